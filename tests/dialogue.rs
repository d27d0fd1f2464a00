use std::cell::RefCell;
use std::rc::Rc;

use shakmaty::Color;
use voice_chess::command::UserCommand;
use voice_chess::dialogue::{Controller, DialogueState, Event, Flow, Options};
use voice_chess::engine::{Engine, EngineError, EngineReply, SearchRequest};
use voice_chess::game::{Game, MoveApplier, MoveResult, MoveSpec};
use voice_chess::speech::{SpeechInput, SpeechOutput};

#[derive(Default)]
struct Mic {
    listening: bool,
    sessions: usize,
    /// A session was started while another was still open
    overlapped: bool,
}

struct MockInput(Rc<RefCell<Mic>>);

impl SpeechInput for MockInput {
    fn start_listening(&mut self) {
        let mut mic = self.0.borrow_mut();
        if mic.listening {
            mic.overlapped = true;
        }
        mic.listening = true;
        mic.sessions += 1;
    }

    fn stop_listening(&mut self) {
        self.0.borrow_mut().listening = false;
    }

    fn is_listening(&self) -> bool {
        self.0.borrow().listening
    }
}

struct MockOutput(Rc<RefCell<Vec<String>>>);

impl SpeechOutput for MockOutput {
    fn speak(&mut self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }
}

struct SharedGame(Rc<RefCell<Game>>);

impl MoveApplier for SharedGame {
    fn apply_move(&mut self, spec: &MoveSpec) -> Option<MoveResult> {
        self.0.borrow_mut().apply_move(spec)
    }
    fn is_checkmate(&self) -> bool {
        self.0.borrow().is_checkmate()
    }
    fn is_draw(&self) -> bool {
        self.0.borrow().is_draw()
    }
    fn position_fen(&self) -> String {
        self.0.borrow().position_fen()
    }
    fn side_to_move(&self) -> Color {
        self.0.borrow().side_to_move()
    }
    fn reset(&mut self) {
        self.0.borrow_mut().reset()
    }
}

#[derive(Default)]
struct EngineLog {
    requests: Vec<SearchRequest>,
    cancelled: Vec<u64>,
    refuse: bool,
    shut_down: bool,
}

struct MockEngine(Rc<RefCell<EngineLog>>);

impl Engine for MockEngine {
    fn request_move(&mut self, request: SearchRequest) -> Result<(), EngineError> {
        let mut log = self.0.borrow_mut();
        if log.refuse {
            return Err(EngineError::Stopped);
        }
        log.requests.push(request);
        Ok(())
    }

    fn cancel(&mut self, ticket: u64) {
        self.0.borrow_mut().cancelled.push(ticket);
    }

    fn shutdown(&mut self) {
        self.0.borrow_mut().shut_down = true;
    }
}

struct Harness {
    controller: Controller,
    mic: Rc<RefCell<Mic>>,
    spoken: Rc<RefCell<Vec<String>>>,
    game: Rc<RefCell<Game>>,
    engine: Option<Rc<RefCell<EngineLog>>>,
}

impl Harness {
    fn hot_seat() -> Self {
        Self::build(None, Color::White)
    }

    fn with_engine(player: Color) -> Self {
        Self::build(Some(EngineLog::default()), player)
    }

    fn build(engine: Option<EngineLog>, player: Color) -> Self {
        let mic = Rc::new(RefCell::new(Mic::default()));
        let spoken = Rc::new(RefCell::new(Vec::new()));
        let game = Rc::new(RefCell::new(Game::new()));
        let engine = engine.map(|log| Rc::new(RefCell::new(log)));
        let boxed: Option<Box<dyn Engine>> = engine
            .as_ref()
            .map(|log| Box::new(MockEngine(Rc::clone(log))) as Box<dyn Engine>);
        let controller = Controller::new(
            Box::new(MockInput(Rc::clone(&mic))),
            Box::new(MockOutput(Rc::clone(&spoken))),
            Box::new(SharedGame(Rc::clone(&game))),
            boxed,
            Options {
                player,
                depth: 8,
                whole_word: false,
            },
        );
        let mut harness = Self {
            controller,
            mic,
            spoken,
            game,
            engine,
        };
        harness.controller.new_game();
        harness.check_invariants();
        harness
    }

    fn hear(&mut self, text: &str) -> Flow {
        self.send(Event::Heard(text.to_string()))
    }

    fn send(&mut self, event: Event) -> Flow {
        let flow = self.controller.handle(event);
        self.check_invariants();
        flow
    }

    fn check_invariants(&self) {
        let confirming = matches!(
            self.controller.state(),
            DialogueState::AwaitingConfirmation { .. }
        );
        assert_eq!(!self.controller.pending_san().is_empty(), confirming);
        assert!(!self.mic.borrow().overlapped, "listening sessions overlapped");
        if self.controller.is_engine_busy() {
            assert!(!self.listening());
        }
    }

    fn listening(&self) -> bool {
        self.mic.borrow().listening
    }

    fn last_spoken(&self) -> String {
        self.spoken.borrow().last().cloned().unwrap_or_default()
    }

    fn history(&self) -> Vec<String> {
        self.game.borrow().history().to_vec()
    }

    fn requests(&self) -> Vec<SearchRequest> {
        self.engine
            .as_ref()
            .map(|log| log.borrow().requests.clone())
            .unwrap_or_default()
    }

    fn play(&mut self, phrase: &str) {
        self.hear(phrase);
        self.hear("yes");
    }
}

#[test]
fn new_game_listens_for_the_first_move() {
    let h = Harness::hot_seat();
    assert_eq!(h.controller.state(), &DialogueState::AwaitingMove);
    assert!(h.listening());
    assert_eq!(h.last_spoken(), "New game. White to move.");
}

#[test]
fn cancel_clears_the_pending_move() {
    let mut h = Harness::hot_seat();
    h.hear("e four");
    assert_eq!(
        h.controller.state(),
        &DialogueState::AwaitingConfirmation {
            pending: "e4".into()
        }
    );
    assert!(h.last_spoken().contains("Did you say e4?"));
    assert!(h.listening());

    h.hear("nope");
    assert_eq!(h.controller.state(), &DialogueState::AwaitingMove);
    assert_eq!(h.controller.pending_san(), "");
    assert!(h.last_spoken().starts_with("Canceled"));
    assert!(h.listening());
    assert!(h.history().is_empty());
}

#[test]
fn confirm_plays_the_move() {
    let mut h = Harness::hot_seat();
    h.hear("knight f three");
    h.hear("yes please");
    assert_eq!(h.history(), ["Nf3"]);
    assert_eq!(h.controller.state(), &DialogueState::AwaitingMove);
    assert_eq!(h.last_spoken(), "Knight f3. Black to move.");
    assert!(h.listening());
}

#[test]
fn unrecognized_phrase_asks_again() {
    let mut h = Harness::hot_seat();
    let sessions = h.mic.borrow().sessions;
    h.hear("knight");
    assert_eq!(h.controller.state(), &DialogueState::AwaitingMove);
    assert!(h.last_spoken().contains("didn't understand"));
    assert!(h.listening());
    assert_eq!(h.mic.borrow().sessions, sessions + 1);

    for _ in 0..50 {
        h.hear("???");
    }
    assert_eq!(h.controller.state(), &DialogueState::AwaitingMove);
    assert_eq!(h.mic.borrow().sessions, sessions + 51);
}

#[test]
fn illegal_move_is_discarded() {
    let mut h = Harness::hot_seat();
    h.play("e five");
    assert!(h.history().is_empty());
    assert_eq!(h.controller.state(), &DialogueState::AwaitingMove);
    assert!(h.last_spoken().contains("illegal move"));
    assert!(h.listening());
}

#[test]
fn repeat_restates_the_prompt() {
    let mut h = Harness::hot_seat();
    h.hear("e four");
    let prompt = h.last_spoken();
    h.hear("say again");
    assert_eq!(h.last_spoken(), prompt);
    assert_eq!(h.controller.pending_san(), "e4");
    assert!(h.listening());
}

#[test]
fn unknown_answer_can_replace_the_candidate() {
    let mut h = Harness::hot_seat();
    h.hear("e four");
    h.hear("d four");
    assert_eq!(h.controller.pending_san(), "d4");
    assert!(h.last_spoken().contains("Did you say d4?"));

    h.hear("knight");
    assert_eq!(h.controller.pending_san(), "d4");
    assert_eq!(h.last_spoken(), "Please say confirm or cancel.");

    h.hear("okay");
    assert_eq!(h.history(), ["d4"]);
}

#[test]
fn listen_failure_waits_for_start() {
    let mut h = Harness::hot_seat();
    h.hear("e four");
    h.send(Event::ListenFailed("no speech detected".into()));
    assert_eq!(h.controller.state(), &DialogueState::AwaitingMove);
    assert!(!h.listening());
    assert!(h.last_spoken().contains("start"));

    h.send(Event::Command(UserCommand::Start));
    assert!(h.listening());
    assert_eq!(h.last_spoken(), "White to move.");
}

#[test]
fn stop_parks_and_start_resumes() {
    let mut h = Harness::hot_seat();
    h.hear("e four");
    h.send(Event::Command(UserCommand::Stop));
    assert!(!h.listening());
    assert_eq!(h.controller.pending_san(), "e4");

    h.send(Event::Command(UserCommand::Start));
    assert!(h.listening());
    assert_eq!(h.controller.state(), &DialogueState::AwaitingMove);

    // already listening: nothing changes
    let sessions = h.mic.borrow().sessions;
    h.send(Event::Command(UserCommand::Start));
    assert_eq!(h.mic.borrow().sessions, sessions);
}

#[test]
fn engine_replies_after_a_confirmed_move() {
    let mut h = Harness::with_engine(Color::White);
    assert_eq!(h.last_spoken(), "New game. You play white. Your move.");
    h.play("e four");

    let requests = h.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].fen,
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
    );
    assert_eq!(requests[0].depth, 8);
    assert!(h.controller.is_engine_busy());
    assert!(!h.listening());
    assert_eq!(h.last_spoken(), "You play e4.");

    // nothing is heard while the engine thinks
    h.hear("d four");
    assert_eq!(h.controller.state(), &DialogueState::AwaitingMove);

    h.send(Event::EngineMoved {
        ticket: requests[0].ticket,
        reply: EngineReply::BestMove("e7e5".into()),
    });
    assert_eq!(h.history(), ["e4", "e5"]);
    assert!(!h.controller.is_engine_busy());
    assert_eq!(h.last_spoken(), "I play e5. Your move.");
    assert!(h.listening());
}

#[test]
fn engine_opens_when_user_plays_black() {
    let mut h = Harness::with_engine(Color::Black);
    assert_eq!(h.requests().len(), 1);
    assert!(!h.listening());
    let ticket = h.requests()[0].ticket;
    h.send(Event::EngineMoved {
        ticket,
        reply: EngineReply::BestMove("d2d4".into()),
    });
    assert_eq!(h.history(), ["d4"]);
    assert!(h.listening());
}

#[test]
fn stale_engine_reply_is_dropped() {
    let mut h = Harness::with_engine(Color::White);
    h.play("e four");
    let old_ticket = h.requests()[0].ticket;

    h.send(Event::Command(UserCommand::NewGame));
    assert!(h.history().is_empty());
    h.send(Event::EngineMoved {
        ticket: old_ticket,
        reply: EngineReply::BestMove("e7e5".into()),
    });
    assert!(h.history().is_empty());
    assert!(h.listening());
}

#[test]
fn new_game_stops_the_running_search() {
    let mut h = Harness::with_engine(Color::Black);
    assert_eq!(h.requests().len(), 1);

    // start while the engine thinks does not queue another search
    h.send(Event::Command(UserCommand::Start));
    assert_eq!(h.requests().len(), 1);

    h.send(Event::Command(UserCommand::NewGame));
    let requests = h.requests();
    let cancelled = h
        .engine
        .as_ref()
        .map(|log| log.borrow().cancelled.clone())
        .unwrap_or_default();
    let tickets: Vec<u64> = requests.iter().map(|r| r.ticket).collect();
    assert_eq!(tickets, [1, 2]);
    assert_eq!(cancelled, [1]);
    let outstanding = tickets.iter().filter(|t| !cancelled.contains(t)).count();
    assert_eq!(outstanding, 1);
    assert!(h.controller.is_engine_busy());

    // the stopped search still answers, and is ignored
    h.send(Event::EngineMoved {
        ticket: 1,
        reply: EngineReply::BestMove("d2d4".into()),
    });
    assert!(h.history().is_empty());
    assert!(h.controller.is_engine_busy());

    h.send(Event::EngineMoved {
        ticket: 2,
        reply: EngineReply::BestMove("e2e4".into()),
    });
    assert_eq!(h.history(), ["e4"]);
    assert!(h.listening());
}

#[test]
fn new_game_when_idle_cancels_nothing() {
    let mut h = Harness::with_engine(Color::White);
    h.send(Event::Command(UserCommand::NewGame));
    assert!(h.engine.as_ref().is_some_and(|log| log.borrow().cancelled.is_empty()));
    assert!(h.requests().is_empty());
}

#[test]
fn engine_failure_falls_back_to_both_sides() {
    let mut h = Harness::with_engine(Color::White);
    h.play("e four");
    let ticket = h.requests()[0].ticket;
    h.send(Event::EngineMoved {
        ticket,
        reply: EngineReply::Failed("engine closed its output".into()),
    });
    assert!(!h.controller.has_engine());
    assert!(h.engine.as_ref().is_some_and(|log| log.borrow().shut_down));
    assert!(h.last_spoken().ends_with("Black to move."));
    assert!(h.listening());

    h.play("e five");
    assert_eq!(h.history(), ["e4", "e5"]);
}

#[test]
fn refused_request_drops_the_engine() {
    let mut h = Harness::with_engine(Color::White);
    if let Some(log) = &h.engine {
        log.borrow_mut().refuse = true;
    }
    h.play("e four");
    assert!(!h.controller.has_engine());
    assert!(!h.controller.is_engine_busy());
    assert!(h.listening());
}

#[test]
fn checkmate_ends_the_game() {
    let mut h = Harness::hot_seat();
    for phrase in ["f three", "e five", "g four", "queen h four"] {
        h.play(phrase);
    }
    assert_eq!(h.history(), ["f3", "e5", "g4", "Qh4#"]);
    assert!(h.controller.is_finished());
    assert_eq!(
        h.last_spoken(),
        "Queen h4 checkmate. Checkmate. Black wins."
    );
    assert!(!h.listening());

    h.send(Event::Command(UserCommand::Start));
    assert!(!h.listening());
    assert!(h.last_spoken().contains("game is over"));

    h.send(Event::Command(UserCommand::NewGame));
    assert!(!h.controller.is_finished());
    assert!(h.history().is_empty());
    assert!(h.listening());
}

#[test]
fn quit_and_shutdown() {
    let mut h = Harness::with_engine(Color::White);
    assert_eq!(h.send(Event::Command(UserCommand::Status)), Flow::Continue);
    assert!(h.controller.status().contains("awaiting move"));
    assert_eq!(h.send(Event::Command(UserCommand::Quit)), Flow::Quit);

    h.controller.shutdown();
    assert!(!h.listening());
    assert!(h.engine.as_ref().is_some_and(|log| log.borrow().shut_down));
}
