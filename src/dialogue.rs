//! Dialogue controller - listen, interpret, confirm, commit
//!
//! Everything the controller reacts to arrives as an [`Event`] on a single
//! channel: transcripts and failures from speech input, engine replies, and
//! user commands. Handling an event never blocks; the next step is always a
//! fresh listening session or an engine request whose answer comes back as
//! another event, so the unbounded "say that again" loop is a chain of
//! events rather than a chain of calls.

use shakmaty::Color;
use tracing::{debug, info, warn};

use crate::command::{self, UserCommand};
use crate::confirm::{Classifier, Verdict};
use crate::engine::{Engine, EngineReply, SearchRequest};
use crate::game::{MoveApplier, MoveSpec};
use crate::interpret::{describe, interpret_utterance};
use crate::speech::{SpeechInput, SpeechOutput};
use crate::ui;

/// Input to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// One transcript from a listening session
    Heard(String),
    /// The listening session ended in a recognition failure
    ListenFailed(String),
    /// An engine reply, tagged with the ticket of its request
    EngineMoved { ticket: u64, reply: EngineReply },
    Command(UserCommand),
}

/// Where the conversation is. The pending move only exists while waiting
/// for a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogueState {
    #[default]
    AwaitingMove,
    AwaitingConfirmation { pending: String },
}

impl DialogueState {
    /// The move awaiting confirmation, or "" when there is none
    pub fn pending_san(&self) -> &str {
        match self {
            DialogueState::AwaitingMove => "",
            DialogueState::AwaitingConfirmation { pending } => pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Side the user plays against the engine
    pub player: Color,
    /// Engine search depth
    pub depth: u32,
    /// Whole-word confirmation matching
    pub whole_word: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            player: Color::White,
            depth: 10,
            whole_word: false,
        }
    }
}

pub struct Controller {
    input: Box<dyn SpeechInput>,
    output: Box<dyn SpeechOutput>,
    game: Box<dyn MoveApplier>,
    /// `None` means both sides are played by voice
    engine: Option<Box<dyn Engine>>,
    classifier: Classifier,
    player: Color,
    depth: u32,
    state: DialogueState,
    engine_busy: bool,
    /// Bumped on every new game so replies to old searches are dropped
    ticket: u64,
    /// Game over; only a new game gets things moving again
    finished: bool,
}

impl Controller {
    pub fn new(
        input: Box<dyn SpeechInput>,
        output: Box<dyn SpeechOutput>,
        game: Box<dyn MoveApplier>,
        engine: Option<Box<dyn Engine>>,
        options: Options,
    ) -> Self {
        Self {
            input,
            output,
            game,
            engine,
            classifier: Classifier::new(options.whole_word),
            player: options.player,
            depth: options.depth,
            state: DialogueState::AwaitingMove,
            engine_busy: false,
            ticket: 0,
            finished: false,
        }
    }

    pub fn state(&self) -> &DialogueState {
        &self.state
    }

    pub fn pending_san(&self) -> &str {
        self.state.pending_san()
    }

    pub fn is_engine_busy(&self) -> bool {
        self.engine_busy
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn handle(&mut self, event: Event) -> Flow {
        match event {
            Event::Heard(text) => self.on_heard(&text),
            Event::ListenFailed(reason) => self.on_listen_failed(&reason),
            Event::EngineMoved { ticket, reply } => self.on_engine_moved(ticket, reply),
            Event::Command(cmd) => return self.on_command(cmd),
        }
        Flow::Continue
    }

    fn on_command(&mut self, cmd: UserCommand) -> Flow {
        match cmd {
            UserCommand::NewGame => self.new_game(),
            UserCommand::Start => self.start(),
            UserCommand::Stop => self.stop(),
            UserCommand::Status => ui::notice(&self.status()),
            UserCommand::Help => ui::notice(command::HELP),
            UserCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Reset the board and the dialogue, then play the first turn
    pub fn new_game(&mut self) {
        self.input.stop_listening();
        self.game.reset();
        self.state = DialogueState::AwaitingMove;
        if self.engine_busy {
            // The old search is stopped and its reply dropped by ticket
            if let Some(engine) = self.engine.as_mut() {
                engine.cancel(self.ticket);
            }
            self.engine_busy = false;
        }
        self.finished = false;
        self.ticket += 1;
        info!(ticket = self.ticket, "new game");

        let intro = if self.engine.is_some() {
            format!("New game. You play {}.", color_name(self.player))
        } else {
            "New game.".to_string()
        };
        self.next_turn(&intro);
    }

    /// Enter the awaiting-move state and listen, unless already listening
    pub fn start(&mut self) {
        if self.finished {
            self.output.speak("The game is over. Start a new game to play again.");
            return;
        }
        if self.engine_busy {
            ui::notice("The engine is thinking");
            return;
        }
        if self.input.is_listening() {
            return;
        }
        self.state = DialogueState::AwaitingMove;
        self.next_turn("");
    }

    /// Stop listening. The dialogue stays where it is.
    pub fn stop(&mut self) {
        self.input.stop_listening();
        ui::notice("Stopped listening. /start to resume.");
    }

    /// Release speech input and the engine
    pub fn shutdown(&mut self) {
        self.input.stop_listening();
        if let Some(mut engine) = self.engine.take() {
            engine.shutdown();
        }
        self.engine_busy = false;
    }

    pub fn status(&self) -> String {
        let state = match &self.state {
            DialogueState::AwaitingMove => "awaiting move".to_string(),
            DialogueState::AwaitingConfirmation { pending } => {
                format!("awaiting confirmation of {}", pending)
            }
        };
        let engine = match (&self.engine, self.engine_busy) {
            (None, _) => "off",
            (Some(_), true) => "thinking",
            (Some(_), false) => "idle",
        };
        format!(
            "state: {}\nto move: {}\nlistening: {}\nengine: {}\ngame over: {}\nfen: {}",
            state,
            color_name(self.game.side_to_move()),
            if self.input.is_listening() { "yes" } else { "no" },
            engine,
            if self.finished { "yes" } else { "no" },
            self.game.position_fen(),
        )
    }

    fn on_heard(&mut self, text: &str) {
        if self.finished || self.engine_busy {
            debug!(text, "transcript ignored");
            return;
        }
        ui::heard(text);

        let pending = match &self.state {
            DialogueState::AwaitingMove => None,
            DialogueState::AwaitingConfirmation { pending } => Some(pending.clone()),
        };
        let Some(pending) = pending else {
            let san = interpret_utterance(text);
            debug!(text, san = san.as_str(), "interpreted");
            if san.is_empty() {
                self.output
                    .speak("Sorry, I didn't understand that move. Please say it again.");
                self.listen();
            } else {
                self.propose(san);
            }
            return;
        };

        let verdict = self.classifier.classify(text);
        debug!(text, %verdict, pending = pending.as_str(), "classified");
        match verdict {
            Verdict::Confirm => self.commit(pending),
            Verdict::Cancel => {
                self.state = DialogueState::AwaitingMove;
                self.output.speak("Canceled. Say your move.");
                self.listen();
            }
            Verdict::Repeat => {
                self.prompt(&pending);
                self.listen();
            }
            Verdict::Unknown => {
                let san = interpret_utterance(text);
                if san.is_empty() {
                    self.output.speak("Please say confirm or cancel.");
                    self.listen();
                } else {
                    self.propose(san);
                }
            }
        }
    }

    fn on_listen_failed(&mut self, reason: &str) {
        warn!("speech input failed: {}", reason);
        ui::error(&format!("Speech input failed: {}", reason));
        self.input.stop_listening();
        self.state = DialogueState::AwaitingMove;
        self.output
            .speak("I couldn't hear that. Use start when you are ready to try again.");
    }

    fn on_engine_moved(&mut self, ticket: u64, reply: EngineReply) {
        if ticket != self.ticket || !self.engine_busy {
            debug!(ticket, current = self.ticket, "stale engine reply dropped");
            return;
        }
        self.engine_busy = false;

        match reply {
            EngineReply::BestMove(uci) => {
                match self.game.apply_move(&MoveSpec::Uci(uci.clone())) {
                    Some(result) => {
                        info!(san = result.san.as_str(), uci = result.uci.as_str(), "engine move");
                        self.next_turn(&format!("I play {}.", describe(&result.san)));
                    }
                    None => self.engine_lost(&format!("engine sent an illegal move {}", uci)),
                }
            }
            EngineReply::NoMoves => {
                if self.game.is_checkmate() || self.game.is_draw() {
                    self.next_turn("");
                } else {
                    self.engine_lost("engine found no move in a live position");
                }
            }
            EngineReply::Failed(reason) => self.engine_lost(&reason),
        }
    }

    fn propose(&mut self, san: String) {
        self.prompt(&san);
        self.state = DialogueState::AwaitingConfirmation { pending: san };
        self.listen();
    }

    fn prompt(&mut self, san: &str) {
        self.output.speak(&format!(
            "Did you say {}? Say confirm or cancel.",
            describe(san)
        ));
    }

    fn commit(&mut self, pending: String) {
        self.state = DialogueState::AwaitingMove;
        match self.game.apply_move(&MoveSpec::San(pending.clone())) {
            Some(result) => {
                info!(san = result.san.as_str(), uci = result.uci.as_str(), "move played");
                let said = if self.engine.is_some() {
                    format!("You play {}.", describe(&result.san))
                } else {
                    format!("{}.", capitalize(&describe(&result.san)))
                };
                self.next_turn(&said);
            }
            None => {
                debug!(san = pending.as_str(), "rejected");
                self.output
                    .speak(&format!(
                        "{} is an illegal move. Say another move.",
                        capitalize(&describe(&pending))
                    ));
                self.listen();
            }
        }
    }

    /// Announce what just happened, then end the game, ask the engine, or
    /// listen for the next spoken move
    fn next_turn(&mut self, preface: &str) {
        if let Some(result) = self.game_over_message() {
            self.finished = true;
            self.state = DialogueState::AwaitingMove;
            self.input.stop_listening();
            info!(result = result.as_str(), "game over");
            self.output.speak(&join(preface, &result));
            return;
        }

        if self.engine_to_move() {
            if !preface.is_empty() {
                self.output.speak(preface);
            }
            self.request_engine_move();
            return;
        }

        let ask = if self.engine.is_some() {
            "Your move.".to_string()
        } else {
            format!("{} to move.", capitalize(color_name(self.game.side_to_move())))
        };
        self.output.speak(&join(preface, &ask));
        self.listen();
    }

    fn game_over_message(&self) -> Option<String> {
        if self.game.is_checkmate() {
            let winner = match self.game.side_to_move() {
                Color::White => Color::Black,
                Color::Black => Color::White,
            };
            Some(format!("Checkmate. {} wins.", capitalize(color_name(winner))))
        } else if self.game.is_draw() {
            Some("The game is a draw.".to_string())
        } else {
            None
        }
    }

    fn engine_to_move(&self) -> bool {
        self.engine.is_some() && self.game.side_to_move() != self.player
    }

    fn request_engine_move(&mut self) {
        if self.engine_busy {
            debug!(ticket = self.ticket, "engine already searching");
            return;
        }
        let request = SearchRequest {
            fen: self.game.position_fen(),
            depth: self.depth,
            ticket: self.ticket,
        };
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        self.input.stop_listening();
        match engine.request_move(request) {
            Ok(()) => self.engine_busy = true,
            Err(e) => self.engine_lost(&e.to_string()),
        }
    }

    /// Drop the engine and carry on with both sides spoken
    fn engine_lost(&mut self, reason: &str) {
        warn!("engine dropped: {}", reason);
        ui::error(&format!("Engine error: {}", reason));
        if let Some(mut engine) = self.engine.take() {
            engine.shutdown();
        }
        self.engine_busy = false;
        self.next_turn("The engine stopped. You can keep playing both sides.");
    }

    /// Open a fresh listening session (stop-then-start)
    fn listen(&mut self) {
        if self.finished || self.engine_busy {
            return;
        }
        self.input.stop_listening();
        self.input.start_listening();
    }
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn join(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{} {}", first, second),
    }
}
