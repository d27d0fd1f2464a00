//! Chess engine over UCI (async I/O)
//!
//! The engine runs as a child process owned by a tokio task. Requests go in
//! through a channel and each reply comes back later as an [`Event`] on the
//! dialogue's event channel, so asking for a move never blocks.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::dialogue::Event;
use crate::ui;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start engine `{path}`: {source}")]
    Spawn {
        path: String,
        source: std::io::Error,
    },
    #[error("engine i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine closed its output")]
    Closed,
    #[error("engine is no longer running")]
    Stopped,
}

/// Ask for the best move in a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub fen: String,
    pub depth: u32,
    /// Echoed back with the reply so stale answers can be dropped
    pub ticket: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReply {
    /// Coordinate move, `<from><to>[promotion]`
    BestMove(String),
    /// The side to move has no legal moves
    NoMoves,
    Failed(String),
}

pub trait Engine {
    /// Start a search. Returns at once; the reply arrives as an event.
    fn request_move(&mut self, request: SearchRequest) -> Result<(), EngineError>;
    /// Abandon every search with a ticket up to `ticket`. A search already
    /// running is stopped early; its reply still arrives and is stale.
    fn cancel(&mut self, ticket: u64);
    fn shutdown(&mut self);
}

/// Parse a `bestmove` line. `None` for any other line.
pub fn parse_bestmove(line: &str) -> Option<EngineReply> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "bestmove" {
        return None;
    }
    Some(match parts.next() {
        None | Some("(none)") | Some("0000") => EngineReply::NoMoves,
        Some(mv) => EngineReply::BestMove(mv.to_string()),
    })
}

/// A running UCI process
struct UciProcess {
    // Held so the child is killed when the process handle is dropped
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl UciProcess {
    async fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut child = Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: config.path.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(EngineError::Closed)?;
        let stdout = BufReader::new(child.stdout.take().ok_or(EngineError::Closed)?).lines();

        let mut process = Self {
            _child: child,
            stdin,
            stdout,
        };

        process.send("uci").await?;
        process.wait_for("uciok").await?;
        process
            .send(&format!("setoption name Threads value {}", config.threads))
            .await?;
        process.send("ucinewgame").await?;
        process.send("isready").await?;
        process.wait_for("readyok").await?;

        Ok(process)
    }

    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "engine <");
        self.stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, EngineError> {
        let line = self.stdout.next_line().await?.ok_or(EngineError::Closed)?;
        let line = line.trim().to_string();
        debug!(line = line.as_str(), "engine >");
        Ok(line)
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        while self.read_line().await? != expected {}
        Ok(())
    }

    /// Search and wait for `bestmove`. A cancel covering this ticket sends
    /// `stop`, which makes the engine answer at once.
    async fn best_move(
        &mut self,
        request: &SearchRequest,
        cancel: &mut watch::Receiver<u64>,
    ) -> Result<EngineReply, EngineError> {
        self.send(&format!("position fen {}", request.fen)).await?;
        self.send(&format!("go depth {}", request.depth)).await?;
        let mut watching = true;
        loop {
            tokio::select! {
                // next_line is cancel safe, no partial line is lost
                line = self.read_line() => {
                    if let Some(reply) = parse_bestmove(&line?) {
                        return Ok(reply);
                    }
                }
                changed = cancel.changed(), if watching => {
                    if changed.is_err() || *cancel.borrow_and_update() >= request.ticket {
                        watching = false;
                        if changed.is_ok() {
                            debug!(ticket = request.ticket, "search stopped");
                            self.send("stop").await?;
                        }
                    }
                }
            }
        }
    }

    async fn quit(mut self) {
        let _ = self.send("quit").await;
    }
}

/// Engine handle; the process lives in a background task
pub struct UciEngine {
    requests: Option<mpsc::UnboundedSender<SearchRequest>>,
    /// Highest cancelled ticket
    cancel: watch::Sender<u64>,
}

impl UciEngine {
    /// Start the engine process and finish the UCI handshake
    pub async fn spawn(
        config: &EngineConfig,
        events: flume::Sender<Event>,
    ) -> Result<Self, EngineError> {
        let process = UciProcess::start(config).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (cancel, cancel_rx) = watch::channel(0);
        tokio::spawn(run(process, rx, cancel_rx, events));
        Ok(Self {
            requests: Some(tx),
            cancel,
        })
    }
}

async fn run(
    mut process: UciProcess,
    mut rx: mpsc::UnboundedReceiver<SearchRequest>,
    mut cancel: watch::Receiver<u64>,
    events: flume::Sender<Event>,
) {
    while let Some(request) = rx.recv().await {
        if request.ticket <= *cancel.borrow_and_update() {
            debug!(ticket = request.ticket, "cancelled before it started");
            continue;
        }
        let reply = match process.best_move(&request, &mut cancel).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("engine search failed: {}", e);
                let _ = events.send(Event::EngineMoved {
                    ticket: request.ticket,
                    reply: EngineReply::Failed(e.to_string()),
                });
                return;
            }
        };
        let event = Event::EngineMoved {
            ticket: request.ticket,
            reply,
        };
        if events.send(event).is_err() {
            break;
        }
    }
    process.quit().await;
}

impl Engine for UciEngine {
    fn request_move(&mut self, request: SearchRequest) -> Result<(), EngineError> {
        let tx = self.requests.as_ref().ok_or(EngineError::Stopped)?;
        if tx.send(request).is_err() {
            self.requests = None;
            return Err(EngineError::Stopped);
        }
        ui::thinking();
        Ok(())
    }

    fn cancel(&mut self, ticket: u64) {
        self.cancel.send_if_modified(|current| {
            let newer = ticket > *current;
            if newer {
                *current = ticket;
            }
            newer
        });
    }

    fn shutdown(&mut self) {
        // Dropping the sender ends the task, which sends `quit`
        self.requests = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bestmove() {
        assert_eq!(
            parse_bestmove("bestmove e2e4 ponder e7e5"),
            Some(EngineReply::BestMove("e2e4".into()))
        );
        assert_eq!(
            parse_bestmove("bestmove e7e8q"),
            Some(EngineReply::BestMove("e7e8q".into()))
        );
        assert_eq!(parse_bestmove("bestmove (none)"), Some(EngineReply::NoMoves));
        assert_eq!(parse_bestmove("bestmove 0000"), Some(EngineReply::NoMoves));
        assert_eq!(parse_bestmove("bestmove"), Some(EngineReply::NoMoves));
    }

    #[test]
    fn test_other_lines_ignored() {
        assert_eq!(parse_bestmove("info depth 10 score cp 20 pv e2e4"), None);
        assert_eq!(parse_bestmove("readyok"), None);
        assert_eq!(parse_bestmove(""), None);
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let config = EngineConfig {
            path: "/nonexistent/voice-chess-engine".into(),
            ..EngineConfig::default()
        };
        let (tx, _rx) = flume::unbounded();
        let err = UciEngine::spawn(&config, tx).await.err().unwrap();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }

    /// Start a shell-script engine. Each `go` line is answered by `on_go`.
    #[cfg(unix)]
    async fn fake_engine(name: &str, on_go: &str) -> (UciEngine, flume::Receiver<Event>) {
        let script = std::env::temp_dir().join(format!(
            "voice-chess-{}-{}.sh",
            name,
            std::process::id()
        ));
        let body = format!(
            "while read -r line; do\n\
             case \"$line\" in\n\
             uci) echo 'id name fake'; echo uciok ;;\n\
             isready) echo readyok ;;\n\
             {}\n\
             quit) exit 0 ;;\n\
             esac\n\
             done\n",
            on_go
        );
        std::fs::write(&script, body).unwrap();
        let config = EngineConfig {
            path: "sh".into(),
            args: vec![script.to_string_lossy().into_owned()],
            ..EngineConfig::default()
        };
        let (tx, rx) = flume::unbounded();
        let engine = UciEngine::spawn(&config, tx).await.unwrap();
        (engine, rx)
    }

    #[cfg(unix)]
    fn request(ticket: u64, depth: u32) -> SearchRequest {
        SearchRequest {
            fen: "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1".into(),
            depth,
            ticket,
        }
    }

    #[cfg(unix)]
    async fn next_event(rx: &flume::Receiver<Event>) -> Event {
        tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv_async())
            .await
            .expect("engine did not answer")
            .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_best_move_keeps_ticket() {
        let (mut engine, rx) = fake_engine(
            "bestmove",
            "go*) echo 'info depth 1 pv e7e5'; echo 'bestmove e7e5 ponder g1f3' ;;",
        )
        .await;
        engine.request_move(request(7, 10)).unwrap();
        assert_eq!(
            next_event(&rx).await,
            Event::EngineMoved {
                ticket: 7,
                reply: EngineReply::BestMove("e7e5".into()),
            }
        );
        engine.shutdown();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_exit_reports_failure() {
        let (mut engine, rx) = fake_engine("exits", "go*) exit 1 ;;").await;
        engine.request_move(request(7, 10)).unwrap();
        match next_event(&rx).await {
            Event::EngineMoved {
                ticket: 7,
                reply: EngineReply::Failed(_),
            } => {}
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_search_does_not_block_the_next() {
        // depth 1 only answers once stopped; any other depth answers at once
        let (mut engine, rx) = fake_engine(
            "cancel",
            "'go depth 1') ;;\n\
             stop) echo 'bestmove d7d5' ;;\n\
             go*) echo 'bestmove e7e5' ;;",
        )
        .await;
        engine.request_move(request(1, 1)).unwrap();
        engine.cancel(1);
        engine.request_move(request(2, 10)).unwrap();

        loop {
            match next_event(&rx).await {
                Event::EngineMoved { ticket: 1, .. } => continue,
                event => {
                    assert_eq!(
                        event,
                        Event::EngineMoved {
                            ticket: 2,
                            reply: EngineReply::BestMove("e7e5".into()),
                        }
                    );
                    break;
                }
            }
        }
    }
}
