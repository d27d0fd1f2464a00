use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::debug;

use crate::command::{UserCommand, is_slash_command, parse_slash_command};
use crate::dialogue::Event;
use crate::ui;

/// Transcripts typed on stdin, one line per utterance
pub struct ConsoleInput {
    listening: Arc<AtomicBool>,
}

impl ConsoleInput {
    /// Start the stdin reader thread
    pub fn spawn(events: flume::Sender<Event>) -> Self {
        let listening = Arc::new(AtomicBool::new(false));
        let reader_flag = Arc::clone(&listening);
        thread::spawn(move || {
            let stdin = std::io::stdin();
            read_lines(stdin.lock(), &reader_flag, &events);
        });
        Self { listening }
    }
}

impl super::SpeechInput for ConsoleInput {
    fn start_listening(&mut self) {
        self.listening.store(true, Ordering::SeqCst);
        ui::listening();
    }

    fn stop_listening(&mut self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

/// Reader loop. Commands always go through; a typed line becomes a
/// transcript only when a session is open, and closes that session.
fn read_lines<R: BufRead>(reader: R, listening: &AtomicBool, events: &flume::Sender<Event>) {
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = if is_slash_command(line) {
            match parse_slash_command(line) {
                Some(cmd) => Event::Command(cmd),
                None => {
                    ui::error(&format!("Unknown command: {} (try /help)", line));
                    continue;
                }
            }
        } else if listening.swap(false, Ordering::SeqCst) {
            Event::Heard(line.to_string())
        } else {
            debug!(line, "typed while not listening");
            ui::notice("Not listening. /start to speak a move.");
            continue;
        };

        if events.send(event).is_err() {
            return;
        }
    }
    // stdin closed
    let _ = events.send(Event::Command(UserCommand::Quit));
}
