use std::process::{Child, Command, Stdio};

use tracing::warn;

use crate::ui;

/// Replies printed to the terminal
pub struct ConsoleVoice;

impl super::SpeechOutput for ConsoleVoice {
    fn speak(&mut self, text: &str) {
        ui::say(text);
    }
}

/// Replies printed and spoken by an external TTS program such as `say` or
/// `espeak`. The text is passed as the last argument.
pub struct CommandVoice {
    program: String,
    args: Vec<String>,
    current: Option<Child>,
}

impl CommandVoice {
    pub fn new(program: &str, args: &[String]) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
            current: None,
        }
    }

    /// Cut off the utterance in progress, if any
    fn silence(&mut self) {
        if let Some(mut child) = self.current.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

impl super::SpeechOutput for CommandVoice {
    fn speak(&mut self, text: &str) {
        self.silence();
        ui::say(text);
        match Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => self.current = Some(child),
            Err(e) => warn!("failed to run {}: {}", self.program, e),
        }
    }
}

impl Drop for CommandVoice {
    fn drop(&mut self) {
        self.silence();
    }
}
