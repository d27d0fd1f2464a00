//! Speech collaborators - where transcripts come from and where replies go
//!
//! Input is session based: `start_listening` opens a session that ends with
//! exactly one `Event::Heard` or `Event::ListenFailed` on the event channel.
//! Starting a session implicitly ends the previous one, and anything a
//! stopped session would have produced is dropped.

mod console;
mod voice;

#[cfg(feature = "mic")]
mod mic;
#[cfg(any(feature = "mic", test))]
mod segment;
#[cfg(feature = "mic")]
mod vad;

pub use console::ConsoleInput;
pub use voice::{CommandVoice, ConsoleVoice};

#[cfg(feature = "mic")]
pub use mic::MicInput;

use crate::config::{SpeechConfig, VoiceConfig};
use crate::dialogue::Event;

pub trait SpeechInput {
    fn start_listening(&mut self);
    /// Safe to call when no session is open
    fn stop_listening(&mut self);
    fn is_listening(&self) -> bool;
}

pub trait SpeechOutput {
    /// Fire and forget. Cuts off whatever is still being spoken.
    fn speak(&mut self, text: &str);
}

/// Build the configured speech input. An error here means speech input is
/// not available in this environment at all.
pub fn build_input(
    config: &SpeechConfig,
    events: flume::Sender<Event>,
) -> anyhow::Result<Box<dyn SpeechInput>> {
    match config {
        SpeechConfig::Console => Ok(Box::new(ConsoleInput::spawn(events))),
        #[cfg(feature = "mic")]
        SpeechConfig::Mic {
            model_path,
            vad_model,
        } => Ok(Box::new(MicInput::new(model_path, vad_model, events)?)),
        #[cfg(not(feature = "mic"))]
        SpeechConfig::Mic { .. } => {
            anyhow::bail!("microphone input is not available in this build (enable the `mic` feature)")
        }
    }
}

pub fn build_output(config: &VoiceConfig) -> Box<dyn SpeechOutput> {
    match &config.command {
        Some(program) => Box::new(CommandVoice::new(program, &config.args)),
        None => Box::new(ConsoleVoice),
    }
}
