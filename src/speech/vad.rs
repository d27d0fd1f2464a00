use std::path::Path;

use tracing::{info, warn};
use vad_rs::Vad;

use super::segment::{SAMPLE_RATE, rms};

const SILERO_THRESHOLD: f32 = 0.3;
const SILERO_THRESHOLD_END: f32 = 0.25;
const ENERGY_THRESHOLD: f32 = 0.01;
const ENERGY_THRESHOLD_END: f32 = 0.006;

/// Voice activity detector. Thresholds are lower once speech has started so
/// trailing syllables are kept.
pub enum VadEngine {
    Silero(Vad),
    Energy,
}

impl VadEngine {
    /// Silero when the model file loads, energy otherwise
    pub fn load(model_path: &str) -> Self {
        if !Path::new(model_path).exists() {
            info!("no VAD model at {}, using energy detection", model_path);
            return VadEngine::Energy;
        }
        match Vad::new(model_path, SAMPLE_RATE) {
            Ok(vad) => VadEngine::Silero(vad),
            Err(e) => {
                warn!("failed to load VAD model {}: {}", model_path, e);
                VadEngine::Energy
            }
        }
    }

    pub fn is_speech(&mut self, frame: &[f32], currently_speaking: bool) -> bool {
        match self {
            VadEngine::Silero(vad) => {
                let threshold = if currently_speaking {
                    SILERO_THRESHOLD_END
                } else {
                    SILERO_THRESHOLD
                };
                vad.compute(frame)
                    .map(|r| r.prob > threshold)
                    .unwrap_or(false)
            }
            VadEngine::Energy => {
                let threshold = if currently_speaking {
                    ENERGY_THRESHOLD_END
                } else {
                    ENERGY_THRESHOLD
                };
                rms(frame) > threshold
            }
        }
    }

    pub fn reset(&mut self) {
        if let VadEngine::Silero(vad) = self {
            vad.reset();
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VadEngine::Silero(_) => "Silero",
            VadEngine::Energy => "Energy",
        }
    }
}
