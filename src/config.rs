use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub confirm: ConfirmConfig,
}

// ============================================================================
// Game Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    #[default]
    White,
    Black,
}

impl From<PlayerColor> for shakmaty::Color {
    fn from(color: PlayerColor) -> Self {
        match color {
            PlayerColor::White => shakmaty::Color::White,
            PlayerColor::Black => shakmaty::Color::Black,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct GameConfig {
    /// Side the user plays when an engine is attached
    #[serde(default)]
    pub player: PlayerColor,
}

// ============================================================================
// Engine Config
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    /// Play against the engine; when false both sides are spoken
    #[serde(default = "default_engine_enabled")]
    pub enabled: bool,
    /// Engine binary (supports ${ENV_VAR} syntax)
    #[serde(default = "default_engine_path")]
    pub path: String,
    /// Extra command line arguments for the engine
    #[serde(default)]
    pub args: Vec<String>,
    /// Fixed search depth for every reply
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default = "default_threads")]
    pub threads: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_engine_enabled(),
            path: default_engine_path(),
            args: Vec::new(),
            depth: default_depth(),
            threads: default_threads(),
        }
    }
}

fn default_engine_enabled() -> bool {
    true
}

fn default_engine_path() -> String {
    "stockfish".into()
}

fn default_depth() -> u32 {
    10
}

fn default_threads() -> u32 {
    1
}

// ============================================================================
// Speech Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(tag = "input", rename_all = "lowercase")]
pub enum SpeechConfig {
    /// Transcripts typed on stdin
    #[default]
    Console,
    /// Microphone with VAD and Parakeet transcription (needs the `mic` feature)
    Mic {
        #[serde(default = "default_transcriber_model")]
        model_path: String,
        #[serde(default = "default_vad_model")]
        vad_model: String,
    },
}

fn default_transcriber_model() -> String {
    "models/parakeet-tdt-0.6b-v3-int8".into()
}

fn default_vad_model() -> String {
    "models/silero_vad_v4.onnx".into()
}

// ============================================================================
// Voice Config
// ============================================================================

#[derive(Debug, Deserialize, Default, Clone)]
pub struct VoiceConfig {
    /// External TTS program, e.g. "say" or "espeak". Text only when unset.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments placed before the spoken text
    #[serde(default)]
    pub args: Vec<String>,
}

// ============================================================================
// Confirm Config
// ============================================================================

#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct ConfirmConfig {
    /// Match confirmation keywords as whole words instead of substrings
    #[serde(default)]
    pub whole_word: bool,
}

/// Expand ${VAR} to environment variable values
fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_else(|_| {
                warn!("environment variable '{}' not found", var_name);
                String::new()
            });
            result.replace_range(start..start + end + 1, &value);
        } else {
            break;
        }
    }

    result
}

impl Config {
    /// Load from a TOML file, falling back to defaults when missing or invalid
    pub fn load(path: &Path) -> Self {
        let mut config = if path.exists() {
            match fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|s| Self::parse(&s).map_err(|e| e.to_string()))
            {
                Ok(config) => config,
                Err(e) => {
                    warn!("ignoring {}: {}", path.display(), e);
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        config.resolve();
        config
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn resolve(&mut self) {
        self.engine.path = expand_env_vars(&self.engine.path);
    }
}
