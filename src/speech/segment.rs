//! Utterance segmentation over VAD decisions
//!
//! Frames are 30ms at 16kHz. Speech needs a few consecutive voiced frames
//! to start (so clicks are ignored), keeps a short pre-roll so the first
//! syllable is not clipped, and ends after half a second of silence or at
//! the length cap.

use std::collections::VecDeque;

pub const SAMPLE_RATE: usize = 16000;
pub const FRAME_SAMPLES: usize = 480;

const MIN_SPEECH_SAMPLES: usize = SAMPLE_RATE / 2;
const MAX_SPEECH_SAMPLES: usize = SAMPLE_RATE * 10;
const SILENCE_FRAMES_TO_END: usize = 15;
const PREFILL_FRAMES: usize = 10;
const ONSET_FRAMES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Onset(usize),
    Speaking(usize),
}

pub struct Segmenter {
    phase: Phase,
    speech: Vec<f32>,
    prefill: VecDeque<Vec<f32>>,
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            speech: Vec::with_capacity(MAX_SPEECH_SAMPLES),
            prefill: VecDeque::with_capacity(PREFILL_FRAMES + 1),
        }
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self.phase, Phase::Speaking(_))
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.speech.clear();
        self.prefill.clear();
    }

    /// Feed one frame with its VAD decision. Returns a finished utterance.
    pub fn push(&mut self, frame: &[f32], is_speech: bool) -> Option<Vec<f32>> {
        match &mut self.phase {
            Phase::Idle => {
                if is_speech {
                    self.phase = Phase::Onset(1);
                }
                self.remember(frame);
            }
            Phase::Onset(count) => {
                if is_speech {
                    *count += 1;
                    let started = *count >= ONSET_FRAMES;
                    self.remember(frame);
                    if started {
                        for pf in self.prefill.drain(..) {
                            self.speech.extend_from_slice(&pf);
                        }
                        self.phase = Phase::Speaking(0);
                    }
                } else {
                    self.phase = Phase::Idle;
                    self.remember(frame);
                }
            }
            Phase::Speaking(silence) => {
                self.speech.extend_from_slice(frame);
                if is_speech {
                    *silence = 0;
                } else {
                    *silence += 1;
                }
            }
        }

        let done = match self.phase {
            Phase::Speaking(silence) => {
                silence >= SILENCE_FRAMES_TO_END || self.speech.len() >= MAX_SPEECH_SAMPLES
            }
            _ => false,
        };
        if !done {
            return None;
        }

        self.phase = Phase::Idle;
        if self.speech.len() >= MIN_SPEECH_SAMPLES {
            Some(std::mem::take(&mut self.speech))
        } else {
            self.speech.clear();
            None
        }
    }

    fn remember(&mut self, frame: &[f32]) {
        self.prefill.push_back(frame.to_vec());
        if self.prefill.len() > PREFILL_FRAMES {
            self.prefill.pop_front();
        }
    }
}

/// Root mean square level of a frame
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(level: f32) -> Vec<f32> {
        vec![level; FRAME_SAMPLES]
    }

    #[test]
    fn test_utterance_with_preroll() {
        let mut seg = Segmenter::new();
        for _ in 0..5 {
            assert!(seg.push(&frame(0.0), false).is_none());
        }
        for _ in 0..30 {
            assert!(seg.push(&frame(0.5), true).is_none());
        }
        assert!(seg.is_speaking());
        for _ in 0..14 {
            assert!(seg.push(&frame(0.0), false).is_none());
        }
        let utterance = seg.push(&frame(0.0), false).unwrap();
        // 5 silent pre-roll frames, 30 voiced, 15 trailing silence
        assert_eq!(utterance.len(), 50 * FRAME_SAMPLES);
        assert!(!seg.is_speaking());
    }

    #[test]
    fn test_click_is_ignored() {
        let mut seg = Segmenter::new();
        assert!(seg.push(&frame(0.5), true).is_none());
        for _ in 0..40 {
            assert!(seg.push(&frame(0.0), false).is_none());
        }
        assert!(!seg.is_speaking());
    }

    #[test]
    fn test_long_speech_is_capped() {
        let mut seg = Segmenter::new();
        let mut pushed = 0;
        let utterance = loop {
            pushed += 1;
            if let Some(u) = seg.push(&frame(0.5), true) {
                break u;
            }
            assert!(pushed < 400);
        };
        assert!(utterance.len() >= MAX_SPEECH_SAMPLES);
    }

    #[test]
    fn test_reset_drops_partial_speech() {
        let mut seg = Segmenter::new();
        for _ in 0..10 {
            seg.push(&frame(0.5), true);
        }
        seg.reset();
        assert!(!seg.is_speaking());
        for _ in 0..20 {
            assert!(seg.push(&frame(0.0), false).is_none());
        }
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5]) - 0.5).abs() < 1e-6);
    }
}
