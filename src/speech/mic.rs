//! Microphone input: cpal capture -> resample to 16kHz -> VAD segmenter ->
//! Parakeet transcription, one utterance per listening session

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use anyhow::{Context, anyhow};
use cpal::Stream;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rubato::{FftFixedIn, Resampler};
use tracing::{debug, info, warn};
use transcribe_rs::{
    TranscriptionEngine,
    engines::parakeet::{ParakeetEngine, ParakeetModelParams},
};

use super::segment::{FRAME_SAMPLES, SAMPLE_RATE, Segmenter};
use super::vad::VadEngine;
use crate::dialogue::Event;
use crate::ui;

const RESAMPLE_CHUNK: usize = 1024;

/// Session id shared with the worker; 0 means not listening
type Session = Arc<AtomicU64>;

pub struct MicInput {
    session: Session,
    next_session: u64,
    // Capture stops when the stream is dropped
    _stream: Stream,
}

impl MicInput {
    pub fn new(
        model_path: &str,
        vad_model: &str,
        events: flume::Sender<Event>,
    ) -> anyhow::Result<Self> {
        let session: Session = Arc::new(AtomicU64::new(0));
        let (frame_tx, frame_rx) = mpsc::channel::<Vec<f32>>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        let worker_session = Arc::clone(&session);
        let worker_events = events.clone();
        let model_path = model_path.to_string();
        let vad_model = vad_model.to_string();
        thread::spawn(move || {
            let transcriber = match Transcriber::new(&model_path) {
                Ok(t) => {
                    let _ = ready_tx.send(Ok(()));
                    t
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            run_worker(
                frame_rx,
                VadEngine::load(&vad_model),
                transcriber,
                &worker_session,
                &worker_events,
            );
        });

        ready_rx
            .recv()
            .map_err(|_| anyhow!("transcriber thread exited"))?
            .map_err(|e| anyhow!("failed to load speech model: {}", e))?;

        let stream = start_capture(frame_tx, Arc::clone(&session), events)?;
        Ok(Self {
            session,
            next_session: 0,
            _stream: stream,
        })
    }
}

impl super::SpeechInput for MicInput {
    fn start_listening(&mut self) {
        self.next_session += 1;
        self.session.store(self.next_session, Ordering::SeqCst);
        ui::listening();
    }

    fn stop_listening(&mut self) {
        self.session.store(0, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.session.load(Ordering::SeqCst) != 0
    }
}

struct Transcriber {
    engine: ParakeetEngine,
}

impl Transcriber {
    fn new(model_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut engine = ParakeetEngine::new();
        info!("loading speech model {}", model_path.as_ref().display());
        engine
            .load_model_with_params(model_path.as_ref(), ParakeetModelParams::int8())
            .map_err(|e| anyhow!(e.to_string()))?;
        info!("speech model loaded");
        Ok(Self { engine })
    }

    #[hotpath::measure]
    fn transcribe(&mut self, samples: Vec<f32>) -> anyhow::Result<String> {
        let result = self
            .engine
            .transcribe_samples(samples, None)
            .map_err(|e| anyhow!(e.to_string()))?;
        Ok(result.text.trim().to_string())
    }
}

/// Segment frames into utterances while a session is open and deliver the
/// transcript only if that same session is still open afterwards
fn run_worker(
    frames: Receiver<Vec<f32>>,
    mut vad: VadEngine,
    mut transcriber: Transcriber,
    session: &AtomicU64,
    events: &flume::Sender<Event>,
) {
    info!("VAD: {}", vad.name());
    let mut segmenter = Segmenter::new();
    let mut active = 0;

    while let Ok(frame) = frames.recv() {
        let current = session.load(Ordering::SeqCst);
        if current != active {
            segmenter.reset();
            vad.reset();
            active = current;
        }
        if current == 0 {
            continue;
        }

        let is_speech = vad.is_speech(&frame, segmenter.is_speaking());
        let Some(samples) = segmenter.push(&frame, is_speech) else {
            continue;
        };

        debug!(samples = samples.len(), "utterance");
        let event = match transcriber.transcribe(samples) {
            // Nothing intelligible; keep the session open
            Ok(text) if text.is_empty() => continue,
            Ok(text) => Event::Heard(text),
            Err(e) => Event::ListenFailed(e.to_string()),
        };
        // Only the session that captured the audio may answer
        if session
            .compare_exchange(current, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            && events.send(event).is_err()
        {
            break;
        }
    }
}

struct FrameResampler {
    resampler: Option<FftFixedIn<f32>>,
    in_buf: Vec<f32>,
    pending: Vec<f32>,
}

impl FrameResampler {
    fn new(in_hz: usize) -> anyhow::Result<Self> {
        let resampler = if in_hz == SAMPLE_RATE {
            None
        } else {
            Some(
                FftFixedIn::<f32>::new(in_hz, SAMPLE_RATE, RESAMPLE_CHUNK, 1, 1)
                    .context("failed to build resampler")?,
            )
        };
        Ok(Self {
            resampler,
            in_buf: Vec::with_capacity(RESAMPLE_CHUNK),
            pending: Vec::with_capacity(FRAME_SAMPLES),
        })
    }

    fn push(&mut self, src: &[f32], mut emit: impl FnMut(Vec<f32>)) {
        let Some(resampler) = self.resampler.as_mut() else {
            emit_frames(&mut self.pending, src, &mut emit);
            return;
        };

        self.in_buf.extend_from_slice(src);
        while self.in_buf.len() >= RESAMPLE_CHUNK {
            let chunk: Vec<f32> = self.in_buf.drain(..RESAMPLE_CHUNK).collect();
            if let Ok(out) = resampler.process(&[&chunk], None) {
                emit_frames(&mut self.pending, &out[0], &mut emit);
            }
        }
    }
}

fn emit_frames(pending: &mut Vec<f32>, data: &[f32], emit: &mut impl FnMut(Vec<f32>)) {
    pending.extend_from_slice(data);
    while pending.len() >= FRAME_SAMPLES {
        emit(pending.drain(..FRAME_SAMPLES).collect());
    }
}

/// Start capture on the default input device, sending 16kHz mono frames
fn start_capture(
    tx: Sender<Vec<f32>>,
    session: Session,
    events: flume::Sender<Event>,
) -> anyhow::Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no microphone found"))?;
    let supported = device.default_input_config()?;
    let input_rate = supported.sample_rate() as usize;
    let channels = supported.channels() as usize;
    info!("audio: {}Hz {}ch -> {}Hz mono", input_rate, channels, SAMPLE_RATE);

    let mut resampler = FrameResampler::new(input_rate)?;

    let stream = device.build_input_stream(
        &supported.config(),
        move |data: &[f32], _| {
            let mono: Vec<f32> = if channels == 1 {
                data.to_vec()
            } else {
                data.chunks(channels)
                    .map(|c| c.iter().sum::<f32>() / channels as f32)
                    .collect()
            };
            resampler.push(&mono, |frame| {
                let _ = tx.send(frame);
            });
        },
        move |err| {
            warn!("audio stream error: {}", err);
            if session.swap(0, Ordering::SeqCst) != 0 {
                let _ = events.send(Event::ListenFailed(err.to_string()));
            }
        },
        None,
    )?;

    stream.play()?;
    Ok(stream)
}
