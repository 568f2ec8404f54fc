//! Video recording: camcorder profiles, the encoder contract and the
//! recording session that borrows the hardware handle from the controller.
//!
//! While a [`VideoRecordingSession`] is recording, the camera is unlocked
//! and driven by the encoder. The session reports back through a one-shot
//! [`VideoCompletion`]: `Some(result)` after a clean stop, `None` on
//! failure, in which case the controller takes the handle back itself.

use crate::capture::{VideoResult, VideoTermination};
use crate::errors::CameraError;
use crate::hardware::CameraDevice;
use crate::types::{Audio, Location, Size, VideoCodec};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Container written by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Mpeg4,
    ThreeGpp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    Aac,
    AmrNb,
}

/// Encoder settings the device recommends for one quality level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamcorderProfile {
    pub name: String,
    pub file_format: OutputFormat,
    pub video_size: Size,
    pub video_frame_rate: u32,
    pub video_codec: VideoCodec,
    pub video_bit_rate: u32,
    pub audio_codec: AudioCodec,
    pub audio_bit_rate: u32,
    pub audio_channels: u32,
    pub audio_sample_rate: u32,
}

impl CamcorderProfile {
    /// Baseline profile used when the device reports none.
    pub fn fallback() -> Self {
        Self {
            name: "low".to_string(),
            file_format: OutputFormat::ThreeGpp,
            video_size: Size::new(176, 144),
            video_frame_rate: 15,
            video_codec: VideoCodec::H263,
            video_bit_rate: 192_000,
            audio_codec: AudioCodec::AmrNb,
            audio_bit_rate: 12_200,
            audio_channels: 1,
            audio_sample_rate: 8_000,
        }
    }
}

/// Highest quality profile whose frame fits within `capture` in either
/// orientation; the smallest profile when none fits.
pub fn select_profile(profiles: &[CamcorderProfile], capture: Size) -> CamcorderProfile {
    let long = capture.width.max(capture.height);
    let short = capture.width.min(capture.height);
    let fits = |p: &&CamcorderProfile| {
        p.video_size.width.max(p.video_size.height) <= long
            && p.video_size.width.min(p.video_size.height) <= short
    };

    profiles
        .iter()
        .filter(fits)
        .max_by_key(|p| p.video_size.area())
        .or_else(|| profiles.iter().min_by_key(|p| p.video_size.area()))
        .cloned()
        .unwrap_or_else(CamcorderProfile::fallback)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub codec: AudioCodec,
    pub bit_rate: u32,
    pub channels: u32,
    pub sample_rate: u32,
}

/// Everything the encoder needs to start writing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub file: PathBuf,
    pub format: OutputFormat,
    pub codec: VideoCodec,
    pub size: Size,
    pub frame_rate: u32,
    pub bit_rate: u32,
    pub audio: Option<AudioConfig>,
    /// Clockwise rotation players should apply.
    pub orientation_hint: u32,
    pub location: Option<Location>,
    /// Bytes, 0 for unlimited.
    pub max_size: u64,
    /// Milliseconds, 0 for unlimited.
    pub max_duration: u64,
}

impl EncoderConfig {
    /// Build from a queried profile. A `Device` codec defers to the profile.
    pub fn from_profile(profile: &CamcorderProfile, file: PathBuf, codec: VideoCodec, audio: Audio) -> Self {
        let codec = match codec {
            VideoCodec::Device => profile.video_codec,
            other => other,
        };
        let audio = match audio {
            Audio::On => Some(AudioConfig {
                codec: profile.audio_codec,
                bit_rate: profile.audio_bit_rate,
                channels: profile.audio_channels,
                sample_rate: profile.audio_sample_rate,
            }),
            Audio::Off => None,
        };
        Self {
            file,
            format: profile.file_format,
            codec,
            size: profile.video_size,
            frame_rate: profile.video_frame_rate,
            bit_rate: profile.video_bit_rate,
            audio,
            orientation_hint: 0,
            location: None,
            max_size: 0,
            max_duration: 0,
        }
    }

    pub fn with_orientation_hint(mut self, degrees: u32) -> Self {
        self.orientation_hint = degrees;
        self
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn with_limits(mut self, max_size: u64, max_duration: u64) -> Self {
        self.max_size = max_size;
        self.max_duration = max_duration;
        self
    }
}

/// Asynchronous notifications from a running encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderEvent {
    MaxDurationReached,
    MaxSizeReached,
    Error(String),
}

/// Sink the encoder uses to report [`EncoderEvent`]s from any thread.
#[derive(Clone)]
pub struct EncoderEvents {
    sink: Arc<dyn Fn(EncoderEvent) + Send + Sync>,
}

impl EncoderEvents {
    pub fn new(sink: impl Fn(EncoderEvent) + Send + Sync + 'static) -> Self {
        Self { sink: Arc::new(sink) }
    }

    pub fn emit(&self, event: EncoderEvent) {
        (self.sink)(event);
    }
}

impl fmt::Debug for EncoderEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderEvents").finish_non_exhaustive()
    }
}

/// A media encoder that records from an unlocked camera.
pub trait VideoEncoder: Send {
    fn configure(&mut self, config: &EncoderConfig, camera: &mut dyn CameraDevice) -> Result<(), CameraError>;
    fn start(&mut self, events: EncoderEvents) -> Result<(), CameraError>;
    /// Finalize the file. An error means the output is unusable.
    fn stop(&mut self) -> Result<(), CameraError>;
}

/// Creates encoders and reports the device's camcorder profiles.
pub trait EncoderProvider: Send + Sync {
    fn profiles(&self, camera_id: usize) -> Vec<CamcorderProfile>;
    fn create_encoder(&self) -> Box<dyn VideoEncoder>;
}

/// One-shot completion sink of a recording session. Resolves with `None`
/// if dropped unresolved.
#[derive(Debug)]
pub struct VideoCompletion {
    tx: Option<Sender<Option<VideoResult>>>,
}

impl VideoCompletion {
    pub fn new() -> (VideoCompletion, Receiver<Option<VideoResult>>) {
        let (tx, rx) = bounded(1);
        (VideoCompletion { tx: Some(tx) }, rx)
    }

    fn resolve(&mut self, result: Option<VideoResult>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }
}

impl Drop for VideoCompletion {
    fn drop(&mut self) {
        self.resolve(None);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Stopped,
    Failed,
}

/// A single recording, from encoder configuration to finalization.
pub struct VideoRecordingSession {
    state: RecordingState,
    result: VideoResult,
    config: EncoderConfig,
    encoder: Box<dyn VideoEncoder>,
    completion: VideoCompletion,
}

impl VideoRecordingSession {
    pub fn new(
        result: VideoResult,
        config: EncoderConfig,
        encoder: Box<dyn VideoEncoder>,
        completion: VideoCompletion,
    ) -> Self {
        Self {
            state: RecordingState::Idle,
            result,
            config,
            encoder,
            completion,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn id(&self) -> &str {
        &self.result.id
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Configure the encoder on the already unlocked `camera` and start
    /// recording. On failure the completion resolves with `None`.
    pub fn start(&mut self, camera: &mut dyn CameraDevice, events: EncoderEvents) {
        if self.state != RecordingState::Idle {
            return;
        }
        let started = self
            .encoder
            .configure(&self.config, camera)
            .and_then(|_| self.encoder.start(events));
        match started {
            Ok(()) => {
                log::info!("recording {} to {}", self.result.id, self.config.file.display());
                self.state = RecordingState::Recording;
            }
            Err(e) => {
                log::error!("failed to start recording: {e}");
                self.fail();
            }
        }
    }

    /// Finalize and lock the camera again. A no-op unless recording.
    pub fn stop(&mut self, camera: &mut dyn CameraDevice, termination: VideoTermination) {
        if self.state != RecordingState::Recording {
            return;
        }
        if let Err(e) = self.encoder.stop() {
            log::error!("failed to finalize recording: {e}");
            self.fail();
            return;
        }
        if let Err(e) = camera.lock() {
            log::warn!("failed to lock camera after recording: {e}");
        }
        self.state = RecordingState::Stopped;
        self.result.termination = termination;
        log::info!("recording {} stopped ({termination:?})", self.result.id);
        self.completion.resolve(Some(self.result.clone()));
    }

    /// The encoder failed on its own; the output is discarded.
    pub fn abort(&mut self) {
        if self.state == RecordingState::Recording {
            let _ = self.encoder.stop();
        }
        if matches!(self.state, RecordingState::Recording | RecordingState::Idle) {
            self.fail();
        }
    }

    fn fail(&mut self) {
        self.state = RecordingState::Failed;
        self.completion.resolve(None);
    }
}

impl fmt::Debug for VideoRecordingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoRecordingSession")
            .field("state", &self.state)
            .field("id", &self.result.id)
            .field("file", &self.config.file)
            .finish()
    }
}
