//! Recording encoder that writes nothing.

use crate::errors::CameraError;
use crate::hardware::CameraDevice;
use crate::types::{Size, VideoCodec};
use crate::video::{
    AudioCodec, CamcorderProfile, EncoderConfig, EncoderEvent, EncoderEvents, EncoderProvider,
    OutputFormat, VideoEncoder,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared log of every encoder created by a [`FakeEncoderProvider`].
#[derive(Debug, Default)]
pub struct EncoderLog {
    pub configured: Vec<EncoderConfig>,
    pub started: usize,
    pub stopped: usize,
    pub fail_configure: bool,
    pub fail_stop: bool,
    events: Option<EncoderEvents>,
}

fn lock(log: &Mutex<EncoderLog>) -> MutexGuard<'_, EncoderLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn profile(name: &str, size: Size) -> CamcorderProfile {
    CamcorderProfile {
        name: name.to_string(),
        file_format: OutputFormat::Mpeg4,
        video_size: size,
        video_frame_rate: 30,
        video_codec: VideoCodec::H264,
        video_bit_rate: 10_000_000,
        audio_codec: AudioCodec::Aac,
        audio_bit_rate: 128_000,
        audio_channels: 2,
        audio_sample_rate: 48_000,
    }
}

pub struct FakeEncoderProvider {
    profiles: Vec<CamcorderProfile>,
    log: Arc<Mutex<EncoderLog>>,
}

impl FakeEncoderProvider {
    /// 720p and 1080p profiles.
    pub fn new() -> Self {
        Self::with_profiles(vec![
            profile("720p", Size::new(1280, 720)),
            profile("1080p", Size::new(1920, 1080)),
        ])
    }

    pub fn with_profiles(profiles: Vec<CamcorderProfile>) -> Self {
        Self {
            profiles,
            log: Arc::new(Mutex::new(EncoderLog::default())),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut EncoderLog) -> R) -> R {
        f(&mut lock(&self.log))
    }

    pub fn configured(&self) -> Vec<EncoderConfig> {
        lock(&self.log).configured.clone()
    }

    /// Raise `event` as the running encoder would. False before any start.
    pub fn emit(&self, event: EncoderEvent) -> bool {
        let events = lock(&self.log).events.clone();
        match events {
            Some(events) => {
                events.emit(event);
                true
            }
            None => false,
        }
    }
}

impl Default for FakeEncoderProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderProvider for FakeEncoderProvider {
    fn profiles(&self, _camera_id: usize) -> Vec<CamcorderProfile> {
        self.profiles.clone()
    }

    fn create_encoder(&self) -> Box<dyn VideoEncoder> {
        Box::new(FakeEncoder {
            log: self.log.clone(),
        })
    }
}

struct FakeEncoder {
    log: Arc<Mutex<EncoderLog>>,
}

impl VideoEncoder for FakeEncoder {
    fn configure(&mut self, config: &EncoderConfig, _camera: &mut dyn CameraDevice) -> Result<(), CameraError> {
        let mut log = lock(&self.log);
        if log.fail_configure {
            return Err(CameraError::EncodingError("encoder refused configuration".into()));
        }
        log.configured.push(config.clone());
        Ok(())
    }

    fn start(&mut self, events: EncoderEvents) -> Result<(), CameraError> {
        let mut log = lock(&self.log);
        log.started += 1;
        log.events = Some(events);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CameraError> {
        let mut log = lock(&self.log);
        log.stopped += 1;
        log.events = None;
        if log.fail_stop {
            return Err(CameraError::EncodingError("nothing was recorded".into()));
        }
        Ok(())
    }
}
