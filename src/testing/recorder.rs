//! Listener, frame consumer and surface that record what they are told.

use crate::capabilities::CameraOptions;
use crate::capture::{PictureResult, VideoResult};
use crate::errors::CameraException;
use crate::frame::Frame;
use crate::listener::{CameraListener, FrameConsumer};
use crate::preview::{PreviewOutput, PreviewSurface, SurfaceId};
use crate::types::{PointF, Size};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One listener callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    CameraOpened(CameraOptions),
    CameraClosed,
    PreviewSizeChanged(Size),
    Shutter(bool),
    PictureTaken(PictureResult),
    VideoTaken(VideoResult),
    ZoomChanged(f32),
    ExposureCorrectionChanged(f32),
    FocusStart(PointF),
    FocusEnd(bool, PointF),
    Error(CameraException),
}

/// Listener that keeps every callback in order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
    changed: Condvar,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: ListenerEvent) {
        log::trace!("listener: {event:?}");
        lock(&self.events).push(event);
        self.changed.notify_all();
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        lock(&self.events).clone()
    }

    pub fn count(&self, matches: impl Fn(&ListenerEvent) -> bool) -> usize {
        lock(&self.events).iter().filter(|event| matches(event)).count()
    }

    pub fn errors(&self) -> Vec<CameraException> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                ListenerEvent::Error(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }

    /// Block until `done` holds for the recorded events or `timeout` passes.
    pub fn wait_for(&self, timeout: Duration, done: impl Fn(&[ListenerEvent]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut events = lock(&self.events);
        loop {
            if done(&events) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            events = self
                .changed
                .wait_timeout(events, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl CameraListener for RecordingListener {
    fn on_camera_opened(&self, options: &CameraOptions) {
        self.record(ListenerEvent::CameraOpened(options.clone()));
    }

    fn on_camera_closed(&self) {
        self.record(ListenerEvent::CameraClosed);
    }

    fn on_preview_size_changed(&self, size: Size) {
        self.record(ListenerEvent::PreviewSizeChanged(size));
    }

    fn on_shutter(&self, is_snapshot: bool) {
        self.record(ListenerEvent::Shutter(is_snapshot));
    }

    fn on_picture_taken(&self, result: PictureResult) {
        self.record(ListenerEvent::PictureTaken(result));
    }

    fn on_video_taken(&self, result: VideoResult) {
        self.record(ListenerEvent::VideoTaken(result));
    }

    fn on_zoom_changed(&self, zoom: f32, _points: &[PointF]) {
        self.record(ListenerEvent::ZoomChanged(zoom));
    }

    fn on_exposure_correction_changed(&self, value: f32, _bounds: [f32; 2], _points: &[PointF]) {
        self.record(ListenerEvent::ExposureCorrectionChanged(value));
    }

    fn on_focus_start(&self, point: PointF) {
        self.record(ListenerEvent::FocusStart(point));
    }

    fn on_focus_end(&self, success: bool, point: PointF) {
        self.record(ListenerEvent::FocusEnd(success, point));
    }

    fn on_error(&self, error: CameraException) {
        self.record(ListenerEvent::Error(error));
    }
}

/// Frame consumer that holds on to frames until told to let go.
#[derive(Debug, Default)]
pub struct FrameCollector {
    frames: Mutex<Vec<Frame>>,
}

impl FrameCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.frames).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand every held frame to the caller; dropping them returns the buffers.
    pub fn take(&self) -> Vec<Frame> {
        std::mem::take(&mut *lock(&self.frames))
    }
}

impl FrameConsumer for FrameCollector {
    fn on_frame(&self, frame: Frame) {
        lock(&self.frames).push(frame);
    }
}

/// Surface with adjustable readiness and size.
#[derive(Debug)]
pub struct FakeSurface {
    id: SurfaceId,
    ready: AtomicBool,
    size: Mutex<Size>,
    desired: Mutex<Option<Size>>,
}

impl FakeSurface {
    pub fn new(size: Size) -> Self {
        Self::with_id(size, 1)
    }

    pub fn with_id(size: Size, id: u64) -> Self {
        Self {
            id: SurfaceId(id),
            ready: AtomicBool::new(true),
            size: Mutex::new(size),
            desired: Mutex::new(None),
        }
    }

    /// A surface that has not been laid out yet.
    pub fn pending(size: Size) -> Self {
        let surface = Self::new(size);
        surface.set_ready(false);
        surface
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn resize(&self, size: Size) {
        *lock(&self.size) = size;
    }

    /// Last preview size the controller asked the surface to show.
    pub fn desired_size(&self) -> Option<Size> {
        *lock(&self.desired)
    }
}

impl PreviewSurface for FakeSurface {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn surface_size(&self) -> Size {
        *lock(&self.size)
    }

    fn output(&self) -> PreviewOutput {
        PreviewOutput::Texture(self.id)
    }

    fn set_desired_size(&self, size: Size) {
        *lock(&self.desired) = Some(size);
    }
}
