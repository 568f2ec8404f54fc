//! The camera session controller.
//!
//! [`SessionController`] is the caller-facing half: every intent records the
//! requested value (if any) and posts a job to a [`SerialExecutor`] whose
//! state is the worker-side `Core`. The core owns the hardware handle, the
//! session state machine, the capability snapshot and the frame pool; none
//! of them is touched from any other thread. Hardware and encoder callbacks
//! are posted back onto the same executor, tagged with the session
//! generation so events from a previous session are dropped.
//!
//! Settings follow one rule: the caller-visible value is what was last
//! requested, unless the core rejected it, in which case it goes back to
//! the last accepted value (provided nothing newer was requested since).

use crate::assert_invariant;
use crate::capabilities::CameraOptions;
use crate::capture::{CaptureRequest, StillCapture, VideoResult, VideoTermination};
use crate::config::SessionConfig;
use crate::errors::{CameraError, CameraException, ErrorReason};
use crate::exif;
use crate::focus::{self, FocusTracker};
use crate::frame::FramePool;
use crate::hardware::{
    CameraDevice, CameraProvider, DeviceCallbacks, DeviceEvent, HardwareError, HardwareErrorCode,
    Parameters,
};
use crate::listener::{CameraListener, FrameConsumer, NoopListener};
use crate::orientation::Orientation;
use crate::preview::PreviewSurface;
use crate::reconcile::{self, native, Reconciled};
use crate::registry::CameraRegistry;
use crate::sizes;
use crate::snapshot::{self, EncodedSnapshot, SnapshotJob};
use crate::types::{
    AspectRatio, Audio, Facing, Flash, Hdr, ImageFormat, Location, Mode, PointF, Reference, Size,
    VideoCodec, WhiteBalance,
};
use crate::video::{
    select_profile, EncoderConfig, EncoderEvent, EncoderEvents, EncoderProvider, VideoCompletion,
    VideoRecordingSession,
};
use crate::worker::{spawn_post_processing, Completion, CompletionSignal, ExecutorHandle, SerialExecutor};
use crossbeam_channel::{Receiver, TryRecvError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle of one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Stopped,
    Starting,
    Started,
    Stopping,
}

/// User-facing settings. Used both for the caller-visible requested values
/// and for the values the worker has accepted.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    facing: Facing,
    flash: Flash,
    white_balance: WhiteBalance,
    hdr: Hdr,
    zoom: f32,
    exposure_correction: f32,
    audio: Audio,
    play_sounds: bool,
    location: Option<Location>,
    mode: Mode,
    video_codec: VideoCodec,
    video_max_size: u64,
    video_max_duration: u64,
}

impl Settings {
    fn from_config(config: &SessionConfig) -> Self {
        Self {
            facing: config.camera.facing,
            flash: Flash::default(),
            white_balance: WhiteBalance::default(),
            hdr: Hdr::default(),
            zoom: 0.0,
            exposure_correction: 0.0,
            audio: config.camera.audio,
            play_sounds: config.camera.play_sounds,
            location: None,
            mode: config.camera.mode,
            video_codec: config.video.codec,
            video_max_size: config.video.max_size_bytes,
            video_max_duration: config.video.max_duration_ms,
        }
    }
}

/// Worker state mirrored for the caller's getters.
#[derive(Debug, Default)]
struct Published {
    state: SessionState,
    options: Option<CameraOptions>,
    orientation: Orientation,
    preview_size: Option<Size>,
    capture_size: Option<Size>,
    taking_picture: bool,
    taking_video: bool,
}

struct Shared {
    requested: Mutex<Settings>,
    published: Mutex<Published>,
    surface: Mutex<Option<Arc<dyn PreviewSurface>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Try `requested`, then `previous`, then the default against a freshly
/// opened camera. `None` means nothing fit and the parameter is left alone.
fn on_open<T: Copy + Default, N>(
    requested: T,
    previous: T,
    check: impl Fn(T, T) -> Reconciled<T, N>,
) -> (T, Option<N>) {
    match check(requested, previous) {
        Reconciled::Accepted(native) => (requested, Some(native)),
        Reconciled::Rejected { rollback_to } => match check(rollback_to, T::default()) {
            Reconciled::Accepted(native) => (rollback_to, Some(native)),
            Reconciled::Rejected { .. } => (T::default(), None),
        },
    }
}

/// Collaborators and settings for a [`SessionController`].
pub struct SessionControllerBuilder {
    provider: Arc<dyn CameraProvider>,
    encoders: Option<Arc<dyn EncoderProvider>>,
    listener: Arc<dyn CameraListener>,
    frame_consumer: Option<Arc<dyn FrameConsumer>>,
    surface: Option<Arc<dyn PreviewSurface>>,
    registry: Arc<CameraRegistry>,
    config: SessionConfig,
}

impl SessionControllerBuilder {
    pub fn new(provider: Arc<dyn CameraProvider>) -> Self {
        Self {
            provider,
            encoders: None,
            listener: Arc::new(NoopListener),
            frame_consumer: None,
            surface: None,
            registry: Arc::new(CameraRegistry::new()),
            config: SessionConfig::default(),
        }
    }

    pub fn with_encoders(mut self, encoders: Arc<dyn EncoderProvider>) -> Self {
        self.encoders = Some(encoders);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn CameraListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_frame_consumer(mut self, consumer: Arc<dyn FrameConsumer>) -> Self {
        self.frame_consumer = Some(consumer);
        self
    }

    pub fn with_surface(mut self, surface: Arc<dyn PreviewSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Share the acquisition check with other controllers.
    pub fn with_registry(mut self, registry: Arc<CameraRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(mut self) -> Result<SessionController, CameraError> {
        self.config.validate().map_err(CameraError::ConfigError)?;

        let shared = Arc::new(Shared {
            requested: Mutex::new(Settings::from_config(&self.config)),
            published: Mutex::new(Published::default()),
            surface: Mutex::new(self.surface.take()),
        });
        let core_shared = shared.clone();
        let executor = SerialExecutor::spawn("camera-session-worker", move |handle| {
            Core::new(handle, core_shared, self)
        })?;

        Ok(SessionController {
            shared,
            handle: executor.handle(),
            executor,
        })
    }
}

/// Higher-level controller over a single hardware camera.
///
/// Every intent returns immediately with a [`CompletionSignal`] that
/// resolves once the worker has processed it, whether or not it had any
/// effect. Ignoring the signal is fine.
pub struct SessionController {
    shared: Arc<Shared>,
    handle: ExecutorHandle<Core>,
    executor: SerialExecutor<Core>,
}

impl SessionController {
    pub fn builder(provider: Arc<dyn CameraProvider>) -> SessionControllerBuilder {
        SessionControllerBuilder::new(provider)
    }

    fn submit(&self, task: impl FnOnce(&mut Core) + Send + 'static) -> CompletionSignal {
        let (completion, signal) = Completion::new();
        self.handle.post(move |core: &mut Core| {
            task(core);
            completion.complete();
        });
        signal
    }

    /// Resolves once everything submitted before it has run.
    pub fn sync(&self) -> CompletionSignal {
        self.submit(|_| {})
    }

    pub fn open(&self) -> CompletionSignal {
        self.submit(Core::start_session)
    }

    pub fn close(&self) -> CompletionSignal {
        self.submit(Core::stop_session)
    }

    pub fn set_facing(&self, facing: Facing) -> CompletionSignal {
        lock(&self.shared.requested).facing = facing;
        self.submit(move |core| core.apply_facing(facing))
    }

    pub fn set_flash(&self, flash: Flash) -> CompletionSignal {
        lock(&self.shared.requested).flash = flash;
        self.submit(move |core| core.apply_flash(flash))
    }

    pub fn set_white_balance(&self, white_balance: WhiteBalance) -> CompletionSignal {
        lock(&self.shared.requested).white_balance = white_balance;
        self.submit(move |core| core.apply_white_balance(white_balance))
    }

    pub fn set_hdr(&self, hdr: Hdr) -> CompletionSignal {
        lock(&self.shared.requested).hdr = hdr;
        self.submit(move |core| core.apply_hdr(hdr))
    }

    /// Zoom as a fraction of the maximum. Values outside `[0, 1]` are
    /// clamped and the clamped value is what gets reported.
    pub fn set_zoom(&self, zoom: f32, points: Vec<PointF>, notify: bool) -> CompletionSignal {
        if !zoom.is_nan() {
            lock(&self.shared.requested).zoom = zoom;
        }
        self.submit(move |core| core.apply_zoom(zoom, points, notify))
    }

    /// Exposure correction in EV, clamped to the camera's range.
    pub fn set_exposure_correction(
        &self,
        value: f32,
        bounds: [f32; 2],
        points: Vec<PointF>,
        notify: bool,
    ) -> CompletionSignal {
        if !value.is_nan() {
            lock(&self.shared.requested).exposure_correction = value;
        }
        self.submit(move |core| core.apply_exposure_correction(value, bounds, points, notify))
    }

    pub fn set_audio(&self, audio: Audio) -> CompletionSignal {
        lock(&self.shared.requested).audio = audio;
        self.submit(move |core| core.apply_audio(audio))
    }

    pub fn set_play_sounds(&self, play_sounds: bool) -> CompletionSignal {
        lock(&self.shared.requested).play_sounds = play_sounds;
        self.submit(move |core| core.apply_play_sounds_request(play_sounds))
    }

    pub fn set_location(&self, location: Option<Location>) -> CompletionSignal {
        lock(&self.shared.requested).location = location.clone();
        self.submit(move |core| core.apply_location(location))
    }

    pub fn set_mode(&self, mode: Mode) -> CompletionSignal {
        lock(&self.shared.requested).mode = mode;
        self.submit(move |core| core.apply_mode(mode))
    }

    pub fn set_video_codec(&self, codec: VideoCodec) -> CompletionSignal {
        lock(&self.shared.requested).video_codec = codec;
        self.submit(move |core| core.accepted.video_codec = codec)
    }

    /// Maximum recording size in bytes, 0 for unlimited.
    pub fn set_video_max_size(&self, bytes: u64) -> CompletionSignal {
        lock(&self.shared.requested).video_max_size = bytes;
        self.submit(move |core| core.accepted.video_max_size = bytes)
    }

    /// Maximum recording duration in milliseconds, 0 for unlimited.
    pub fn set_video_max_duration(&self, millis: u64) -> CompletionSignal {
        lock(&self.shared.requested).video_max_duration = millis;
        self.submit(move |core| core.accepted.video_max_duration = millis)
    }

    /// Rotation of the UI relative to the device's natural orientation.
    pub fn set_display_offset(&self, degrees: u32) -> CompletionSignal {
        self.submit(move |core| core.set_display_offset(degrees))
    }

    /// Physical orientation of the device, as reported by its sensors.
    pub fn set_device_orientation(&self, degrees: u32) -> CompletionSignal {
        self.submit(move |core| core.set_device_orientation(degrees))
    }

    /// Attach the presentation surface and try to bind preview to it.
    pub fn set_preview_surface(&self, surface: Arc<dyn PreviewSurface>) -> CompletionSignal {
        *lock(&self.shared.surface) = Some(surface);
        self.submit(Core::replace_surface)
    }

    /// The surface became ready.
    pub fn on_surface_available(&self) -> CompletionSignal {
        self.submit(Core::bind_to_surface)
    }

    /// The surface changed size.
    pub fn on_surface_changed(&self) -> CompletionSignal {
        self.submit(Core::on_surface_changed)
    }

    /// Tap-to-focus at `point`, in view coordinates.
    pub fn start_auto_focus(&self, point: PointF) -> CompletionSignal {
        let view = lock(&self.shared.surface)
            .as_ref()
            .filter(|surface| surface.is_ready())
            .map(|surface| surface.surface_size())
            .unwrap_or_default();
        self.submit(move |core| core.start_auto_focus(point, view))
    }

    /// Full resolution still capture. Picture mode only.
    pub fn capture_photo(&self) -> CompletionSignal {
        self.submit(Core::capture_photo)
    }

    /// Capture the next preview frame, cropped to `ratio` (view coordinates).
    pub fn capture_photo_snapshot(&self, ratio: Option<AspectRatio>) -> CompletionSignal {
        self.submit(move |core| core.capture_snapshot(ratio))
    }

    /// Record into `file`. Video mode only.
    pub fn capture_video(&self, file: impl Into<PathBuf>) -> CompletionSignal {
        let file = file.into();
        self.submit(move |core| core.capture_video(file))
    }

    pub fn stop_video(&self) -> CompletionSignal {
        self.submit(|core| core.end_video(VideoTermination::UserRequested))
    }

    pub fn state(&self) -> SessionState {
        lock(&self.shared.published).state
    }

    /// Capability snapshot of the open camera, once started.
    pub fn camera_options(&self) -> Option<CameraOptions> {
        let published = lock(&self.shared.published);
        if published.state == SessionState::Started {
            published.options.clone()
        } else {
            None
        }
    }

    pub fn facing(&self) -> Facing {
        lock(&self.shared.requested).facing
    }

    pub fn flash(&self) -> Flash {
        lock(&self.shared.requested).flash
    }

    pub fn white_balance(&self) -> WhiteBalance {
        lock(&self.shared.requested).white_balance
    }

    pub fn hdr(&self) -> Hdr {
        lock(&self.shared.requested).hdr
    }

    pub fn zoom(&self) -> f32 {
        lock(&self.shared.requested).zoom
    }

    pub fn exposure_correction(&self) -> f32 {
        lock(&self.shared.requested).exposure_correction
    }

    pub fn audio(&self) -> Audio {
        lock(&self.shared.requested).audio
    }

    pub fn play_sounds(&self) -> bool {
        lock(&self.shared.requested).play_sounds
    }

    pub fn location(&self) -> Option<Location> {
        lock(&self.shared.requested).location.clone()
    }

    pub fn mode(&self) -> Mode {
        lock(&self.shared.requested).mode
    }

    pub fn video_codec(&self) -> VideoCodec {
        lock(&self.shared.requested).video_codec
    }

    pub fn video_max_size(&self) -> u64 {
        lock(&self.shared.requested).video_max_size
    }

    pub fn video_max_duration(&self) -> u64 {
        lock(&self.shared.requested).video_max_duration
    }

    pub fn orientation(&self) -> Orientation {
        lock(&self.shared.published).orientation
    }

    /// Preview stream size expressed in `reference` coordinates.
    pub fn preview_size(&self, reference: Reference) -> Option<Size> {
        let published = lock(&self.shared.published);
        let flip = published.orientation.flip(Reference::Sensor, reference);
        published
            .preview_size
            .map(|size| if flip { size.flip() } else { size })
    }

    /// Full resolution capture size expressed in `reference` coordinates.
    pub fn capture_size(&self, reference: Reference) -> Option<Size> {
        let published = lock(&self.shared.published);
        let flip = published.orientation.flip(Reference::Sensor, reference);
        published
            .capture_size
            .map(|size| if flip { size.flip() } else { size })
    }

    pub fn is_taking_picture(&self) -> bool {
        lock(&self.shared.published).taking_picture
    }

    pub fn is_taking_video(&self) -> bool {
        lock(&self.shared.published).taking_video
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.handle.post(Core::stop_session);
        self.executor.shutdown();
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Worker-side session state. Only ever touched on the executor thread.
struct Core {
    handle: ExecutorHandle<Core>,
    shared: Arc<Shared>,
    provider: Arc<dyn CameraProvider>,
    encoders: Option<Arc<dyn EncoderProvider>>,
    listener: Arc<dyn CameraListener>,
    frame_consumer: Option<Arc<dyn FrameConsumer>>,
    registry: Arc<CameraRegistry>,
    config: SessionConfig,

    state: SessionState,
    generation: u64,
    camera: Option<Box<dyn CameraDevice>>,
    camera_id: Option<usize>,
    options: Option<CameraOptions>,
    orientation: Orientation,
    accepted: Settings,
    /// Values last pushed to (and taken by) the hardware; rollback targets on open.
    last_applied: Settings,
    bound: bool,
    preview_size: Option<Size>,
    capture_size: Option<Size>,
    pool: FramePool,
    still: StillCapture,
    video: Option<VideoRecordingSession>,
    video_result: Option<Receiver<Option<VideoResult>>>,
    focus: FocusTracker,
}

impl Core {
    fn new(handle: ExecutorHandle<Core>, shared: Arc<Shared>, parts: SessionControllerBuilder) -> Self {
        let accepted = Settings::from_config(&parts.config);
        Self {
            handle,
            shared,
            provider: parts.provider,
            encoders: parts.encoders,
            listener: parts.listener,
            frame_consumer: parts.frame_consumer,
            registry: parts.registry,
            pool: FramePool::new(parts.config.preview.buffer_pool_size),
            config: parts.config,
            state: SessionState::Stopped,
            generation: 0,
            camera: None,
            camera_id: None,
            options: None,
            orientation: Orientation::default(),
            last_applied: accepted.clone(),
            accepted,
            bound: false,
            preview_size: None,
            capture_size: None,
            still: StillCapture::new(),
            video: None,
            video_result: None,
            focus: FocusTracker::new(),
        }
    }

    // ---- bookkeeping ----

    fn is_available(&self) -> bool {
        match self.state {
            SessionState::Started => true,
            SessionState::Starting => self.camera.is_some(),
            SessionState::Stopped | SessionState::Stopping => false,
        }
    }

    fn set_state(&mut self, state: SessionState) {
        assert_invariant!(
            self.handle.is_worker_thread(),
            "Session state only changes on the worker",
            "controller::set_state"
        );
        log::info!("camera session: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        let mut published = lock(&self.shared.published);
        published.state = self.state;
        published.options = self.options.clone();
        published.orientation = self.orientation;
        published.preview_size = self.preview_size;
        published.capture_size = self.capture_size;
        published.taking_picture = self.still.in_flight();
        published.taking_video = self.video.is_some();
    }

    /// Record `value` as accepted and show it to the caller, unless the
    /// caller has requested something newer than `expected` meanwhile.
    fn settle<T: PartialEq + Clone>(&mut self, field: fn(&mut Settings) -> &mut T, expected: T, value: T) {
        *field(&mut self.accepted) = value.clone();
        let mut requested = lock(&self.shared.requested);
        let slot = field(&mut requested);
        if *slot == expected {
            *slot = value;
        }
    }

    fn update_parameters(&mut self, apply: impl FnOnce(&mut Parameters)) -> Result<(), HardwareError> {
        let camera = self.camera.as_mut().ok_or(HardwareError::Released)?;
        let mut params = camera.parameters();
        apply(&mut params);
        camera.set_parameters(&params)
    }

    fn set_parameter(&mut self, what: &str, apply: impl FnOnce(&mut Parameters)) -> bool {
        match self.update_parameters(apply) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to apply {what}: {e}");
                false
            }
        }
    }

    fn surface(&self) -> Option<Arc<dyn PreviewSurface>> {
        lock(&self.shared.surface).clone()
    }

    fn programmer_error(&self, message: &str) {
        log::error!("{message}");
        self.listener.on_error(CameraException::programmer_error(message));
    }

    // ---- lifecycle ----

    fn start_session(&mut self) {
        match self.state {
            SessionState::Stopped => {}
            SessionState::Started => {
                log::info!("open while started, closing first");
                self.stop_session();
            }
            SessionState::Starting | SessionState::Stopping => {
                log::debug!("open ignored while {:?}", self.state);
                return;
            }
        }
        self.set_state(SessionState::Starting);

        let cameras = self.provider.cameras();
        let selection = match reconcile::facing(self.accepted.facing, self.accepted.facing, &cameras) {
            Reconciled::Accepted(selection) => selection,
            Reconciled::Rejected { .. } => {
                return self.fail_to_connect(format!("no {:?} camera available", self.accepted.facing));
            }
        };
        let id = selection.camera_id;
        if !self.registry.acquire(id) {
            return self.fail_to_connect(format!("camera {id} is held by another session"));
        }
        let mut camera = match self.provider.open(id) {
            Ok(camera) => camera,
            Err(e) => {
                self.registry.release(id);
                return self.fail_to_connect(format!("failed to open camera {id}: {e}"));
            }
        };

        self.generation += 1;
        let generation = self.generation;
        let handle = self.handle.clone();
        camera.set_callbacks(DeviceCallbacks::new(move |event| {
            handle.post(move |core: &mut Core| core.on_device_event(generation, event));
        }));

        self.orientation.facing = selection.info.facing;
        self.orientation.sensor_offset = selection.info.orientation;
        let flip = self.orientation.flip(Reference::Sensor, Reference::View);
        self.options = Some(CameraOptions::new(&camera.parameters(), &selection.info, &cameras, flip));
        self.camera = Some(camera);
        self.camera_id = Some(id);
        log::info!("opened camera {id} ({:?})", selection.info.facing);

        self.apply_all_settings();
        let degrees = self.orientation.offset(Reference::Sensor, Reference::View);
        if let Some(camera) = self.camera.as_mut() {
            if let Err(e) = camera.set_display_orientation(degrees) {
                log::warn!("failed to set display orientation: {e}");
            }
        }

        self.publish();
        if let Some(options) = self.options.as_ref() {
            self.listener.on_camera_opened(options);
        }
        self.bind_to_surface();
    }

    fn fail_to_connect(&mut self, message: String) {
        log::error!("{message}");
        self.set_state(SessionState::Stopped);
        self.listener.on_error(CameraException::failed_to_connect(message));
    }

    fn stop_session(&mut self) {
        if matches!(self.state, SessionState::Stopped | SessionState::Stopping) {
            return;
        }
        self.set_state(SessionState::Stopping);

        self.end_video(VideoTermination::UserRequested);
        for token in self.focus.clear() {
            self.handle.cancel(token);
        }
        self.still.reset();

        let was_open = self.camera.is_some();
        if let Some(mut camera) = self.camera.take() {
            camera.set_preview_callback_enabled(false);
            if self.bound {
                if let Err(e) = camera.stop_preview() {
                    log::warn!("failed to stop preview: {e}");
                }
            }
            if let Err(e) = camera.release() {
                log::warn!("failed to release camera: {e}");
            }
        }
        if let Some(id) = self.camera_id.take() {
            self.registry.release(id);
        }

        self.generation += 1;
        self.pool.clear();
        self.options = None;
        self.preview_size = None;
        self.capture_size = None;
        self.bound = false;
        self.set_state(SessionState::Stopped);
        if was_open {
            self.listener.on_camera_closed();
        }
    }

    fn restart(&mut self) {
        self.stop_session();
        self.start_session();
    }

    /// Reconcile every pending setting against the fresh snapshot and push
    /// them to the hardware in one parameter update. Rejected values fall back
    /// to what the hardware last took, then to the default.
    fn apply_all_settings(&mut self) {
        let (Some(options), Some(camera)) = (self.options.clone(), self.camera.as_ref()) else {
            return;
        };
        let mut params = camera.parameters();
        let pending = self.accepted.clone();
        let previous = self.last_applied.clone();

        let (flash, native) = on_open(pending.flash, previous.flash, |r, p| reconcile::flash(r, p, &options));
        if let Some(native) = native {
            params.flash_mode = Some(native.to_string());
        }
        self.settle(|s| &mut s.flash, pending.flash, flash);

        let (white_balance, native) = on_open(pending.white_balance, previous.white_balance, |r, p| {
            reconcile::white_balance(r, p, &options)
        });
        if let Some(native) = native {
            params.white_balance = Some(native.to_string());
        }
        self.settle(|s| &mut s.white_balance, pending.white_balance, white_balance);

        let (hdr, native) = on_open(pending.hdr, previous.hdr, |r, p| reconcile::hdr(r, p, &options));
        if let Some(native) = native {
            params.scene_mode = Some(native.to_string());
        }
        self.settle(|s| &mut s.hdr, pending.hdr, hdr);

        let (_, level) = on_open(pending.zoom, previous.zoom, |r, p| reconcile::zoom(r, p, &options));
        let zoom = level.map_or(0.0, |level| {
            params.zoom = level.index;
            level.value
        });
        self.settle(|s| &mut s.zoom, pending.zoom, zoom);

        let (_, level) = on_open(pending.exposure_correction, previous.exposure_correction, |r, p| {
            reconcile::exposure_correction(r, p, &options)
        });
        let exposure_correction = level.map_or(0.0, |level| {
            params.exposure_compensation = level.index;
            level.value
        });
        self.settle(|s| &mut s.exposure_correction, pending.exposure_correction, exposure_correction);

        if let Some(gps) = reconcile::location(pending.location.as_ref()) {
            params.gps = Some(gps);
        }
        if let Some(mode) = reconcile::default_focus_mode(pending.mode, &params.supported_focus_modes) {
            params.focus_mode = Some(mode.to_string());
        }
        params.recording_hint = pending.mode == Mode::Video;

        if let Some(camera) = self.camera.as_mut() {
            match camera.set_parameters(&params) {
                Ok(()) => {
                    self.last_applied.flash = flash;
                    self.last_applied.white_balance = white_balance;
                    self.last_applied.hdr = hdr;
                    self.last_applied.zoom = zoom;
                    self.last_applied.exposure_correction = exposure_correction;
                }
                Err(e) => log::warn!("failed to apply settings on open: {e}"),
            }
        }
        self.apply_play_sounds(pending.play_sounds, true);
    }

    // ---- preview binding ----

    fn bind_to_surface(&mut self) {
        if self.bound || !self.is_available() {
            return;
        }
        let Some(surface) = self.surface().filter(|surface| surface.is_ready()) else {
            log::debug!("surface not ready, preview binding deferred");
            return;
        };
        if let Err(e) = self.bind(surface.as_ref()) {
            self.fail_preview(e);
        }
    }

    /// Detach a bound preview so the newly set surface gets attached.
    fn replace_surface(&mut self) {
        if self.bound && self.camera.is_some() {
            if self.video.is_some() {
                log::warn!("preview surface replaced while recording, stopping video");
                self.end_video(VideoTermination::UserRequested);
            }
            if let Some(camera) = self.camera.as_mut() {
                if let Err(e) = camera.stop_preview() {
                    log::warn!("failed to stop preview for surface swap: {e}");
                }
            }
            self.bound = false;
            if self.state == SessionState::Started {
                self.set_state(SessionState::Starting);
            }
        }
        self.bind_to_surface();
    }

    fn bind(&mut self, surface: &dyn PreviewSurface) -> Result<(), CameraError> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| CameraError::InvalidState("camera released".into()))?;
        camera
            .set_preview_output(&surface.output())
            .map_err(|e| CameraError::PreviewError(format!("failed to attach output: {e}")))?;
        let params = camera.parameters();

        let capture = self
            .compute_capture_size(&params)
            .ok_or_else(|| CameraError::PreviewError("no supported picture size".into()))?;
        let preview = self
            .compute_preview_size(&params, capture, surface.surface_size())
            .ok_or_else(|| CameraError::PreviewError("no supported preview size".into()))?;
        self.capture_size = Some(capture);
        self.preview_size = Some(preview);
        self.update_parameters(|p| {
            p.preview_size = Some(preview);
            p.picture_size = Some(capture);
        })
        .map_err(|e| CameraError::PreviewError(format!("failed to apply sizes: {e}")))?;

        self.notify_preview_size(surface, preview);
        self.start_frame_delivery(params.preview_format);
        self.start_preview()?;

        assert_invariant!(!self.bound, "Preview binds at most once per session", "controller::bind");
        self.bound = true;
        log::info!("preview bound: preview {preview}, capture {capture}");
        self.set_state(SessionState::Started);
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), CameraError> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| CameraError::InvalidState("camera released".into()))?;
        camera
            .start_preview()
            .map_err(|e| CameraError::PreviewError(format!("failed to start preview: {e}")))
    }

    fn fail_preview(&mut self, error: CameraError) {
        log::error!("preview failed: {error}");
        self.stop_session();
        self.listener
            .on_error(CameraException::new(ErrorReason::FailedToStartPreview, error));
    }

    fn compute_capture_size(&self, params: &Parameters) -> Option<Size> {
        let flip = self.orientation.flip(Reference::Sensor, Reference::View);
        let ratio = self
            .config
            .preview
            .desired_aspect_ratio()
            .map(|ratio| if flip { ratio.inverse() } else { ratio });
        let limit = match self.accepted.mode {
            Mode::Video => self.video_size_limit(),
            Mode::Picture => None,
        };
        sizes::compute_capture_size(&params.supported_picture_sizes, ratio, limit)
    }

    fn video_size_limit(&self) -> Option<Size> {
        let (encoders, id) = (self.encoders.as_ref()?, self.camera_id?);
        encoders
            .profiles(id)
            .into_iter()
            .map(|profile| profile.video_size)
            .max_by_key(Size::area)
    }

    fn compute_preview_size(&self, params: &Parameters, capture: Size, surface: Size) -> Option<Size> {
        let target = if self.orientation.flip(Reference::Sensor, Reference::View) {
            surface.flip()
        } else {
            surface
        };
        sizes::compute_preview_size(&params.supported_preview_sizes, capture.aspect_ratio(), target)
    }

    fn notify_preview_size(&self, surface: &dyn PreviewSurface, preview: Size) {
        let view = if self.orientation.flip(Reference::Sensor, Reference::View) {
            preview.flip()
        } else {
            preview
        };
        surface.set_desired_size(view);
        self.listener.on_preview_size_changed(view);
    }

    fn start_frame_delivery(&mut self, format: ImageFormat) {
        let Some(size) = self.preview_size else {
            return;
        };
        let buffers = self.pool.allocate(size, format);
        if let Some(camera) = self.camera.as_mut() {
            camera.set_preview_callback_enabled(false);
            camera.set_preview_callback_enabled(true);
            for buffer in buffers {
                camera.add_callback_buffer(buffer);
            }
        }
    }

    fn on_surface_changed(&mut self) {
        if !self.bound || !self.is_available() {
            return;
        }
        let (Some(surface), Some(camera), Some(capture)) = (self.surface(), self.camera.as_ref(), self.capture_size)
        else {
            return;
        };
        let params = camera.parameters();
        let Some(preview) = self.compute_preview_size(&params, capture, surface.surface_size()) else {
            return;
        };
        if Some(preview) == self.preview_size {
            return;
        }
        log::info!("surface changed, preview size now {preview}");
        if let Err(e) = self.rebind_preview(surface.as_ref(), preview, params.preview_format) {
            self.fail_preview(e);
        }
    }

    fn rebind_preview(&mut self, surface: &dyn PreviewSurface, preview: Size, format: ImageFormat) -> Result<(), CameraError> {
        if let Some(camera) = self.camera.as_mut() {
            camera
                .stop_preview()
                .map_err(|e| CameraError::PreviewError(format!("failed to stop preview: {e}")))?;
        }
        self.preview_size = Some(preview);
        self.update_parameters(|p| p.preview_size = Some(preview))
            .map_err(|e| CameraError::PreviewError(format!("failed to apply preview size: {e}")))?;
        self.notify_preview_size(surface, preview);
        self.start_frame_delivery(format);
        self.start_preview()?;
        self.publish();
        Ok(())
    }

    fn set_display_offset(&mut self, degrees: u32) {
        self.orientation.display_offset = degrees % 360;
        self.publish();
    }

    fn set_device_orientation(&mut self, degrees: u32) {
        self.orientation.device_orientation = degrees % 360;
        self.publish();
    }

    // ---- settings ----

    fn apply_facing(&mut self, facing: Facing) {
        let cameras = self.provider.cameras();
        match reconcile::facing(facing, self.accepted.facing, &cameras) {
            Reconciled::Accepted(selection) => {
                let changed = facing != self.accepted.facing;
                self.accepted.facing = facing;
                if changed && self.is_available() {
                    log::info!("switching to camera {}", selection.camera_id);
                    self.restart();
                }
            }
            Reconciled::Rejected { rollback_to } => {
                log::debug!("no {facing:?} camera, keeping {rollback_to:?}");
                self.settle(|s| &mut s.facing, facing, rollback_to);
            }
        }
    }

    fn apply_flash(&mut self, flash: Flash) {
        if !self.is_available() {
            self.accepted.flash = flash;
            return;
        }
        let Some(options) = self.options.as_ref() else {
            return;
        };
        match reconcile::flash(flash, self.accepted.flash, options) {
            Reconciled::Accepted(native) => {
                self.accepted.flash = flash;
                if self.set_parameter("flash", |p| p.flash_mode = Some(native.to_string())) {
                    self.last_applied.flash = flash;
                }
            }
            Reconciled::Rejected { rollback_to } => {
                log::debug!("flash {flash:?} unsupported, keeping {rollback_to:?}");
                self.settle(|s| &mut s.flash, flash, rollback_to);
            }
        }
    }

    fn apply_white_balance(&mut self, white_balance: WhiteBalance) {
        if !self.is_available() {
            self.accepted.white_balance = white_balance;
            return;
        }
        let Some(options) = self.options.as_ref() else {
            return;
        };
        match reconcile::white_balance(white_balance, self.accepted.white_balance, options) {
            Reconciled::Accepted(native) => {
                self.accepted.white_balance = white_balance;
                if self.set_parameter("white balance", |p| p.white_balance = Some(native.to_string())) {
                    self.last_applied.white_balance = white_balance;
                }
            }
            Reconciled::Rejected { rollback_to } => {
                log::debug!("white balance {white_balance:?} unsupported, keeping {rollback_to:?}");
                self.settle(|s| &mut s.white_balance, white_balance, rollback_to);
            }
        }
    }

    fn apply_hdr(&mut self, hdr: Hdr) {
        if !self.is_available() {
            self.accepted.hdr = hdr;
            return;
        }
        let Some(options) = self.options.as_ref() else {
            return;
        };
        match reconcile::hdr(hdr, self.accepted.hdr, options) {
            Reconciled::Accepted(native) => {
                self.accepted.hdr = hdr;
                if self.set_parameter("hdr", |p| p.scene_mode = Some(native.to_string())) {
                    self.last_applied.hdr = hdr;
                }
            }
            Reconciled::Rejected { rollback_to } => {
                log::debug!("hdr {hdr:?} unsupported, keeping {rollback_to:?}");
                self.settle(|s| &mut s.hdr, hdr, rollback_to);
            }
        }
    }

    fn apply_zoom(&mut self, zoom: f32, points: Vec<PointF>, notify: bool) {
        if !self.is_available() {
            if !zoom.is_nan() {
                self.accepted.zoom = zoom;
            }
            return;
        }
        let Some(options) = self.options.as_ref() else {
            return;
        };
        match reconcile::zoom(zoom, self.accepted.zoom, options) {
            Reconciled::Accepted(level) => {
                assert_invariant!(
                    (0.0..=1.0).contains(&level.value),
                    "Zoom stays within [0, 1]",
                    "controller::apply_zoom"
                );
                self.settle(|s| &mut s.zoom, zoom, level.value);
                if self.set_parameter("zoom", |p| p.zoom = level.index) {
                    self.last_applied.zoom = level.value;
                }
                if notify {
                    self.listener.on_zoom_changed(level.value, &points);
                }
            }
            Reconciled::Rejected { rollback_to } => {
                log::debug!("zoom {zoom} rejected, keeping {rollback_to}");
                self.settle(|s| &mut s.zoom, zoom, rollback_to);
                if notify {
                    self.listener.on_zoom_changed(rollback_to, &points);
                }
            }
        }
    }

    fn apply_exposure_correction(&mut self, value: f32, bounds: [f32; 2], points: Vec<PointF>, notify: bool) {
        if !self.is_available() {
            if !value.is_nan() {
                self.accepted.exposure_correction = value;
            }
            return;
        }
        let Some(options) = self.options.as_ref() else {
            return;
        };
        let (min, max) = (options.exposure_correction_min(), options.exposure_correction_max());
        match reconcile::exposure_correction(value, self.accepted.exposure_correction, options) {
            Reconciled::Accepted(level) => {
                assert_invariant!(
                    level.value >= min && level.value <= max,
                    "Exposure correction stays within the supported range",
                    "controller::apply_exposure_correction"
                );
                self.settle(|s| &mut s.exposure_correction, value, level.value);
                if self.set_parameter("exposure correction", |p| p.exposure_compensation = level.index) {
                    self.last_applied.exposure_correction = level.value;
                }
                if notify {
                    self.listener.on_exposure_correction_changed(level.value, bounds, &points);
                }
            }
            Reconciled::Rejected { rollback_to } => {
                log::debug!("exposure correction {value} rejected, keeping {rollback_to}");
                self.settle(|s| &mut s.exposure_correction, value, rollback_to);
                if notify {
                    self.listener.on_exposure_correction_changed(rollback_to, bounds, &points);
                }
            }
        }
    }

    fn apply_play_sounds_request(&mut self, play_sounds: bool) {
        if !self.is_available() {
            self.accepted.play_sounds = play_sounds;
            return;
        }
        let previous = self.accepted.play_sounds;
        self.apply_play_sounds(play_sounds, previous);
    }

    fn apply_play_sounds(&mut self, requested: bool, previous: bool) {
        let can_disable = self
            .options
            .as_ref()
            .is_some_and(CameraOptions::can_disable_shutter_sound);
        match reconcile::play_sounds(requested, previous, can_disable) {
            Reconciled::Accepted(toggle) => {
                self.accepted.play_sounds = requested;
                if let (Some(enabled), Some(camera)) = (toggle, self.camera.as_mut()) {
                    if let Err(e) = camera.enable_shutter_sound(enabled) {
                        log::warn!("failed to toggle shutter sound: {e}");
                    }
                }
            }
            Reconciled::Rejected { rollback_to } => {
                log::debug!("shutter sound can't be disabled on this camera");
                self.settle(|s| &mut s.play_sounds, requested, rollback_to);
            }
        }
    }

    fn apply_location(&mut self, location: Option<Location>) {
        self.accepted.location = location.clone();
        if !self.is_available() {
            return;
        }
        if let Some(gps) = reconcile::location(location.as_ref()) {
            self.set_parameter("location", |p| p.gps = Some(gps));
        }
    }

    fn apply_audio(&mut self, audio: Audio) {
        if self.video.is_some() && self.accepted.audio != audio {
            log::warn!("audio changed while recording, applies to the next video");
        }
        self.accepted.audio = audio;
    }

    fn apply_mode(&mut self, mode: Mode) {
        if self.accepted.mode == mode {
            return;
        }
        self.accepted.mode = mode;
        if self.is_available() {
            log::info!("mode changed to {mode:?}, restarting");
            self.restart();
        }
    }

    // ---- device events ----

    fn on_device_event(&mut self, generation: u64, event: DeviceEvent) {
        if generation != self.generation || self.camera.is_none() {
            log::debug!("dropping stale device event");
            return;
        }
        match event {
            DeviceEvent::PreviewFrame(data) => self.on_preview_frame(data),
            DeviceEvent::OneShotFrame(data) => self.on_snapshot_frame(data),
            DeviceEvent::Shutter => self.on_shutter(),
            DeviceEvent::PictureTaken(jpeg) => self.on_picture_taken(jpeg),
            DeviceEvent::AutoFocus(success) => self.on_auto_focus(success),
            DeviceEvent::Error(code) => self.on_hardware_error(code),
        }
    }

    fn on_hardware_error(&mut self, code: HardwareErrorCode) {
        match code {
            HardwareErrorCode::ServerDied => {
                log::warn!("media server died, restarting session");
                self.restart();
            }
            HardwareErrorCode::Evicted => {
                log::error!("camera evicted by another client");
                self.stop_session();
                self.listener
                    .on_error(CameraException::disconnected("camera taken by another client"));
            }
            HardwareErrorCode::Unknown(code) => {
                log::error!("hardware error {code}");
                self.stop_session();
                self.listener.on_error(CameraException::unknown(CameraError::ConnectError(
                    format!("hardware error {code}"),
                )));
            }
        }
    }

    fn on_preview_frame(&mut self, data: Vec<u8>) {
        if self.state != SessionState::Started || !self.pool.is_configured() {
            return;
        }
        if data.len() == FramePool::buffer_len(self.pool.size(), self.pool.format()) {
            let rotation = self.orientation.offset(Reference::Sensor, Reference::Output);
            let frame = self.pool.wrap(data, rotation);
            match &self.frame_consumer {
                Some(consumer) => consumer.on_frame(frame),
                None => frame.release(),
            }
        } else {
            log::debug!("dropping stale preview buffer of {} bytes", data.len());
        }
        if let (Some(buffer), Some(camera)) = (self.pool.acquire(), self.camera.as_mut()) {
            camera.add_callback_buffer(buffer);
        }
    }

    // ---- still capture ----

    fn capture_photo(&mut self) {
        if !self.is_available() {
            return;
        }
        if self.accepted.mode == Mode::Video {
            return self.programmer_error("can't take a full resolution picture in video mode");
        }
        if self.still.in_flight() {
            log::debug!("picture already in progress");
            return;
        }
        let Some(capture) = self.capture_size else {
            log::debug!("picture requested before preview binding");
            return;
        };

        let flip = self.orientation.flip(Reference::Sensor, Reference::Output);
        let size = if flip { capture.flip() } else { capture };
        let request = CaptureRequest::new(false, self.accepted.facing, size)
            .with_location(self.accepted.location.clone());
        self.still.begin(request);
        self.publish();

        let rotation = self.orientation.offset(Reference::Sensor, Reference::Output);
        self.set_parameter("rotation", |p| p.rotation = rotation);
        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        if let Err(e) = camera.take_picture() {
            log::error!("take_picture failed: {e}");
            self.still.reset();
            self.publish();
            self.listener
                .on_error(CameraException::unknown(CameraError::CaptureError(e.to_string())));
        }
    }

    fn on_shutter(&mut self) {
        if self.still.request().is_some_and(|request| !request.is_snapshot) {
            if let Some(is_snapshot) = self.still.shutter() {
                self.listener.on_shutter(is_snapshot);
            }
        }
    }

    fn on_picture_taken(&mut self, jpeg: Vec<u8>) {
        let Some(request) = self.still.request().filter(|request| !request.is_snapshot) else {
            log::debug!("unexpected picture payload dropped");
            return;
        };
        let (id, size) = (request.id.clone(), request.size);
        if self.still.decoding().is_none() {
            return;
        }

        let rotation = exif::rotation_degrees(&jpeg);
        if let Some(result) = self.still.finish(&id, jpeg, rotation, size) {
            self.listener.on_picture_taken(result);
        }
        self.still.reset();
        self.publish();

        if self.bound {
            if let Err(e) = self.start_preview() {
                self.fail_preview(e);
            }
        }
    }

    fn capture_snapshot(&mut self, ratio: Option<AspectRatio>) {
        if !self.is_available() {
            return;
        }
        if self.video.is_some() {
            log::debug!("snapshot ignored while recording");
            return;
        }
        if self.still.in_flight() {
            log::debug!("picture already in progress");
            return;
        }
        let Some(preview) = self.preview_size.filter(|_| self.bound) else {
            log::debug!("snapshot needs a running preview");
            return;
        };

        let flip = self.orientation.flip(Reference::Output, Reference::View);
        let mut request = CaptureRequest::new(true, self.accepted.facing, preview)
            .with_location(self.accepted.location.clone());
        if let Some(ratio) = ratio {
            request = request.with_crop(if flip { ratio.inverse() } else { ratio });
        }
        self.still.begin(request);
        self.publish();
        if let Some(camera) = self.camera.as_mut() {
            camera.set_one_shot_preview_callback();
        }
    }

    fn on_snapshot_frame(&mut self, data: Vec<u8>) {
        if let Some(camera) = self.camera.as_mut() {
            camera.set_preview_callback_enabled(true);
        }
        let Some(request) = self.still.request().filter(|request| request.is_snapshot).cloned() else {
            return;
        };
        if let Some(is_snapshot) = self.still.shutter() {
            self.listener.on_shutter(is_snapshot);
        }
        self.still.decoding();

        let job = SnapshotJob {
            data,
            size: request.size,
            rotation: self.orientation.offset(Reference::Sensor, Reference::Output),
            crop: request.crop,
            quality: self.config.snapshot.jpeg_quality,
        };
        let handle = self.handle.clone();
        let generation = self.generation;
        let id = request.id;
        let spawned = spawn_post_processing("camera-session-snapshot", move || {
            let outcome = snapshot::encode_snapshot(&job);
            handle.post(move |core: &mut Core| core.on_snapshot_encoded(generation, &id, outcome));
        });
        if let Err(e) = spawned {
            log::error!("failed to start snapshot encoding: {e}");
            self.still.reset();
            self.publish();
            self.listener.on_error(CameraException::unknown(e));
        }
    }

    fn on_snapshot_encoded(&mut self, generation: u64, id: &str, outcome: Result<EncodedSnapshot, CameraError>) {
        if generation != self.generation || self.still.request().map(|r| r.id.as_str()) != Some(id) {
            return;
        }
        match outcome {
            Ok(encoded) => {
                if let Some(result) = self.still.finish(id, encoded.jpeg, 0, encoded.size) {
                    self.listener.on_picture_taken(result);
                }
            }
            Err(e) => {
                log::error!("snapshot encoding failed: {e}");
                self.listener.on_error(CameraException::unknown(e));
            }
        }
        self.still.reset();
        self.publish();
    }

    // ---- video ----

    fn capture_video(&mut self, file: PathBuf) {
        if !self.is_available() {
            return;
        }
        if self.accepted.mode == Mode::Picture {
            return self.programmer_error("can't record video while in picture mode");
        }
        if self.video.is_some() {
            log::debug!("video already in progress");
            return;
        }
        let Some(encoders) = self.encoders.clone() else {
            log::error!("no encoder provider configured");
            self.listener.on_error(CameraException::unknown(CameraError::EncodingError(
                "no video encoder available".into(),
            )));
            return;
        };
        let (Some(camera_id), Some(capture)) = (self.camera_id, self.capture_size) else {
            log::debug!("video requested before preview binding");
            return;
        };

        let rotation = self.orientation.offset(Reference::Sensor, Reference::Output);
        let flip = self.orientation.flip(Reference::Sensor, Reference::Output);
        let settings = &self.accepted;
        let result = VideoResult {
            id: uuid::Uuid::new_v4().to_string(),
            file: file.clone(),
            rotation,
            size: if flip { capture.flip() } else { capture },
            codec: settings.video_codec,
            audio: settings.audio,
            facing: settings.facing,
            location: settings.location.clone(),
            max_size: settings.video_max_size,
            max_duration: settings.video_max_duration,
            termination: VideoTermination::UserRequested,
        };
        let profile = select_profile(&encoders.profiles(camera_id), capture);
        let config = EncoderConfig::from_profile(&profile, file, settings.video_codec, settings.audio)
            .with_orientation_hint(rotation)
            .with_location(settings.location.clone())
            .with_limits(settings.video_max_size, settings.video_max_duration);
        let (completion, results) = VideoCompletion::new();
        let id = result.id.clone();
        let mut session = VideoRecordingSession::new(result, config, encoders.create_encoder(), completion);

        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        if let Err(e) = camera.unlock() {
            log::error!("failed to unlock camera for recording: {e}");
            self.listener.on_error(CameraException::unknown(CameraError::EncodingError(format!(
                "failed to unlock camera: {e}"
            ))));
            return;
        }

        let generation = self.generation;
        let handle = self.handle.clone();
        let events = EncoderEvents::new(move |event| {
            let id = id.clone();
            handle.post(move |core: &mut Core| core.on_encoder_event(generation, &id, event));
        });
        session.start(&mut **camera, events);
        self.video = Some(session);
        self.video_result = Some(results);
        self.publish();
        self.poll_video_result();
    }

    /// Stop the recording, if any. Safe to call repeatedly.
    fn end_video(&mut self, termination: VideoTermination) {
        if let (Some(session), Some(camera)) = (self.video.as_mut(), self.camera.as_mut()) {
            session.stop(&mut **camera, termination);
        }
        self.poll_video_result();
    }

    fn on_encoder_event(&mut self, generation: u64, id: &str, event: EncoderEvent) {
        if generation != self.generation || self.video.as_ref().map(|s| s.id()) != Some(id) {
            return;
        }
        match event {
            EncoderEvent::MaxDurationReached => self.end_video(VideoTermination::MaxDurationReached),
            EncoderEvent::MaxSizeReached => self.end_video(VideoTermination::MaxSizeReached),
            EncoderEvent::Error(message) => {
                log::error!("encoder error: {message}");
                if let Some(session) = self.video.as_mut() {
                    session.abort();
                }
                self.poll_video_result();
            }
        }
    }

    fn poll_video_result(&mut self) {
        let outcome = match self.video_result.as_ref().map(Receiver::try_recv) {
            None | Some(Err(TryRecvError::Empty)) => return,
            Some(Ok(result)) => result,
            Some(Err(TryRecvError::Disconnected)) => None,
        };
        self.video = None;
        self.video_result = None;

        match outcome {
            Some(result) => self.listener.on_video_taken(result),
            None => {
                log::warn!("recording failed, taking the camera back");
                if let Some(camera) = self.camera.as_mut() {
                    if let Err(e) = camera.lock() {
                        log::warn!("failed to lock camera: {e}");
                    }
                }
            }
        }
        if self.bound {
            if let Some(camera) = self.camera.as_mut() {
                camera.set_preview_callback_enabled(true);
            }
        }
        self.publish();
    }

    // ---- focus ----

    fn start_auto_focus(&mut self, point: PointF, view: Size) {
        if !self.is_available() {
            return;
        }
        if !self
            .options
            .as_ref()
            .is_some_and(CameraOptions::is_auto_focus_supported)
        {
            return;
        }

        let (id, superseded) = self.focus.start(point);
        if let Some(old) = superseded {
            if let Some(token) = old.timeout {
                self.handle.cancel(token);
            }
            self.listener.on_focus_end(false, old.point);
        }
        if let Some(token) = self.focus.replace_reset(None) {
            self.handle.cancel(token);
        }

        let sensor_to_view = self.orientation.offset(Reference::Sensor, Reference::View);
        let areas = focus::compute_metering_areas(point, view, sensor_to_view);
        self.set_parameter("focus areas", |p| {
            p.focus_areas = focus::areas_for(p.max_num_focus_areas, &areas);
            p.metering_areas = focus::areas_for(p.max_num_metering_areas, &areas);
            p.focus_mode = Some(native::FOCUS_MODE_AUTO.to_string());
        });
        self.listener.on_focus_start(point);

        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        match camera.auto_focus() {
            Ok(()) => {
                let generation = self.generation;
                let token = self
                    .handle
                    .post_delayed(self.config.focus.timeout(), move |core: &mut Core| {
                        core.on_focus_timeout(generation, id)
                    });
                self.focus.set_timeout(id, token);
            }
            Err(e) => {
                log::error!("auto focus failed: {e}");
                self.focus.end(id);
                self.listener.on_focus_end(false, point);
            }
        }
    }

    fn on_auto_focus(&mut self, success: bool) {
        let Some(pending) = self.focus.end_current() else {
            log::debug!("late autofocus report dropped");
            return;
        };
        if let Some(token) = pending.timeout {
            self.handle.cancel(token);
        }
        self.listener.on_focus_end(success, pending.point);
        self.schedule_focus_reset();
    }

    fn on_focus_timeout(&mut self, generation: u64, id: u64) {
        if generation != self.generation {
            return;
        }
        if let Some(pending) = self.focus.end(id) {
            log::warn!("autofocus did not report back, giving up");
            self.listener.on_focus_end(false, pending.point);
            self.schedule_focus_reset();
        }
    }

    fn schedule_focus_reset(&mut self) {
        let generation = self.generation;
        let token = self
            .handle
            .post_delayed(self.config.focus.reset_delay(), move |core: &mut Core| {
                core.reset_focus(generation)
            });
        if let Some(old) = self.focus.replace_reset(Some(token)) {
            self.handle.cancel(old);
        }
    }

    fn reset_focus(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        self.focus.replace_reset(None);
        if !self.is_available() {
            return;
        }
        if let Some(camera) = self.camera.as_mut() {
            camera.cancel_auto_focus();
        }
        let mode = self.accepted.mode;
        self.set_parameter("focus reset", |p| {
            p.focus_areas.clear();
            p.metering_areas.clear();
            if let Some(focus_mode) = reconcile::default_focus_mode(mode, &p.supported_focus_modes) {
                p.focus_mode = Some(focus_mode.to_string());
            }
        });
    }
}
