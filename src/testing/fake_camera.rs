//! In-memory camera hardware.
//!
//! [`FakeProvider`] opens [`FakeDevice`]s that share their state with a
//! [`FakeCameraHandle`], so a test can inspect what the controller did to
//! the hardware and play the hardware's side: deliver preview frames,
//! report autofocus or raise errors. Events are always emitted after the
//! state lock is released.

use super::synthetic_data::{fill_nv21, synthetic_jpeg, synthetic_nv21_frame};
use crate::hardware::{
    CameraDevice, CameraInfo, CameraProvider, DeviceCallbacks, DeviceEvent, HardwareError,
    HardwareErrorCode, Parameters,
};
use crate::preview::PreviewOutput;
use crate::reconcile::native;
use crate::types::{Facing, ImageFormat, Size};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parameter block of a well-equipped back camera.
pub fn default_parameters() -> Parameters {
    let modes = |names: &[&str]| names.iter().map(|name| name.to_string()).collect::<Vec<_>>();
    Parameters {
        supported_preview_sizes: vec![Size::new(640, 480), Size::new(1280, 720), Size::new(1920, 1080)],
        supported_picture_sizes: vec![Size::new(4000, 3000), Size::new(3840, 2160), Size::new(1920, 1080)],
        supported_flash_modes: modes(&[
            native::FLASH_OFF,
            native::FLASH_AUTO,
            native::FLASH_ON,
            native::FLASH_TORCH,
        ]),
        supported_white_balance: modes(&[native::WHITE_BALANCE_AUTO, native::WHITE_BALANCE_DAYLIGHT]),
        supported_scene_modes: modes(&[native::SCENE_MODE_AUTO]),
        supported_focus_modes: modes(&[
            native::FOCUS_MODE_AUTO,
            native::FOCUS_MODE_CONTINUOUS_PICTURE,
            native::FOCUS_MODE_CONTINUOUS_VIDEO,
            native::FOCUS_MODE_FIXED,
        ]),
        zoom_supported: true,
        max_zoom: 10,
        min_exposure_compensation: -4,
        max_exposure_compensation: 4,
        exposure_compensation_step: 0.5,
        max_num_focus_areas: 1,
        max_num_metering_areas: 2,
        preview_format: ImageFormat::Nv21,
        ..Parameters::default()
    }
}

/// Everything a fake device remembers, plus knobs to make it misbehave.
#[derive(Debug, Clone)]
pub struct FakeCameraState {
    pub params: Parameters,
    pub callbacks: Option<DeviceCallbacks>,
    pub preview_output: Option<PreviewOutput>,
    pub display_orientation: Option<u32>,
    pub preview_running: bool,
    pub callback_enabled: bool,
    pub one_shot_pending: bool,
    pub queued_buffers: VecDeque<Vec<u8>>,
    pub shutter_sound: Option<bool>,
    pub unlocked: bool,
    pub released: bool,
    pub frames_delivered: u64,
    /// Parameter block in effect when the last picture was taken.
    pub params_at_capture: Option<Parameters>,

    pub set_parameters_calls: usize,
    pub start_preview_calls: usize,
    pub take_picture_calls: usize,
    pub auto_focus_calls: usize,
    pub cancel_auto_focus_calls: usize,
    pub lock_calls: usize,
    pub unlock_calls: usize,

    pub fail_start_preview: bool,
    pub fail_take_picture: bool,
    pub fail_auto_focus: bool,
    /// Report this autofocus outcome as soon as focus starts.
    pub report_auto_focus: Option<bool>,
    /// EXIF orientation written into captured pictures.
    pub picture_orientation: u16,
}

impl FakeCameraState {
    pub fn new(params: Parameters) -> Self {
        Self {
            params,
            callbacks: None,
            preview_output: None,
            display_orientation: None,
            preview_running: false,
            callback_enabled: false,
            one_shot_pending: false,
            queued_buffers: VecDeque::new(),
            shutter_sound: None,
            unlocked: false,
            released: false,
            frames_delivered: 0,
            params_at_capture: None,
            set_parameters_calls: 0,
            start_preview_calls: 0,
            take_picture_calls: 0,
            auto_focus_calls: 0,
            cancel_auto_focus_calls: 0,
            lock_calls: 0,
            unlock_calls: 0,
            fail_start_preview: false,
            fail_take_picture: false,
            fail_auto_focus: false,
            report_auto_focus: None,
            picture_orientation: 6,
        }
    }
}

/// Test-side view of an opened fake device.
#[derive(Debug, Clone)]
pub struct FakeCameraHandle {
    id: usize,
    state: Arc<Mutex<FakeCameraState>>,
}

impl FakeCameraHandle {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeCameraState) -> R) -> R {
        f(&mut lock(&self.state))
    }

    pub fn params(&self) -> Parameters {
        lock(&self.state).params.clone()
    }

    pub fn is_released(&self) -> bool {
        lock(&self.state).released
    }

    pub fn is_previewing(&self) -> bool {
        lock(&self.state).preview_running
    }

    pub fn queued_buffers(&self) -> usize {
        lock(&self.state).queued_buffers.len()
    }

    /// Emit `event` through the registered callbacks. False if none.
    pub fn emit(&self, event: DeviceEvent) -> bool {
        let callbacks = lock(&self.state).callbacks.clone();
        match callbacks {
            Some(callbacks) => {
                callbacks.emit(event);
                true
            }
            None => false,
        }
    }

    pub fn emit_error(&self, code: HardwareErrorCode) -> bool {
        self.emit(DeviceEvent::Error(code))
    }

    pub fn report_auto_focus(&self, success: bool) -> bool {
        self.emit(DeviceEvent::AutoFocus(success))
    }

    /// Produce one preview frame the way the hardware would: to a pending
    /// one-shot request first, otherwise into the oldest queued buffer.
    /// False when nothing could be delivered.
    pub fn deliver_frame(&self) -> bool {
        let (callbacks, event) = {
            let mut state = lock(&self.state);
            if !state.preview_running || state.released {
                return false;
            }
            let Some(callbacks) = state.callbacks.clone() else {
                return false;
            };
            let frame_number = state.frames_delivered;
            let size = state.params.preview_size.unwrap_or_default();
            let event = if state.one_shot_pending {
                state.one_shot_pending = false;
                DeviceEvent::OneShotFrame(synthetic_nv21_frame(frame_number, size))
            } else if state.callback_enabled {
                let Some(mut buffer) = state.queued_buffers.pop_front() else {
                    return false;
                };
                fill_nv21(&mut buffer, frame_number, size.width);
                DeviceEvent::PreviewFrame(buffer)
            } else {
                return false;
            };
            state.frames_delivered += 1;
            (callbacks, event)
        };
        callbacks.emit(event);
        true
    }
}

/// A camera device backed by [`FakeCameraState`].
#[derive(Debug)]
pub struct FakeDevice {
    handle: FakeCameraHandle,
}

impl FakeDevice {
    fn state(&self) -> MutexGuard<'_, FakeCameraState> {
        lock(&self.handle.state)
    }

    fn check_open(state: &FakeCameraState) -> Result<(), HardwareError> {
        if state.released {
            Err(HardwareError::Released)
        } else {
            Ok(())
        }
    }
}

impl CameraDevice for FakeDevice {
    fn parameters(&self) -> Parameters {
        self.state().params.clone()
    }

    fn set_parameters(&mut self, params: &Parameters) -> Result<(), HardwareError> {
        let mut state = self.state();
        Self::check_open(&state)?;
        state.params = params.clone();
        state.set_parameters_calls += 1;
        Ok(())
    }

    fn set_callbacks(&mut self, callbacks: DeviceCallbacks) {
        self.state().callbacks = Some(callbacks);
    }

    fn set_display_orientation(&mut self, degrees: u32) -> Result<(), HardwareError> {
        let mut state = self.state();
        if state.preview_running {
            return Err(HardwareError::Failed("preview is running".into()));
        }
        state.display_orientation = Some(degrees);
        Ok(())
    }

    fn set_preview_output(&mut self, output: &PreviewOutput) -> Result<(), HardwareError> {
        let mut state = self.state();
        Self::check_open(&state)?;
        state.preview_output = Some(*output);
        Ok(())
    }

    fn set_preview_callback_enabled(&mut self, enabled: bool) {
        let mut state = self.state();
        state.callback_enabled = enabled;
        if !enabled {
            state.queued_buffers.clear();
        }
    }

    fn add_callback_buffer(&mut self, buffer: Vec<u8>) {
        self.state().queued_buffers.push_back(buffer);
    }

    fn set_one_shot_preview_callback(&mut self) {
        let mut state = self.state();
        state.one_shot_pending = true;
        state.callback_enabled = false;
    }

    fn start_preview(&mut self) -> Result<(), HardwareError> {
        let mut state = self.state();
        Self::check_open(&state)?;
        state.start_preview_calls += 1;
        if state.fail_start_preview {
            return Err(HardwareError::Failed("preview refused".into()));
        }
        state.preview_running = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), HardwareError> {
        self.state().preview_running = false;
        Ok(())
    }

    fn take_picture(&mut self) -> Result<(), HardwareError> {
        let (callbacks, jpeg) = {
            let mut state = self.state();
            Self::check_open(&state)?;
            if state.fail_take_picture {
                return Err(HardwareError::Failed("capture refused".into()));
            }
            state.take_picture_calls += 1;
            state.params_at_capture = Some(state.params.clone());
            state.preview_running = false;
            (state.callbacks.clone(), synthetic_jpeg(state.picture_orientation))
        };
        if let Some(callbacks) = callbacks {
            callbacks.shutter();
            callbacks.picture_taken(jpeg);
        }
        Ok(())
    }

    fn auto_focus(&mut self) -> Result<(), HardwareError> {
        let (callbacks, report) = {
            let mut state = self.state();
            Self::check_open(&state)?;
            if state.fail_auto_focus {
                return Err(HardwareError::Failed("autofocus refused".into()));
            }
            state.auto_focus_calls += 1;
            (state.callbacks.clone(), state.report_auto_focus)
        };
        if let (Some(callbacks), Some(success)) = (callbacks, report) {
            callbacks.auto_focus(success);
        }
        Ok(())
    }

    fn cancel_auto_focus(&mut self) {
        self.state().cancel_auto_focus_calls += 1;
    }

    fn enable_shutter_sound(&mut self, enabled: bool) -> Result<(), HardwareError> {
        self.state().shutter_sound = Some(enabled);
        Ok(())
    }

    fn lock(&mut self) -> Result<(), HardwareError> {
        let mut state = self.state();
        state.lock_calls += 1;
        state.unlocked = false;
        Ok(())
    }

    fn unlock(&mut self) -> Result<(), HardwareError> {
        let mut state = self.state();
        Self::check_open(&state)?;
        state.unlock_calls += 1;
        state.unlocked = true;
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        let mut state = self.state();
        state.released = true;
        state.preview_running = false;
        state.callbacks = None;
        state.queued_buffers.clear();
        Ok(())
    }
}

/// Provider of fake cameras. Defaults to a back camera (id 0, sensor at 90
/// degrees, shutter sound can be disabled) and a front camera (id 1, 270).
pub struct FakeProvider {
    cameras: Vec<CameraInfo>,
    template: Mutex<FakeCameraState>,
    devices: Mutex<Vec<FakeCameraHandle>>,
    fail_open: AtomicBool,
    opens: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::with_cameras(vec![
            CameraInfo {
                facing: Facing::Back,
                orientation: 90,
                can_disable_shutter_sound: true,
            },
            CameraInfo {
                facing: Facing::Front,
                orientation: 270,
                can_disable_shutter_sound: false,
            },
        ])
    }

    pub fn with_cameras(cameras: Vec<CameraInfo>) -> Self {
        Self {
            cameras,
            template: Mutex::new(FakeCameraState::new(default_parameters())),
            devices: Mutex::new(Vec::new()),
            fail_open: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
        }
    }

    /// Adjust the state every device opened from now on starts with.
    pub fn configure(&self, f: impl FnOnce(&mut FakeCameraState)) {
        f(&mut lock(&self.template));
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn devices(&self) -> Vec<FakeCameraHandle> {
        lock(&self.devices).clone()
    }

    pub fn last_device(&self) -> Option<FakeCameraHandle> {
        lock(&self.devices).last().cloned()
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraProvider for FakeProvider {
    fn number_of_cameras(&self) -> usize {
        self.cameras.len()
    }

    fn camera_info(&self, id: usize) -> Option<CameraInfo> {
        self.cameras.get(id).cloned()
    }

    fn open(&self, id: usize) -> Result<Box<dyn CameraDevice>, HardwareError> {
        if id >= self.cameras.len() || self.fail_open.load(Ordering::SeqCst) {
            return Err(HardwareError::Unavailable(id));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        let handle = FakeCameraHandle {
            id,
            state: Arc::new(Mutex::new(lock(&self.template).clone())),
        };
        lock(&self.devices).push(handle.clone());
        Ok(Box::new(FakeDevice { handle }))
    }
}
