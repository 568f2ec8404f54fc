//! End-to-end tests of the session controller against the in-memory hardware.

#[cfg(test)]
mod controller_tests {
    use camera_session::config::SessionConfig;
    use camera_session::hardware::CameraInfo;
    use camera_session::invariant::contract_test;
    use camera_session::preview::{PreviewOutput, SurfaceId};
    use camera_session::reconcile::native;
    use camera_session::testing::{
        FakeEncoderProvider, FakeProvider, FakeSurface, FrameCollector, ListenerEvent,
        RecordingListener,
    };
    use camera_session::video::EncoderEvent;
    use camera_session::{
        AspectRatio, CameraRegistry, CompletionSignal, ErrorReason, Facing, Flash, Hdr,
        HardwareErrorCode, Location, Mode, PointF, Reference, SessionController, SessionState,
        Size, VideoTermination, WhiteBalance,
    };
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);
    const PORTRAIT: Size = Size::new(1080, 1920);

    struct Rig {
        provider: Arc<FakeProvider>,
        encoders: Arc<FakeEncoderProvider>,
        listener: Arc<RecordingListener>,
        frames: Arc<FrameCollector>,
        surface: Arc<FakeSurface>,
        controller: SessionController,
    }

    fn build(provider: FakeProvider, config: SessionConfig, surface: FakeSurface) -> Rig {
        let provider = Arc::new(provider);
        let encoders = Arc::new(FakeEncoderProvider::new());
        let listener = Arc::new(RecordingListener::new());
        let frames = Arc::new(FrameCollector::new());
        let surface = Arc::new(surface);
        let controller = SessionController::builder(provider.clone())
            .with_encoders(encoders.clone())
            .with_listener(listener.clone())
            .with_frame_consumer(frames.clone())
            .with_surface(surface.clone())
            .with_config(config)
            .build()
            .unwrap();
        Rig {
            provider,
            encoders,
            listener,
            frames,
            surface,
            controller,
        }
    }

    fn rig() -> Rig {
        build(FakeProvider::new(), SessionConfig::default(), FakeSurface::new(PORTRAIT))
    }

    fn video_config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.camera.mode = Mode::Video;
        config
    }

    fn done(signal: CompletionSignal) {
        assert!(signal.wait_timeout(WAIT), "worker did not process the intent in time");
    }

    fn started(rig: Rig) -> Rig {
        done(rig.controller.open());
        assert_eq!(rig.controller.state(), SessionState::Started);
        rig
    }

    fn eventually(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    fn is_picture(event: &ListenerEvent) -> bool {
        matches!(event, ListenerEvent::PictureTaken(_))
    }

    fn is_focus_end(event: &ListenerEvent) -> bool {
        matches!(event, ListenerEvent::FocusEnd(..))
    }

    // ---- lifecycle ----

    #[test]
    fn test_open_binds_preview() {
        let rig = started(rig());
        let device = rig.provider.last_device().unwrap();

        let options = rig.controller.camera_options().unwrap();
        assert_eq!(options.facing(), Facing::Back);
        assert!(options.supports_facing(Facing::Front));

        let events = rig.listener.events();
        assert!(matches!(events[0], ListenerEvent::CameraOpened(_)));
        assert!(events.contains(&ListenerEvent::PreviewSizeChanged(Size::new(480, 640))));

        assert_eq!(rig.controller.preview_size(Reference::Sensor), Some(Size::new(640, 480)));
        assert_eq!(rig.controller.preview_size(Reference::View), Some(Size::new(480, 640)));
        assert_eq!(rig.controller.capture_size(Reference::Output), Some(Size::new(3000, 4000)));
        assert_eq!(rig.surface.desired_size(), Some(Size::new(480, 640)));

        assert!(device.is_previewing());
        assert_eq!(device.queued_buffers(), 2);
        assert_eq!(device.with(|state| state.display_orientation), Some(90));
        let params = device.params();
        assert_eq!(params.preview_size, Some(Size::new(640, 480)));
        assert_eq!(params.picture_size, Some(Size::new(4000, 3000)));
        assert_eq!(params.focus_mode.as_deref(), Some(native::FOCUS_MODE_CONTINUOUS_PICTURE));
        assert!(!params.recording_hint);
    }

    #[test]
    fn test_close_is_idempotent() {
        let rig = started(rig());
        let device = rig.provider.last_device().unwrap();

        done(rig.controller.close());
        done(rig.controller.close());

        assert_eq!(rig.controller.state(), SessionState::Stopped);
        assert!(rig.controller.camera_options().is_none());
        assert!(device.is_released());
        assert_eq!(rig.listener.count(|e| *e == ListenerEvent::CameraClosed), 1);
    }

    #[test]
    fn test_open_while_started_restarts() {
        let rig = started(rig());
        done(rig.controller.open());

        assert_eq!(rig.controller.state(), SessionState::Started);
        assert_eq!(rig.provider.open_count(), 2);
        assert!(rig.provider.devices()[0].is_released());
        assert_eq!(rig.listener.count(|e| *e == ListenerEvent::CameraClosed), 1);
    }

    #[test]
    fn test_open_failure_reports_connect_error() {
        let provider = FakeProvider::new();
        provider.set_fail_open(true);
        let rig = build(provider, SessionConfig::default(), FakeSurface::new(PORTRAIT));

        done(rig.controller.open());

        assert_eq!(rig.controller.state(), SessionState::Stopped);
        let errors = rig.listener.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].reason, ErrorReason::FailedToConnect);
        assert_eq!(rig.listener.count(|e| matches!(e, ListenerEvent::CameraOpened(_))), 0);
    }

    #[test]
    fn test_preview_failure_stops_session() {
        let provider = FakeProvider::new();
        provider.configure(|state| state.fail_start_preview = true);
        let rig = build(provider, SessionConfig::default(), FakeSurface::new(PORTRAIT));

        done(rig.controller.open());

        assert_eq!(rig.controller.state(), SessionState::Stopped);
        assert!(rig.provider.last_device().unwrap().is_released());
        let errors = rig.listener.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].reason, ErrorReason::FailedToStartPreview);
    }

    #[test]
    fn test_shared_registry_prevents_double_open() {
        let registry = Arc::new(CameraRegistry::new());
        let provider: Arc<FakeProvider> = Arc::new(FakeProvider::new());
        let first = SessionController::builder(provider.clone())
            .with_registry(registry.clone())
            .build()
            .unwrap();
        let listener = Arc::new(RecordingListener::new());
        let second = SessionController::builder(provider.clone())
            .with_registry(registry.clone())
            .with_listener(listener.clone())
            .build()
            .unwrap();

        done(first.open());
        done(second.open());
        assert_eq!(second.state(), SessionState::Stopped);
        assert_eq!(listener.errors()[0].reason, ErrorReason::FailedToConnect);

        done(first.close());
        assert!(!registry.is_held(0));
        done(second.open());
        assert_eq!(second.state(), SessionState::Starting);
        assert!(registry.is_held(0));
    }

    #[test]
    fn test_binding_waits_for_surface() {
        let rig = build(FakeProvider::new(), SessionConfig::default(), FakeSurface::pending(PORTRAIT));

        done(rig.controller.open());
        assert_eq!(rig.controller.state(), SessionState::Starting);
        assert!(rig.controller.camera_options().is_none());

        // Settings already reach the hardware while waiting for the surface.
        done(rig.controller.set_flash(Flash::On));
        let device = rig.provider.last_device().unwrap();
        assert_eq!(device.params().flash_mode.as_deref(), Some(native::FLASH_ON));
        assert!(!device.is_previewing());

        rig.surface.set_ready(true);
        done(rig.controller.on_surface_available());
        assert_eq!(rig.controller.state(), SessionState::Started);
        assert!(device.is_previewing());
    }

    #[test]
    fn test_surface_resize_renegotiates_preview() {
        let mut config = SessionConfig::default();
        config.preview.desired_aspect_ratio = Some([9, 16]);
        let rig = started(build(FakeProvider::new(), config, FakeSurface::new(PORTRAIT)));
        assert_eq!(rig.controller.preview_size(Reference::View), Some(Size::new(1080, 1920)));
        assert_eq!(rig.controller.capture_size(Reference::Sensor), Some(Size::new(3840, 2160)));

        rig.surface.resize(Size::new(540, 960));
        done(rig.controller.on_surface_changed());

        assert_eq!(rig.controller.preview_size(Reference::Sensor), Some(Size::new(1280, 720)));
        assert!(rig
            .listener
            .events()
            .contains(&ListenerEvent::PreviewSizeChanged(Size::new(720, 1280))));
        let device = rig.provider.last_device().unwrap();
        assert!(device.is_previewing());
        assert_eq!(device.params().preview_size, Some(Size::new(1280, 720)));
        assert_eq!(device.queued_buffers(), 2);
    }

    #[test]
    fn test_new_surface_replaces_bound_preview() {
        let rig = started(rig());
        let device = rig.provider.last_device().unwrap();
        assert_eq!(device.with(|s| s.preview_output), Some(PreviewOutput::Texture(SurfaceId(1))));

        let replacement = Arc::new(FakeSurface::with_id(Size::new(540, 960), 2));
        done(rig.controller.set_preview_surface(replacement.clone()));

        assert_eq!(rig.controller.state(), SessionState::Started);
        assert_eq!(device.with(|s| s.preview_output), Some(PreviewOutput::Texture(SurfaceId(2))));
        assert!(device.is_previewing());
        assert_eq!(device.with(|s| s.start_preview_calls), 2);
        assert_eq!(device.queued_buffers(), 2);
        assert!(replacement.desired_size().is_some());
        assert_eq!(replacement.desired_size(), rig.controller.preview_size(Reference::View));
        assert_eq!(rig.provider.open_count(), 1);
    }

    #[test]
    fn test_pending_replacement_surface_defers_binding() {
        let rig = started(rig());
        let device = rig.provider.last_device().unwrap();

        let replacement = Arc::new(FakeSurface::with_id(PORTRAIT, 2));
        replacement.set_ready(false);
        done(rig.controller.set_preview_surface(replacement.clone()));
        assert_eq!(rig.controller.state(), SessionState::Starting);
        assert!(!device.is_previewing());

        replacement.set_ready(true);
        done(rig.controller.on_surface_available());
        assert_eq!(rig.controller.state(), SessionState::Started);
        assert_eq!(device.with(|s| s.preview_output), Some(PreviewOutput::Texture(SurfaceId(2))));
        assert!(device.is_previewing());
    }

    #[test]
    fn test_drop_closes_camera() {
        let rig = started(rig());
        let device = rig.provider.last_device().unwrap();
        let listener = rig.listener.clone();

        drop(rig.controller);

        assert!(device.is_released());
        assert_eq!(listener.count(|e| *e == ListenerEvent::CameraClosed), 1);
    }

    // ---- hardware errors ----

    #[test]
    fn test_server_died_restarts_without_error() {
        let rig = started(rig());
        let device = rig.provider.last_device().unwrap();

        assert!(device.emit_error(HardwareErrorCode::ServerDied));
        done(rig.controller.sync());

        assert_eq!(rig.controller.state(), SessionState::Started);
        assert_eq!(rig.provider.open_count(), 2);
        assert!(device.is_released());
        assert!(rig.listener.errors().is_empty());
        assert_eq!(rig.listener.count(|e| matches!(e, ListenerEvent::CameraOpened(_))), 2);

        // The replacement camera streams into a fresh pool.
        let replacement = rig.provider.last_device().unwrap();
        assert!(replacement.is_previewing());
        assert!(replacement.deliver_frame());
        done(rig.controller.sync());
        assert_eq!(rig.frames.len(), 1);
        assert_eq!(
            replacement.queued_buffers(),
            SessionConfig::default().preview.buffer_pool_size
        );
    }

    #[test]
    fn test_eviction_reports_disconnected() {
        let rig = started(rig());

        rig.provider
            .last_device()
            .unwrap()
            .emit_error(HardwareErrorCode::Evicted);
        done(rig.controller.sync());

        assert_eq!(rig.controller.state(), SessionState::Stopped);
        assert_eq!(rig.listener.errors()[0].reason, ErrorReason::Disconnected);
    }

    // ---- settings ----

    #[test]
    fn test_settings_before_open_are_applied() {
        let rig = rig();
        rig.controller.set_flash(Flash::Torch);
        rig.controller.set_white_balance(WhiteBalance::Cloudy);
        rig.controller.set_zoom(0.5, Vec::new(), false);
        assert_eq!(rig.controller.white_balance(), WhiteBalance::Cloudy);

        let rig = started(rig);
        let params = rig.provider.last_device().unwrap().params();
        assert_eq!(params.flash_mode.as_deref(), Some(native::FLASH_TORCH));
        assert_eq!(params.zoom, 5);
        assert_eq!(rig.controller.flash(), Flash::Torch);
        // Not offered by the camera: back to the default.
        assert_eq!(rig.controller.white_balance(), WhiteBalance::Auto);
    }

    #[test]
    fn test_rejected_setting_rolls_back() {
        let rig = started(rig());

        done(rig.controller.set_flash(Flash::Auto));
        done(rig.controller.set_hdr(Hdr::On));
        done(rig.controller.set_white_balance(WhiteBalance::Fluorescent));

        assert_eq!(rig.controller.flash(), Flash::Auto);
        assert_eq!(rig.controller.hdr(), Hdr::Off);
        assert_eq!(rig.controller.white_balance(), WhiteBalance::Auto);
        let params = rig.provider.last_device().unwrap().params();
        assert_eq!(params.flash_mode.as_deref(), Some(native::FLASH_AUTO));
        assert_ne!(params.scene_mode.as_deref(), Some(native::SCENE_MODE_HDR));
    }

    #[test]
    fn test_reopen_keeps_last_accepted_setting() {
        let rig = started(rig());
        done(rig.controller.set_white_balance(WhiteBalance::Daylight));
        done(rig.controller.set_zoom(0.4, Vec::new(), false));
        done(rig.controller.close());

        // Neither is offered by the camera; both fall back to what it last took.
        rig.controller.set_white_balance(WhiteBalance::Fluorescent);
        rig.controller.set_hdr(Hdr::On);
        let rig = started(rig);

        assert_eq!(rig.controller.white_balance(), WhiteBalance::Daylight);
        assert_eq!(rig.controller.hdr(), Hdr::Off);
        assert_eq!(rig.controller.zoom(), 0.4);
        let params = rig.provider.last_device().unwrap().params();
        assert_eq!(params.white_balance.as_deref(), Some(native::WHITE_BALANCE_DAYLIGHT));
        assert_eq!(params.zoom, 4);
    }

    #[test]
    fn test_rejected_zoom_reports_rollback() {
        let provider = FakeProvider::new();
        provider.configure(|state| state.params.zoom_supported = false);
        let rig = started(build(provider, SessionConfig::default(), FakeSurface::new(PORTRAIT)));

        done(rig.controller.set_zoom(0.5, vec![PointF::new(1.0, 1.0)], true));
        assert_eq!(rig.controller.zoom(), 0.0);
        assert_eq!(rig.listener.count(|e| *e == ListenerEvent::ZoomChanged(0.0)), 1);

        done(rig.controller.set_zoom(0.5, Vec::new(), false));
        assert_eq!(rig.listener.count(|e| matches!(e, ListenerEvent::ZoomChanged(_))), 1);
    }

    #[test]
    fn test_rejected_exposure_reports_rollback() {
        let provider = FakeProvider::new();
        provider.configure(|state| {
            state.params.min_exposure_compensation = 0;
            state.params.max_exposure_compensation = 0;
        });
        let rig = started(build(provider, SessionConfig::default(), FakeSurface::new(PORTRAIT)));

        done(rig.controller.set_exposure_correction(1.5, [-2.0, 2.0], Vec::new(), true));
        assert_eq!(rig.controller.exposure_correction(), 0.0);
        assert_eq!(
            rig.listener.count(|e| *e == ListenerEvent::ExposureCorrectionChanged(0.0)),
            1
        );
    }

    #[test]
    fn test_zoom_is_clamped_and_reported() {
        let rig = started(rig());

        done(rig.controller.set_zoom(1.5, vec![PointF::new(10.0, 20.0)], true));
        assert_eq!(rig.controller.zoom(), 1.0);
        assert_eq!(rig.provider.last_device().unwrap().params().zoom, 10);
        assert_eq!(
            rig.listener.count(|e| *e == ListenerEvent::ZoomChanged(1.0)),
            1
        );

        done(rig.controller.set_zoom(0.3, Vec::new(), false));
        assert_eq!(rig.provider.last_device().unwrap().params().zoom, 3);
        assert_eq!(rig.listener.count(|e| matches!(e, ListenerEvent::ZoomChanged(_))), 1);
        contract_test("zoom", &["Zoom stays within [0, 1]"]);
    }

    #[test]
    fn test_exposure_is_clamped() {
        let rig = started(rig());

        done(rig.controller.set_exposure_correction(5.0, [-2.0, 2.0], Vec::new(), true));
        assert_eq!(rig.controller.exposure_correction(), 2.0);
        assert_eq!(rig.provider.last_device().unwrap().params().exposure_compensation, 4);
        assert!(rig
            .listener
            .events()
            .contains(&ListenerEvent::ExposureCorrectionChanged(2.0)));

        done(rig.controller.set_exposure_correction(-0.7, [-2.0, 2.0], Vec::new(), false));
        assert_eq!(rig.provider.last_device().unwrap().params().exposure_compensation, -1);
        contract_test("exposure", &["Exposure correction stays within the supported range"]);
    }

    #[test]
    fn test_facing_front_before_open() {
        let rig = rig();
        rig.controller.set_facing(Facing::Front);
        let rig = started(rig);

        assert_eq!(rig.provider.last_device().unwrap().id(), 1);
        assert_eq!(rig.controller.camera_options().unwrap().facing(), Facing::Front);
        assert_eq!(rig.provider.open_count(), 1);
    }

    #[test]
    fn test_facing_switch_restarts() {
        let rig = started(rig());

        done(rig.controller.set_facing(Facing::Front));

        assert_eq!(rig.controller.state(), SessionState::Started);
        assert_eq!(rig.provider.open_count(), 2);
        assert!(rig.provider.devices()[0].is_released());
        assert_eq!(rig.provider.last_device().unwrap().id(), 1);
        assert_eq!(rig.listener.count(|e| *e == ListenerEvent::CameraClosed), 1);
    }

    #[test]
    fn test_missing_facing_rolls_back() {
        let provider = FakeProvider::with_cameras(vec![CameraInfo {
            facing: Facing::Back,
            orientation: 90,
            can_disable_shutter_sound: true,
        }]);
        let rig = started(build(provider, SessionConfig::default(), FakeSurface::new(PORTRAIT)));

        done(rig.controller.set_facing(Facing::Front));

        assert_eq!(rig.controller.facing(), Facing::Back);
        assert_eq!(rig.provider.open_count(), 1);
    }

    #[test]
    fn test_play_sounds_follow_camera_capability() {
        let rig = started(rig());
        done(rig.controller.set_play_sounds(false));
        assert!(!rig.controller.play_sounds());
        assert_eq!(rig.provider.last_device().unwrap().with(|s| s.shutter_sound), Some(false));

        // The front camera can't silence its shutter.
        done(rig.controller.set_play_sounds(true));
        done(rig.controller.set_facing(Facing::Front));
        done(rig.controller.set_play_sounds(false));
        assert!(rig.controller.play_sounds());
    }

    #[test]
    fn test_location_reaches_parameters_and_results() {
        let rig = started(rig());
        let location = Location::new(45.07, 7.68).with_altitude(240.0).with_provider("gps");

        done(rig.controller.set_location(Some(location.clone())));
        let gps = rig.provider.last_device().unwrap().params().gps.unwrap();
        assert_eq!(gps.latitude, 45.07);
        assert_eq!(gps.processing_method, "gps");

        rig.controller.capture_photo();
        assert!(rig.listener.wait_for(WAIT, |events| events.iter().any(is_picture)));
        let picture = rig
            .listener
            .events()
            .into_iter()
            .find_map(|e| match e {
                ListenerEvent::PictureTaken(result) => Some(result),
                _ => None,
            })
            .unwrap();
        assert_eq!(picture.location, Some(location));
    }

    #[test]
    fn test_mode_switch_restarts_with_recording_hint() {
        let rig = started(rig());

        done(rig.controller.set_mode(Mode::Video));

        assert_eq!(rig.provider.open_count(), 2);
        let params = rig.provider.last_device().unwrap().params();
        assert!(params.recording_hint);
        assert_eq!(params.focus_mode.as_deref(), Some(native::FOCUS_MODE_CONTINUOUS_VIDEO));
        assert_eq!(rig.controller.capture_size(Reference::Sensor), Some(Size::new(1920, 1080)));
    }

    // ---- still capture ----

    #[test]
    fn test_picture_capture() {
        let rig = started(rig());

        done(rig.controller.capture_photo());
        assert!(rig.listener.wait_for(WAIT, |events| events.iter().any(is_picture)));
        done(rig.controller.sync());

        let events = rig.listener.events();
        let shutter = events.iter().position(|e| *e == ListenerEvent::Shutter(false)).unwrap();
        let picture = events.iter().position(is_picture).unwrap();
        assert!(shutter < picture);
        let ListenerEvent::PictureTaken(result) = &events[picture] else {
            unreachable!()
        };
        assert!(!result.is_snapshot);
        assert_eq!(result.size, Size::new(3000, 4000));
        assert_eq!(result.rotation, 90);
        assert_eq!(result.facing, Facing::Back);

        let device = rig.provider.last_device().unwrap();
        assert_eq!(device.params().rotation, 90);
        assert!(device.is_previewing());
        assert!(!rig.controller.is_taking_picture());
    }

    #[test]
    fn test_capture_sees_settings_requested_before_it() {
        let rig = started(rig());

        rig.controller.set_flash(Flash::On);
        rig.controller.set_zoom(0.7, Vec::new(), false);
        rig.controller.capture_photo();
        assert!(rig.listener.wait_for(WAIT, |events| events.iter().any(is_picture)));
        done(rig.controller.sync());

        let device = rig.provider.last_device().unwrap();
        let params = device.with(|s| s.params_at_capture.clone()).unwrap();
        assert_eq!(params.flash_mode.as_deref(), Some(native::FLASH_ON));
        assert_eq!(params.zoom, 7);
    }

    #[test]
    fn test_single_capture_in_flight() {
        let rig = started(rig());

        rig.controller.capture_photo();
        rig.controller.capture_photo();
        rig.controller.capture_photo_snapshot(None);
        assert!(rig.listener.wait_for(WAIT, |events| events.iter().any(is_picture)));
        done(rig.controller.sync());

        assert_eq!(rig.listener.count(is_picture), 1);
        let device = rig.provider.last_device().unwrap();
        assert_eq!(device.with(|s| s.take_picture_calls), 1);
        assert!(!device.with(|s| s.one_shot_pending));
    }

    #[test]
    fn test_picture_rejected_in_video_mode() {
        let rig = started(build(FakeProvider::new(), video_config(), FakeSurface::new(PORTRAIT)));

        done(rig.controller.capture_photo());

        let errors = rig.listener.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_programmer_error());
        assert_eq!(rig.provider.last_device().unwrap().with(|s| s.take_picture_calls), 0);
    }

    #[test]
    fn test_capture_ignored_when_stopped() {
        let rig = rig();
        done(rig.controller.capture_photo());
        done(rig.controller.capture_photo_snapshot(None));
        assert!(rig.listener.events().is_empty());
        assert_eq!(rig.provider.open_count(), 0);
    }

    #[test]
    fn test_snapshot_is_cropped_and_upright() {
        let rig = started(rig());
        let device = rig.provider.last_device().unwrap();

        done(rig.controller.capture_photo_snapshot(Some(AspectRatio::of(1, 1))));
        assert!(rig.controller.is_taking_picture());
        assert!(device.deliver_frame());
        assert!(rig.listener.wait_for(WAIT, |events| events.iter().any(is_picture)));
        done(rig.controller.sync());

        let events = rig.listener.events();
        assert!(events.contains(&ListenerEvent::Shutter(true)));
        let result = events
            .into_iter()
            .find_map(|e| match e {
                ListenerEvent::PictureTaken(result) => Some(result),
                _ => None,
            })
            .unwrap();
        assert!(result.is_snapshot);
        assert_eq!(result.rotation, 0);
        assert_eq!(result.size, Size::new(480, 480));

        let decoded = image::load_from_memory(&result.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (480, 480));

        // Buffered delivery is back on after the one-shot frame.
        assert!(device.with(|s| s.callback_enabled));
        assert!(!rig.controller.is_taking_picture());
    }

    // ---- preview frames ----

    #[test]
    fn test_frames_are_pooled() {
        let rig = started(rig());
        let device = rig.provider.last_device().unwrap();

        assert!(device.deliver_frame());
        assert!(device.deliver_frame());
        done(rig.controller.sync());

        assert_eq!(rig.frames.len(), 2);
        let frames = rig.frames.take();
        assert_eq!(frames[0].size(), Size::new(640, 480));
        assert_eq!(frames[0].rotation(), 90);
        assert_eq!(frames[0].data().len(), 640 * 480 * 3 / 2);
        assert_eq!(device.queued_buffers(), 2);
        drop(frames);

        assert!(device.deliver_frame());
        done(rig.controller.sync());
        assert_eq!(rig.frames.len(), 1);
        assert_eq!(device.queued_buffers(), 2);
    }

    // ---- focus ----

    fn focus_config(timeout_ms: u64, reset_delay_ms: u64) -> SessionConfig {
        let mut config = SessionConfig::default();
        config.focus.timeout_ms = timeout_ms;
        config.focus.reset_delay_ms = reset_delay_ms;
        config
    }

    #[test]
    fn test_focus_reports_once() {
        let provider = FakeProvider::new();
        provider.configure(|state| state.report_auto_focus = Some(true));
        let rig = started(build(provider, focus_config(10_000, 10_000), FakeSurface::new(PORTRAIT)));
        let point = PointF::new(540.0, 960.0);

        done(rig.controller.start_auto_focus(point));
        assert!(rig.listener.wait_for(WAIT, |events| events.iter().any(is_focus_end)));
        done(rig.controller.sync());

        assert!(rig.listener.events().contains(&ListenerEvent::FocusStart(point)));
        assert_eq!(rig.listener.count(is_focus_end), 1);
        assert!(rig.listener.events().contains(&ListenerEvent::FocusEnd(true, point)));

        let params = rig.provider.last_device().unwrap().params();
        assert_eq!(params.focus_areas.len(), 1);
        assert_eq!(params.metering_areas.len(), 2);
        assert_eq!(params.focus_mode.as_deref(), Some(native::FOCUS_MODE_AUTO));
    }

    #[test]
    fn test_focus_timeout_then_reset() {
        let rig = started(build(FakeProvider::new(), focus_config(30, 30), FakeSurface::new(PORTRAIT)));
        let device = rig.provider.last_device().unwrap();
        let point = PointF::new(100.0, 100.0);

        rig.controller.start_auto_focus(point);
        assert!(rig
            .listener
            .wait_for(WAIT, |events| events.contains(&ListenerEvent::FocusEnd(false, point))));
        assert!(eventually(|| device.with(|s| s.cancel_auto_focus_calls) >= 1));
        done(rig.controller.sync());

        let params = device.params();
        assert!(params.focus_areas.is_empty());
        assert!(params.metering_areas.is_empty());
        assert_eq!(params.focus_mode.as_deref(), Some(native::FOCUS_MODE_CONTINUOUS_PICTURE));

        // A late hardware report does not produce a second end.
        device.report_auto_focus(true);
        done(rig.controller.sync());
        assert_eq!(rig.listener.count(is_focus_end), 1);
    }

    #[test]
    fn test_superseded_focus_ends_once() {
        let rig = started(build(FakeProvider::new(), focus_config(10_000, 10_000), FakeSurface::new(PORTRAIT)));
        let device = rig.provider.last_device().unwrap();
        let (first, second) = (PointF::new(10.0, 10.0), PointF::new(900.0, 1500.0));

        rig.controller.start_auto_focus(first);
        done(rig.controller.start_auto_focus(second));
        assert_eq!(rig.listener.count(is_focus_end), 1);
        assert!(rig.listener.events().contains(&ListenerEvent::FocusEnd(false, first)));

        device.report_auto_focus(true);
        device.report_auto_focus(false);
        done(rig.controller.sync());
        assert_eq!(rig.listener.count(is_focus_end), 2);
        assert!(rig.listener.events().contains(&ListenerEvent::FocusEnd(true, second)));
    }

    #[test]
    fn test_focus_failure_ends_immediately() {
        let provider = FakeProvider::new();
        provider.configure(|state| state.fail_auto_focus = true);
        let rig = started(build(provider, SessionConfig::default(), FakeSurface::new(PORTRAIT)));
        let point = PointF::new(1.0, 2.0);

        done(rig.controller.start_auto_focus(point));

        assert!(rig.listener.events().contains(&ListenerEvent::FocusEnd(false, point)));
        assert_eq!(rig.listener.count(is_focus_end), 1);
    }

    // ---- video ----

    #[test]
    fn test_video_recording() {
        let rig = started(build(FakeProvider::new(), video_config(), FakeSurface::new(PORTRAIT)));
        let device = rig.provider.last_device().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        assert_eq!(rig.controller.capture_size(Reference::Sensor), Some(Size::new(1920, 1080)));

        done(rig.controller.capture_video(&file));
        assert!(rig.controller.is_taking_video());
        assert_eq!(device.with(|s| s.unlock_calls), 1);
        let configured = rig.encoders.configured();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].size, Size::new(1920, 1080));
        assert_eq!(configured[0].orientation_hint, 90);
        assert_eq!(configured[0].file, file);

        // A second request while recording is ignored.
        done(rig.controller.capture_video(dir.path().join("other.mp4")));
        assert_eq!(rig.encoders.configured().len(), 1);

        done(rig.controller.stop_video());
        done(rig.controller.stop_video());

        let videos: Vec<_> = rig
            .listener
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::VideoTaken(result) => Some(result),
                _ => None,
            })
            .collect();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].file, file);
        assert_eq!(videos[0].size, Size::new(1080, 1920));
        assert_eq!(videos[0].rotation, 90);
        assert_eq!(videos[0].termination, VideoTermination::UserRequested);
        assert_eq!(device.with(|s| s.lock_calls), 1);
        assert!(!rig.controller.is_taking_video());
    }

    #[test]
    fn test_video_stops_at_max_duration() {
        let rig = started(build(FakeProvider::new(), video_config(), FakeSurface::new(PORTRAIT)));
        done(rig.controller.set_video_max_duration(1_000));
        done(rig.controller.capture_video("limited.mp4"));
        assert_eq!(rig.encoders.configured()[0].max_duration, 1_000);

        assert!(rig.encoders.emit(EncoderEvent::MaxDurationReached));
        done(rig.controller.sync());

        let terminations: Vec<_> = rig
            .listener
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::VideoTaken(result) => Some(result.termination),
                _ => None,
            })
            .collect();
        assert_eq!(terminations, vec![VideoTermination::MaxDurationReached]);
        assert!(!rig.controller.is_taking_video());
    }

    #[test]
    fn test_encoder_failure_relocks_camera() {
        let rig = started(build(FakeProvider::new(), video_config(), FakeSurface::new(PORTRAIT)));
        rig.encoders.with(|log| log.fail_configure = true);
        let device = rig.provider.last_device().unwrap();

        done(rig.controller.capture_video("broken.mp4"));

        assert!(!rig.controller.is_taking_video());
        assert_eq!(device.with(|s| s.lock_calls), 1);
        assert_eq!(rig.listener.count(|e| matches!(e, ListenerEvent::VideoTaken(_))), 0);
    }

    #[test]
    fn test_close_finishes_recording() {
        let rig = started(build(FakeProvider::new(), video_config(), FakeSurface::new(PORTRAIT)));
        done(rig.controller.capture_video("interrupted.mp4"));

        done(rig.controller.close());

        let events = rig.listener.events();
        let video = events
            .iter()
            .position(|e| matches!(e, ListenerEvent::VideoTaken(_)))
            .unwrap();
        let closed = events.iter().position(|e| *e == ListenerEvent::CameraClosed).unwrap();
        assert!(video < closed);
    }

    #[test]
    fn test_video_rejected_in_picture_mode() {
        let rig = started(rig());

        done(rig.controller.capture_video("nope.mp4"));

        assert!(rig.listener.errors()[0].is_programmer_error());
        assert!(rig.encoders.configured().is_empty());
    }

    #[test]
    fn test_snapshot_ignored_while_recording() {
        let rig = started(build(FakeProvider::new(), video_config(), FakeSurface::new(PORTRAIT)));
        done(rig.controller.capture_video("busy.mp4"));

        done(rig.controller.capture_photo_snapshot(None));

        assert!(!rig.controller.is_taking_picture());
        assert!(!rig.provider.last_device().unwrap().with(|s| s.one_shot_pending));
    }

    #[test]
    fn test_worker_invariants_are_checked() {
        let _rig = started(rig());
        contract_test(
            "session",
            &[
                "Session state only changes on the worker",
                "Preview binds at most once per session",
            ],
        );
    }
}
