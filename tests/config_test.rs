#[cfg(test)]
mod config_tests {
    use camera_session::config::SessionConfig;
    use camera_session::errors::CameraError;
    use camera_session::testing::FakeProvider;
    use camera_session::{Facing, Mode, SessionController, VideoCodec};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("camera-session.toml");

        let mut config = SessionConfig::default();
        config.camera.facing = Facing::Front;
        config.camera.mode = Mode::Video;
        config.preview.desired_aspect_ratio = Some([16, 9]);
        config.video.codec = VideoCodec::H264;
        config.video.max_duration_ms = 30_000;
        config.save_to_file(&path).unwrap();

        let loaded = SessionConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let loaded = SessionConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, SessionConfig::default());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[camera\nfacing = ").unwrap();

        match SessionConfig::load_from_file(&path) {
            Err(CameraError::ConfigError(message)) => assert!(message.contains("parse")),
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = SessionConfig::default();
        config.preview.buffer_pool_size = 0;

        let result = SessionController::builder(Arc::new(FakeProvider::new()))
            .with_config(config)
            .build();
        assert!(matches!(result, Err(CameraError::ConfigError(_))));
    }

    #[test]
    fn test_config_seeds_initial_settings() {
        let mut config = SessionConfig::default();
        config.camera.facing = Facing::Front;
        config.camera.play_sounds = false;
        config.video.max_size_bytes = 1 << 20;

        let controller = SessionController::builder(Arc::new(FakeProvider::new()))
            .with_config(config)
            .build()
            .unwrap();
        assert_eq!(controller.facing(), Facing::Front);
        assert!(!controller.play_sounds());
        assert_eq!(controller.video_max_size(), 1 << 20);
    }
}
