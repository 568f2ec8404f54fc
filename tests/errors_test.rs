#[cfg(test)]
mod error_tests {
    use camera_session::errors::{CameraError, CameraException, ErrorReason};
    use std::error::Error;

    #[test]
    fn test_camera_error_connect() {
        let error = CameraError::ConnectError("camera 0 busy".to_string());
        assert!(error.to_string().contains("Camera connection error"));
        assert!(error.to_string().contains("camera 0 busy"));
    }

    #[test]
    fn test_camera_error_preview() {
        let error = CameraError::PreviewError("no surface".to_string());
        assert_eq!(format!("{}", error), "Preview error: no surface");
    }

    #[test]
    fn test_camera_error_debug_format() {
        let error = CameraError::EncodingError("Debug test".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("EncodingError"));
        assert!(debug_str.contains("Debug test"));
    }

    #[test]
    fn test_camera_error_has_no_source() {
        let error = CameraError::CaptureError("Error trait test".to_string());
        let _error_trait: &dyn Error = &error;
        assert!(error.source().is_none());
    }

    #[test]
    fn test_all_error_variants_display() {
        let errors = vec![
            CameraError::InitializationError("a".to_string()),
            CameraError::ConnectError("b".to_string()),
            CameraError::PreviewError("c".to_string()),
            CameraError::CaptureError("d".to_string()),
            CameraError::ControlError("e".to_string()),
            CameraError::EncodingError("f".to_string()),
            CameraError::IoError("g".to_string()),
            CameraError::InvalidState("h".to_string()),
            CameraError::ConfigError("i".to_string()),
        ];
        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_exception_constructors_pick_reason() {
        assert_eq!(
            CameraException::failed_to_connect("x").reason,
            ErrorReason::FailedToConnect
        );
        assert_eq!(
            CameraException::failed_to_start_preview("x").reason,
            ErrorReason::FailedToStartPreview
        );
        assert_eq!(CameraException::disconnected("x").reason, ErrorReason::Disconnected);
        assert_eq!(
            CameraException::unknown(CameraError::IoError("x".into())).reason,
            ErrorReason::Unknown
        );
    }

    #[test]
    fn test_exception_wraps_source() {
        let exception = CameraException::failed_to_connect("camera 1 missing");
        let source = exception.source().unwrap();
        assert!(source.to_string().contains("camera 1 missing"));
        assert!(exception.to_string().contains("failed to connect"));
    }

    #[test]
    fn test_programmer_errors_are_distinguishable() {
        let misuse = CameraException::programmer_error("video in picture mode");
        assert!(misuse.is_programmer_error());
        assert_eq!(misuse.reason, ErrorReason::Unknown);

        let hardware = CameraException::unknown(CameraError::CaptureError("jammed".into()));
        assert!(!hardware.is_programmer_error());
    }

    #[test]
    fn test_error_reason_serialization() {
        let json = serde_json::to_string(&ErrorReason::Disconnected).unwrap();
        assert_eq!(json, "\"Disconnected\"");
        let back: ErrorReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorReason::Disconnected);
    }
}
