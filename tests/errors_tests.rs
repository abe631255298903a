use std::error::Error;
use pagelens::LensError;

#[test]
fn test_lens_error_implements_error_trait() {
    fn assert_error<T: Error + Send + Sync + 'static>(_: &T) {}

    let error = LensError::Document("bad node".to_string());
    assert_error(&error);
}

#[test]
fn test_lens_error_display() {
    assert_eq!(
        LensError::MissingCredential.to_string(),
        "No API key has been configured"
    );
    assert_eq!(
        LensError::EmptyCredentialInput.to_string(),
        "API key must not be empty"
    );

    // Service messages are shown to the user exactly as received
    let error = LensError::RemoteService("API key not valid".to_string());
    assert_eq!(format!("{error}"), "API key not valid");

    let error = LensError::ClipboardWrite("denied".to_string());
    assert_eq!(format!("{error}"), "Failed to write to the clipboard: denied");

    let error = LensError::Http("Connection error".to_string());
    assert_eq!(
        format!("{error}"),
        "Failed to send HTTP request: Connection error"
    );
}

#[test]
fn test_lens_error_from_conversions() {
    let err = anyhow::anyhow!("tab crashed");
    match LensError::from(err) {
        LensError::Host(msg) => assert!(msg.contains("tab crashed")),
        other => panic!("Unexpected error type: {other:?}"),
    }

    let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    assert!(matches!(LensError::from(json_err), LensError::Storage(_)));

    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    match LensError::from(io_err) {
        LensError::Storage(msg) => assert!(msg.contains("read-only")),
        other => panic!("Unexpected error type: {other:?}"),
    }

    #[allow(unused)]
    #[allow(clippy::items_after_statements)]
    fn _check_reqwest_conversion(err: reqwest::Error) -> LensError {
        LensError::from(err)
    }
}
