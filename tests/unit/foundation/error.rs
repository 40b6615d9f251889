use super::*;

#[test]
fn at_frame_prefixes_message_and_keeps_variant() {
    let e = FramelabError::encode("pipe closed").at_frame(FrameIndex(42));
    assert!(matches!(e, FramelabError::Encode(_)));
    assert_eq!(e.to_string(), "encode error: frame 42: pipe closed");
}

#[test]
fn cancelled_is_untouched_by_frame_context() {
    let e = FramelabError::Cancelled.at_frame(FrameIndex(1));
    assert!(matches!(e, FramelabError::Cancelled));
}

#[test]
fn serde_json_errors_map_to_serde_variant() {
    let err = serde_json::from_str::<u32>("not json").unwrap_err();
    let e: FramelabError = err.into();
    assert!(matches!(e, FramelabError::Serde(_)));
}
