use crate::error::DropReason;

#[test]
fn drop_reason_display_test() {
    assert_eq!(DropReason::CodecError.to_string(), "Generic codec error");
    assert_eq!(DropReason::InvalidFrame.to_string(), "Invalid frame");
    assert_eq!(
        DropReason::CodecParametersError.to_string(),
        "Codec parameters update failed"
    );
}
