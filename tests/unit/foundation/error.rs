use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CompositorError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(CompositorError::graph("x").to_string().contains("graph error:"));
    assert!(
        CompositorError::resource("x")
            .to_string()
            .contains("resource error:")
    );
    assert!(
        CompositorError::evaluation("x")
            .to_string()
            .contains("evaluation error:")
    );
    assert!(
        CompositorError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CompositorError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn serde_json_errors_convert() {
    let err: CompositorError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert!(matches!(err, CompositorError::Serde(_)));
}
