use super::*;

#[test]
fn defaults_are_valid() {
    let cfg = CompositorConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(cfg.blur_quality, BlurQuality::Quality);
}

#[test]
fn partial_json_fills_defaults() {
    let cfg = CompositorConfig::from_json(r#"{ "chunk_size": 16, "blur_quality": "fast" }"#)
        .unwrap();
    assert_eq!(cfg.chunk_size, 16);
    assert_eq!(cfg.blur_quality, BlurQuality::Fast);
    assert_eq!(cfg.chunk_order, ChunkOrder::CenterOut);
    assert_eq!(cfg.resolution, Resolution::new(256, 256));
}

#[test]
fn sampler_variants_deserialize() {
    let cfg = CompositorConfig::from_json(r#"{ "sampler": "bicubic" }"#).unwrap();
    assert_eq!(cfg.sampler, PixelSampler::Bicubic);

    let cfg = CompositorConfig::from_json(r#"{ "sampler": { "ewa": { "dx": 2.0, "dy": 1.0 } } }"#)
        .unwrap();
    assert_eq!(cfg.sampler, PixelSampler::Ewa { dx: 2.0, dy: 1.0 });
}

#[test]
fn invalid_settings_are_rejected() {
    assert!(CompositorConfig::from_json(r#"{ "chunk_size": 0 }"#).is_err());
    assert!(CompositorConfig::from_json(r#"{ "threads": 0 }"#).is_err());
    assert!(
        CompositorConfig::from_json(r#"{ "resolution": { "width": 0, "height": 4 } }"#).is_err()
    );
    assert!(CompositorConfig::from_json("not json").is_err());
}

#[test]
fn zero_resolution_reports_which_field() {
    let cfg = CompositorConfig {
        resolution: Resolution::new(0, 8),
        ..CompositorConfig::default()
    };
    let err = cfg.validate().unwrap_err().to_string();
    assert!(err.starts_with("validation error: resolution"), "{err}");

    let cfg = CompositorConfig {
        output_resolution: Some(Resolution::new(8, 0)),
        ..CompositorConfig::default()
    };
    let err = cfg.validate().unwrap_err().to_string();
    assert!(err.starts_with("validation error: output_resolution"), "{err}");
}
