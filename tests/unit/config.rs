use super::*;

#[test]
fn defaults_match_recommended_encode_settings() {
    let cfg = GeneratorConfig::default();
    assert_eq!(cfg.capture.batch_size, 10);
    assert_eq!(cfg.capture.settle(), Duration::ZERO);
    assert_eq!(cfg.encoder.codec, "libx264");
    assert_eq!(cfg.encoder.pix_fmt, "yuv420p");
    assert_eq!(cfg.encoder.preset, "slow");
    assert_eq!(cfg.encoder.crf, 18);
    assert!(cfg.encoder.faststart);
    assert!(cfg.encoder.is_chroma_subsampled_420());
    assert!(cfg.validate().is_ok());
}

#[test]
fn partial_json_keeps_other_defaults() {
    let cfg: GeneratorConfig =
        serde_json::from_str(r#"{ "capture": { "batch_size": 4 }, "encoder": { "crf": 23 } }"#)
            .unwrap();
    assert_eq!(cfg.capture.batch_size, 4);
    assert_eq!(cfg.capture.settle_ms, 0);
    assert_eq!(cfg.encoder.crf, 23);
    assert_eq!(cfg.encoder.preset, "slow");
    assert_eq!(cfg.load_timeout_ms, 30_000);
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(serde_json::from_str::<GeneratorConfig>(r#"{ "batchsize": 4 }"#).is_err());
}

#[test]
fn validation_catches_bad_values() {
    let mut cfg = GeneratorConfig::default();
    cfg.capture.batch_size = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = GeneratorConfig::default();
    cfg.load_timeout_ms = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = GeneratorConfig::default();
    cfg.encoder.crf = 52;
    assert!(cfg.validate().is_err());

    let mut cfg = GeneratorConfig::default();
    cfg.encoder.codec = " ".to_string();
    assert!(cfg.validate().is_err());

    let mut cfg = GeneratorConfig::default();
    cfg.chrome.capture_timeout_ms = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn config_file_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("framecast.json");
    std::fs::write(&path, r#"{ "staging_root": "/var/tmp/frames" }"#).unwrap();
    let cfg = GeneratorConfig::from_json_file(&path).unwrap();
    assert_eq!(cfg.staging_root(), PathBuf::from("/var/tmp/frames"));

    std::fs::write(&path, r#"{ "capture": { "batch_size": 0 } }"#).unwrap();
    assert!(GeneratorConfig::from_json_file(&path).is_err());
}
