/*!
 * Integration tests for settings and configuration loading
 */

use bucket_hub::config::{HubConfig, LogLevel, Settings};
use bucket_hub::error::{HubError, EXIT_CONFIG};
use bucket_hub::protocol::s3::S3StorageClass;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_settings(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_single_bucket_settings_file() {
    let file = write_settings(
        r#"
        [logging]
        level = "warn"

        [storage]
        bucket = "logs"
        region = "oss-cn-hangzhou"
        endpoint = "https://oss-cn-hangzhou.aliyuncs.com"
        accessKeyId = "K"
        accessKeySecret = "S"
        storage_class = "STANDARD_IA"
        "#,
    );

    let settings = Settings::from_file(file.path()).unwrap();

    assert_eq!(settings.logging.level, LogLevel::Warn);
    assert!(!settings.storage.is_multi());
    assert_eq!(settings.storage.default_bucket(), Some("logs"));

    let logs = settings.storage.credentials_for("logs").unwrap();
    assert_eq!(logs.access_key.as_deref(), Some("K"));
    assert_eq!(logs.secret_key.as_deref(), Some("S"));
    assert_eq!(logs.storage_class, S3StorageClass::StandardIa);
}

#[test]
fn test_multi_bucket_settings_file() {
    let file = write_settings(
        r#"
        [storage.images]
        region = "r1"
        access_key_id = "K1"
        access_key_secret = "S1"

        [storage.videos]
        bucket = "videos-archive"
        region = "r2"
        access_key_id = "K2"
        access_key_secret = "S2"
        "#,
    );

    let settings = Settings::from_file(file.path()).unwrap();
    let storage = &settings.storage;

    assert!(storage.is_multi());
    assert_eq!(storage.default_bucket(), None);
    assert_eq!(storage.configured_buckets(), vec!["images", "videos"]);
    assert_eq!(storage.credentials_for("images").unwrap().bucket, "images");
    assert_eq!(
        storage.credentials_for("videos").unwrap().bucket,
        "videos-archive"
    );
}

#[test]
fn test_json_config_shapes() {
    let single = HubConfig::from_json(r#"{"bucket":"logs","stsToken":"T"}"#).unwrap();
    assert_eq!(
        single.credentials_for("logs").unwrap().session_token.as_deref(),
        Some("T")
    );

    let multi = HubConfig::from_json(r#"{"a-bucket":{},"b-bucket":{"region":"r"}}"#).unwrap();
    assert!(multi.is_multi());
    assert!(multi.validate().is_ok());
}

#[test]
fn test_missing_file_is_config_error() {
    let err = Settings::from_file(std::path::Path::new("/nonexistent/bucket-hub.toml"))
        .unwrap_err();
    assert!(matches!(err, HubError::InvalidConfig(_)));
    assert_eq!(err.exit_code(), EXIT_CONFIG);
}

#[test]
fn test_missing_storage_section_is_rejected() {
    let file = write_settings("[logging]\nlevel = \"info\"\n");
    assert!(matches!(
        Settings::from_file(file.path()),
        Err(HubError::InvalidConfig(_))
    ));
}

#[test]
fn test_bad_value_in_bucket_map_is_reported() {
    let file = write_settings(
        r#"
        [storage.images]
        region = "us-east-1"
        max_retries = "three"

        [storage.videos]
        region = "us-east-1"
        "#,
    );

    let err = Settings::from_file(file.path()).unwrap_err();
    let message = err.to_string();

    assert_eq!(err.exit_code(), EXIT_CONFIG);
    assert!(message.contains("images"), "{}", message);
    assert!(message.contains("max_retries"), "{}", message);
    assert!(!message.contains("needs a bucket name"), "{}", message);
}
