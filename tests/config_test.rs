//! Tests for config and secrets loading from disk.

use std::fs;
use std::io::Write;

use tempfile::{NamedTempFile, TempDir};

use vegvisir::config::{ApiKeySecret, Config, Secrets};
use vegvisir::{RouterError, TokenBudgetEstimator};

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn load_explicit_config() {
    let file = write_config(
        r#"
        fallback_message = "Try again soon"

        [local]
        command = "sh"
        args = ["-c", "cat"]

        [remote]
        timeout_secs = 3
        "#,
    );

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.remote.timeout_secs, 3);
    assert_eq!(config.local.as_ref().unwrap().command, "sh");
    assert_eq!(config.fallback_message.as_deref(), Some("Try again soon"));
}

#[test]
fn invalid_toml_is_configuration_error() {
    let file = write_config("[selector\nshort_question_tokens = ");
    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, RouterError::Configuration(msg) if msg.contains("Failed to parse")));
}

#[test]
fn router_builder_requires_local_command() {
    let config = Config::default();
    let err = config
        .router_builder(&Secrets::default())
        .unwrap()
        .estimator(TokenBudgetEstimator::new())
        .build()
        .unwrap_err();
    assert!(matches!(err, RouterError::Configuration(_)));
}

#[test]
fn router_builder_enables_remote_with_key() {
    let file = write_config(
        r#"
        [local]
        command = "cat"
        "#,
    );
    let config = Config::load_from(file.path()).unwrap();
    let secrets = Secrets {
        openai: Some(ApiKeySecret {
            api_key: "sk-test".to_string(),
        }),
    };

    let router = config.router_builder(&secrets).unwrap().build().unwrap();
    assert!(router.credentials_available());
}

#[cfg(unix)]
mod permissions {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    fn secrets_file(dir: &TempDir, mode: u32) -> std::path::PathBuf {
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "[openai]\napi_key = \"sk-from-file\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn owner_only_secrets_load() {
        let dir = TempDir::new().unwrap();
        let path = secrets_file(&dir, 0o600);
        let secrets = Secrets::load_from(&path).unwrap();
        assert_eq!(secrets.openai_api_key(), Some("sk-from-file".to_string()));
    }

    #[test]
    fn read_only_secrets_load() {
        let dir = TempDir::new().unwrap();
        let path = secrets_file(&dir, 0o400);
        assert!(Secrets::load_from(&path).is_ok());
    }

    #[test]
    fn world_readable_secrets_rejected() {
        let dir = TempDir::new().unwrap();
        let path = secrets_file(&dir, 0o644);
        let err = Secrets::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("insecure permissions 644"));
    }
}
