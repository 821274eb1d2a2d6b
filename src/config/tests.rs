use super::*;
use serial_test::serial;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        env::remove_var("PROXYGATE_PORT");
        env::remove_var("PROXYGATE_BIND_ADDR");
        env::remove_var("PROXYGATE_EMBEDDING_MODEL_DIR");
        env::remove_var("PROXYGATE_CACHE_MAX_SIZE");
        env::remove_var("PROXYGATE_DEFAULT_TTL_SECONDS");
        env::remove_var("PROXYGATE_DEFAULT_SIMILARITY_THRESHOLD");
        env::remove_var("PROXYGATE_UPSTREAM_URL");
        env::remove_var("PROXYGATE_UPSTREAM_API_KEY");
        env::remove_var("PROXYGATE_PRODUCTION_MODE");
        env::remove_var("PROXYGATE_ADMIN_CONFIRMATION_TOKEN");
    }
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.port, 8080);
    assert_eq!(
        config.bind_addr,
        IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))
    );
    assert!(config.embedding_model_dir.is_none());
    assert_eq!(config.cache_max_size, 1000);
    assert!(config.production_mode);
}

#[test]
fn socket_addr_formatting() {
    let config = Config::default();
    assert_eq!(config.socket_addr(), "127.0.0.1:8080");

    let config = Config {
        port: 3000,
        bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        ..Default::default()
    };
    assert_eq!(config.socket_addr(), "0.0.0.0:3000");
}

#[test]
#[serial]
fn from_env_with_defaults() {
    clear_env();
    let config = Config::from_env().expect("should parse with defaults");
    assert_eq!(config.port, 8080);
}

#[test]
#[serial]
fn from_env_custom_port() {
    clear_env();
    with_env_vars(&[("PROXYGATE_PORT", "3000")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.port, 3000);
    });
}

#[test]
#[serial]
fn from_env_invalid_port_zero() {
    clear_env();
    with_env_vars(&[("PROXYGATE_PORT", "0")], || {
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
    });
}

#[test]
#[serial]
fn from_env_invalid_port_not_a_number() {
    clear_env();
    with_env_vars(&[("PROXYGATE_PORT", "not_a_port")], || {
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::PortParseError { .. }));
    });
}

#[test]
#[serial]
fn from_env_invalid_bind_addr() {
    clear_env();
    with_env_vars(&[("PROXYGATE_BIND_ADDR", "not.an.ip")], || {
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBindAddr { .. }));
    });
}

#[test]
#[serial]
fn from_env_cache_and_threshold_overrides() {
    clear_env();
    with_env_vars(
        &[
            ("PROXYGATE_CACHE_MAX_SIZE", "2500"),
            ("PROXYGATE_DEFAULT_SIMILARITY_THRESHOLD", "0.95"),
            ("PROXYGATE_DEFAULT_TTL_SECONDS", "3600"),
        ],
        || {
            let config = Config::from_env().expect("should parse");
            assert_eq!(config.cache_max_size, 2500);
            assert_eq!(config.default_similarity_threshold, 0.95);
            assert_eq!(config.default_ttl_seconds, 3600);
        },
    );
}

#[test]
fn validate_nonexistent_model_dir() {
    let config = Config {
        embedding_model_dir: Some(PathBuf::from("/nonexistent/model/dir")),
        ..Default::default()
    };
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::PathNotFound { .. }));
}

#[test]
fn validate_model_dir_must_be_a_directory() {
    let config = Config {
        embedding_model_dir: Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml")),
        ..Default::default()
    };
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::NotADirectory { .. }));
}

#[test]
fn validate_success_with_defaults() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn error_messages_are_descriptive() {
    let err = ConfigError::InvalidPort {
        value: "0".to_string(),
    };
    assert!(err.to_string().contains("invalid port"));

    let err = ConfigError::PathNotFound {
        path: PathBuf::from("/some/path"),
    };
    assert!(err.to_string().contains("/some/path"));
}
