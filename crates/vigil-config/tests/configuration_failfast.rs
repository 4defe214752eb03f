//! Ensures invalid configuration sources fail loudly instead of falling back.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use tempfile::TempDir;
use vigil_config::{Config, LaunchMode};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    guard: Option<MutexGuard<'static, ()>>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &OsStr) -> Self {
        let guard = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = std::env::var_os(key);
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            guard: Some(guard),
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
        drop(self.guard.take());
    }
}

#[test]
fn malformed_config_file_is_rejected() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("vigil.toml");
    fs::write(&path, "tick_interval_ms = not_a_number\n").expect("write malformed config");

    let args = vec![
        OsString::from("vigild"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];

    assert!(
        Config::load_from_iter(args).is_err(),
        "malformed configuration must not load"
    );
}

#[test]
fn unknown_launch_mode_in_environment_is_rejected() {
    let _env = EnvOverride::set_var("VIGIL_LAUNCH_MODE", OsStr::new("sideways"));
    let args = vec![OsString::from("vigild")];
    assert!(
        Config::load_from_iter(args).is_err(),
        "unknown launch mode must not load"
    );
}

#[test]
fn environment_selects_foreground_mode() {
    let _env = EnvOverride::set_var("VIGIL_LAUNCH_MODE", OsStr::new("foreground"));
    let args = vec![OsString::from("vigild")];
    let config = Config::load_from_iter(args).expect("configuration should load");
    assert_eq!(config.launch_mode(), LaunchMode::Foreground);
}
