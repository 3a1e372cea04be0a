//! Configuration module for scrscr.
//!
//! Configuration is resolved once at startup from an optional TOML file
//! overlaid with environment variables, then validated into an immutable
//! [`Config`]. Environment variables override file values; both override
//! built-in defaults.
//!
//! # Options
//!
//! | TOML key | Environment variable | Default | Description |
//! |----------|----------------------|---------|-------------|
//! | `screens_dir` | `SCRSCR_SCREENS_DIR` | auto-detect | Directory to watch for new screenshots |
//! | `action` | `SCRSCR_ACTION` | `upload` | `upload` or `clipboard` |
//! | `downscale` | `SCRSCR_DOWNSCALE` | `false` | Halve image dimensions before upload |
//! | `remove` | `SCRSCR_REMOVE` | `false` | Delete the source file after delivery |
//! | `sftp_host` | `SCRSCR_SFTP_HOST` | - | Remote host (required for `upload`) |
//! | `sftp_port` | `SCRSCR_SFTP_PORT` | 22 | Remote SSH port |
//! | `sftp_user` | `SCRSCR_SFTP_USER` | - | Remote username (required for `upload`) |
//! | `sftp_pass` | `SCRSCR_SFTP_PASS` | - | Remote password (required for `upload`) |
//! | `sftp_path` | `SCRSCR_SFTP_PATH` | - | Remote directory receiving uploads (required for `upload`) |
//! | `view_path` | `SCRSCR_VIEW_PATH` | - | Public URL prefix mirroring `sftp_path` (required for `upload`) |
//!
//! # Example
//!
//! ```no_run
//! use scrscr::config::Config;
//!
//! let config = Config::load(None).expect("failed to load configuration");
//! println!("action: {}", config.action);
//! ```

use std::env;
use std::fmt;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::Deserialize;
use thiserror::Error;

/// Default SSH port for the upload target.
const DEFAULT_SFTP_PORT: u16 = 22;

/// Config directory name under the platform config root.
const CONFIG_DIR_NAME: &str = "scrscr";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that can occur during configuration resolution.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML or contains unknown keys.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The upload action is selected but required options are absent.
    #[error("missing required options for upload action: {0}")]
    MissingUploadOptions(String),

    /// A file or environment value has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Delivery action performed for each new screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Upload over SFTP and place the public link on the clipboard.
    Upload,

    /// Copy the image itself onto the clipboard.
    Clipboard,
}

impl Action {
    fn parse(key: &str, value: &str) -> Result<Self, ConfigError> {
        match value {
            "upload" => Ok(Self::Upload),
            "clipboard" => Ok(Self::Clipboard),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected 'upload' or 'clipboard', got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Clipboard => write!(f, "clipboard"),
        }
    }
}

/// Remote SFTP destination plus the public URL prefix mirroring it.
///
/// Present on [`Config`] only when the upload action is selected, in which
/// case every field has been validated at load time.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    /// Remote host name or address.
    pub host: String,

    /// Remote SSH port.
    pub port: u16,

    /// Remote username.
    pub user: String,

    /// Remote password.
    pub pass: String,

    /// Remote directory receiving uploads, without a trailing slash.
    pub remote_dir: String,

    /// Public URL prefix corresponding to `remote_dir`, without a trailing slash.
    pub view_url: String,
}

/// Resolved configuration for scrscr.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory to watch. `None` means auto-detect at startup.
    pub screens_dir: Option<PathBuf>,

    /// Delivery action for each new screenshot.
    pub action: Action,

    /// Halve image dimensions before upload when density permits.
    pub downscale: bool,

    /// Delete the source file after successful delivery.
    pub remove: bool,

    /// Upload destination. `Some` exactly when `action` is [`Action::Upload`].
    pub upload: Option<UploadTarget>,
}

/// On-disk layout of `config.toml`. Every key is optional here; required-field
/// validation happens after the environment overlay is applied.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    screens_dir: Option<PathBuf>,
    action: Option<String>,
    downscale: Option<bool>,
    remove: Option<bool>,
    sftp_host: Option<String>,
    sftp_port: Option<u16>,
    sftp_user: Option<String>,
    sftp_pass: Option<String>,
    sftp_path: Option<String>,
    view_path: Option<String>,
}

impl Config {
    /// Loads and validates configuration.
    ///
    /// Reads `path_override` if given (the file must exist), otherwise the
    /// default config file if present, then overlays `SCRSCR_*` environment
    /// variables and validates the result.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `path_override` is given but does not exist
    /// - the config file cannot be read or parsed
    /// - a value fails validation (bad action name, malformed boolean/port)
    /// - the upload action is selected and required options are missing
    pub fn load(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        let mut raw = match path_override {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound(path.to_path_buf()));
                }
                read_file(path)?
            }
            None => {
                let default = Self::default_path()?;
                if default.is_file() {
                    read_file(&default)?
                } else {
                    RawConfig::default()
                }
            }
        };

        apply_env(&mut raw)?;
        validate(raw)
    }

    /// Platform config file location (`~/.config/scrscr/config.toml` on Linux).
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(base_dirs
            .config_dir()
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Renders the resolved configuration as TOML-style lines, with the
    /// password redacted. Used by `scrscr config`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match &self.screens_dir {
            Some(dir) => {
                let _ = writeln!(out, "screens_dir = {:?}", dir.display().to_string());
            }
            None => {
                let _ = writeln!(out, "# screens_dir auto-detected at startup");
            }
        }
        let _ = writeln!(out, "action = {:?}", self.action.to_string());
        let _ = writeln!(out, "downscale = {}", self.downscale);
        let _ = writeln!(out, "remove = {}", self.remove);
        if let Some(upload) = &self.upload {
            let _ = writeln!(out, "sftp_host = {:?}", upload.host);
            let _ = writeln!(out, "sftp_port = {}", upload.port);
            let _ = writeln!(out, "sftp_user = {:?}", upload.user);
            let _ = writeln!(out, "sftp_pass = \"(redacted)\"");
            let _ = writeln!(out, "sftp_path = {:?}", upload.remote_dir);
            let _ = writeln!(out, "view_path = {:?}", upload.view_url);
        }
        out
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Overlays `SCRSCR_*` environment variables onto the file layer.
fn apply_env(raw: &mut RawConfig) -> Result<(), ConfigError> {
    if let Ok(val) = env::var("SCRSCR_SCREENS_DIR") {
        raw.screens_dir = Some(PathBuf::from(val));
    }
    if let Ok(val) = env::var("SCRSCR_ACTION") {
        raw.action = Some(val);
    }
    if let Ok(val) = env::var("SCRSCR_DOWNSCALE") {
        raw.downscale = Some(parse_bool("SCRSCR_DOWNSCALE", &val)?);
    }
    if let Ok(val) = env::var("SCRSCR_REMOVE") {
        raw.remove = Some(parse_bool("SCRSCR_REMOVE", &val)?);
    }
    if let Ok(val) = env::var("SCRSCR_SFTP_HOST") {
        raw.sftp_host = Some(val);
    }
    if let Ok(val) = env::var("SCRSCR_SFTP_PORT") {
        raw.sftp_port = Some(parse_port("SCRSCR_SFTP_PORT", &val)?);
    }
    if let Ok(val) = env::var("SCRSCR_SFTP_USER") {
        raw.sftp_user = Some(val);
    }
    if let Ok(val) = env::var("SCRSCR_SFTP_PASS") {
        raw.sftp_pass = Some(val);
    }
    if let Ok(val) = env::var("SCRSCR_SFTP_PATH") {
        raw.sftp_path = Some(val);
    }
    if let Ok(val) = env::var("SCRSCR_VIEW_PATH") {
        raw.view_path = Some(val);
    }
    Ok(())
}

fn validate(raw: RawConfig) -> Result<Config, ConfigError> {
    let action = match raw.action.as_deref() {
        Some(value) => Action::parse("action", value)?,
        None => Action::Upload,
    };

    let upload = match action {
        Action::Upload => Some(validate_upload(&raw)?),
        Action::Clipboard => None,
    };

    Ok(Config {
        screens_dir: raw.screens_dir,
        action,
        downscale: raw.downscale.unwrap_or(false),
        remove: raw.remove.unwrap_or(false),
        upload,
    })
}

fn validate_upload(raw: &RawConfig) -> Result<UploadTarget, ConfigError> {
    match (
        &raw.sftp_host,
        &raw.sftp_user,
        &raw.sftp_pass,
        &raw.sftp_path,
        &raw.view_path,
    ) {
        (Some(host), Some(user), Some(pass), Some(remote_dir), Some(view_url)) => {
            Ok(UploadTarget {
                host: host.clone(),
                port: raw.sftp_port.unwrap_or(DEFAULT_SFTP_PORT),
                user: user.clone(),
                pass: pass.clone(),
                remote_dir: trim_trailing_slashes(remote_dir),
                view_url: trim_trailing_slashes(view_url),
            })
        }
        _ => {
            let mut missing = Vec::new();
            if raw.sftp_host.is_none() {
                missing.push("sftp_host");
            }
            if raw.sftp_user.is_none() {
                missing.push("sftp_user");
            }
            if raw.sftp_pass.is_none() {
                missing.push("sftp_pass");
            }
            if raw.sftp_path.is_none() {
                missing.push("sftp_path");
            }
            if raw.view_path.is_none() {
                missing.push("view_path");
            }
            Err(ConfigError::MissingUploadOptions(missing.join(", ")))
        }
    }
}

/// Strips trailing slashes so `{prefix}/{name}` joins produce a single separator.
fn trim_trailing_slashes(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}

/// Parses a boolean environment value. Accepts `true`/`false`/`1`/`0`.
fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected true/false/1/0, got '{other}'"),
        }),
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected port number, got '{value}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper to run tests with isolated environment variables.
    /// Clears all SCRSCR_* vars before the test and restores them after.
    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        // Save and remove existing SCRSCR_* vars
        let saved_vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with("SCRSCR_"))
            .collect();

        for (key, _) in &saved_vars {
            env::remove_var(key);
        }

        let result = f();

        // Restore saved vars
        for (key, value) in saved_vars {
            env::set_var(key, value);
        }

        result
    }

    /// Writes a config file with the given contents and returns its handle.
    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("should create temp file");
        file.write_all(contents.as_bytes())
            .expect("should write temp config");
        file
    }

    fn set_upload_env() {
        env::set_var("SCRSCR_SFTP_HOST", "shots.example.com");
        env::set_var("SCRSCR_SFTP_USER", "shots");
        env::set_var("SCRSCR_SFTP_PASS", "hunter2");
        env::set_var("SCRSCR_SFTP_PATH", "/var/www/screens");
        env::set_var("SCRSCR_VIEW_PATH", "https://example.com/screens");
    }

    #[test]
    #[serial]
    fn test_upload_requires_credentials() {
        with_clean_env(|| {
            let file = config_file("");
            let result = Config::load(Some(file.path()));
            assert!(result.is_err());

            let err = result.unwrap_err();
            assert!(matches!(
                err,
                ConfigError::MissingUploadOptions(ref keys)
                    if keys.contains("sftp_host") && keys.contains("view_path")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_clipboard_action_needs_no_credentials() {
        with_clean_env(|| {
            env::set_var("SCRSCR_ACTION", "clipboard");

            let file = config_file("");
            let config = Config::load(Some(file.path())).expect("should load clipboard config");

            assert_eq!(config.action, Action::Clipboard);
            assert!(config.upload.is_none());
            assert!(config.screens_dir.is_none());
            assert!(!config.downscale);
            assert!(!config.remove);
        });
    }

    #[test]
    #[serial]
    fn test_full_config_from_file() {
        with_clean_env(|| {
            let file = config_file(
                r#"
                screens_dir = "/tmp/screens"
                action = "upload"
                downscale = true
                remove = true
                sftp_host = "shots.example.com"
                sftp_port = 2222
                sftp_user = "shots"
                sftp_pass = "hunter2"
                sftp_path = "/var/www/screens/"
                view_path = "https://example.com/screens/"
                "#,
            );

            let config = Config::load(Some(file.path())).expect("should load full config");

            assert_eq!(config.screens_dir, Some(PathBuf::from("/tmp/screens")));
            assert_eq!(config.action, Action::Upload);
            assert!(config.downscale);
            assert!(config.remove);

            let upload = config.upload.expect("upload target should be present");
            assert_eq!(upload.host, "shots.example.com");
            assert_eq!(upload.port, 2222);
            assert_eq!(upload.user, "shots");
            assert_eq!(upload.pass, "hunter2");
            // Trailing slashes are trimmed
            assert_eq!(upload.remote_dir, "/var/www/screens");
            assert_eq!(upload.view_url, "https://example.com/screens");
        });
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        with_clean_env(|| {
            let file = config_file(
                r#"
                action = "clipboard"
                downscale = false
                "#,
            );
            env::set_var("SCRSCR_ACTION", "upload");
            env::set_var("SCRSCR_DOWNSCALE", "1");
            set_upload_env();

            let config = Config::load(Some(file.path())).expect("should load config");

            assert_eq!(config.action, Action::Upload);
            assert!(config.downscale);

            let upload = config.upload.expect("upload target should be present");
            assert_eq!(upload.host, "shots.example.com");
            assert_eq!(upload.port, DEFAULT_SFTP_PORT);
        });
    }

    #[test]
    #[serial]
    fn test_env_only_config() {
        with_clean_env(|| {
            env::set_var("SCRSCR_SCREENS_DIR", "/tmp/screens");
            env::set_var("SCRSCR_REMOVE", "true");
            set_upload_env();

            let file = config_file("");
            let config = Config::load(Some(file.path())).expect("should load env config");

            assert_eq!(config.screens_dir, Some(PathBuf::from("/tmp/screens")));
            assert!(config.remove);
            assert!(config.upload.is_some());
        });
    }

    #[test]
    #[serial]
    fn test_invalid_action_rejected() {
        with_clean_env(|| {
            env::set_var("SCRSCR_ACTION", "email");

            let file = config_file("");
            let result = Config::load(Some(file.path()));
            assert!(result.is_err());

            let err = result.unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "action" && message.contains("email")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_bool_rejected() {
        with_clean_env(|| {
            env::set_var("SCRSCR_DOWNSCALE", "yes");

            let file = config_file("");
            let result = Config::load(Some(file.path()));
            assert!(result.is_err());

            let err = result.unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, .. } if key == "SCRSCR_DOWNSCALE"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_port_rejected() {
        with_clean_env(|| {
            env::set_var("SCRSCR_SFTP_PORT", "none");

            let file = config_file("");
            let result = Config::load(Some(file.path()));
            assert!(result.is_err());

            let err = result.unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, .. } if key == "SCRSCR_SFTP_PORT"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file() {
        with_clean_env(|| {
            let result = Config::load(Some(Path::new("/nonexistent/scrscr.toml")));
            assert!(result.is_err());

            let err = result.unwrap_err();
            assert!(matches!(err, ConfigError::FileNotFound(_)));
        });
    }

    #[test]
    #[serial]
    fn test_unknown_key_rejected() {
        with_clean_env(|| {
            let file = config_file("sftp_hots = \"typo.example.com\"\n");

            let result = Config::load(Some(file.path()));
            assert!(result.is_err());

            let err = result.unwrap_err();
            assert!(matches!(err, ConfigError::Parse { .. }));
        });
    }

    #[test]
    #[serial]
    fn test_render_redacts_password() {
        with_clean_env(|| {
            set_upload_env();

            let file = config_file("");
            let config = Config::load(Some(file.path())).expect("should load config");

            let rendered = config.render();
            assert!(rendered.contains("sftp_host = \"shots.example.com\""));
            assert!(rendered.contains("sftp_pass = \"(redacted)\""));
            assert!(!rendered.contains("hunter2"));
        });
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Upload.to_string(), "upload");
        assert_eq!(Action::Clipboard.to_string(), "clipboard");
    }
}
