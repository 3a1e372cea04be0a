//! Screenshot directory detection.
//!
//! macOS stores the screen-capture save location in the
//! `com.apple.screencapture` defaults domain. When configuration omits an
//! explicit directory, scrscr queries it with
//! `defaults read com.apple.screencapture location`.
//!
//! Detection is macOS-only. On other platforms [`detect_screens_dir`] returns
//! [`DetectError::Unsupported`] and `screens_dir` must be configured.

use std::path::PathBuf;

use directories::BaseDirs;
use thiserror::Error;

#[cfg(target_os = "macos")]
use tokio::process::Command;

/// Errors that can occur during screenshot directory detection.
#[derive(Error, Debug)]
pub enum DetectError {
    /// The detection command could not be run.
    #[error("failed to run detection command: {0}")]
    Io(#[from] std::io::Error),

    /// The detection command exited unsuccessfully.
    #[error("detection command failed: {0}")]
    CommandFailed(String),

    /// The detection command produced empty output.
    #[error("detection returned no usable path")]
    EmptyOutput,

    /// Detection only works on macOS.
    #[error("automatic detection is unsupported on this platform; set screens_dir")]
    Unsupported,
}

/// Queries the OS for the default screen-capture save location.
#[cfg(target_os = "macos")]
pub async fn detect_screens_dir() -> Result<PathBuf, DetectError> {
    let output = Command::new("defaults")
        .args(["read", "com.apple.screencapture", "location"])
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(DetectError::CommandFailed(stderr));
    }

    parse_location_output(&String::from_utf8_lossy(&output.stdout))
}

/// Queries the OS for the default screen-capture save location.
#[cfg(not(target_os = "macos"))]
pub async fn detect_screens_dir() -> Result<PathBuf, DetectError> {
    Err(DetectError::Unsupported)
}

/// Extracts a usable directory path from `defaults read` output.
///
/// The value is trimmed rather than stripped of all whitespace, so paths
/// containing spaces survive. A leading `~` is expanded against the home
/// directory.
pub fn parse_location_output(output: &str) -> Result<PathBuf, DetectError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(DetectError::EmptyOutput);
    }
    Ok(expand_tilde(trimmed))
}

fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(base_dirs) = BaseDirs::new() {
            return base_dirs.home_dir().to_path_buf();
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(base_dirs) = BaseDirs::new() {
            return base_dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_path() {
        let path = parse_location_output("/Users/me/Screenshots").expect("should parse");
        assert_eq!(path, PathBuf::from("/Users/me/Screenshots"));
    }

    #[test]
    fn test_parse_trims_trailing_newline() {
        // `defaults read` terminates its output with a newline
        let path = parse_location_output("/Users/me/Screenshots\n").expect("should parse");
        assert_eq!(path, PathBuf::from("/Users/me/Screenshots"));
    }

    #[test]
    fn test_parse_preserves_interior_spaces() {
        let path = parse_location_output("/Users/me/My Screen Shots\n").expect("should parse");
        assert_eq!(path, PathBuf::from("/Users/me/My Screen Shots"));
    }

    #[test]
    fn test_parse_empty_output_fails() {
        let result = parse_location_output("");
        assert!(matches!(result, Err(DetectError::EmptyOutput)));
    }

    #[test]
    fn test_parse_whitespace_only_fails() {
        let result = parse_location_output("  \n");
        assert!(matches!(result, Err(DetectError::EmptyOutput)));
    }

    #[test]
    fn test_parse_expands_tilde() {
        let base_dirs = BaseDirs::new().expect("home directory should exist in tests");
        let expected = base_dirs.home_dir().join("Desktop/Screens");

        let path = parse_location_output("~/Desktop/Screens\n").expect("should parse");
        assert_eq!(path, expected);
    }

    #[test]
    fn test_parse_bare_tilde() {
        let base_dirs = BaseDirs::new().expect("home directory should exist in tests");

        let path = parse_location_output("~").expect("should parse");
        assert_eq!(path, base_dirs.home_dir());
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn test_detect_unsupported_off_macos() {
        let result = detect_screens_dir().await;
        assert!(matches!(result, Err(DetectError::Unsupported)));
    }
}
