//! Remote delivery over SFTP.
//!
//! Each upload opens its own connection: TCP connect, SSH handshake,
//! password auth, one SFTP write, then the session drops. Nothing is pooled
//! or reused between events.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::Session;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::UploadTarget;

/// TCP connect timeout for the upload connection.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Session-wide timeout for SSH operations, in milliseconds.
const SESSION_TIMEOUT_MS: u32 = 30_000;

/// Errors that can occur while uploading to the remote store.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The host name did not resolve to an address.
    #[error("could not resolve host: {0}")]
    Resolve(String),

    /// TCP connection to the remote host failed.
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    /// SSH handshake or SFTP operation failed.
    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    /// Password authentication was rejected.
    #[error("authentication failed for {user}: {message}")]
    Auth { user: String, message: String },

    /// Writing the remote file failed.
    #[error("remote write failed: {0}")]
    Write(#[source] std::io::Error),
}

/// A remote destination that stores uploaded screenshots.
///
/// Implementations block; the dispatcher calls them from a blocking thread.
pub trait RemoteStore: Send + Sync {
    /// Writes `bytes` under `name` in the remote upload directory.
    fn put(&self, bytes: &[u8], name: &str) -> Result<(), TransferError>;
}

/// [`RemoteStore`] backed by an SFTP server.
#[derive(Debug, Clone)]
pub struct SftpStore {
    target: UploadTarget,
}

impl SftpStore {
    /// Creates a store writing into `target.remote_dir` on `target.host`.
    pub fn new(target: UploadTarget) -> Self {
        Self { target }
    }

    fn remote_path(&self, name: &str) -> String {
        format!("{}/{}", self.target.remote_dir, name)
    }

    fn connect(&self) -> Result<Session, TransferError> {
        let addr = (self.target.host.as_str(), self.target.port)
            .to_socket_addrs()
            .map_err(|_| TransferError::Resolve(self.target.host.clone()))?
            .next()
            .ok_or_else(|| TransferError::Resolve(self.target.host.clone()))?;

        let tcp = TcpStream::connect_timeout(&addr, Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .map_err(TransferError::Connect)?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(SESSION_TIMEOUT_MS);
        session.handshake()?;

        session
            .userauth_password(&self.target.user, &self.target.pass)
            .map_err(|e| TransferError::Auth {
                user: self.target.user.clone(),
                message: e.message().to_string(),
            })?;

        Ok(session)
    }
}

impl RemoteStore for SftpStore {
    fn put(&self, bytes: &[u8], name: &str) -> Result<(), TransferError> {
        let remote_path = self.remote_path(name);
        debug!(
            host = %self.target.host,
            remote_path = %remote_path,
            "Opening SFTP connection"
        );

        let session = self.connect()?;
        let sftp = session.sftp()?;

        let mut remote_file = sftp.create(Path::new(&remote_path))?;
        remote_file.write_all(bytes).map_err(TransferError::Write)?;

        info!(
            remote_path = %remote_path,
            size = bytes.len(),
            "Uploaded screenshot"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> UploadTarget {
        UploadTarget {
            host: "shots.example.com".to_string(),
            port: 22,
            user: "shots".to_string(),
            pass: "hunter2".to_string(),
            remote_dir: "/var/www/screens".to_string(),
            view_url: "https://example.com/screens".to_string(),
        }
    }

    #[test]
    fn test_remote_path_join() {
        let store = SftpStore::new(target());
        assert_eq!(
            store.remote_path("250821-ab3x9.png"),
            "/var/www/screens/250821-ab3x9.png"
        );
    }

    #[test]
    fn test_transfer_error_display() {
        let err = TransferError::Resolve("shots.example.com".to_string());
        assert_eq!(err.to_string(), "could not resolve host: shots.example.com");

        let err = TransferError::Auth {
            user: "shots".to_string(),
            message: "access denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "authentication failed for shots: access denied"
        );
    }
}
