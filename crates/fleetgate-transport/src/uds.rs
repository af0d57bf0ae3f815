use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Unix domain socket for the local control plane.
///
/// The socket file is created with owner-only permissions and removed on
/// drop, unless something else has replaced it in the meantime.
pub struct ControlSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl ControlSocket {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Unix `sockaddr_un.sun_path` is 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind the control socket. Must be called within a tokio runtime.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source| TransportError::BindPath {
            path: path.clone(),
            source,
        };

        // A leftover socket from a previous run is replaced; any other file is not.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "control socket listening");

        Ok(Self {
            listener,
            created_inode: Some((created.dev(), created.ino())),
            path,
        })
    }

    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await.map_err(TransportError::Accept)?;
        debug!("accepted control connection");
        Ok(stream)
    }

    /// Connect to a running gateway's control socket.
    pub async fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
        let path = path.as_ref();
        UnixStream::connect(path)
            .await
            .map_err(|source| TransportError::Connect {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    fn test_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fleetgate-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn bind_accept_connect() {
        let dir = test_dir("uds");
        let sock_path = dir.join("control.sock");

        let socket = ControlSocket::bind(&sock_path).unwrap();
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        let path = sock_path.clone();
        let client = tokio::spawn(async move {
            let mut stream = ControlSocket::connect(&path).await.unwrap();
            stream.write_all(b"hello").await.unwrap();
        });

        let mut server = socket.accept().await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        client.await.unwrap();

        drop(socket);
        assert!(!sock_path.exists(), "socket file should be removed on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn rebinding_replaces_stale_socket() {
        let dir = test_dir("uds-stale");
        let sock_path = dir.join("control.sock");

        let first = ControlSocket::bind(&sock_path).unwrap();
        std::mem::forget(first);
        let second = ControlSocket::bind(&sock_path);
        assert!(second.is_ok());

        drop(second);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn rejects_existing_regular_file() {
        let dir = test_dir("uds-file");
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = ControlSocket::bind(&sock_path);
        assert!(matches!(result, Err(TransportError::BindPath { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn rejects_long_path() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = ControlSocket::bind(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }
}
