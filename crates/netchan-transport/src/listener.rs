use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener};
#[cfg(unix)]
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
#[cfg(unix)]
use std::os::unix::net::UnixListener;
#[cfg(unix)]
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::address::Address;
use crate::error::{Result, TransportError};
use crate::stream::NetStream;

/// A bound, listening socket for one channel address.
///
/// TCP listeners resolve `":port"` to every interface. Unix listeners create
/// the socket file, replacing a stale socket but never a regular file, and
/// remove it again on drop.
pub struct NetListener {
    inner: NetListenerInner,
    address: Address,
}

enum NetListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixSocketListener),
}

impl NetListener {
    /// Default permission mode for created Unix socket paths.
    #[cfg(unix)]
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Bind and listen on `address`.
    pub fn bind(address: &Address) -> Result<Self> {
        let inner = match address {
            Address::Tcp { host, port } => {
                let target = Address::listen_target(host, *port);
                let listener = TcpListener::bind(&target).map_err(|e| TransportError::Bind {
                    address: address.to_string(),
                    source: e,
                })?;
                info!(%address, local = ?listener.local_addr().ok(), "listening on tcp");
                NetListenerInner::Tcp(listener)
            }
            #[cfg(unix)]
            Address::Unix(path) => {
                let listener = UnixSocketListener::bind(path, Self::DEFAULT_SOCKET_MODE)
                    .map_err(|e| TransportError::Bind {
                        address: address.to_string(),
                        source: e,
                    })?;
                info!(%address, "listening on unix domain socket");
                NetListenerInner::Unix(listener)
            }
        };

        Ok(Self {
            inner,
            address: address.clone(),
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<NetStream> {
        match &self.inner {
            NetListenerInner::Tcp(listener) => {
                let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
                debug!(%peer, "accepted tcp connection");
                Ok(NetStream::from_tcp(stream))
            }
            #[cfg(unix)]
            NetListenerInner::Unix(listener) => {
                let (stream, _addr) = listener.listener.accept().map_err(TransportError::Accept)?;
                debug!("accepted unix connection");
                Ok(NetStream::from_unix(stream))
            }
        }
    }

    /// The address this listener was bound with.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The concrete local address, with an ephemeral port resolved.
    pub fn local_addr(&self) -> Result<Address> {
        match &self.inner {
            NetListenerInner::Tcp(listener) => {
                let local = listener.local_addr()?;
                Ok(Address::Tcp {
                    host: host_string(local.ip()),
                    port: local.port(),
                })
            }
            #[cfg(unix)]
            NetListenerInner::Unix(listener) => Ok(Address::Unix(listener.path.clone())),
        }
    }

    /// An address that reaches this listener from the local host.
    ///
    /// Dialing it unblocks a thread parked in [`NetListener::accept`].
    pub fn wake_address(&self) -> Result<Address> {
        match &self.inner {
            NetListenerInner::Tcp(listener) => {
                let local = listener.local_addr()?;
                let ip = match local.ip() {
                    IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
                    IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
                    ip => ip,
                };
                let wake = SocketAddr::new(ip, local.port());
                Ok(Address::Tcp {
                    host: host_string(wake.ip()),
                    port: wake.port(),
                })
            }
            #[cfg(unix)]
            NetListenerInner::Unix(listener) => Ok(Address::Unix(listener.path.clone())),
        }
    }
}

fn host_string(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(ip) => ip.to_string(),
        IpAddr::V6(ip) => format!("[{ip}]"),
    }
}

impl std::fmt::Debug for NetListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetListener")
            .field("address", &self.address)
            .finish()
    }
}

#[cfg(unix)]
struct UnixSocketListener {
    listener: UnixListener,
    path: PathBuf,
    created_inode: (u64, u64),
}

#[cfg(unix)]
impl UnixSocketListener {
    fn bind(path: &Path, mode: u32) -> std::io::Result<Self> {
        // Remove stale socket if it exists, but never remove non-socket files.
        if let Ok(metadata) = std::fs::symlink_metadata(path) {
            if !metadata.file_type().is_socket() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                ));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        let created = std::fs::symlink_metadata(path)?;

        Ok(Self {
            listener,
            path: path.to_path_buf(),
            created_inode: (created.dev(), created.ino()),
        })
    }
}

#[cfg(unix)]
impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        let Ok(metadata) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        let (dev, ino) = self.created_inode;
        if metadata.file_type().is_socket() && metadata.dev() == dev && metadata.ino() == ino {
            debug!(path = ?self.path, "cleaning up socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    fn loopback() -> Address {
        Address::parse("127.0.0.1:0").unwrap()
    }

    #[test]
    fn bind_accept_connect_tcp() {
        let listener = NetListener::bind(&loopback()).unwrap();
        let local = listener.local_addr().unwrap();
        let Address::Tcp { port, .. } = &local else {
            panic!("expected tcp local address");
        };
        assert_ne!(*port, 0, "ephemeral port should be resolved");

        let handle = std::thread::spawn(move || {
            let mut client = NetStream::connect(&local).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn bind_in_use_fails() {
        let first = NetListener::bind(&loopback()).unwrap();
        let taken = first.local_addr().unwrap();

        let result = NetListener::bind(&taken);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn wake_address_unblocks_accept_on_wildcard() {
        let listener = NetListener::bind(&Address::parse(":0").unwrap()).unwrap();
        let wake = listener.wake_address().unwrap();
        assert!(wake.to_string().starts_with("127.0.0.1:"));

        let waker = std::thread::spawn(move || {
            NetStream::connect_timeout(&wake, std::time::Duration::from_secs(1))
                .expect("wake connection should succeed")
        });

        listener.accept().expect("accept should be woken");
        waker.join().unwrap();
    }

    #[cfg(unix)]
    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "netchan-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[cfg(unix)]
    #[test]
    fn unix_bind_and_cleanup() {
        let dir = temp_dir("uds");
        let sock_path = dir.join("chan.sock");
        let address = Address::Unix(sock_path.clone());

        let listener = NetListener::bind(&address).unwrap();
        assert!(sock_path.exists());
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        let handle = std::thread::spawn(move || {
            let mut client = NetStream::connect(&address).unwrap();
            client.write_all(b"ping").unwrap();
        });
        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        handle.join().unwrap();

        drop(listener);
        assert!(
            !sock_path.exists(),
            "socket file should be cleaned up on drop"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn unix_bind_rejects_existing_non_socket_file() {
        let dir = temp_dir("uds-file");
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = NetListener::bind(&Address::Unix(sock_path.clone()));
        assert!(matches!(result, Err(TransportError::Bind { .. })));
        assert!(sock_path.exists(), "regular file must be left alone");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
