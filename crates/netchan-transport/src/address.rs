use std::fmt;
#[cfg(unix)]
use std::path::{Path, PathBuf};

use crate::error::{Result, TransportError};

/// Prefix selecting a Unix domain socket address.
pub const UNIX_PREFIX: &str = "unix:";

/// Host used when listening on an address with an empty host (`":9000"`).
const LISTEN_ANY_HOST: &str = "0.0.0.0";

/// Host used when dialing an address with an empty host (`":9000"`).
const DIAL_LOCAL_HOST: &str = "127.0.0.1";

/// A parsed channel address.
///
/// Plain `host:port` strings select TCP. An empty host (`":9000"`) means
/// every interface when listening and the local host when dialing.
/// `unix:<path>` selects a Unix domain socket on unix targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Tcp { host: String, port: u16 },
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Address {
    /// Parse an address string.
    pub fn parse(address: &str) -> Result<Self> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(TransportError::invalid_address(address, "empty address"));
        }

        if let Some(path) = trimmed.strip_prefix(UNIX_PREFIX) {
            return Self::parse_unix(address, path);
        }

        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| TransportError::invalid_address(address, "missing port"))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| TransportError::invalid_address(address, "port is not a number"))?;

        Ok(Self::Tcp {
            host: host.to_string(),
            port,
        })
    }

    #[cfg(unix)]
    fn parse_unix(address: &str, path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(TransportError::invalid_address(address, "empty socket path"));
        }
        Ok(Self::Unix(PathBuf::from(path)))
    }

    #[cfg(not(unix))]
    fn parse_unix(address: &str, _path: &str) -> Result<Self> {
        Err(TransportError::invalid_address(
            address,
            "unix domain sockets are not supported on this platform",
        ))
    }

    /// `host:port` target for listening.
    pub(crate) fn listen_target(host: &str, port: u16) -> String {
        if host.is_empty() {
            format!("{LISTEN_ANY_HOST}:{port}")
        } else {
            format!("{host}:{port}")
        }
    }

    /// `host:port` target for dialing.
    pub(crate) fn dial_target(host: &str, port: u16) -> String {
        if host.is_empty() {
            format!("{DIAL_LOCAL_HOST}:{port}")
        } else {
            format!("{host}:{port}")
        }
    }

    /// The socket path for Unix addresses.
    #[cfg(unix)]
    pub fn unix_path(&self) -> Option<&Path> {
        match self {
            Self::Unix(path) => Some(path),
            Self::Tcp { .. } => None,
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "tcp",
            #[cfg(unix)]
            Self::Unix(_) => "unix-domain-socket",
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}

impl std::str::FromStr for Address {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
