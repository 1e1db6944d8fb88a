//! The cross-process fallback notifier: a `SOCK_DGRAM` Unix domain socket
//! bound at a deterministic filesystem path. Used whenever producer and
//! consumer don't share a fork ancestor (so no inherited `eventfd`) and on
//! every non-Linux platform.

use crate::NotifyError;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One byte is the entire payload; its value is never inspected, only its
/// arrival. `signal` sends it, `wait` drains every pending one.
const TOKEN: &[u8; 1] = b"\x01";

pub struct SocketPathNotifier {
    socket: UnixDatagram,
    /// `Some` only for the end that bound (and therefore owns) the path;
    /// `Drop` unlinks it so a restarted consumer can rebind cleanly.
    owned_path: Option<PathBuf>,
}

impl SocketPathNotifier {
    /// Consumer-side: binds a fresh socket at `path`, removing any stale
    /// file left behind by a crashed prior consumer first.
    pub fn bind(path: &Path) -> Result<Self, NotifyError> {
        let _ = std::fs::remove_file(path);
        let socket = UnixDatagram::bind(path).map_err(|source| NotifyError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        socket.set_nonblocking(true).map_err(|source| NotifyError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            socket,
            owned_path: Some(path.to_path_buf()),
        })
    }

    /// Producer-side: connects to a socket some consumer already bound.
    /// The producer's own socket is anonymous (unbound), so it never owns
    /// or unlinks a path.
    pub fn connect(path: &Path) -> Result<Self, NotifyError> {
        let socket = UnixDatagram::unbound().map_err(|source| NotifyError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        socket
            .connect(path)
            .map_err(|source| NotifyError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| NotifyError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            socket,
            owned_path: None,
        })
    }

    pub fn signal(&self) -> io::Result<()> {
        match self.socket.send(TOKEN) {
            Ok(_) => Ok(()),
            // The kernel's datagram queue is full: the wake is only a
            // hint, and the consumer will still see data on its next poll.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Blocks up to `timeout` for at least one token, then drains any
    /// further tokens already queued without blocking again.
    pub fn wait(&self, timeout: Duration) -> io::Result<bool> {
        if !crate::poll_one(self.socket.as_raw_fd(), timeout)? {
            return Ok(false);
        }
        let mut buf = [0u8; 1];
        loop {
            match self.socket.recv(&mut buf) {
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

impl Drop for SocketPathNotifier {
    fn drop(&mut self) {
        if let Some(path) = &self.owned_path {
            let _ = std::fs::remove_file(path);
        }
    }
}
