//! `ringlog-notify`: the consumer-wake transport.
//!
//! Two interchangeable ways to carry a one-token wake from a producer to
//! the blocked consumer: a counting `eventfd` shared across a fork
//! boundary, or a datagram socket bound at a filesystem path for unrelated
//! processes. Neither carries a payload; [`Notifier::signal`] is a hint,
//! not a message.

use ringlog_core::NotifyKind;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

mod descriptor;
mod socket;

pub use descriptor::DescriptorNotifier;
pub use socket::SocketPathNotifier;

/// Prefix used for derived notifier socket file names, distinguishing them
/// from unrelated sockets in the same temp directory.
pub const NOTIFY_PREFIX: &str = "ringlog";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to create notifier: {0}")]
    Create(#[source] io::Error),

    #[error("failed to bind notifier socket at '{path}': {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect notifier socket at '{path}': {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The requested notifier kind has no implementation on this platform.
    /// Internal only: [`effective_kind`] substitutes before construction is
    /// ever attempted, so callers should never observe this.
    #[error("requested notifier kind is unavailable on this platform")]
    Unavailable,
}

/// Derives the deterministic socket path for a region name: the name with
/// its leading `/` stripped, under the system temp directory.
pub fn derive_socket_path(region_name: &str) -> PathBuf {
    let stripped = region_name.strip_prefix('/').unwrap_or(region_name);
    std::env::temp_dir().join(format!("{NOTIFY_PREFIX}_{stripped}.sock"))
}

/// The notifier kind actually usable on this platform. `eventfd` only
/// exists on Linux; everywhere else this substitutes the socket-path
/// variant, and the caller must persist the substitution into the region
/// header so producers agree.
pub fn effective_kind(requested: NotifyKind) -> NotifyKind {
    if requested == NotifyKind::Descriptor && !cfg!(target_os = "linux") {
        NotifyKind::SocketPath
    } else {
        requested
    }
}

/// A closed sum over the two notifier transports. Statically dispatched:
/// only two variants exist and both are known at compile time.
pub enum Notifier {
    Descriptor(DescriptorNotifier),
    SocketPath(SocketPathNotifier),
}

impl Notifier {
    /// Consumer-side construction. Returns the notifier, the kind actually
    /// in effect (post-substitution), and the socket path if one was bound
    /// (so the caller can record it in the header).
    pub fn bind_for_consumer(
        kind: NotifyKind,
        region_name: &str,
        user_path: Option<&Path>,
    ) -> Result<(Self, NotifyKind, Option<PathBuf>), NotifyError> {
        match effective_kind(kind) {
            NotifyKind::Descriptor => {
                let notifier = DescriptorNotifier::create()?;
                Ok((Notifier::Descriptor(notifier), NotifyKind::Descriptor, None))
            }
            NotifyKind::SocketPath => {
                let path = user_path
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| derive_socket_path(region_name));
                let notifier = SocketPathNotifier::bind(&path)?;
                Ok((
                    Notifier::SocketPath(notifier),
                    NotifyKind::SocketPath,
                    Some(path),
                ))
            }
        }
    }

    /// Producer-side construction, attaching to whatever the header
    /// records the consumer actually set up.
    pub fn connect_for_producer(
        kind: NotifyKind,
        notify_fd: i32,
        notify_path: &str,
    ) -> Result<Self, NotifyError> {
        match kind {
            NotifyKind::Descriptor => {
                // SAFETY: the header only records `Descriptor` when the
                // consumer created a real eventfd inherited across fork;
                // `notify_fd` is that descriptor, still open in this
                // process.
                let notifier = unsafe { DescriptorNotifier::from_raw_fd(notify_fd) };
                Ok(Notifier::Descriptor(notifier))
            }
            NotifyKind::SocketPath => {
                let notifier = SocketPathNotifier::connect(Path::new(notify_path))?;
                Ok(Notifier::SocketPath(notifier))
            }
        }
    }

    /// Delivers exactly one wake token. Non-blocking; tolerates a
    /// transiently full token queue (a wake is only a hint).
    pub fn signal(&self) -> io::Result<()> {
        match self {
            Notifier::Descriptor(d) => d.signal(),
            Notifier::SocketPath(s) => s.signal(),
        }
    }

    /// Blocks up to `timeout` for at least one token, then drains any
    /// additional tokens already queued. Returns whether it woke (vs. timed
    /// out). Single-consumer use only.
    pub fn wait(&self, timeout: Duration) -> io::Result<bool> {
        match self {
            Notifier::Descriptor(d) => d.wait(timeout),
            Notifier::SocketPath(s) => s.wait(timeout),
        }
    }
}

/// Polls a single fd for readability, used by both notifier variants so
/// `wait`'s "block up to timeout, then drain" shape stays identical.
pub(crate) fn poll_one(fd: i32, timeout: Duration) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let ms = timeout.as_millis().min(i32::MAX as u128) as i32;
    let rc = unsafe { libc::poll(&mut pfd, 1, ms) };
    if rc < 0 {
        let e = io::Error::last_os_error();
        if e.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(e);
    }
    Ok(rc > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_deterministic_path() {
        let p = derive_socket_path("/appshm");
        assert_eq!(
            p,
            std::env::temp_dir().join(format!("{NOTIFY_PREFIX}_appshm.sock"))
        );
    }

    #[test]
    fn strips_only_one_leading_slash() {
        let p = derive_socket_path("appshm");
        assert_eq!(
            p,
            std::env::temp_dir().join(format!("{NOTIFY_PREFIX}_appshm.sock"))
        );
    }

    #[test]
    fn socket_notifier_signal_wakes_wait() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        let server = SocketPathNotifier::bind(&path).unwrap();
        let client = SocketPathNotifier::connect(&path).unwrap();

        client.signal().unwrap();
        let woke = server.wait(Duration::from_millis(500)).unwrap();
        assert!(woke);

        let timed_out = server.wait(Duration::from_millis(20)).unwrap();
        assert!(!timed_out);
    }

    #[test]
    fn socket_notifier_drains_multiple_tokens_in_one_wait() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burst.sock");
        let server = SocketPathNotifier::bind(&path).unwrap();
        let client = SocketPathNotifier::connect(&path).unwrap();

        for _ in 0..5 {
            client.signal().unwrap();
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(server.wait(Duration::from_millis(500)).unwrap());
        // A second immediate wait should find nothing left to drain.
        assert!(!server.wait(Duration::from_millis(20)).unwrap());
    }
}
