//! The `eventfd`-backed notifier. Linux only; [`crate::effective_kind`]
//! substitutes the socket-path variant everywhere else, so the stub below
//! exists only to keep `Notifier` compiling cross-platform.

use crate::NotifyError;
use std::io;
use std::time::Duration;

#[cfg(target_os = "linux")]
mod imp {
    use super::*;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

    /// A counting descriptor in semaphore mode: each read consumes exactly
    /// one token, matching the notifier's one-token-per-signal contract.
    pub struct DescriptorNotifier {
        fd: OwnedFd,
    }

    impl DescriptorNotifier {
        pub fn create() -> Result<Self, NotifyError> {
            let raw = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_SEMAPHORE) };
            if raw < 0 {
                return Err(NotifyError::Create(io::Error::last_os_error()));
            }
            // SAFETY: eventfd() just returned a freshly opened, owned fd.
            let fd = unsafe { OwnedFd::from_raw_fd(raw) };
            Ok(Self { fd })
        }

        /// Adopts an eventfd inherited across a fork boundary.
        ///
        /// # Safety
        /// `fd` must be a valid, open eventfd exclusively owned by the
        /// caller from this point on.
        pub unsafe fn from_raw_fd(fd: RawFd) -> Self {
            Self {
                fd: unsafe { OwnedFd::from_raw_fd(fd) },
            }
        }

        pub fn as_raw_fd(&self) -> RawFd {
            self.fd.as_raw_fd()
        }

        pub fn signal(&self) -> io::Result<()> {
            let one: u64 = 1;
            let n = unsafe {
                libc::write(
                    self.fd.as_raw_fd(),
                    &one as *const u64 as *const libc::c_void,
                    8,
                )
            };
            if n < 0 {
                let e = io::Error::last_os_error();
                // The counter is saturated (EAGAIN): the wake is only a
                // hint and the consumer's poll window tolerates this.
                if e.kind() == io::ErrorKind::WouldBlock {
                    return Ok(());
                }
                return Err(e);
            }
            Ok(())
        }

        pub fn wait(&self, timeout: Duration) -> io::Result<bool> {
            if !crate::poll_one(self.fd.as_raw_fd(), timeout)? {
                return Ok(false);
            }
            let mut buf = [0u8; 8];
            let _ = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    8,
                )
            };
            Ok(true)
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::*;
    use std::os::fd::RawFd;

    pub struct DescriptorNotifier(std::convert::Infallible);

    impl DescriptorNotifier {
        pub fn create() -> Result<Self, NotifyError> {
            Err(NotifyError::Unavailable)
        }

        /// # Safety
        /// Never actually reachable: `effective_kind` substitutes before a
        /// producer would try to adopt a descriptor on this platform.
        pub unsafe fn from_raw_fd(_fd: RawFd) -> Self {
            unreachable!("eventfd notifier is not available off Linux")
        }

        pub fn as_raw_fd(&self) -> RawFd {
            match self.0 {}
        }

        pub fn signal(&self) -> io::Result<()> {
            match self.0 {}
        }

        pub fn wait(&self, _timeout: Duration) -> io::Result<bool> {
            match self.0 {}
        }
    }
}

pub use imp::DescriptorNotifier;
