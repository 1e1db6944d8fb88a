//! `ringlog-shm`: creation, attachment, and destruction of named
//! shared-memory regions.
//!
//! This crate knows how to get a raw, process-shared pointer to a region of
//! the right size; it does not know anything about the ring protocol laid
//! out inside that memory (`ringlog-core`) or how the consumer is woken
//! (`ringlog-notify`). `ShmRegion::create` is the only place that writes the
//! orphan registry; `ShmRegion::destroy` is the only place that removes it.

mod registry;

pub use registry::{deregister_name, register_name, registered_names, registry_path};

use memmap2::MmapRaw;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::{Mode, fstat};
use nix::unistd::ftruncate;
use ringlog_core::RINGLOG_VERSION;
use std::fs::File;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShmError {
    #[error("region name must be non-empty and begin with '/'")]
    InvalidHandle,

    #[error("region size must be non-zero")]
    ZeroSize,

    #[error("failed to create shared memory region '{name}': {source}")]
    CreateFailed {
        name: String,
        #[source]
        source: nix::Error,
    },

    #[error("failed to map shared memory region '{name}': {source}")]
    MapFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ring version mismatch in region '{name}': expected {expected}, found {found}")]
    VersionMismatch {
        name: String,
        expected: u32,
        found: u32,
    },
}

/// A mapped shared-memory region. Cheap to pass by reference; the mapping
/// itself is only torn down when the handle is dropped or explicitly
/// [`ShmRegion::unmap`]ped.
pub struct ShmRegion {
    mmap: MmapRaw,
    name: String,
    size: usize,
}

// SAFETY: the ring protocol built on top of this mapping synchronizes every
// access through the atomics in its header and slots; the raw pointer
// itself never changes after mapping.
unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}

fn validate_name(name: &str) -> Result<(), ShmError> {
    if name.len() < 2 || !name.starts_with('/') {
        return Err(ShmError::InvalidHandle);
    }
    Ok(())
}

impl ShmRegion {
    /// Creates a brand-new named region of `size` bytes, mapped read/write,
    /// and records `name` in the per-user orphan registry. The caller (the
    /// consumer) is responsible for initializing the header and slots
    /// before anyone else attaches.
    pub fn create(name: &str, size: usize) -> Result<Self, ShmError> {
        validate_name(name)?;
        if size == 0 {
            return Err(ShmError::ZeroSize);
        }

        let fd = shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::from_bits_truncate(0o600),
        )
        .map_err(|source| ShmError::CreateFailed {
            name: name.to_string(),
            source,
        })?;
        ftruncate(&fd, size as i64).map_err(|source| ShmError::CreateFailed {
            name: name.to_string(),
            source,
        })?;

        let file: File = fd.into();
        let mmap = MmapRaw::map_raw(&file).map_err(|source| ShmError::MapFailed {
            name: name.to_string(),
            source,
        })?;

        register_name(name);
        tracing::debug!(name, size, "created shared memory region");

        Ok(Self {
            mmap,
            name: name.to_string(),
            size,
        })
    }

    /// Attaches to an existing region by name, without checking the header
    /// version. Size is discovered from the kernel object itself.
    pub fn attach(name: &str) -> Result<Self, ShmError> {
        validate_name(name)?;

        let fd =
            shm_open(name, OFlag::O_RDWR, Mode::empty()).map_err(|source| ShmError::CreateFailed {
                name: name.to_string(),
                source,
            })?;
        let stat = fstat(&fd).map_err(|source| ShmError::CreateFailed {
            name: name.to_string(),
            source,
        })?;
        let size = stat.st_size as usize;
        if size == 0 {
            return Err(ShmError::ZeroSize);
        }

        let file: File = fd.into();
        let mmap = MmapRaw::map_raw(&file).map_err(|source| ShmError::MapFailed {
            name: name.to_string(),
            source,
        })?;

        Ok(Self {
            mmap,
            name: name.to_string(),
            size,
        })
    }

    /// Attaches and additionally verifies the header's `version` field
    /// against the version compiled into this `ringlog-core`. This is the
    /// entry point producers must use; a mismatch is always fatal.
    pub fn attach_and_check_version(name: &str) -> Result<Self, ShmError> {
        let region = Self::attach(name)?;
        // SAFETY: `attach` just validated the region is at least as large
        // as the `st_size` reported by the kernel; `RingHeader` is the
        // first thing written by `create`, so reading its `version` field
        // (a plain `u32`, not behind any atomic) is always valid here.
        let found = unsafe { &*(region.mmap.as_ptr() as *const ringlog_core::RingHeader) }.version;
        if found != RINGLOG_VERSION {
            tracing::warn!(
                name = %region.name,
                expected = RINGLOG_VERSION,
                found,
                "ring version mismatch at attach"
            );
            return Err(ShmError::VersionMismatch {
                name: region.name,
                expected: RINGLOG_VERSION,
                found,
            });
        }
        Ok(region)
    }

    /// Removes the kernel shared-memory object and deregisters its name.
    /// Only the owning consumer should call this, and only after unmapping
    /// (or dropping) every handle to it.
    pub fn destroy(name: &str) {
        if shm_unlink(name).is_err() {
            tracing::debug!(name, "shm_unlink found nothing to remove");
        }
        deregister_name(name);
    }

    /// Consumes the handle, unmapping the region. Never unlinks the kernel
    /// object; call [`Self::destroy`] separately if that's intended.
    pub fn unmap(self) {
        drop(self);
    }

    #[inline]
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unique_name(tag: &str) -> String {
        let n = UNIQ.fetch_add(1, Ordering::Relaxed);
        format!("/ringlog_shm_test_{tag}_{}_{}", std::process::id(), n)
    }
    static UNIQ: AtomicU32 = AtomicU32::new(0);

    #[test]
    fn create_then_attach_share_bytes() {
        let name = unique_name("roundtrip");
        let region = ShmRegion::create(&name, 4096).unwrap();
        unsafe {
            *region.as_mut_ptr() = 0xAB;
        }
        let attached = ShmRegion::attach(&name).unwrap();
        assert_eq!(unsafe { *attached.as_mut_ptr() }, 0xAB);
        assert_eq!(attached.size(), 4096);
        ShmRegion::destroy(&name);
    }

    #[test]
    fn rejects_bad_names() {
        assert!(matches!(
            ShmRegion::create("no-leading-slash", 4096),
            Err(ShmError::InvalidHandle)
        ));
        assert!(matches!(
            ShmRegion::create("/x", 0),
            Err(ShmError::ZeroSize)
        ));
    }

    #[test]
    fn attach_and_check_version_rejects_mismatch() {
        let name = unique_name("version");
        let bytes = ringlog_core::bytes_for_region(4, 192);
        let region = ShmRegion::create(&name, bytes).unwrap();
        unsafe {
            ringlog_core::RingHeader::init(
                region.as_mut_ptr() as *mut ringlog_core::RingHeader,
                4,
                192,
                ringlog_core::OverflowPolicy::Drop,
                ringlog_core::NotifyKind::SocketPath,
                -1,
                b"",
            );
            // Corrupt the version in place, as a test would simulate a
            // stale/foreign writer.
            (*(region.as_mut_ptr() as *mut ringlog_core::RingHeader)).version = 0xDEAD_BEEF;
        }
        let err = ShmRegion::attach_and_check_version(&name).unwrap_err();
        match err {
            ShmError::VersionMismatch { expected, found, .. } => {
                assert_eq!(expected, RINGLOG_VERSION);
                assert_eq!(found, 0xDEAD_BEEF);
            }
            other => panic!("expected VersionMismatch, got {other:?}"),
        }
        ShmRegion::destroy(&name);
    }
}
