// AXON shared memory region - typed, file-backed mapping under the platform shm dir
use crate::error::{AxonError, AxonResult};
use crate::memory::platform;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::mem;
use std::path::PathBuf;

/// Marker for types that may live inside a shared memory segment.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, contain no pointers, references, or
/// heap-backed fields, and must be in a valid state when every byte is zero.
/// All state mutated after setup must be atomics or slots whose exclusive
/// ownership is enforced by the containing exchange protocol, since several
/// processes access the value concurrently.
pub unsafe trait ShmSafe: Send + Sync + Sized {
    /// One-time setup run by the creator after the segment is zero-filled.
    /// Attachers never call this; the creator runs it exactly once.
    fn init_in_place(&self) {}
}

/// A named OS shared-memory segment mapped as a single `T`.
///
/// Exactly one process is the creator: it allocates the segment (removing any
/// stale file of the same name first), sizes it to `size_of::<T>()`,
/// zero-fills it, and runs the one-time in-place initialization. Every other
/// process attaches to the existing segment and must agree on `T`'s layout.
///
/// The mapping is a unique resource: the region moves, it never clones. On
/// drop the creator removes the OS-visible name so later creators start
/// clean; attachers only unmap.
#[derive(Debug)]
pub struct SharedRegion<T: ShmSafe> {
    mmap: MmapMut,
    path: PathBuf,
    _file: File,
    name: String,
    creator: bool,
    _marker: PhantomData<T>,
}

impl<T: ShmSafe> SharedRegion<T> {
    /// Create the segment, becoming its owner.
    ///
    /// Removes any stale file left by a crashed previous creator, then
    /// creates the backing file sized exactly to `T`, maps it, zero-fills,
    /// and runs `T::init_in_place` once.
    pub fn create(name: &str) -> AxonResult<Self> {
        let size = mem::size_of::<T>();
        if size == 0 {
            return Err(AxonError::allocation(
                "Cannot create shared memory for zero-sized types",
            ));
        }

        let dir = platform::shm_base_dir();
        std::fs::create_dir_all(&dir).map_err(|e| {
            AxonError::allocation(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        if !platform::has_native_shm() {
            log::debug!(
                "SharedRegion '{}': no RAM-backed segment dir on {}, using a plain file mapping",
                name,
                platform::platform_name()
            );
        }

        let path = platform::shm_path(name);
        if path.exists() {
            log::debug!("SharedRegion '{}': removing stale segment", name);
            std::fs::remove_file(&path).map_err(|e| {
                AxonError::allocation(format!("Failed to remove stale segment '{}': {}", name, e))
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                AxonError::allocation(format!("Failed to create segment '{}': {}", name, e))
            })?;

        file.set_len(size as u64).map_err(|e| {
            AxonError::allocation(format!("Failed to size segment '{}': {}", name, e))
        })?;

        let mut mmap = unsafe {
            MmapOptions::new().len(size).map_mut(&file).map_err(|e| {
                AxonError::allocation(format!("Failed to map segment '{}': {}", name, e))
            })?
        };
        mmap.fill(0);

        let region = Self {
            mmap,
            path,
            _file: file,
            name: name.to_string(),
            creator: true,
            _marker: PhantomData,
        };

        region.get().init_in_place();

        log::info!("SharedRegion '{}': created ({} bytes)", name, size);
        Ok(region)
    }

    /// Attach to an existing segment created by another process.
    ///
    /// Fails with [`AxonError::NotFound`] if no segment of that name exists
    /// (the creator is missing or has not started yet) and with
    /// [`AxonError::Allocation`] if the segment size disagrees with `T`
    /// (the two processes were built against different layouts).
    pub fn attach(name: &str) -> AxonResult<Self> {
        let size = mem::size_of::<T>();
        let path = platform::shm_path(name);

        if !path.exists() {
            return Err(AxonError::not_found(format!(
                "Shared memory '{}' does not exist",
                name
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                AxonError::allocation(format!("Failed to open segment '{}': {}", name, e))
            })?;

        let metadata = file.metadata().map_err(|e| {
            AxonError::allocation(format!("Failed to stat segment '{}': {}", name, e))
        })?;
        if metadata.len() != size as u64 {
            return Err(AxonError::allocation(format!(
                "Segment '{}' size mismatch: expected {} bytes, found {}",
                name,
                size,
                metadata.len()
            )));
        }

        let mmap = unsafe {
            MmapOptions::new().len(size).map_mut(&file).map_err(|e| {
                AxonError::allocation(format!("Failed to map segment '{}': {}", name, e))
            })?
        };

        log::info!("SharedRegion '{}': attached ({} bytes)", name, size);
        Ok(Self {
            mmap,
            path,
            _file: file,
            name: name.to_string(),
            creator: false,
            _marker: PhantomData,
        })
    }

    /// Shared reference to the mapped object. Valid as long as the region
    /// lives; all mutation goes through the interior atomics and slots of
    /// `T` itself.
    pub fn get(&self) -> &T {
        let ptr = self.mmap.as_ptr() as *const T;
        debug_assert!(ptr as usize % mem::align_of::<T>() == 0);
        unsafe { &*ptr }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_creator(&self) -> bool {
        self.creator
    }

    pub fn size(&self) -> usize {
        self.mmap.len()
    }
}

impl<T: ShmSafe> Drop for SharedRegion<T> {
    fn drop(&mut self) {
        if self.creator {
            // Remove the OS-visible name so the next creator starts clean.
            // Attachers holding a mapping stay valid until they unmap.
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::warn!("SharedRegion '{}': failed to remove segment: {}", self.name, e);
            } else {
                log::debug!("SharedRegion '{}': removed", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[repr(C)]
    struct Sentinel {
        magic: AtomicU32,
        value: AtomicU32,
    }

    unsafe impl ShmSafe for Sentinel {
        fn init_in_place(&self) {
            self.magic.store(0xA5A5_5A5A, Ordering::Relaxed);
        }
    }

    fn unique(name: &str) -> String {
        format!("{}_{}", name, std::process::id())
    }

    #[test]
    fn test_create_then_attach_sees_init() {
        let name = unique("region_sentinel");
        let created = SharedRegion::<Sentinel>::create(&name).unwrap();
        assert!(created.is_creator());
        assert_eq!(created.get().magic.load(Ordering::Relaxed), 0xA5A5_5A5A);

        let attached = SharedRegion::<Sentinel>::attach(&name).unwrap();
        assert!(!attached.is_creator());
        assert_eq!(attached.get().magic.load(Ordering::Relaxed), 0xA5A5_5A5A);

        // Writes through one mapping are visible through the other.
        created.get().value.store(42, Ordering::Relaxed);
        assert_eq!(attached.get().value.load(Ordering::Relaxed), 42);
    }

    #[test]
    fn test_attach_missing_is_not_found() {
        let err = SharedRegion::<Sentinel>::attach(&unique("region_absent")).err().unwrap();
        assert!(matches!(err, AxonError::NotFound(_)));
    }

    #[test]
    fn test_drop_removes_name() {
        let name = unique("region_lifecycle");
        let created = SharedRegion::<Sentinel>::create(&name).unwrap();
        drop(created);

        let err = SharedRegion::<Sentinel>::attach(&name).err().unwrap();
        assert!(matches!(err, AxonError::NotFound(_)));
    }

    #[test]
    fn test_create_replaces_stale_segment() {
        let name = unique("region_stale");
        let path = platform::shm_path(&name);
        std::fs::create_dir_all(platform::shm_base_dir()).unwrap();
        std::fs::write(&path, vec![0xFFu8; 3]).unwrap();

        let created = SharedRegion::<Sentinel>::create(&name).unwrap();
        assert_eq!(created.size(), mem::size_of::<Sentinel>());
        assert_eq!(created.get().value.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_attach_size_mismatch_rejected() {
        let name = unique("region_mismatch");
        let path = platform::shm_path(&name);
        std::fs::create_dir_all(platform::shm_base_dir()).unwrap();
        std::fs::write(&path, vec![0u8; 1]).unwrap();

        let err = SharedRegion::<Sentinel>::attach(&name).err().unwrap();
        assert!(matches!(err, AxonError::Allocation(_)));
        std::fs::remove_file(&path).unwrap();
    }
}
