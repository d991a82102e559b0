//! Resource images in memory-mapped flash partitions.
//!
//! A small descriptor table over [`PartitionMap`]. Names are matched
//! case-insensitively against the configured resource list; the n-th name
//! lives in partition `(partition_type, first_subtype + n)`.

use std::sync::Arc;

use espdoom_shared::constants::MAX_OPEN_FILES;
use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::fatal;

/// Identifies one flash partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionId {
    pub partition_type: u8,
    pub subtype: u8,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to map partition {id:?}: {reason}")]
pub struct MapError {
    pub id: PartitionId,
    pub reason: String,
}

/// Flash partitions that can be mapped into the address space.
pub trait PartitionMap: Send + Sync {
    /// `true` if the partition exists.
    fn contains(&self, id: PartitionId) -> bool;

    /// Map the whole partition read-only.
    fn map(&self, id: PartitionId) -> Result<Arc<[u8]>, MapError>;

    /// Release a mapping returned by [`map`](Self::map).
    fn unmap(&self, _id: PartitionId) {}
}

/// Partitions backed by heap buffers.
#[derive(Debug, Default, Clone)]
pub struct MemoryPartitions {
    partitions: HashMap<PartitionId, Arc<[u8]>>,
}

impl MemoryPartitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: PartitionId, data: impl Into<Arc<[u8]>>) {
        self.partitions.insert(id, data.into());
    }
}

impl PartitionMap for MemoryPartitions {
    fn contains(&self, id: PartitionId) -> bool {
        self.partitions.contains_key(&id)
    }

    fn map(&self, id: PartitionId) -> Result<Arc<[u8]>, MapError> {
        self.partitions.get(&id).cloned().ok_or_else(|| MapError {
            id,
            reason: "no such partition".to_string(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("open {0} failed: no free descriptor")]
    NoFreeDescriptor(String),

    #[error("open {0} failed: not a known resource")]
    NotFound(String),

    #[error("bad descriptor {0}")]
    BadDescriptor(i32),

    #[error("read of {len} bytes at {offset} past end of {size}-byte image")]
    ReadPastEnd { offset: i64, len: usize, size: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    /// Not implemented: logged, offset unchanged.
    End,
}

struct OpenFile {
    id: PartitionId,
    image: Arc<[u8]>,
    offset: i64,
}

/// Descriptor table of at most [`MAX_OPEN_FILES`] open images.
pub struct FileTable<P: PartitionMap> {
    partitions: P,
    resources: Vec<String>,
    partition_type: u8,
    first_subtype: u8,
    files: [Option<OpenFile>; MAX_OPEN_FILES],
}

impl<P: PartitionMap> FileTable<P> {
    pub fn new(partitions: P, config: &StorageConfig) -> Self {
        Self {
            partitions,
            resources: config.resources.clone(),
            partition_type: config.partition_type,
            first_subtype: config.first_partition_subtype,
            files: Default::default(),
        }
    }

    /// Open a resource image by name.
    ///
    /// A known name whose partition is missing or fails to map aborts the
    /// process.
    pub fn open(&mut self, name: &str) -> Result<i32, StorageError> {
        let Some(fd) = self.files.iter().position(Option::is_none) else {
            info!("open {} failed: no free descriptor", name);
            return Err(StorageError::NoFreeDescriptor(name.to_string()));
        };
        let Some(index) = self.resource_index(name) else {
            info!("open {} failed", name);
            return Err(StorageError::NotFound(name.to_string()));
        };

        let id = PartitionId {
            partition_type: self.partition_type,
            subtype: self.first_subtype.wrapping_add(index as u8),
        };
        if !self.partitions.contains(id) {
            fatal("Resource partition missing", format_args!("{} ({:?})", name, id));
        }
        let image = self
            .partitions
            .map(id)
            .unwrap_or_else(|e| fatal("Resource mapping failed", e));
        info!("{}: {} bytes, fd = {}", name, image.len(), fd);

        self.files[fd] = Some(OpenFile {
            id,
            image,
            offset: 0,
        });
        Ok(fd as i32)
    }

    /// Move the read offset. Returns the new offset.
    pub fn seek(&mut self, fd: i32, offset: i64, whence: Whence) -> Result<i64, StorageError> {
        let file = self.file_mut(fd)?;
        match whence {
            Whence::Set => file.offset = offset,
            Whence::Cur => file.offset += offset,
            Whence::End => warn!("seek: Whence::End unimplemented"),
        }
        Ok(file.offset)
    }

    pub fn file_length(&self, fd: i32) -> Result<usize, StorageError> {
        Ok(self.file(fd)?.image.len())
    }

    /// Fill `buf` from the current offset and advance past it.
    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> Result<(), StorageError> {
        let file = self.file_mut(fd)?;
        let bytes = slice_at(&file.image, file.offset, buf.len())?;
        buf.copy_from_slice(bytes);
        file.offset += buf.len() as i64;
        Ok(())
    }

    /// The mapped image from `offset` to its end.
    pub fn mmap(&self, fd: i32, offset: usize) -> Result<&[u8], StorageError> {
        let file = self.file(fd)?;
        file.image.get(offset..).ok_or(StorageError::ReadPastEnd {
            offset: offset as i64,
            len: 0,
            size: file.image.len(),
        })
    }

    pub fn close(&mut self, fd: i32) -> Result<(), StorageError> {
        let slot = usize::try_from(fd)
            .ok()
            .and_then(|i| self.files.get_mut(i))
            .ok_or(StorageError::BadDescriptor(fd))?;
        let file = slot.take().ok_or(StorageError::BadDescriptor(fd))?;
        self.partitions.unmap(file.id);
        debug!("close: fd {}", fd);
        Ok(())
    }

    /// `name + ext` if it names a known resource.
    pub fn find_file(&self, name: &str, ext: &str) -> Option<String> {
        let candidate = format!("{name}{ext}");
        if self.resource_index(&candidate).is_some() {
            Some(candidate)
        } else {
            info!("find_file: {} not found", candidate);
            None
        }
    }

    pub fn open_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_some()).count()
    }

    fn resource_index(&self, name: &str) -> Option<usize> {
        self.resources
            .iter()
            .position(|resource| resource.eq_ignore_ascii_case(name))
    }

    fn file(&self, fd: i32) -> Result<&OpenFile, StorageError> {
        usize::try_from(fd)
            .ok()
            .and_then(|i| self.files.get(i))
            .and_then(Option::as_ref)
            .ok_or(StorageError::BadDescriptor(fd))
    }

    fn file_mut(&mut self, fd: i32) -> Result<&mut OpenFile, StorageError> {
        usize::try_from(fd)
            .ok()
            .and_then(|i| self.files.get_mut(i))
            .and_then(Option::as_mut)
            .ok_or(StorageError::BadDescriptor(fd))
    }
}

fn slice_at(image: &[u8], offset: i64, len: usize) -> Result<&[u8], StorageError> {
    usize::try_from(offset)
        .ok()
        .and_then(|start| image.get(start..start.checked_add(len)?))
        .ok_or(StorageError::ReadPastEnd {
            offset,
            len,
            size: image.len(),
        })
}
