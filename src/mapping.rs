//! Read/write memory mapping of a container file.

use crate::{
    element::Element,
    index::DatasetDescriptor,
    view::{AnyView, ArrayView, ArrayViewMut, ViewError},
};
use log::info;
use memmap2::{MmapMut, MmapOptions};
use std::{
    fs::{File, OpenOptions},
    io,
    fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// An error mapping a file. Each step of [`MappedFile::open`] fails with its
/// own variant.
#[derive(Debug, Error)]
pub enum MapFileError {
    /// The file could not be opened for reading and writing.
    #[error("cannot open file for mapping {}: {source}", .path.display())]
    Open {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The file size could not be determined.
    #[error("cannot stat {}: {source}", .path.display())]
    Stat {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The file could not be mapped.
    #[error("cannot map {}: {source}", .path.display())]
    Map {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

/// A shared read/write mapping of a whole file.
///
/// Views borrow the mapping: any number of [`ArrayView`]s through `&self`,
/// or one [`ArrayViewMut`] through `&mut self`. Writes land in the file
/// through the mapping; [`flush`](Self::flush) forces them to disk. The
/// mapping is released when this value is dropped, which the borrow checker
/// only allows once no views remain.
pub struct MappedFile {
    mmap: MmapMut,
    path: PathBuf,
    _file: File,
}

impl MappedFile {
    /// Opens `path` for reading and writing and maps its full length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MapFileError> {
        let path = path.as_ref().to_owned();
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(source) => return Err(MapFileError::Open { path, source }),
        };
        let len = match file.metadata().and_then(|meta| {
            usize::try_from(meta.len())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file too large to map"))
        }) {
            Ok(len) => len,
            Err(source) => return Err(MapFileError::Stat { path, source }),
        };
        Self::map(file, path, len)
    }

    fn map(file: File, path: PathBuf, len: usize) -> Result<Self, MapFileError> {
        // SAFETY: the mapping is shared and writable. Modification of the file
        // by other processes while it is mapped is outside our control; within
        // this process all access goes through borrows of `self`.
        let mmap = match unsafe { MmapOptions::new().len(len).map_mut(&file) } {
            Ok(mmap) => mmap,
            Err(source) => return Err(MapFileError::Map { path, source }),
        };
        info!("mapped {} ({len} bytes)", path.display());
        Ok(Self { mmap, path, _file: file })
    }

    /// Path of the mapped file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Whether the mapped file is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// The mapped bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// The mapped bytes, writable.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Writes modified pages back to the file.
    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }

    /// A typed view of the dataset `desc` describes.
    pub fn view<T: Element>(
        &self,
        desc: &DatasetDescriptor,
    ) -> Result<ArrayView<'_, T>, ViewError> {
        ArrayView::new(self.as_bytes(), desc)
    }

    /// A writable typed view of the dataset `desc` describes.
    pub fn view_mut<T: Element>(
        &mut self,
        desc: &DatasetDescriptor,
    ) -> Result<ArrayViewMut<'_, T>, ViewError> {
        ArrayViewMut::new(self.as_bytes_mut(), desc)
    }

    /// A view of the dataset whose element type is chosen by `desc`.
    pub fn any_view(&self, desc: &DatasetDescriptor) -> Result<AnyView<'_>, ViewError> {
        AnyView::new(self.as_bytes(), desc)
    }
}

impl fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .finish_non_exhaustive()
    }
}
