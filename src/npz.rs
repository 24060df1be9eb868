//! `.npz` containers: ZIP archives whose members are `.npy` arrays.
//!
//! Member paths form the hierarchy. Directory members and every path prefix
//! ending in `/` are groups; `*.npy` members are datasets. A dataset is
//! contiguous in the container file only when its member is stored without
//! compression or encryption and its header declares C order, in which case
//! its elements start right after the `.npy` header inside the member.

mod header;
mod writer;

pub use self::{
    header::{FormatHeaderError, ParseHeaderError, ReadHeaderError},
    writer::{NpzWriter, WriteNpzError},
};

use self::header::Header;
use crate::{
    element::ElementType,
    index::{DatasetProbe, EnumerationError, ObjectKind, ObjectSource, ProbeError, VisitedObject},
};
use log::debug;
use py_literal::Value as PyValue;
use std::{
    collections::HashSet,
    fs::File,
    io::{self, Read, Seek},
    path::{Path, PathBuf},
};
use thiserror::Error;
use zip::{result::ZipError, CompressionMethod, ZipArchive};

/// An error opening a container.
#[derive(Debug, Error)]
pub enum OpenContainerError {
    /// The file could not be opened.
    #[error("cannot open container {}: {source}", .path.display())]
    Io {
        /// Path of the container.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The file is not a readable archive.
    #[error("cannot open container {}: {source}", .path.display())]
    Archive {
        /// Path of the container.
        path: PathBuf,
        /// Underlying error.
        source: ZipError,
    },
}

/// An open `.npz` container.
///
/// This is the object source the index is built from. It reads member
/// headers only; element data is accessed through a
/// [`MappedFile`](crate::MappedFile).
///
/// # Example
///
/// ```no_run
/// use mmview::{MetadataIndex, NpzContainer};
///
/// let mut container = NpzContainer::open("grid.npz")?;
/// let index = MetadataIndex::build(&mut container)?;
/// for dataset in &index {
///     println!("{} at offset {}", dataset.name(), dataset.byte_offset());
/// }
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
pub struct NpzContainer<R = File> {
    archive: ZipArchive<R>,
}

impl NpzContainer<File> {
    /// Opens the container at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenContainerError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|source| OpenContainerError::Io { path: path.to_owned(), source })?;
        let archive = ZipArchive::new(file)
            .map_err(|source| OpenContainerError::Archive { path: path.to_owned(), source })?;
        Ok(Self { archive })
    }
}

impl<R: Read + Seek> NpzContainer<R> {
    /// Reads a container from `reader`.
    ///
    /// Offsets reported for its datasets are relative to the start of
    /// `reader`.
    pub fn from_reader(reader: R) -> Result<Self, ZipError> {
        Ok(Self { archive: ZipArchive::new(reader)? })
    }

    /// Number of members in the archive.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// Whether the archive has no members.
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }
}

impl<R: Read + Seek> ObjectSource for NpzContainer<R> {
    fn visit(
        &mut self,
        root: &str,
        visitor: &mut dyn FnMut(VisitedObject<'_>),
    ) -> Result<(), EnumerationError> {
        let prefix = root_prefix(root);
        if !prefix.is_empty() && !self.archive.file_names().any(|n| n.starts_with(&prefix)) {
            return Err(EnumerationError::RootNotFound(root.to_owned()));
        }

        visitor(VisitedObject { name: ".", kind: ObjectKind::Group });
        let mut groups = HashSet::new();
        for i in 0..self.archive.len() {
            let mut member = self.archive.by_index_raw(i)?;
            let Some(path) = member.name().strip_prefix(prefix.as_str()).map(str::to_owned) else {
                continue;
            };
            for group in parent_groups(&path) {
                if groups.insert(group.to_owned()) {
                    visitor(VisitedObject { name: group, kind: ObjectKind::Group });
                }
            }
            if member.is_dir() {
                continue;
            }
            let Some(name) = array_name_from_file_name(&path) else {
                debug!("{path}: not an array member; ignored");
                continue;
            };

            let stored = member.compression() == CompressionMethod::Stored && !member.encrypted();
            let npy = if stored {
                let data_start = member.data_start();
                NpyMember::read(&mut member, data_start)
            } else {
                NpyMember::unreadable()
            };
            visitor(VisitedObject { name, kind: ObjectKind::Dataset(&npy) });
        }
        Ok(())
    }
}

/// Header information of one array member.
struct NpyMember {
    offset: Option<u64>,
    header: Result<Header, ProbeError>,
}

impl NpyMember {
    /// Reads the header of a stored member whose data begins at `data_start`
    /// in the container file.
    ///
    /// A member whose header cannot be read, because it is malformed or ends
    /// early, gets no offset and reports the failure as a header error.
    fn read<M: Read>(member: &mut M, data_start: u64) -> Self {
        match Header::read_from(member) {
            Ok((header, header_len)) => {
                let offset = (!header.fortran_order)
                    .then(|| data_start.checked_add(header_len as u64))
                    .flatten();
                Self { offset, header: Ok(header) }
            }
            Err(err) => Self { offset: None, header: Err(ProbeError::Header(err.to_string())) },
        }
    }

    /// A compressed or encrypted member, whose header is not read.
    fn unreadable() -> Self {
        Self { offset: None, header: Err(ProbeError::Unavailable) }
    }

    fn header(&self) -> Result<&Header, ProbeError> {
        self.header.as_ref().map_err(ProbeError::clone)
    }
}

impl DatasetProbe for NpyMember {
    fn contiguous_offset(&self) -> Option<u64> {
        self.offset
    }

    fn shape(&self) -> Result<Vec<usize>, ProbeError> {
        Ok(self.header()?.shape.clone())
    }

    fn element_type(&self) -> Result<ElementType, ProbeError> {
        match &self.header()?.type_descriptor {
            PyValue::String(descr) => ElementType::from_descriptor(descr)
                .ok_or_else(|| ProbeError::UnsupportedType(descr.clone())),
            other => Err(ProbeError::UnsupportedType(other.to_string())),
        }
    }
}

/// Member path prefix selecting the objects below `root`.
fn root_prefix(root: &str) -> String {
    match root.trim_matches('/') {
        "" | "." => String::new(),
        root => format!("{root}/"),
    }
}

/// Every proper prefix of `path` that ends just before a `/`.
fn parent_groups(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}

/// Name of the array stored in a member, if it is an array member.
///
/// An interior NUL ends the path, and only the lowercase `.npy` suffix marks
/// an array.
fn array_name_from_file_name(path: &str) -> Option<&str> {
    let path = path.split('\0').next().unwrap_or(path);
    path.strip_suffix(".npy")
}
