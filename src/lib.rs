#![doc = include_str!("../README.md")]
//! ## Reading a container
//!
//! - Indexing: [`MetadataIndex::build`] over any [`ObjectSource`], such as
//!   an [`NpzContainer`]
//! - Mapping: [`MappedFile::open`]
//! - Viewing: [`MappedFile::view`], [`MappedFile::view_mut`] and
//!   [`MappedFile::any_view`]
//! - All of the above at once: [`Session`]
//!
//! ## Writing a container
//!
//! [`NpzWriter`] writes containers whose uncompressed arrays can be mapped.
//!
//! ## Limitations
//!
//! - Only datasets stored as one contiguous run of bytes in C order can be
//!   viewed. Compressed, encrypted and Fortran-ordered arrays are left out of
//!   the index.
//!
//! - The element types are fixed-size integers up to 64 bits, `f32`, `f64`
//!   and complex floating point numbers (if enabled with the crate feature).
//!
//! - Views never resize the file or move a dataset.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs)]

mod element;
mod index;
mod mapping;
pub mod npz;
mod session;
mod view;

#[cfg(feature = "ndarray")]
mod impl_ndarray;

pub use crate::{
    element::{Element, ElementType, Endian, ScalarKind, Value},
    index::{
        DatasetDescriptor, DatasetProbe, EnumerationError, MetadataIndex, ObjectKind,
        ObjectSource, ProbeError, VisitedObject,
    },
    mapping::{MapFileError, MappedFile},
    npz::{NpzContainer, NpzWriter, OpenContainerError, WriteNpzError},
    session::{Session, SessionError},
    view::{AnyView, ArrayView, ArrayViewMut, IndexError, Iter, Lane, ViewError},
};
