//! Dataset descriptors and the index built from a container enumeration.
//!
//! The container format itself is parsed by an [`ObjectSource`]. The builder
//! here only consumes what the source resolves for each visited object.

use crate::element::ElementType;
use log::{debug, info, warn};
use std::io;
use thiserror::Error;

/// Recorded metadata of one contiguous dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetDescriptor {
    name: String,
    byte_offset: u64,
    shape: Vec<usize>,
    element_type: ElementType,
}

impl DatasetDescriptor {
    /// Creates a descriptor.
    pub fn new(
        name: impl Into<String>,
        byte_offset: u64,
        shape: Vec<usize>,
        element_type: ElementType,
    ) -> Self {
        Self { name: name.into(), byte_offset, shape, element_type }
    }

    /// Path of the dataset within the container hierarchy.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute offset of the first element within the file.
    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    /// Extent of each dimension.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions; zero for a scalar.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// On-disk element representation.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Product of the shape, or `None` on overflow.
    pub fn element_count(&self) -> Option<u64> {
        self.shape
            .iter()
            .try_fold(1u64, |count, &extent| count.checked_mul(u64::try_from(extent).ok()?))
    }

    /// Size of the data in bytes, or `None` on overflow.
    pub fn byte_len(&self) -> Option<u64> {
        self.element_count()?
            .checked_mul(self.element_type.width() as u64)
    }
}

/// An error enumerating the objects of a container.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnumerationError {
    /// The requested root does not exist in the container.
    #[error("root {0:?} not found in container")]
    RootNotFound(String),
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The container archive could not be read.
    #[error("error reading container archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// An error resolving the metadata of a single dataset.
///
/// Datasets whose metadata cannot be resolved are left out of the index.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ProbeError {
    /// The element type is outside the supported set.
    #[error("unsupported element type {0}")]
    UnsupportedType(String),
    /// The dataset header is malformed.
    #[error("error parsing header: {0}")]
    Header(String),
    /// The source cannot read the metadata without decoding the data.
    #[error("metadata is not available for a non-contiguous dataset")]
    Unavailable,
}

/// Queries a source answers about one dataset while it is being visited.
pub trait DatasetProbe {
    /// Absolute offset of the first element, or `None` if the data is not
    /// stored as one contiguous run of bytes.
    fn contiguous_offset(&self) -> Option<u64>;

    /// Extent of each dimension.
    fn shape(&self) -> Result<Vec<usize>, ProbeError>;

    /// On-disk element representation.
    fn element_type(&self) -> Result<ElementType, ProbeError>;
}

/// What kind of object is being visited.
pub enum ObjectKind<'a> {
    /// A node that contains other objects.
    Group,
    /// An array, with the queries that resolve its metadata.
    Dataset(&'a dyn DatasetProbe),
}

/// One object reported by an [`ObjectSource`].
pub struct VisitedObject<'a> {
    /// Path of the object relative to the enumeration root.
    pub name: &'a str,
    /// Kind of the object.
    pub kind: ObjectKind<'a>,
}

/// A container that can enumerate its objects.
pub trait ObjectSource {
    /// Calls `visitor` once for every object below `root`, in the source's
    /// native order.
    ///
    /// Fails if the enumeration cannot be carried out. The visitor may have
    /// been called for some objects before an error is returned.
    fn visit(
        &mut self,
        root: &str,
        visitor: &mut dyn FnMut(VisitedObject<'_>),
    ) -> Result<(), EnumerationError>;
}

/// Insertion-ordered descriptors of the contiguous datasets in a container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataIndex {
    datasets: Vec<DatasetDescriptor>,
}

impl MetadataIndex {
    /// Builds the index from every object in `source`.
    pub fn build<S: ObjectSource + ?Sized>(source: &mut S) -> Result<Self, EnumerationError> {
        Self::build_from(source, "/")
    }

    /// Builds the index from the objects below `root`.
    ///
    /// Datasets without a contiguous offset, and datasets whose shape or
    /// element type cannot be resolved, are skipped. An enumeration failure
    /// discards everything collected so far.
    pub fn build_from<S: ObjectSource + ?Sized>(
        source: &mut S,
        root: &str,
    ) -> Result<Self, EnumerationError> {
        let mut datasets = Vec::new();
        source.visit(root, &mut |object: VisitedObject<'_>| match object.kind {
            ObjectKind::Group => debug!("{} group", object.name),
            ObjectKind::Dataset(probe) => {
                if let Some(descriptor) = describe(object.name, probe) {
                    datasets.push(descriptor);
                }
            }
        })?;
        Ok(Self { datasets })
    }

    /// Number of recorded datasets.
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Whether no dataset was recorded.
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Iterates over the descriptors in enumeration order.
    pub fn iter(&self) -> std::slice::Iter<'_, DatasetDescriptor> {
        self.datasets.iter()
    }

    /// The descriptors in enumeration order.
    pub fn as_slice(&self) -> &[DatasetDescriptor] {
        &self.datasets
    }

    /// First descriptor with the given name.
    pub fn get(&self, name: &str) -> Option<&DatasetDescriptor> {
        self.datasets.iter().find(|d| d.name == name)
    }

    /// First descriptor matching `predicate`.
    pub fn find<P>(&self, mut predicate: P) -> Option<&DatasetDescriptor>
    where
        P: FnMut(&DatasetDescriptor) -> bool,
    {
        self.datasets.iter().find(|d| predicate(d))
    }
}

impl<'a> IntoIterator for &'a MetadataIndex {
    type Item = &'a DatasetDescriptor;
    type IntoIter = std::slice::Iter<'a, DatasetDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.datasets.iter()
    }
}

fn describe(name: &str, probe: &dyn DatasetProbe) -> Option<DatasetDescriptor> {
    let Some(byte_offset) = probe.contiguous_offset() else {
        match probe.shape() {
            Err(err @ ProbeError::Header(_)) => warn!("{name}: {err}; skipped"),
            _ => info!("{name}: no contiguous offset, probably not a contiguous array; skipped"),
        }
        return None;
    };
    let resolved = probe
        .shape()
        .and_then(|shape| Ok((shape, probe.element_type()?)));
    match resolved {
        Ok((shape, element_type)) => {
            info!("{name} dataset at offset {byte_offset}");
            Some(DatasetDescriptor::new(name, byte_offset, shape, element_type))
        }
        Err(err) => {
            warn!("{name}: {err}; skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Endian, ScalarKind};

    enum FakeObject {
        Group(&'static str),
        Dataset(&'static str, FakeProbe),
    }

    struct FakeProbe {
        offset: Option<u64>,
        shape: Vec<usize>,
        element_type: Option<ElementType>,
    }

    impl DatasetProbe for FakeProbe {
        fn contiguous_offset(&self) -> Option<u64> {
            self.offset
        }

        fn shape(&self) -> Result<Vec<usize>, ProbeError> {
            Ok(self.shape.clone())
        }

        fn element_type(&self) -> Result<ElementType, ProbeError> {
            self.element_type
                .ok_or_else(|| ProbeError::UnsupportedType("<U8".into()))
        }
    }

    struct FakeSource {
        objects: Vec<FakeObject>,
        visits: usize,
    }

    impl ObjectSource for FakeSource {
        fn visit(
            &mut self,
            root: &str,
            visitor: &mut dyn FnMut(VisitedObject<'_>),
        ) -> Result<(), EnumerationError> {
            if root != "/" {
                return Err(EnumerationError::RootNotFound(root.into()));
            }
            self.visits += 1;
            for object in &self.objects {
                let visited = match object {
                    FakeObject::Group(name) => {
                        VisitedObject { name: *name, kind: ObjectKind::Group }
                    }
                    FakeObject::Dataset(name, probe) => {
                        VisitedObject { name: *name, kind: ObjectKind::Dataset(probe) }
                    }
                };
                visitor(visited);
            }
            Ok(())
        }
    }

    fn f64_type() -> ElementType {
        ElementType::new(ScalarKind::F64, Endian::Little)
    }

    fn i32_type() -> ElementType {
        ElementType::new(ScalarKind::I32, Endian::Little)
    }

    fn dataset(
        name: &'static str,
        offset: Option<u64>,
        shape: &[usize],
        ty: ElementType,
    ) -> FakeObject {
        FakeObject::Dataset(
            name,
            FakeProbe { offset, shape: shape.to_vec(), element_type: Some(ty) },
        )
    }

    #[test]
    fn skips_datasets_without_offset() {
        let mut source = FakeSource {
            objects: vec![
                FakeObject::Group("."),
                dataset("a", Some(128), &[3], i32_type()),
                dataset("b", None, &[4, 4], f64_type()),
                dataset("c", Some(512), &[20, 5], f64_type()),
            ],
            visits: 0,
        };
        let index = MetadataIndex::build(&mut source).unwrap();
        assert_eq!(source.visits, 1);
        assert_eq!(index.len(), 2);

        let names: Vec<_> = index.iter().map(DatasetDescriptor::name).collect();
        assert_eq!(names, ["a", "c"]);

        let c = index.get("c").unwrap();
        assert_eq!(c.byte_offset(), 512);
        assert_eq!(c.shape(), &[20, 5]);
        assert_eq!(c.element_type(), f64_type());
        assert!(index.get("b").is_none());
    }

    #[test]
    fn groups_are_not_recorded() {
        let mut source = FakeSource {
            objects: vec![FakeObject::Group("."), FakeObject::Group("grid")],
            visits: 0,
        };
        let index = MetadataIndex::build(&mut source).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn keeps_enumeration_order_and_duplicates() {
        let mut source = FakeSource {
            objects: vec![
                dataset("z", Some(0), &[1], i32_type()),
                dataset("x/y", Some(8), &[], f64_type()),
                dataset("z", Some(64), &[2], i32_type()),
            ],
            visits: 0,
        };
        let index = MetadataIndex::build(&mut source).unwrap();
        let offsets: Vec<_> = index.iter().map(DatasetDescriptor::byte_offset).collect();
        assert_eq!(offsets, [0, 8, 64]);
        assert_eq!(index.get("z").unwrap().byte_offset(), 0);
        assert_eq!(index.find(|d| d.ndim() == 0).unwrap().name(), "x/y");
    }

    #[test]
    fn unresolvable_type_is_skipped() {
        let mut source = FakeSource {
            objects: vec![
                FakeObject::Dataset(
                    "strings",
                    FakeProbe { offset: Some(0), shape: vec![2], element_type: None },
                ),
                dataset("ok", Some(64), &[2], i32_type()),
            ],
            visits: 0,
        };
        let index = MetadataIndex::build(&mut source).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.as_slice()[0].name(), "ok");
    }

    #[test]
    fn enumeration_failure_yields_no_index() {
        let mut source = FakeSource { objects: vec![], visits: 0 };
        let err = MetadataIndex::build_from(&mut source, "/missing").unwrap_err();
        assert!(matches!(err, EnumerationError::RootNotFound(ref root) if root == "/missing"));
    }

    #[test]
    fn derived_lengths() {
        let scalar = DatasetDescriptor::new("s", 0, vec![], f64_type());
        assert_eq!(scalar.element_count(), Some(1));
        assert_eq!(scalar.byte_len(), Some(8));

        let empty = DatasetDescriptor::new("e", 0, vec![4, 0], i32_type());
        assert_eq!(empty.byte_len(), Some(0));

        let huge = DatasetDescriptor::new("h", 0, vec![usize::MAX, usize::MAX], f64_type());
        assert_eq!(huge.element_count(), None);
        assert_eq!(huge.byte_len(), None);
    }
}
