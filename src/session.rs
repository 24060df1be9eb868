use crate::{
    element::Element,
    index::{DatasetDescriptor, EnumerationError, MetadataIndex},
    mapping::{MapFileError, MappedFile},
    npz::{NpzContainer, OpenContainerError},
    view::{AnyView, ArrayView, ArrayViewMut, ViewError},
};
use std::path::Path;
use thiserror::Error;

/// An error opening a [`Session`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The container could not be opened.
    #[error(transparent)]
    Container(#[from] OpenContainerError),
    /// The objects of the container could not be enumerated.
    #[error("cannot enumerate container: {0}")]
    Enumeration(#[from] EnumerationError),
    /// The container file could not be mapped.
    #[error(transparent)]
    Map(#[from] MapFileError),
}

/// An indexed and mapped container.
///
/// Opening a session reads the metadata of every dataset once, then maps
/// the file for reading and writing. Datasets are selected by name.
///
/// ```no_run
/// use mmview::Session;
///
/// let mut session = Session::open("grid.npz")?;
/// let sum: f64 = session.dataset::<f64>("c")?.iter().sum();
/// session.dataset_mut::<f64>("c")?.set(&[2, 3], sum)?;
/// session.flush()?;
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
pub struct Session {
    index: MetadataIndex,
    mapping: MappedFile,
}

impl Session {
    /// Opens the container at `path`, indexes every contiguous dataset
    /// below the root group and maps the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        Self::open_from(path, "/")
    }

    /// Like [`open`](Self::open), indexing only the datasets below `root`.
    pub fn open_from<P: AsRef<Path>>(path: P, root: &str) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let index = {
            let mut container = NpzContainer::open(path)?;
            MetadataIndex::build_from(&mut container, root)?
        };
        let mapping = MappedFile::open(path)?;
        Ok(Self { index, mapping })
    }

    /// The datasets found when the session was opened.
    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    /// The mapped container file.
    pub fn mapping(&self) -> &MappedFile {
        &self.mapping
    }

    /// Writes modified pages back to the file.
    pub fn flush(&self) -> std::io::Result<()> {
        self.mapping.flush()
    }

    fn descriptor(&self, name: &str) -> Result<&DatasetDescriptor, ViewError> {
        self.index.get(name).ok_or_else(|| ViewError::UnknownDataset(name.to_owned()))
    }

    /// A typed view of the first dataset named `name`.
    pub fn dataset<T: Element>(&self, name: &str) -> Result<ArrayView<'_, T>, ViewError> {
        self.mapping.view(self.descriptor(name)?)
    }

    /// A writable typed view of the first dataset named `name`.
    pub fn dataset_mut<T: Element>(
        &mut self,
        name: &str,
    ) -> Result<ArrayViewMut<'_, T>, ViewError> {
        let desc = self
            .index
            .get(name)
            .ok_or_else(|| ViewError::UnknownDataset(name.to_owned()))?;
        self.mapping.view_mut(desc)
    }

    /// A view of the first dataset named `name`, typed by its recorded
    /// element type.
    pub fn any_dataset(&self, name: &str) -> Result<AnyView<'_>, ViewError> {
        self.mapping.any_view(self.descriptor(name)?)
    }
}
