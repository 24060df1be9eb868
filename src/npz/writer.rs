use super::header::{FormatHeaderError, Header};
use crate::element::{Element, ElementType, Endian};
use py_literal::Value as PyValue;
use std::io::{self, Seek, Write};
use thiserror::Error;
use zip::{result::ZipError, write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// An error writing a container.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteNpzError {
    /// An error caused by the archive writer.
    #[error("error writing container archive: {0}")]
    Zip(#[from] ZipError),
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error formatting a member header.
    #[error("error formatting header: {0}")]
    FormatHeader(#[from] FormatHeaderError),
    /// The element count implied by the shape differs from the data length.
    #[error("shape holds {expected} elements but {actual} were given")]
    ShapeMismatch {
        /// Elements implied by the shape.
        expected: usize,
        /// Elements provided.
        actual: usize,
    },
    /// The element count implied by the shape overflows `usize`.
    #[error("element count overflows usize")]
    LengthOverflow,
}

/// Writes a `.npz` container.
///
/// Arrays are written in C order with little-endian elements. Arrays added
/// with [`add_array`](Self::add_array) are stored uncompressed, so their
/// elements can be mapped directly once the container is finished.
///
/// # Example
///
/// ```no_run
/// use mmview::NpzWriter;
/// use std::fs::File;
///
/// let mut npz = NpzWriter::new(File::create("grid.npz")?);
/// npz.add_array("a", &[3], &[1i32, 2, 3])?;
/// npz.add_group("fields")?;
/// npz.add_array("fields/c", &[2, 2], &[0.0f64, 1.0, 2.0, 3.0])?;
/// npz.finish()?;
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
pub struct NpzWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
}

impl<W: Write + Seek> NpzWriter<W> {
    /// Creates a writer that writes to `writer`.
    pub fn new(writer: W) -> Self {
        Self { zip: ZipWriter::new(writer) }
    }

    /// Adds an explicit group. Groups are otherwise implied by the `/`
    /// separators of array names.
    pub fn add_group(&mut self, name: &str) -> Result<(), WriteNpzError> {
        self.zip.add_directory(name, stored())?;
        Ok(())
    }

    /// Adds an uncompressed array named `name` with the given shape.
    ///
    /// The member is named `name` with a `.npy` suffix.
    pub fn add_array<T: Element>(
        &mut self,
        name: &str,
        shape: &[usize],
        data: &[T],
    ) -> Result<(), WriteNpzError> {
        self.write_member(name, shape, data, stored())
    }

    /// Adds a deflate-compressed array. Such arrays are not contiguous in
    /// the container file and cannot be mapped.
    #[cfg(feature = "compressed-npz")]
    pub fn add_compressed_array<T: Element>(
        &mut self,
        name: &str,
        shape: &[usize],
        data: &[T],
    ) -> Result<(), WriteNpzError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.write_member(name, shape, data, options)
    }

    fn write_member<T: Element>(
        &mut self,
        name: &str,
        shape: &[usize],
        data: &[T],
        options: SimpleFileOptions,
    ) -> Result<(), WriteNpzError> {
        let expected = shape
            .iter()
            .try_fold(1usize, |count, &extent| count.checked_mul(extent))
            .ok_or(WriteNpzError::LengthOverflow)?;
        if expected != data.len() {
            return Err(WriteNpzError::ShapeMismatch { expected, actual: data.len() });
        }

        let element_type = ElementType::new(T::KIND, Endian::Little);
        let header = Header {
            type_descriptor: PyValue::String(element_type.descriptor()),
            fortran_order: false,
            shape: shape.to_vec(),
        };
        let width = element_type.width();
        let mut bytes = vec![0; data.len() * width];
        for (chunk, &elem) in bytes.chunks_exact_mut(width).zip(data) {
            elem.encode(chunk, Endian::Little);
        }

        self.zip.start_file(format!("{name}.npy"), options)?;
        self.zip.write_all(&header.to_bytes()?)?;
        self.zip.write_all(&bytes)?;
        Ok(())
    }

    /// Writes the central directory and returns the underlying writer.
    pub fn finish(self) -> Result<W, WriteNpzError> {
        Ok(self.zip.finish()?)
    }
}

fn stored() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
}
