//! Typed zero-copy views into mapped bytes.
//!
//! A view is built from a byte slice (normally a [`MappedFile`]'s) and a
//! [`DatasetDescriptor`]. Construction checks that the dataset lies within
//! the slice and that the requested element type matches the recorded one.
//! Elements are addressed in row-major order and decoded on access with the
//! recorded byte order.
//!
//! [`MappedFile`]: crate::MappedFile

pub use self::dynamic::AnyView;

use crate::{
    element::{Element, ElementType, Endian, ScalarKind},
    index::DatasetDescriptor,
};
use std::{fmt, marker::PhantomData, mem, ops::Range, slice::ChunksExact};
use thiserror::Error;

mod dynamic;

/// An error creating a view or converting it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ViewError {
    /// No dataset with this name is in the index.
    #[error("no dataset named {0:?}")]
    UnknownDataset(String),
    /// The byte length or end of the dataset overflows `u64`.
    #[error("byte range of dataset {0:?} overflows")]
    LengthOverflow(String),
    /// The dataset extends past the end of the mapping.
    #[error(
        "dataset {name:?} needs bytes {offset}..{offset}+{len} but only {mapped} bytes are mapped"
    )]
    OutOfBounds {
        /// Name of the dataset.
        name: String,
        /// Offset of the first element.
        offset: u64,
        /// Length of the element data in bytes.
        len: u64,
        /// Length of the mapping in bytes.
        mapped: usize,
    },
    /// The requested element type differs from the dataset's.
    #[error("dataset {name:?} holds {actual} elements, not {requested}")]
    UnsupportedType {
        /// Name of the dataset.
        name: String,
        /// Element type requested by the caller.
        requested: ScalarKind,
        /// Element type recorded for the dataset.
        actual: ElementType,
    },
    /// The elements are not in native byte order, so they cannot be borrowed
    /// as a typed slice.
    #[error("elements are stored as {0}, not in native byte order")]
    NonNativeEndian(ElementType),
    /// The element data is not aligned for a typed slice.
    #[error("element data is not aligned to {align} bytes")]
    Misaligned {
        /// Required alignment.
        align: usize,
    },
    /// The dataset holds complex elements, which need the `num-complex`
    /// feature.
    #[cfg(not(feature = "num-complex"))]
    #[error("dataset {0:?} holds complex elements; enable the num-complex feature")]
    ComplexUnavailable(String),
    /// The view shape is rejected by `ndarray`.
    #[cfg(feature = "ndarray")]
    #[error("ndarray shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// An error addressing elements of a view.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum IndexError {
    /// The number of indices differs from the number of dimensions.
    #[error("expected {expected} indices, got {actual}")]
    DimensionMismatch {
        /// Number of indices required.
        expected: usize,
        /// Number of indices given.
        actual: usize,
    },
    /// An index is not below the extent of its dimension.
    #[error("index {index} is out of range for axis {axis} with extent {extent}")]
    IndexOutOfRange {
        /// Axis of the offending index.
        axis: usize,
        /// The offending index.
        index: usize,
        /// Extent of the axis.
        extent: usize,
    },
    /// The axis does not exist.
    #[error("axis {axis} does not exist in a view with {ndim} dimensions")]
    AxisOutOfRange {
        /// The requested axis.
        axis: usize,
        /// Number of dimensions of the view.
        ndim: usize,
    },
}

/// Bytes of the dataset within a mapping of `mapped` bytes.
fn dataset_range(mapped: usize, desc: &DatasetDescriptor) -> Result<Range<usize>, ViewError> {
    let overflow = || ViewError::LengthOverflow(desc.name().to_owned());
    let offset = desc.byte_offset();
    let len = desc.byte_len().ok_or_else(overflow)?;
    let end = offset.checked_add(len).ok_or_else(overflow)?;
    if end > mapped as u64 {
        return Err(ViewError::OutOfBounds { name: desc.name().to_owned(), offset, len, mapped });
    }
    Ok(offset as usize..end as usize)
}

fn check_kind<T: Element>(desc: &DatasetDescriptor) -> Result<(), ViewError> {
    let actual = desc.element_type();
    if actual.kind() == T::KIND {
        Ok(())
    } else {
        Err(ViewError::UnsupportedType {
            name: desc.name().to_owned(),
            requested: T::KIND,
            actual,
        })
    }
}

/// Checks that `bytes` can be reinterpreted as a `[T]` and returns its
/// element count.
fn native_len<T: Element>(bytes: &[u8], element_type: ElementType) -> Result<usize, ViewError> {
    if element_type.width() > 1 && element_type.order() != Endian::NATIVE {
        return Err(ViewError::NonNativeEndian(element_type));
    }
    let align = mem::align_of::<T>();
    if bytes.as_ptr().align_offset(align) != 0 {
        return Err(ViewError::Misaligned { align });
    }
    Ok(bytes.len() / mem::size_of::<T>())
}

/// Shape and row-major strides, in elements.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Layout {
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl Layout {
    fn row_major(shape: &[usize]) -> Self {
        let mut strides = vec![1usize; shape.len()];
        for axis in (1..shape.len()).rev() {
            strides[axis - 1] = strides[axis].saturating_mul(shape[axis]);
        }
        Self { shape: shape.to_vec(), strides }
    }

    fn ndim(&self) -> usize {
        self.shape.len()
    }

    fn len(&self) -> usize {
        if self.shape.contains(&0) {
            0
        } else {
            self.shape.iter().product()
        }
    }

    fn check(&self, axis: usize, index: usize) -> Result<(), IndexError> {
        let extent = self.shape[axis];
        if index < extent {
            Ok(())
        } else {
            Err(IndexError::IndexOutOfRange { axis, index, extent })
        }
    }

    fn flat_index(&self, index: &[usize]) -> Result<usize, IndexError> {
        if index.len() != self.ndim() {
            let (expected, actual) = (self.ndim(), index.len());
            return Err(IndexError::DimensionMismatch { expected, actual });
        }
        let mut flat = 0;
        for (axis, (&i, &stride)) in index.iter().zip(&self.strides).enumerate() {
            self.check(axis, i)?;
            flat += i * stride;
        }
        Ok(flat)
    }

    /// Flat index of the first element of the lane along `axis` through the
    /// other indices `at`.
    fn lane_start(&self, axis: usize, at: &[usize]) -> Result<usize, IndexError> {
        let ndim = self.ndim();
        if axis >= ndim {
            return Err(IndexError::AxisOutOfRange { axis, ndim });
        }
        if at.len() + 1 != ndim {
            return Err(IndexError::DimensionMismatch { expected: ndim - 1, actual: at.len() });
        }
        let others = (0..ndim).filter(|&d| d != axis);
        for (other, &i) in others.clone().zip(at) {
            self.check(other, i)?;
        }
        if self.len() == 0 {
            return Ok(0);
        }
        Ok(others.zip(at).map(|(other, &i)| i * self.strides[other]).sum())
    }

    /// Byte range and layout of slab `i` along the first axis.
    fn slab(&self, i: usize, width: usize) -> Result<(Range<usize>, Self), IndexError> {
        if self.ndim() == 0 {
            return Err(IndexError::AxisOutOfRange { axis: 0, ndim: 0 });
        }
        self.check(0, i)?;
        let slab_len = self.strides[0] * width;
        let layout = Self {
            shape: self.shape[1..].to_vec(),
            strides: self.strides[1..].to_vec(),
        };
        Ok((i * slab_len..(i + 1) * slab_len, layout))
    }
}

fn decode_at<T: Element>(data: &[u8], flat: usize, order: Endian) -> T {
    let width = T::KIND.width();
    T::decode(&data[flat * width..(flat + 1) * width], order)
}

/// A read-only typed view of one dataset.
///
/// The view borrows the mapped bytes, so it cannot outlive the
/// [`MappedFile`](crate::MappedFile) it was created from.
#[derive(Clone)]
pub struct ArrayView<'a, T> {
    data: &'a [u8],
    layout: Layout,
    element_type: ElementType,
    _elem: PhantomData<T>,
}

impl<'a, T: Element> ArrayView<'a, T> {
    /// Creates a view of the dataset `desc` describes within `bytes`.
    ///
    /// Fails with [`ViewError::OutOfBounds`] if the dataset does not lie
    /// entirely within `bytes`, and with [`ViewError::UnsupportedType`] if
    /// `T` is not the dataset's element type.
    pub fn new(bytes: &'a [u8], desc: &DatasetDescriptor) -> Result<Self, ViewError> {
        let range = dataset_range(bytes.len(), desc)?;
        check_kind::<T>(desc)?;
        Ok(Self {
            data: &bytes[range],
            layout: Layout::row_major(desc.shape()),
            element_type: desc.element_type(),
            _elem: PhantomData,
        })
    }

    /// Extent of each dimension.
    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Row-major strides of each dimension, in elements.
    pub fn strides(&self) -> &[usize] {
        &self.layout.strides
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    /// Whether the view has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored element representation.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Position of the element at `index` in row-major order.
    pub fn flat_index(&self, index: &[usize]) -> Result<usize, IndexError> {
        self.layout.flat_index(index)
    }

    /// Reads the element at `index`, one index per dimension. A
    /// zero-dimensional view holds one element at `&[]`.
    pub fn get(&self, index: &[usize]) -> Result<T, IndexError> {
        let flat = self.layout.flat_index(index)?;
        Ok(decode_at(self.data, flat, self.element_type.order()))
    }

    /// Iterates over all elements in row-major order.
    pub fn iter(&self) -> Iter<'a, T> {
        Iter {
            chunks: self.data.chunks_exact(self.element_type.width()),
            order: self.element_type.order(),
            _elem: PhantomData,
        }
    }

    /// Copies all elements into a vector in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Iterates along `axis` with the other indices fixed to `at`, given in
    /// axis order.
    pub fn lane(&self, axis: usize, at: &[usize]) -> Result<Lane<'a, T>, IndexError> {
        let start = self.layout.lane_start(axis, at)?;
        Ok(Lane {
            data: self.data,
            order: self.element_type.order(),
            next: start,
            stride: self.layout.strides[axis],
            remaining: self.layout.shape[axis],
            _elem: PhantomData,
        })
    }

    /// The slab at index `i` of the first axis, with one dimension less.
    pub fn subview(&self, i: usize) -> Result<ArrayView<'a, T>, IndexError> {
        let (range, layout) = self.layout.slab(i, self.element_type.width())?;
        Ok(ArrayView {
            data: &self.data[range],
            layout,
            element_type: self.element_type,
            _elem: PhantomData,
        })
    }

    /// Borrows the elements as a slice in row-major order.
    ///
    /// Only possible when the elements are in native byte order and the
    /// data is suitably aligned for `T`.
    pub fn as_slice(&self) -> Result<&'a [T], ViewError> {
        let len = native_len::<T>(self.data, self.element_type)?;
        // SAFETY: the bytes are aligned for `T`, hold `len` elements of
        // `T`'s size, and every `Element` type is valid for any bit pattern
        // in native byte order.
        Ok(unsafe { std::slice::from_raw_parts(self.data.as_ptr().cast::<T>(), len) })
    }
}

impl<T> fmt::Debug for ArrayView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("shape", &self.layout.shape)
            .field("element_type", &self.element_type)
            .finish_non_exhaustive()
    }
}

impl<'a, T: Element> IntoIterator for &ArrayView<'a, T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A writable typed view of one dataset.
///
/// Writes go straight to the mapped bytes and are visible to every view
/// created afterwards over the same region.
pub struct ArrayViewMut<'a, T> {
    data: &'a mut [u8],
    layout: Layout,
    element_type: ElementType,
    _elem: PhantomData<T>,
}

impl<'a, T: Element> ArrayViewMut<'a, T> {
    /// Creates a writable view of the dataset `desc` describes within
    /// `bytes`, with the same checks as [`ArrayView::new`].
    pub fn new(bytes: &'a mut [u8], desc: &DatasetDescriptor) -> Result<Self, ViewError> {
        let range = dataset_range(bytes.len(), desc)?;
        check_kind::<T>(desc)?;
        Ok(Self {
            data: &mut bytes[range],
            layout: Layout::row_major(desc.shape()),
            element_type: desc.element_type(),
            _elem: PhantomData,
        })
    }

    /// Extent of each dimension.
    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Row-major strides of each dimension, in elements.
    pub fn strides(&self) -> &[usize] {
        &self.layout.strides
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    /// Whether the view has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored element representation.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Position of the element at `index` in row-major order.
    pub fn flat_index(&self, index: &[usize]) -> Result<usize, IndexError> {
        self.layout.flat_index(index)
    }

    /// Reads the element at `index`.
    pub fn get(&self, index: &[usize]) -> Result<T, IndexError> {
        let flat = self.layout.flat_index(index)?;
        Ok(decode_at(&*self.data, flat, self.element_type.order()))
    }

    /// Writes `value` at `index`, encoded in the stored byte order.
    pub fn set(&mut self, index: &[usize], value: T) -> Result<(), IndexError> {
        let flat = self.layout.flat_index(index)?;
        let width = self.element_type.width();
        value.encode(&mut self.data[flat * width..(flat + 1) * width], self.element_type.order());
        Ok(())
    }

    /// Writes `value` to every element.
    pub fn fill(&mut self, value: T) {
        let order = self.element_type.order();
        for chunk in self.data.chunks_exact_mut(self.element_type.width()) {
            value.encode(chunk, order);
        }
    }

    /// Reborrows as a read-only view.
    pub fn view(&self) -> ArrayView<'_, T> {
        ArrayView {
            data: &*self.data,
            layout: self.layout.clone(),
            element_type: self.element_type,
            _elem: PhantomData,
        }
    }

    /// Converts into a read-only view with the full lifetime.
    pub fn into_view(self) -> ArrayView<'a, T> {
        ArrayView {
            data: self.data,
            layout: self.layout,
            element_type: self.element_type,
            _elem: PhantomData,
        }
    }

    /// The writable slab at index `i` of the first axis.
    pub fn subview_mut(&mut self, i: usize) -> Result<ArrayViewMut<'_, T>, IndexError> {
        let (range, layout) = self.layout.slab(i, self.element_type.width())?;
        Ok(ArrayViewMut {
            data: &mut self.data[range],
            layout,
            element_type: self.element_type,
            _elem: PhantomData,
        })
    }

    /// Borrows the elements as a mutable slice, under the same conditions
    /// as [`ArrayView::as_slice`].
    pub fn as_mut_slice(&mut self) -> Result<&mut [T], ViewError> {
        let len = native_len::<T>(&*self.data, self.element_type)?;
        // SAFETY: as in `ArrayView::as_slice`; the slice is uniquely
        // borrowed through `self`.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.data.as_mut_ptr().cast::<T>(), len) })
    }

    /// Converts into a mutable slice with the full lifetime.
    pub fn into_slice(self) -> Result<&'a mut [T], ViewError> {
        let len = native_len::<T>(&*self.data, self.element_type)?;
        // SAFETY: as in `as_mut_slice`; `self` is consumed.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.data.as_mut_ptr().cast::<T>(), len) })
    }
}

impl<T> fmt::Debug for ArrayViewMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayViewMut")
            .field("shape", &self.layout.shape)
            .field("element_type", &self.element_type)
            .finish_non_exhaustive()
    }
}

/// Row-major iterator over the elements of an [`ArrayView`].
pub struct Iter<'a, T> {
    chunks: ChunksExact<'a, u8>,
    order: Endian,
    _elem: PhantomData<T>,
}

impl<T: Element> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.chunks.next().map(|bytes| T::decode(bytes, self.order))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T: Element> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<T> {
        self.chunks.next_back().map(|bytes| T::decode(bytes, self.order))
    }
}

impl<T: Element> ExactSizeIterator for Iter<'_, T> {}

/// Iterator along one axis of an [`ArrayView`].
pub struct Lane<'a, T> {
    data: &'a [u8],
    order: Endian,
    next: usize,
    stride: usize,
    remaining: usize,
    _elem: PhantomData<T>,
}

impl<T: Element> Iterator for Lane<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.remaining == 0 {
            return None;
        }
        let value = decode_at(self.data, self.next, self.order);
        self.remaining -= 1;
        self.next = self.next.saturating_add(self.stride);
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Element> ExactSizeIterator for Lane<'_, T> {}
