use super::{ArrayView, IndexError, ViewError};
use crate::{
    element::{Element, ElementType, ScalarKind, Value},
    index::DatasetDescriptor,
};
#[cfg(feature = "num-complex")]
use num_complex::Complex;

/// A view whose element type is chosen at runtime from the descriptor.
///
/// Elements are read as [`Value`]s. Each variant holds the typed view for
/// one [`ScalarKind`].
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum AnyView<'a> {
    I8(ArrayView<'a, i8>),
    I16(ArrayView<'a, i16>),
    I32(ArrayView<'a, i32>),
    I64(ArrayView<'a, i64>),
    U8(ArrayView<'a, u8>),
    U16(ArrayView<'a, u16>),
    U32(ArrayView<'a, u32>),
    U64(ArrayView<'a, u64>),
    F32(ArrayView<'a, f32>),
    F64(ArrayView<'a, f64>),
    #[cfg(feature = "num-complex")]
    C64(ArrayView<'a, Complex<f32>>),
    #[cfg(feature = "num-complex")]
    C128(ArrayView<'a, Complex<f64>>),
}

macro_rules! dispatch {
    ($self:expr, $view:ident => $body:expr) => {
        match $self {
            AnyView::I8($view) => $body,
            AnyView::I16($view) => $body,
            AnyView::I32($view) => $body,
            AnyView::I64($view) => $body,
            AnyView::U8($view) => $body,
            AnyView::U16($view) => $body,
            AnyView::U32($view) => $body,
            AnyView::U64($view) => $body,
            AnyView::F32($view) => $body,
            AnyView::F64($view) => $body,
            #[cfg(feature = "num-complex")]
            AnyView::C64($view) => $body,
            #[cfg(feature = "num-complex")]
            AnyView::C128($view) => $body,
        }
    };
}

impl<'a> AnyView<'a> {
    /// Creates a view of the dataset `desc` describes within `bytes`, typed
    /// by the recorded element type.
    pub fn new(bytes: &'a [u8], desc: &DatasetDescriptor) -> Result<Self, ViewError> {
        Ok(match desc.element_type().kind() {
            ScalarKind::I8 => Self::I8(ArrayView::new(bytes, desc)?),
            ScalarKind::I16 => Self::I16(ArrayView::new(bytes, desc)?),
            ScalarKind::I32 => Self::I32(ArrayView::new(bytes, desc)?),
            ScalarKind::I64 => Self::I64(ArrayView::new(bytes, desc)?),
            ScalarKind::U8 => Self::U8(ArrayView::new(bytes, desc)?),
            ScalarKind::U16 => Self::U16(ArrayView::new(bytes, desc)?),
            ScalarKind::U32 => Self::U32(ArrayView::new(bytes, desc)?),
            ScalarKind::U64 => Self::U64(ArrayView::new(bytes, desc)?),
            ScalarKind::F32 => Self::F32(ArrayView::new(bytes, desc)?),
            ScalarKind::F64 => Self::F64(ArrayView::new(bytes, desc)?),
            #[cfg(feature = "num-complex")]
            ScalarKind::C64 => Self::C64(ArrayView::new(bytes, desc)?),
            #[cfg(feature = "num-complex")]
            ScalarKind::C128 => Self::C128(ArrayView::new(bytes, desc)?),
            #[cfg(not(feature = "num-complex"))]
            ScalarKind::C64 | ScalarKind::C128 => {
                return Err(ViewError::ComplexUnavailable(desc.name().to_owned()))
            }
        })
    }

    /// Extent of each dimension.
    pub fn shape(&self) -> &[usize] {
        dispatch!(self, v => v.shape())
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        dispatch!(self, v => v.ndim())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    /// Whether the view has no elements.
    pub fn is_empty(&self) -> bool {
        dispatch!(self, v => v.is_empty())
    }

    /// The stored element representation.
    pub fn element_type(&self) -> ElementType {
        dispatch!(self, v => v.element_type())
    }

    /// Reads the element at `index`.
    pub fn get(&self, index: &[usize]) -> Result<Value, IndexError> {
        dispatch!(self, v => v.get(index).map(|e| e.into_value()))
    }

    /// Iterates over all elements in row-major order.
    pub fn values(&self) -> Box<dyn Iterator<Item = Value> + 'a> {
        type Values<'a> = Box<dyn Iterator<Item = Value> + 'a>;
        dispatch!(self, v => Box::new(v.iter().map(|e| e.into_value())) as Values<'a>)
    }

    /// The slab at index `i` of the first axis.
    pub fn subview(&self, i: usize) -> Result<AnyView<'a>, IndexError> {
        Ok(match self {
            Self::I8(v) => Self::I8(v.subview(i)?),
            Self::I16(v) => Self::I16(v.subview(i)?),
            Self::I32(v) => Self::I32(v.subview(i)?),
            Self::I64(v) => Self::I64(v.subview(i)?),
            Self::U8(v) => Self::U8(v.subview(i)?),
            Self::U16(v) => Self::U16(v.subview(i)?),
            Self::U32(v) => Self::U32(v.subview(i)?),
            Self::U64(v) => Self::U64(v.subview(i)?),
            Self::F32(v) => Self::F32(v.subview(i)?),
            Self::F64(v) => Self::F64(v.subview(i)?),
            #[cfg(feature = "num-complex")]
            Self::C64(v) => Self::C64(v.subview(i)?),
            #[cfg(feature = "num-complex")]
            Self::C128(v) => Self::C128(v.subview(i)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Endian;

    #[test]
    fn dispatches_on_recorded_type() {
        let bytes: Vec<u8> = [-1i16, 2, -3, 4].iter().flat_map(|n| n.to_be_bytes()).collect();
        let desc = DatasetDescriptor::new(
            "s",
            0,
            vec![2, 2],
            ElementType::new(ScalarKind::I16, Endian::Big),
        );
        let view = AnyView::new(&bytes, &desc).unwrap();
        assert!(matches!(view, AnyView::I16(_)));
        assert_eq!(view.shape(), &[2, 2]);
        assert_eq!(view.get(&[1, 0]).unwrap(), Value::Int(-3));
        let row: Vec<_> = view.subview(1).unwrap().values().collect();
        assert_eq!(row, [Value::Int(-3), Value::Int(4)]);
        assert_eq!(
            view.get(&[2, 0]).unwrap_err(),
            IndexError::IndexOutOfRange { axis: 0, index: 2, extent: 2 }
        );
    }

    #[test]
    fn bounds_still_apply() {
        let bytes = [0u8; 4];
        let desc = DatasetDescriptor::new(
            "f",
            0,
            vec![1],
            ElementType::new(ScalarKind::F64, Endian::Little),
        );
        assert!(matches!(AnyView::new(&bytes, &desc), Err(ViewError::OutOfBounds { .. })));
    }

    #[cfg(feature = "num-complex")]
    #[test]
    fn complex_values() {
        let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|n| n.to_le_bytes()).collect();
        let desc = DatasetDescriptor::new(
            "z",
            0,
            vec![],
            ElementType::new(ScalarKind::C64, Endian::Little),
        );
        let view = AnyView::new(&bytes, &desc).unwrap();
        assert_eq!(view.get(&[]).unwrap(), Value::Complex(Complex::new(1.5, -2.0)));
    }
}
