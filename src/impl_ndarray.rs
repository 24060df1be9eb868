use crate::{
    element::Element,
    view::{ArrayView, ArrayViewMut, ViewError},
};
use ndarray::{ArrayViewD, ArrayViewMutD, IxDyn};

impl<'a, T: Element> ArrayView<'a, T> {
    /// Borrows the dataset as an [`ndarray::ArrayViewD`] without copying.
    ///
    /// Fails under the same conditions as [`as_slice`](Self::as_slice).
    pub fn to_ndarray(&self) -> Result<ArrayViewD<'a, T>, ViewError> {
        let data = self.as_slice()?;
        Ok(ArrayViewD::from_shape(IxDyn(self.shape()), data)?)
    }
}

impl<'a, T: Element> ArrayViewMut<'a, T> {
    /// Converts into an [`ndarray::ArrayViewMutD`] without copying.
    ///
    /// Fails under the same conditions as [`into_slice`](Self::into_slice).
    pub fn into_ndarray(self) -> Result<ArrayViewMutD<'a, T>, ViewError> {
        let shape = IxDyn(self.shape());
        let data = self.into_slice()?;
        Ok(ArrayViewMutD::from_shape(shape, data)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        element::{ElementType, Endian, ScalarKind},
        index::DatasetDescriptor,
        view::{ArrayView, ArrayViewMut, ViewError},
    };
    use ndarray::{array, Axis};

    fn bytes_desc(shape: &[usize]) -> DatasetDescriptor {
        let element_type = ElementType::new(ScalarKind::U8, Endian::Little);
        DatasetDescriptor::new("b", 0, shape.to_vec(), element_type)
    }

    #[test]
    fn shares_the_mapped_bytes() {
        let mut bytes: Vec<u8> = (0..6).collect();
        let desc = bytes_desc(&[2, 3]);
        {
            let view = ArrayView::<u8>::new(&bytes, &desc).unwrap();
            let arr = view.to_ndarray().unwrap();
            assert_eq!(arr, array![[0, 1, 2], [3, 4, 5]].into_dyn());
            assert_eq!(arr.sum_axis(Axis(0)), array![3, 5, 7].into_dyn());
        }
        let view = ArrayViewMut::<u8>::new(&mut bytes, &desc).unwrap();
        let mut arr = view.into_ndarray().unwrap();
        arr[[1, 2]] = 50;
        assert_eq!(bytes[5], 50);
    }

    #[test]
    fn non_native_order_is_rejected() {
        let bytes = [0u8; 8];
        let order = if Endian::NATIVE == Endian::Little { Endian::Big } else { Endian::Little };
        let element_type = ElementType::new(ScalarKind::U16, order);
        let desc = DatasetDescriptor::new("w", 0, vec![4], element_type);
        let view = ArrayView::<u16>::new(&bytes, &desc).unwrap();
        assert!(matches!(view.to_ndarray(), Err(ViewError::NonNativeEndian(_))));
    }
}
