use ndarray::{Array1, ArrayView1, ArrayViewMut1};

/// Adapter trait for reading a single 1D lane of input.
pub trait Read1D<T> {
    /// Borrow the underlying input as a 1D view.
    fn read_view(&self) -> ArrayView1<'_, T>;
}

/// Adapter trait for writing a single 1D lane of output.
pub trait Write1D<T> {
    /// Borrow the underlying output as a mutable 1D view.
    fn write_view_mut(&mut self) -> ArrayViewMut1<'_, T>;
}

impl<T> Read1D<T> for [T] {
    fn read_view(&self) -> ArrayView1<'_, T> {
        ArrayView1::from(self)
    }
}

impl<T> Write1D<T> for [T] {
    fn write_view_mut(&mut self) -> ArrayViewMut1<'_, T> {
        ArrayViewMut1::from(self)
    }
}

impl<T, const N: usize> Read1D<T> for [T; N] {
    fn read_view(&self) -> ArrayView1<'_, T> {
        ArrayView1::from(&self[..])
    }
}

impl<T, const N: usize> Write1D<T> for [T; N] {
    fn write_view_mut(&mut self) -> ArrayViewMut1<'_, T> {
        ArrayViewMut1::from(&mut self[..])
    }
}

impl<T> Read1D<T> for Vec<T> {
    fn read_view(&self) -> ArrayView1<'_, T> {
        ArrayView1::from(self.as_slice())
    }
}

impl<T> Write1D<T> for Vec<T> {
    fn write_view_mut(&mut self) -> ArrayViewMut1<'_, T> {
        ArrayViewMut1::from(self.as_mut_slice())
    }
}

impl<T> Read1D<T> for Array1<T> {
    fn read_view(&self) -> ArrayView1<'_, T> {
        self.view()
    }
}

impl<T> Write1D<T> for Array1<T> {
    fn write_view_mut(&mut self) -> ArrayViewMut1<'_, T> {
        self.view_mut()
    }
}

impl<T> Read1D<T> for ArrayView1<'_, T> {
    fn read_view(&self) -> ArrayView1<'_, T> {
        self.view()
    }
}

impl<T> Write1D<T> for ArrayViewMut1<'_, T> {
    fn write_view_mut(&mut self) -> ArrayViewMut1<'_, T> {
        self.view_mut()
    }
}
