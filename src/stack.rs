use crate::error::Error;
use crate::reader::{Frame, Reader};
use ndarray::{Array2, Array3, s};
use num::{FromPrimitive, Zero};

/// Stack frames 0..size_t along the first axis into an array of shape (t, y, x).
pub fn stack_frames<T, F>(
    size_t: usize,
    size_y: usize,
    size_x: usize,
    mut frame: F,
) -> Result<Array3<T>, Error>
where
    T: Clone + Zero,
    F: FnMut(usize) -> Result<Array2<T>, Error>,
{
    let mut stack = Array3::<T>::zeros((size_t, size_y, size_x));
    for t in 0..size_t {
        let plane = frame(t)?;
        if plane.dim() != (size_y, size_x) {
            return Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into());
        }
        stack.slice_mut(s![t, .., ..]).assign(&plane);
    }
    Ok(stack)
}

/// Read all Raman shifts (the t axis) of one channel at slice z of the selected series.
pub fn read_stack<T>(reader: &Reader, channel: usize, z: usize) -> Result<Array3<T>, Error>
where
    T: Clone + FromPrimitive + Zero + 'static,
{
    if channel >= reader.size_c {
        return Err(Error::ChannelOutOfBounds(channel, reader.size_c));
    }
    stack_frames(reader.size_t, reader.size_y, reader.size_x, |t| {
        <Frame as TryInto<Array2<T>>>::try_into(reader.get_frame(channel, z, t)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_land_on_their_t() -> Result<(), Error> {
        let stack = stack_frames(3, 2, 4, |t| {
            Ok(Array2::from_elem((2, 4), t as u16 * 10))
        })?;
        assert_eq!(stack.dim(), (3, 2, 4));
        assert_eq!(stack[[0, 1, 3]], 0);
        assert_eq!(stack[[1, 0, 0]], 10);
        assert_eq!(stack[[2, 1, 2]], 20);
        Ok(())
    }

    #[test]
    fn empty_stack() -> Result<(), Error> {
        let stack = stack_frames::<u8, _>(0, 2, 2, |_| unreachable!())?;
        assert_eq!(stack.dim(), (0, 2, 2));
        Ok(())
    }

    #[test]
    fn mismatched_plane() {
        let res = stack_frames(2, 2, 2, |_| Ok(Array2::<u8>::zeros((2, 3))));
        assert!(matches!(res, Err(Error::Shape(_))));
    }

    #[test]
    fn frame_error_propagates() {
        let res = stack_frames(2, 1, 1, |t| {
            if t == 1 {
                Err(Error::ChannelOutOfBounds(1, 1))
            } else {
                Ok(Array2::<u8>::zeros((1, 1)))
            }
        });
        assert!(matches!(res, Err(Error::ChannelOutOfBounds(1, 1))));
    }
}
