use std::ops::{Index, IndexMut};

pub const FRAMES_IN_FLIGHT: usize = 2;

/// One copy of `T` per frame in flight, indexed by the running frame number.
pub struct PerFrame<T>([T; FRAMES_IN_FLIGHT]);

impl<T> PerFrame<T> {
    pub fn new<E>(mut f: impl FnMut(usize) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self([f(0)?, f(1)?]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T> Index<usize> for PerFrame<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index % FRAMES_IN_FLIGHT]
    }
}

impl<T> IndexMut<usize> for PerFrame<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index % FRAMES_IN_FLIGHT]
    }
}

/// Slot of the frame before `frame`, wrapping at zero.
pub fn previous_frame(frame: usize) -> usize {
    frame + FRAMES_IN_FLIGHT - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_wraps_around() {
        let frames = PerFrame::new(|i| Ok::<_, ()>(i * 10)).unwrap();
        assert_eq!(frames[0], 0);
        assert_eq!(frames[1], 10);
        assert_eq!(frames[2], 0);
        assert_eq!(frames[previous_frame(0)], 10);
        assert_eq!(frames[previous_frame(5)], 0);
    }

    #[test]
    fn creation_stops_at_first_error() {
        let mut calls = 0;
        let result = PerFrame::new(|i| {
            calls += 1;
            if i == 0 {
                Err("allocation failed")
            } else {
                Ok(i)
            }
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
