//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value between `min` and `max`.
///
/// NaN values are returned unchanged.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Cumulative arc length along a polyline given as separate x and y coordinates.
///
/// The first element is always zero. If the coordinate slices differ in length the shorter one
/// is used.
pub fn cumulative_length<T>(xs: &[T], ys: &[T]) -> Vec<T>
where
    T: Float + std::ops::AddAssign
{
    let n = xs.len().min(ys.len());
    let mut s = Vec::with_capacity(n);
    let mut acc = T::zero();

    for i in 0..n {
        if i > 0 {
            acc += (xs[i] - xs[i - 1]).hypot(ys[i] - ys[i - 1]);
        }
        s.push(acc);
    }

    s
}
