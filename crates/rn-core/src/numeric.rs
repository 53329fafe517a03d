use crate::{CoreError, CoreResult};

/// Floating point type used for goals, measurements and outputs.
pub type Real = f64;

/// Pass `v` through if it is finite.
pub fn ensure_finite(v: Real, what: &'static str) -> CoreResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Clamp `value` into `[min, max]`.
///
/// Unlike `f64::clamp` this never panics: an inverted range resolves to `min`,
/// and NaN resolves to `min` so a corrupt law output lands on the safe value.
pub fn clamp_output(value: Real, min: Real, max: Real) -> Real {
    if value.is_nan() {
        return min;
    }
    let mut out = value;
    if out > max {
        out = max;
    }
    if out < min {
        out = min;
    }
    out
}
