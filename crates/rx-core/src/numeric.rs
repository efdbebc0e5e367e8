use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

pub fn ensure_finite(v: Real, what: &str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite {
            what: what.to_string(),
            value: v,
        })
    }
}

/// Finite and `>= 0`.
pub fn ensure_non_negative(v: Real, what: &str) -> Result<Real, CoreError> {
    let v = ensure_finite(v, what)?;
    if v < 0.0 {
        return Err(CoreError::Negative {
            what: what.to_string(),
            value: v,
        });
    }
    Ok(v)
}

/// Finite and `> 0`.
pub fn ensure_positive(v: Real, what: &str) -> Result<Real, CoreError> {
    let v = ensure_finite(v, what)?;
    if v <= 0.0 {
        return Err(CoreError::NotPositive {
            what: what.to_string(),
            value: v,
        });
    }
    Ok(v)
}

/// `n` evenly spaced points from `start` to `end`, both ends included.
///
/// The last point is exactly `end` so callers can compare against it.
pub fn linspace(start: Real, end: Real, n: usize) -> Vec<Real> {
    match n {
        0 => Vec::new(),
        1 => vec![end],
        _ => {
            let step = (end - start) / (n - 1) as Real;
            let mut out: Vec<Real> = (0..n).map(|i| start + step * i as Real).collect();
            out[n - 1] = end;
            out
        }
    }
}

/// Linear interpolation between `a` and `b` at fraction `theta`.
pub fn lerp(a: Real, b: Real, theta: Real) -> Real {
    a + theta * (b - a)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn linspace_is_monotonic(end in 1e-3_f64..1e4, n in 2_usize..2000) {
            let pts = linspace(0.0, end, n);
            prop_assert_eq!(pts.len(), n);
            for w in pts.windows(2) {
                prop_assert!(w[1] > w[0]);
            }
            prop_assert_eq!(pts[n - 1], end);
        }

        #[test]
        fn lerp_hits_endpoints(a in -1e3_f64..1e3, b in -1e3_f64..1e3) {
            prop_assert_eq!(lerp(a, b, 0.0), a);
            prop_assert!((lerp(a, b, 1.0) - b).abs() <= 1e-9 * b.abs().max(1.0));
            let mid = lerp(a, b, 0.5);
            prop_assert!(mid >= a.min(b) && mid <= a.max(b));
        }
    }
}
