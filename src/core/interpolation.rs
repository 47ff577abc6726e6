//! Linear interpolation over irregularly sampled horizon curves.
//!
//! Value curves are only sampled at a sparse set of horizons, so any horizon
//! between two sample points is reconstructed by linear interpolation. Two
//! flavours are provided: interpolation in raw horizon space, and in
//! `log(1 + h)` space (which better matches geometrically spaced samples).
//!
//! Conventions match the value-at-horizon definition:
//! - horizon <= 0 has value 0 by definition,
//! - targets outside the sampled range clamp to the boundary samples,
//! - a zero-width bracket (duplicated horizon sample) returns the left value
//!   rather than dividing by zero.

/// Find the bracketing sample pair for `target` in a sorted horizon list.
///
/// Returns `(left, right, frac)` where `frac` is the interpolation weight of
/// the right sample. Out-of-range targets clamp (`frac` 0 or 1 on the same
/// index pair).
#[inline]
fn bracket(horizons: &[usize], target: f32) -> (usize, usize, f32) {
    debug_assert!(!horizons.is_empty());

    if target <= horizons[0] as f32 {
        return (0, 0, 0.0);
    }
    let last = horizons.len() - 1;
    if target >= horizons[last] as f32 {
        return (last, last, 0.0);
    }

    // first index whose horizon exceeds target (bisect-right)
    let right = horizons.partition_point(|&h| (h as f32) <= target);
    let left = right - 1;

    let h0 = horizons[left] as f32;
    let h1 = horizons[right] as f32;
    let width = h1 - h0;
    if width <= 0.0 {
        // duplicated sample point, take the left value
        return (left, left, 0.0);
    }
    (left, right, (target - h0) / width)
}

/// Interpolate a single value curve `values[K]` sampled at `horizons[K]`.
///
/// Horizons must be sorted ascending. `target_h <= 0` returns 0 exactly.
pub fn interpolate(horizons: &[usize], values: &[f32], target_h: f32) -> f32 {
    assert_eq!(
        horizons.len(),
        values.len(),
        "Horizon and value curves must have equal length"
    );

    if target_h <= 0.0 {
        return 0.0;
    }

    let (left, right, frac) = bracket(horizons, target_h);
    values[left] + (values[right] - values[left]) * frac
}

/// Interpolate in `log(1 + h)` space.
///
/// Sample points map exactly (a target equal to a sampled horizon returns the
/// sample unchanged), but intermediate points follow the curve a geometric
/// horizon spacing implies.
pub fn interpolate_log(horizons: &[usize], values: &[f32], target_h: f32) -> f32 {
    assert_eq!(
        horizons.len(),
        values.len(),
        "Horizon and value curves must have equal length"
    );

    if target_h <= 0.0 {
        return 0.0;
    }

    let log_target = (1.0 + target_h).ln();
    let last = horizons.len() - 1;
    if log_target <= (1.0 + horizons[0] as f32).ln() {
        return values[0];
    }
    if log_target >= (1.0 + horizons[last] as f32).ln() {
        return values[last];
    }

    let right = horizons.partition_point(|&h| (1.0 + h as f32).ln() <= log_target);
    let left = right - 1;
    let l0 = (1.0 + horizons[left] as f32).ln();
    let l1 = (1.0 + horizons[right] as f32).ln();
    let width = l1 - l0;
    if width <= 0.0 {
        return values[left];
    }
    let frac = (log_target - l0) / width;
    values[left] + (values[right] - values[left]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_exact_sample_points() {
        let horizons = vec![0, 10, 100];
        let values = vec![0.0, 5.0, 20.0];

        for (i, &h) in horizons.iter().enumerate() {
            let v = interpolate(&horizons, &values, h as f32);
            assert!(
                (v - values[i]).abs() < 1e-6,
                "Exact sample at h={} should return {}, got {}",
                h, values[i], v
            );
        }
    }

    #[test]
    fn test_interpolate_zero_horizon() {
        let horizons = vec![0, 10, 100];
        let values = vec![3.0, 5.0, 20.0]; // even a nonzero sample at h=0 is overridden
        assert_eq!(interpolate(&horizons, &values, 0.0), 0.0);
        assert_eq!(interpolate(&horizons, &values, -5.0), 0.0);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let horizons = vec![0, 10];
        let values = vec![0.0, 10.0];
        let v = interpolate(&horizons, &values, 5.0);
        assert!((v - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_interpolate_clamps_above_range() {
        let horizons = vec![1, 10];
        let values = vec![1.0, 4.0];
        let v = interpolate(&horizons, &values, 50.0);
        assert!((v - 4.0).abs() < 1e-6, "Out-of-range target should clamp");
    }

    #[test]
    fn test_interpolate_duplicate_horizon_no_nan() {
        // force_first_and_last can produce duplicate sample points
        let horizons = vec![0, 0, 10];
        let values = vec![0.0, 2.0, 8.0];
        let v = interpolate(&horizons, &values, 0.5);
        assert!(v.is_finite(), "Zero-width bracket must not produce NaN");
    }

    #[test]
    fn test_interpolate_log_exact_sample_points() {
        let horizons = vec![1, 9, 99];
        let values = vec![1.0, 3.0, 7.0];
        for (i, &h) in horizons.iter().enumerate() {
            let v = interpolate_log(&horizons, &values, h as f32);
            assert!((v - values[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_interpolate_log_geometric_midpoint() {
        // log(1+h) space: h=2 is exactly halfway between h=0 and h=8
        // since log(3) = (log(1) + log(9)) / 2
        let horizons = vec![0, 8];
        let values = vec![0.0, 10.0];
        let v = interpolate_log(&horizons, &values, 2.0);
        assert!((v - 5.0).abs() < 1e-5, "Expected 5.0, got {}", v);
    }
}
