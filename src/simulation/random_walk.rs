//! Bounded random walk used by every simulated numeric series.

use rand::Rng;

use crate::config::WalkBounds;

/// Perturb `current` by a uniform step in `[-volatility/2, volatility/2)` and
/// clamp the result into `[min, max]`.
///
/// An out-of-range `current` is still pulled back into range, so a bad value
/// never propagates to the next tick.
pub fn walk<R: Rng + ?Sized>(rng: &mut R, current: f64, min: f64, max: f64, volatility: f64) -> f64 {
    let change = (rng.gen::<f64>() - 0.5) * volatility;
    clamp(current + change, min, max)
}

/// Relative variant: scales `current` by `1 + u` with `u` uniform in
/// `[-volatility, volatility)`, then clamps.
pub fn walk_relative<R: Rng + ?Sized>(
    rng: &mut R,
    current: f64,
    min: f64,
    max: f64,
    volatility: f64,
) -> f64 {
    let change = (rng.gen::<f64>() - 0.5) * 2.0 * volatility;
    clamp(current * (1.0 + change), min, max)
}

/// [`walk`] with bounds taken from configuration
pub fn walk_within<R: Rng + ?Sized>(rng: &mut R, current: f64, bounds: &WalkBounds) -> f64 {
    walk(rng, current, bounds.min, bounds.max, bounds.volatility)
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}
