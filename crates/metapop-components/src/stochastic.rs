//! Integer event counts from real-valued expectations.

use rand::Rng;

/// Round `expected` to a neighbouring integer so that the mean equals
/// `expected`: the fractional part is the probability of rounding up.
///
/// Non-finite or non-positive expectations yield 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn stochastic_round(expected: f64, rng: &mut impl Rng) -> u64 {
    if !expected.is_finite() || expected <= 0.0 {
        return 0;
    }
    let whole = expected.floor();
    let up = rng.random::<f64>() < expected - whole;
    (whole as u64).saturating_add(u64::from(up))
}

/// Expected events for `population` people at per-person probability `rate`.
#[allow(clippy::cast_precision_loss)]
pub fn expected_events(population: u64, rate: f64) -> f64 {
    population as f64 * rate
}
