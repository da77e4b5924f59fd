//! Tick grid arithmetic.
//!
//! Prices and amounts accepted by the engine live on a fixed tick grid.
//! Decimal values are floored to the grid for normalization, and the book
//! orders price levels by the integer tick count, never by the decimal
//! price itself. The decimal value is kept only for reporting and for the
//! settlement product `size * price`.

/// Bias added before flooring to counter downward representation error
/// (e.g. `4_999_999.999999...` for an input of `50_000.00 / 0.01`).
const FLOOR_BIAS: f64 = 1e-9;

/// Maximum distance between a value and its floored form for the value to
/// count as tick-aligned.
const ALIGNMENT_EPSILON: f64 = 1e-10;

/// Returns the largest multiple of `tick` not exceeding `value`.
///
/// A `tick` of zero leaves the value untouched.
pub fn floor_to_tick(value: f64, tick: f64) -> f64 {
    if tick == 0.0 {
        return value;
    }
    ((value / tick) + FLOOR_BIAS).floor() * tick
}

/// True iff `value` already sits on the grid defined by `tick`.
pub fn is_valid_tick(value: f64, tick: f64) -> bool {
    if tick == 0.0 {
        return true;
    }
    (value - floor_to_tick(value, tick)).abs() < ALIGNMENT_EPSILON
}

/// Converts a grid-aligned decimal price to its integer tick count.
///
/// Returns 0 for a zero tick by convention.
pub fn price_to_ticks(price: f64, tick: f64) -> i64 {
    if tick == 0.0 {
        return 0;
    }
    (price / tick).round() as i64
}

/// Converts an integer tick count back to the decimal price.
pub fn ticks_to_price(ticks: i64, tick: f64) -> f64 {
    ticks as f64 * tick
}
