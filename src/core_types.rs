//! Core type aliases used throughout the system.

/// Order id - unique within the process, allocated from an atomic counter.
pub type OrderId = u64;

/// Integer price expressed in multiples of the price tick.
///
/// All price-level ordering and identity inside the book uses this type;
/// the decimal price exists only for reporting and settlement arithmetic.
pub type PriceTicks = i64;
