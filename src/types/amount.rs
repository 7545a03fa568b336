//! Amount limits shared by the engine and the storage schema
//!
//! Amounts and balances are stored as `NUMERIC(AMOUNT_PRECISION, AMOUNT_SCALE)`.
//! The engine rejects anything that column cannot hold exactly, so every
//! backend accepts and records the same values.

use rust_decimal::Decimal;

/// Total significant digits of a stored amount or balance
pub const AMOUNT_PRECISION: u32 = 20;

/// Decimal places of a stored amount or balance
pub const AMOUNT_SCALE: u32 = 4;

/// Exclusive upper bound of a stored amount or balance: `10^(precision - scale)`
pub fn amount_limit() -> Decimal {
    Decimal::from(10_i64.pow(AMOUNT_PRECISION - AMOUNT_SCALE))
}

/// SQL column type matching the limits above
pub fn amount_column_type() -> String {
    format!("NUMERIC({}, {})", AMOUNT_PRECISION, AMOUNT_SCALE)
}

/// Whether a non-negative value is stored exactly, without rounding or overflow
///
/// Trailing zeros do not count towards the scale: `1.50000` fits.
pub fn fits_storage(value: Decimal) -> bool {
    value.normalize().scale() <= AMOUNT_SCALE && value.abs() < amount_limit()
}
