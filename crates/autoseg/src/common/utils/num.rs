use crate::common::error::validation_error;

/// Converts a count that comes from untyped input (a file or the command line) to `u32`.
/// Negative values are reported as validation errors instead of parse errors.
pub fn checked_count(field: &str, value: i64) -> crate::Result<u32> {
    if value < 0 {
        return validation_error(format!("{field} must not be negative (got {value})"));
    }
    u32::try_from(value).or_else(|_| validation_error(format!("{field} is too large (got {value})")))
}
