//! SQL string literal quoting.

use crate::error::{JsonError, JsonResult};

/// Quote `text` as a PostgreSQL string literal.
///
/// Single quotes are doubled. Text containing backslashes is emitted as an
/// escape string (`E'...'`) with doubled backslashes, which reads the same
/// whether or not `standard_conforming_strings` is on.
///
/// # Example
/// ```
/// use qail_json::quote::quote_literal;
/// assert_eq!(quote_literal("it's").unwrap(), "'it''s'");
/// assert_eq!(quote_literal(r"a\b").unwrap(), r"E'a\\b'");
/// ```
pub fn quote_literal(text: &str) -> JsonResult<String> {
    if text.contains('\0') {
        return Err(JsonError::NullByte);
    }

    let escaped = text.replace('\'', "''");
    if escaped.contains('\\') {
        Ok(format!("E'{}'", escaped.replace('\\', "\\\\")))
    } else {
        Ok(format!("'{}'", escaped))
    }
}
