//! PostgreSQL type OIDs for the JSON family.
//!
//! Reference: https://github.com/postgres/postgres/blob/master/src/include/catalog/pg_type.dat

/// `json`, builtin since PostgreSQL 9.2.
pub const JSON_OID: u32 = 114;
/// `json[]`
pub const JSONARRAY_OID: u32 = 199;

/// `jsonb`, builtin since PostgreSQL 9.4.
pub const JSONB_OID: u32 = 3802;
/// `jsonb[]`
pub const JSONBARRAY_OID: u32 = 3807;

/// First server version exposing `pg_type.typarray` (8.3).
pub const TYPARRAY_MIN_VERSION: u32 = 80300;

/// Map a JSON-family OID to its type name.
pub fn oid_to_name(oid: u32) -> &'static str {
    match oid {
        JSON_OID => "json",
        JSONARRAY_OID => "json[]",
        JSONB_OID => "jsonb",
        JSONBARRAY_OID => "jsonb[]",
        _ => "unknown",
    }
}

/// Check if an OID is one of the builtin JSON array types.
pub fn is_array_oid(oid: u32) -> bool {
    matches!(oid, JSONARRAY_OID | JSONBARRAY_OID)
}
