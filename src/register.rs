//! Registration of `json` typecasters.
//!
//! ```rust,ignore
//! // PostgreSQL 9.2+: the oids are fixed, nothing is queried.
//! register_default_json(Some(&mut session), false, None)?;
//!
//! // Older servers or extension types: look the oids up in pg_type.
//! register_json(Some(&mut session), RegisterOptions::new()).await?;
//! ```

use std::sync::Arc;

use crate::connection::{CatalogConnection, TransactionStatus};
use crate::error::{JsonError, JsonResult};
use crate::oid::{JSONARRAY_OID, JSONBARRAY_OID, JSONB_OID, JSON_OID, TYPARRAY_MIN_VERSION};
use crate::quote::quote_literal;
use crate::registry::TypeRegistry;
use crate::typecast::{new_array_type, new_type, LoadsFn, TypeCaster};

/// Scalar caster and, when the array oid is known, the array caster.
pub type JsonCasters = (Arc<TypeCaster>, Option<Arc<TypeCaster>>);

/// Options for [`register_json`].
#[derive(Clone)]
pub struct RegisterOptions {
    /// Install into the global table even when a connection is given.
    pub globally: bool,
    /// Decoder; the registry default when `None`.
    pub loads: Option<LoadsFn>,
    /// Type oid. When `None` both oids are looked up on the connection.
    pub oid: Option<u32>,
    pub array_oid: Option<u32>,
    /// `pg_type.typname` used for the lookup.
    pub type_name: String,
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self {
            globally: false,
            loads: None,
            oid: None,
            array_oid: None,
            type_name: "json".to_string(),
        }
    }

    pub fn globally(mut self, globally: bool) -> Self {
        self.globally = globally;
        self
    }

    pub fn loads(mut self, loads: LoadsFn) -> Self {
        self.loads = Some(loads);
        self
    }

    /// Use known oids instead of querying the catalog.
    pub fn oids(mut self, oid: u32, array_oid: Option<u32>) -> Self {
        self.oid = Some(oid);
        self.array_oid = array_oid;
        self
    }

    pub fn type_name(mut self, name: &str) -> Self {
        self.type_name = name.to_string();
        self
    }
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Create and register typecasters converting `json` to [`serde_json::Value`].
///
/// Casters are registered on `conn` unless `options.globally` is set or no
/// connection is given. If `options.oid` is `None` the oids are queried on
/// `conn`; this is the only case doing I/O. Fails with
/// [`JsonError::NotFound`] if the type does not exist.
pub async fn register_json(
    conn: Option<&mut dyn CatalogConnection>,
    options: RegisterOptions,
) -> JsonResult<JsonCasters> {
    register_json_in(TypeRegistry::global(), conn, options).await
}

/// [`register_json`] against an explicit registry.
pub async fn register_json_in(
    registry: &TypeRegistry,
    mut conn: Option<&mut dyn CatalogConnection>,
    options: RegisterOptions,
) -> JsonResult<JsonCasters> {
    let (oid, array_oid) = match options.oid {
        Some(oid) => (oid, options.array_oid),
        None => {
            let Some(conn) = conn.as_deref_mut() else {
                return Err(JsonError::configuration(format!(
                    "a connection is required to look up the {} oids",
                    options.type_name
                )));
            };
            get_json_oids(conn, &options.type_name).await?
        }
    };

    let name = options.type_name.to_uppercase();
    let casters = create_json_typecasters_in(registry, oid, array_oid, options.loads, &name)?;
    install(registry, conn, options.globally, &casters);
    Ok(casters)
}

/// Register `json` typecasters for PostgreSQL 9.2+, where the oids are fixed.
///
/// Same as [`register_json`] with oids 114 and 199; never queries the server.
pub fn register_default_json(
    conn: Option<&mut dyn CatalogConnection>,
    globally: bool,
    loads: Option<LoadsFn>,
) -> JsonResult<JsonCasters> {
    register_default_json_in(TypeRegistry::global(), conn, globally, loads)
}

pub fn register_default_json_in(
    registry: &TypeRegistry,
    conn: Option<&mut dyn CatalogConnection>,
    globally: bool,
    loads: Option<LoadsFn>,
) -> JsonResult<JsonCasters> {
    let casters =
        create_json_typecasters_in(registry, JSON_OID, Some(JSONARRAY_OID), loads, "JSON")?;
    install(registry, conn, globally, &casters);
    Ok(casters)
}

/// Register `jsonb` typecasters for PostgreSQL 9.4+ (oids 3802 and 3807).
pub fn register_default_jsonb(
    conn: Option<&mut dyn CatalogConnection>,
    globally: bool,
    loads: Option<LoadsFn>,
) -> JsonResult<JsonCasters> {
    register_default_jsonb_in(TypeRegistry::global(), conn, globally, loads)
}

pub fn register_default_jsonb_in(
    registry: &TypeRegistry,
    conn: Option<&mut dyn CatalogConnection>,
    globally: bool,
    loads: Option<LoadsFn>,
) -> JsonResult<JsonCasters> {
    let casters =
        create_json_typecasters_in(registry, JSONB_OID, Some(JSONBARRAY_OID), loads, "JSONB")?;
    install(registry, conn, globally, &casters);
    Ok(casters)
}

/// Create the `JSON` and `JSONARRAY` typecasters without registering them.
pub fn create_json_typecasters(
    oid: u32,
    array_oid: Option<u32>,
    loads: Option<LoadsFn>,
) -> JsonResult<JsonCasters> {
    create_json_typecasters_in(TypeRegistry::global(), oid, array_oid, loads, "JSON")
}

/// Create typecasters named `name` and `{name}ARRAY`.
///
/// Without `loads` the registry default decoder is used; if there is none this
/// fails with [`JsonError::Configuration`]. No array caster is built when
/// `array_oid` is `None`.
pub fn create_json_typecasters_in(
    registry: &TypeRegistry,
    oid: u32,
    array_oid: Option<u32>,
    loads: Option<LoadsFn>,
    name: &str,
) -> JsonResult<JsonCasters> {
    let loads = match loads {
        Some(loads) => loads,
        None => registry
            .default_loads()
            .ok_or_else(|| JsonError::configuration("no json decoder available"))?,
    };

    let scalar = Arc::new(new_type(&[oid], name, loads));
    let array = array_oid.map(|array_oid| {
        Arc::new(new_array_type(
            &[array_oid],
            format!("{}ARRAY", name),
            Arc::clone(&scalar),
        ))
    });

    Ok((scalar, array))
}

/// Look up the oid of `type_name` and of its array type in `pg_type`.
///
/// The connection's transaction status is preserved: if it was not already in
/// a transaction and autocommit is off, the implicit transaction opened by the
/// lookup is rolled back.
pub async fn get_json_oids(
    conn: &mut dyn CatalogConnection,
    type_name: &str,
) -> JsonResult<(u32, Option<u32>)> {
    let status = conn.status();

    // pg_type.typarray appeared in 8.3
    let typarray = if conn.server_version() >= TYPARRAY_MIN_VERSION {
        "t.typarray::text"
    } else {
        "NULL::text"
    };
    let sql = format!(
        "SELECT t.oid::text, {} FROM pg_type t WHERE t.typname = {};",
        typarray,
        quote_literal(type_name)?
    );

    tracing::debug!("Looking up oids for type '{}'", type_name);
    conn.execute(&sql).await?;
    let row = conn.fetch_one().await?;

    if status != TransactionStatus::InBlock && !conn.autocommit() {
        tracing::debug!("Rolling back catalog lookup");
        conn.rollback().await?;
    }

    let Some(row) = row else {
        return Err(JsonError::NotFound(format!(
            "{} data type not found",
            type_name
        )));
    };

    let oid = parse_oid(row.first())?
        .ok_or_else(|| JsonError::driver(format!("pg_type returned no oid for {}", type_name)))?;
    let array_oid = parse_oid(row.get(1))?.filter(|oid| *oid != 0);

    tracing::debug!(
        "Found type '{}': oid {}, array oid {:?}",
        type_name,
        oid,
        array_oid
    );
    Ok((oid, array_oid))
}

fn parse_oid(column: Option<&Option<String>>) -> JsonResult<Option<u32>> {
    match column {
        Some(Some(text)) => text
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| JsonError::driver(format!("Invalid oid '{}': {}", text, e))),
        _ => Ok(None),
    }
}

/// Install both casters in the same scope.
fn install(
    registry: &TypeRegistry,
    conn: Option<&mut dyn CatalogConnection>,
    globally: bool,
    (scalar, array): &JsonCasters,
) {
    match conn {
        Some(conn) if !globally => {
            let table = conn.codecs_mut();
            registry.register_type(Arc::clone(scalar), Some(&mut *table));
            if let Some(array) = array {
                registry.register_type(Arc::clone(array), Some(table));
            }
        }
        _ => {
            registry.register_type(Arc::clone(scalar), None);
            if let Some(array) = array {
                registry.register_type(Arc::clone(array), None);
            }
        }
    }
}
