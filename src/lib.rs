//! # qail-json — JSON adaptation for PostgreSQL
//!
//! Two halves, sharing only the type oids:
//!
//! - **Out:** [`Json`] wraps a value and renders it as a quoted `json`
//!   literal for a query.
//! - **In:** [`register_json`] and friends install typecasters keyed by oid,
//!   turning received `json` / `json[]` text into [`serde_json::Value`].
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use qail_json::prelude::*;
//! use serde_json::json;
//!
//! let mut session = PgSession::connect("postgres://localhost/mydb").await?;
//!
//! // Outgoing
//! let sql = format!(
//!     "INSERT INTO events (payload) VALUES ({})",
//!     Json::new(json!({"a": 100})).getquoted()?
//! );
//!
//! // Incoming, on this connection only
//! register_default_json(Some(&mut session), false, None)?;
//! let value = session.decode(JSON_OID, Some(r#"{"a": 100}"#))?;
//! ```
//!
//! ## Scopes
//!
//! | Call                                   | Installs into        |
//! |----------------------------------------|----------------------|
//! | `register_json(Some(conn), ..)`        | `conn` only          |
//! | `register_json(Some(conn), globally)`  | process-wide table   |
//! | `register_json(None, ..)`              | process-wide table   |
//!
//! Connection casters take precedence over global ones.

pub mod adapter;
pub mod config;
pub mod connection;
pub mod error;
pub mod oid;
pub mod quote;
pub mod register;
pub mod registry;
pub mod session;
pub mod typecast;

pub use adapter::{Dumps, Json, Pretty};
pub use connection::{CatalogConnection, CatalogRow, TransactionStatus};
pub use error::{JsonError, JsonResult};
pub use oid::{JSONARRAY_OID, JSONBARRAY_OID, JSONB_OID, JSON_OID};
pub use register::{
    create_json_typecasters, get_json_oids, register_default_json, register_default_jsonb,
    register_json, JsonCasters, RegisterOptions,
};
pub use registry::{JsonStyle, TypeRegistry};
pub use session::PgSession;
pub use typecast::{CodecTable, LoadsFn, TypeCaster};

pub mod prelude {
    pub use crate::adapter::{Dumps, Json, Pretty};
    pub use crate::connection::{CatalogConnection, TransactionStatus};
    pub use crate::error::*;
    pub use crate::oid::*;
    pub use crate::register::*;
    pub use crate::registry::{JsonStyle, TypeRegistry};
    pub use crate::session::PgSession;
    pub use crate::typecast::{CodecTable, LoadsFn, TypeCaster};
}
