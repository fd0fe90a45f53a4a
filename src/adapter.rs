//! Adapting Rust values to `json` query parameters.
//!
//! ```
//! use qail_json::Json;
//! use serde_json::json;
//!
//! let param = Json::new(json!({"a": 100}));
//! assert_eq!(param.getquoted().unwrap(), r#"'{"a":100}'"#);
//! ```
//!
//! The encoding can be customized with any [`Dumps`] implementation, either a
//! closure or a type:
//!
//! ```
//! use qail_json::{Json, JsonError};
//!
//! let param = Json::with_dumps(vec![1, 2], |v: &Vec<i32>| {
//!     serde_json::to_string(&v.iter().rev().collect::<Vec<_>>()).map_err(JsonError::Encode)
//! });
//! assert_eq!(param.getquoted().unwrap(), "'[2,1]'");
//! ```

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{JsonError, JsonResult};
use crate::quote::quote_literal;
use crate::registry::TypeRegistry;

/// Something that can serialize a `T` to JSON text.
pub trait Dumps<T: ?Sized>: Send + Sync {
    fn dumps(&self, value: &T) -> JsonResult<String>;
}

impl<T: ?Sized, F> Dumps<T> for F
where
    F: Fn(&T) -> JsonResult<String> + Send + Sync,
{
    fn dumps(&self, value: &T) -> JsonResult<String> {
        self(value)
    }
}

/// Indented serde_json output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pretty;

impl<T: Serialize + ?Sized> Dumps<T> for Pretty {
    fn dumps(&self, value: &T) -> JsonResult<String> {
        serde_json::to_string_pretty(value).map_err(JsonError::Encode)
    }
}

type ToValueFn<T> = fn(&T) -> serde_json::Result<Value>;

fn to_value<T: Serialize>(value: &T) -> serde_json::Result<Value> {
    serde_json::to_value(value)
}

/// A value to be sent as a `json` literal.
///
/// The encoder is resolved when the literal is requested: the one given to
/// [`Json::with_dumps`] if any, otherwise the registry default. Only values
/// built with [`Json::new`] can use the registry default, so any `T` works
/// with an explicit encoder.
pub struct Json<T> {
    adapted: T,
    dumps: Option<Arc<dyn Dumps<T>>>,
    to_value: Option<ToValueFn<T>>,
}

impl<T: Serialize> Json<T> {
    pub fn new(adapted: T) -> Self {
        Self {
            adapted,
            dumps: None,
            to_value: Some(to_value::<T>),
        }
    }
}

impl<T> Json<T> {
    /// Wrap `adapted`, always encoding it with `dumps`.
    pub fn with_dumps(adapted: T, dumps: impl Dumps<T> + 'static) -> Self {
        Self {
            adapted,
            dumps: Some(Arc::new(dumps)),
            to_value: None,
        }
    }

    pub fn adapted(&self) -> &T {
        &self.adapted
    }

    pub fn into_inner(self) -> T {
        self.adapted
    }

    /// Serialize the wrapped value using `registry` for the default encoder.
    pub fn dumps_in(&self, registry: &TypeRegistry) -> JsonResult<String> {
        if let Some(dumps) = &self.dumps {
            return dumps.dumps(&self.adapted);
        }

        let (Some(to_value), Some(default)) = (self.to_value, registry.default_dumps()) else {
            return Err(JsonError::configuration(
                "no serialization function available: you should provide a dumps function",
            ));
        };
        tracing::trace!("Serializing with the registry default encoder");
        let value = to_value(&self.adapted).map_err(JsonError::Encode)?;
        default(&value)
    }

    /// Serialize the wrapped value using the global registry.
    pub fn dumps(&self) -> JsonResult<String> {
        self.dumps_in(TypeRegistry::global())
    }

    /// The quoted SQL literal, using `registry` for the default encoder.
    pub fn getquoted_in(&self, registry: &TypeRegistry) -> JsonResult<String> {
        let text = self.dumps_in(registry)?;
        quote_literal(&text)
    }

    /// The quoted SQL literal, ready to be interpolated into a query.
    pub fn getquoted(&self) -> JsonResult<String> {
        self.getquoted_in(TypeRegistry::global())
    }
}

impl<T: fmt::Debug> fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Json")
            .field("adapted", &self.adapted)
            .field("custom_dumps", &self.dumps.is_some())
            .finish()
    }
}
