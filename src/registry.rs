//! Process-wide typecaster registry and JSON defaults.
//!
//! [`TypeRegistry::global()`] is the registry used when no other is given. It
//! is populated on first use and never cleared implicitly. Tests and embedders
//! that need isolation create their own with [`TypeRegistry::new()`].

use serde_json::Value;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::error::{JsonError, JsonResult};
use crate::typecast::{CodecTable, LoadsFn, TypeCaster};

/// Default encoder: serializes an already converted JSON value.
pub type ValueDumpsFn = Arc<dyn Fn(&Value) -> JsonResult<String> + Send + Sync>;

/// Output style of the serde_json default encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    Compact,
    Pretty,
}

/// serde_json encoder in the given style.
pub fn serde_dumps(style: JsonStyle) -> ValueDumpsFn {
    match style {
        JsonStyle::Compact => {
            Arc::new(|v: &Value| serde_json::to_string(v).map_err(JsonError::Encode))
        }
        JsonStyle::Pretty => {
            Arc::new(|v: &Value| serde_json::to_string_pretty(v).map_err(JsonError::Encode))
        }
    }
}

/// serde_json decoder.
pub fn serde_loads() -> LoadsFn {
    Arc::new(|s: &str| serde_json::from_str::<Value>(s).map_err(JsonError::Decode))
}

static GLOBAL: LazyLock<TypeRegistry> = LazyLock::new(TypeRegistry::new);

/// Global typecasters plus the default encode/decode functions.
pub struct TypeRegistry {
    casters: RwLock<CodecTable>,
    dumps: RwLock<Option<ValueDumpsFn>>,
    loads: RwLock<Option<LoadsFn>>,
}

impl TypeRegistry {
    /// A registry with no casters and serde_json defaults.
    pub fn new() -> Self {
        Self {
            casters: RwLock::new(CodecTable::new()),
            dumps: RwLock::new(Some(serde_dumps(JsonStyle::Compact))),
            loads: RwLock::new(Some(serde_loads())),
        }
    }

    /// A registry with no casters and no default functions.
    pub fn without_defaults() -> Self {
        Self {
            casters: RwLock::new(CodecTable::new()),
            dumps: RwLock::new(None),
            loads: RwLock::new(None),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL
    }

    pub fn default_dumps(&self) -> Option<ValueDumpsFn> {
        self.dumps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn default_loads(&self) -> Option<LoadsFn> {
        self.loads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the default encoder. `None` disables it.
    pub fn set_dumps(&self, dumps: Option<ValueDumpsFn>) {
        *self.dumps.write().unwrap_or_else(PoisonError::into_inner) = dumps;
    }

    /// Replace the default decoder. `None` disables it.
    pub fn set_loads(&self, loads: Option<LoadsFn>) {
        *self.loads.write().unwrap_or_else(PoisonError::into_inner) = loads;
    }

    /// Use the serde_json encoder in the given style as default.
    pub fn set_style(&self, style: JsonStyle) {
        self.set_dumps(Some(serde_dumps(style)));
    }

    pub fn clear_defaults(&self) {
        self.set_dumps(None);
        self.set_loads(None);
    }

    /// Install `caster` into `scope`, or into the global table when `None`.
    pub fn register_type(&self, caster: Arc<TypeCaster>, scope: Option<&mut CodecTable>) {
        match scope {
            Some(local) => {
                tracing::debug!(
                    "Registered typecaster {} for oids {:?} on connection",
                    caster.name(),
                    caster.oids()
                );
                local.insert(caster);
            }
            None => {
                tracing::debug!(
                    "Registered typecaster {} for oids {:?} globally",
                    caster.name(),
                    caster.oids()
                );
                self.casters
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(caster);
            }
        }
    }

    /// Remove the global caster for `oid`.
    pub fn unregister_type(&self, oid: u32) -> Option<Arc<TypeCaster>> {
        self.casters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(oid)
    }

    /// Find the caster for `oid`, preferring `local` over the global table.
    pub fn lookup(&self, local: Option<&CodecTable>, oid: u32) -> Option<Arc<TypeCaster>> {
        if let Some(caster) = local.and_then(|table| table.get(oid)) {
            return Some(Arc::clone(caster));
        }
        self.casters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(oid)
            .cloned()
    }

    /// Convert one received column value.
    ///
    /// Values without a registered caster come back as their raw text.
    pub fn typecast(
        &self,
        local: Option<&CodecTable>,
        oid: u32,
        raw: Option<&str>,
    ) -> JsonResult<Value> {
        match self.lookup(local, oid) {
            Some(caster) => caster.cast(raw),
            None => Ok(raw.map_or(Value::Null, |s| Value::String(s.to_string()))),
        }
    }

    /// Number of OIDs in the global table.
    pub fn len(&self) -> usize {
        self.casters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
