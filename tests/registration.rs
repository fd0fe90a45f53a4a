//! Registration flow tests against an in-memory catalog connection.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use qail_json::register::{register_default_json_in, register_json_in};
use qail_json::{
    CatalogConnection, CatalogRow, CodecTable, Json, JsonError, JsonResult, LoadsFn,
    RegisterOptions, TransactionStatus, TypeRegistry, JSONARRAY_OID, JSON_OID,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

/// Connection answering pg_type lookups from a fixed list.
struct MockConnection {
    status: TransactionStatus,
    autocommit: bool,
    server_version: u32,
    /// (typname, oid, typarray)
    catalog: Vec<(&'static str, u32, u32)>,
    fail_queries: bool,
    queries: Vec<String>,
    rollbacks: usize,
    pending: VecDeque<CatalogRow>,
    codecs: CodecTable,
}

impl MockConnection {
    fn new() -> Self {
        Self {
            status: TransactionStatus::Idle,
            autocommit: false,
            server_version: 160002,
            catalog: vec![("json", 114, 199), ("jsonb", 3802, 3807), ("myjson", 70001, 70002)],
            fail_queries: false,
            queries: Vec::new(),
            rollbacks: 0,
            pending: VecDeque::new(),
            codecs: CodecTable::new(),
        }
    }

    fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    fn with_server_version(mut self, version: u32) -> Self {
        self.server_version = version;
        self
    }

    fn without_catalog(mut self) -> Self {
        self.catalog.clear();
        self
    }
}

#[async_trait]
impl CatalogConnection for MockConnection {
    fn status(&self) -> TransactionStatus {
        self.status
    }

    fn server_version(&self) -> u32 {
        self.server_version
    }

    fn autocommit(&self) -> bool {
        self.autocommit
    }

    async fn execute(&mut self, sql: &str) -> JsonResult<()> {
        self.queries.push(sql.to_string());
        if self.fail_queries {
            return Err(JsonError::driver("server closed the connection unexpectedly"));
        }
        if !self.autocommit && self.status == TransactionStatus::Idle {
            self.status = TransactionStatus::InBlock;
        }

        let typname = sql
            .split("typname = '")
            .nth(1)
            .and_then(|rest| rest.split('\'').next())
            .unwrap_or_default();
        let with_typarray = !sql.contains("NULL::text");

        self.pending = self
            .catalog
            .iter()
            .filter(|(name, _, _)| *name == typname)
            .map(|(_, oid, typarray)| {
                vec![
                    Some(oid.to_string()),
                    with_typarray.then(|| typarray.to_string()),
                ]
            })
            .collect();
        Ok(())
    }

    async fn fetch_one(&mut self) -> JsonResult<Option<CatalogRow>> {
        Ok(self.pending.pop_front())
    }

    async fn rollback(&mut self) -> JsonResult<()> {
        self.rollbacks += 1;
        self.status = TransactionStatus::Idle;
        Ok(())
    }

    fn codecs(&self) -> &CodecTable {
        &self.codecs
    }

    fn codecs_mut(&mut self) -> &mut CodecTable {
        &mut self.codecs
    }
}

#[tokio::test]
async fn test_discovery_when_oid_missing() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new();

    let (scalar, array) = register_json_in(
        &registry,
        Some(&mut conn),
        RegisterOptions::new().type_name("myjson"),
    )
    .await
    .unwrap();

    assert_eq!(conn.queries.len(), 1);
    assert_eq!(scalar.oids(), &[70001]);
    assert_eq!(scalar.name(), "MYJSON");
    assert_eq!(array.unwrap().oids(), &[70002]);

    // Installed on the connection, not globally.
    assert!(conn.codecs().get(70001).is_some());
    assert!(conn.codecs().get(70002).is_some());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_default_oids_skip_discovery() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new();

    let (scalar, array) =
        register_default_json_in(&registry, Some(&mut conn), false, None).unwrap();

    assert!(conn.queries.is_empty());
    assert_eq!(scalar.oids(), &[JSON_OID]);
    assert_eq!(array.unwrap().oids(), &[JSONARRAY_OID]);
}

#[tokio::test]
async fn test_explicit_oids_skip_discovery() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new();

    let (scalar, array) = register_json_in(
        &registry,
        Some(&mut conn),
        RegisterOptions::new().oids(70001, None),
    )
    .await
    .unwrap();

    assert!(conn.queries.is_empty());
    assert_eq!(scalar.oids(), &[70001]);
    assert!(array.is_none());
}

#[tokio::test]
async fn test_discovery_restores_transaction_status() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new();
    assert_eq!(conn.status(), TransactionStatus::Idle);

    register_json_in(&registry, Some(&mut conn), RegisterOptions::new())
        .await
        .unwrap();

    assert_eq!(conn.status(), TransactionStatus::Idle);
    assert_eq!(conn.rollbacks, 1);
}

#[tokio::test]
async fn test_discovery_keeps_open_transaction() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new();
    conn.status = TransactionStatus::InBlock;

    register_json_in(&registry, Some(&mut conn), RegisterOptions::new())
        .await
        .unwrap();

    assert_eq!(conn.status(), TransactionStatus::InBlock);
    assert_eq!(conn.rollbacks, 0);
}

#[tokio::test]
async fn test_discovery_in_autocommit_does_not_roll_back() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new().with_autocommit(true);

    register_json_in(&registry, Some(&mut conn), RegisterOptions::new())
        .await
        .unwrap();

    assert_eq!(conn.status(), TransactionStatus::Idle);
    assert_eq!(conn.rollbacks, 0);
}

#[tokio::test]
async fn test_type_not_found() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new().without_catalog();

    let err = register_json_in(&registry, Some(&mut conn), RegisterOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, JsonError::NotFound(ref msg) if msg == "json data type not found"));
    // The lookup transaction is still undone.
    assert_eq!(conn.status(), TransactionStatus::Idle);
    assert!(conn.codecs().is_empty());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_old_server_has_no_array_oid() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new().with_server_version(80204);

    let (scalar, array) = register_json_in(&registry, Some(&mut conn), RegisterOptions::new())
        .await
        .unwrap();

    assert!(conn.queries[0].contains("NULL::text"));
    assert_eq!(scalar.oids(), &[JSON_OID]);
    assert!(array.is_none());
}

#[tokio::test]
async fn test_driver_errors_propagate() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new();
    conn.fail_queries = true;

    let err = register_json_in(&registry, Some(&mut conn), RegisterOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "server closed the connection unexpectedly");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_discovery_requires_connection() {
    let registry = TypeRegistry::new();
    let err = register_json_in(&registry, None, RegisterOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, JsonError::Configuration(_)));
}

#[tokio::test]
async fn test_scope_isolation() {
    let registry = TypeRegistry::new();
    let mut a = MockConnection::new();
    let b = MockConnection::new();

    register_default_json_in(&registry, Some(&mut a), false, None).unwrap();

    let text = r#"{"a": 1}"#;
    assert_eq!(
        registry.typecast(Some(a.codecs()), JSON_OID, Some(text)).unwrap(),
        json!({"a": 1})
    );
    // Connection B is unaffected: the text comes back raw.
    assert_eq!(
        registry.typecast(Some(b.codecs()), JSON_OID, Some(text)).unwrap(),
        Value::String(text.to_string())
    );
}

#[tokio::test]
async fn test_global_registration_reaches_all_connections() {
    let registry = TypeRegistry::new();
    let mut a = MockConnection::new();
    let mut b = MockConnection::new();

    register_default_json_in(&registry, Some(&mut a), true, None).unwrap();
    assert!(a.codecs().is_empty());

    assert_eq!(
        registry.typecast(Some(b.codecs()), JSON_OID, Some("[1]")).unwrap(),
        json!([1])
    );

    // A local registration on B wins over the global one.
    let raw: LoadsFn =
        Arc::new(|s: &str| -> JsonResult<Value> { Ok(Value::String(s.to_string())) });
    register_default_json_in(&registry, Some(&mut b), false, Some(raw)).unwrap();
    assert_eq!(
        registry.typecast(Some(b.codecs()), JSON_OID, Some("[1]")).unwrap(),
        json!("[1]")
    );
    assert_eq!(
        registry.typecast(Some(a.codecs()), JSON_OID, Some("[1]")).unwrap(),
        json!([1])
    );
}

#[tokio::test]
async fn test_discovered_oids_registered_globally() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new();
    let other = MockConnection::new();

    let (scalar, array) = register_json_in(
        &registry,
        Some(&mut conn),
        RegisterOptions::new().type_name("myjson").globally(true),
    )
    .await
    .unwrap();

    assert_eq!(conn.queries.len(), 1);
    assert_eq!(scalar.oids(), &[70001]);
    assert_eq!(array.unwrap().oids(), &[70002]);

    // The lookup ran on `conn`, but the casters landed in the global table.
    assert!(conn.codecs().is_empty());
    assert_eq!(registry.len(), 2);
    assert_eq!(
        registry.typecast(Some(other.codecs()), 70002, Some(r#"{"{\"k\": 1}",NULL}"#)).unwrap(),
        json!([{"k": 1}, null])
    );
}

#[tokio::test]
async fn test_custom_loads() {
    let registry = TypeRegistry::new();
    let mut conn = MockConnection::new();

    // Keep numbers as their exact text.
    let loads: LoadsFn = Arc::new(|s: &str| -> JsonResult<Value> {
        let value: Value = serde_json::from_str(s).map_err(JsonError::Decode)?;
        Ok(match value {
            Value::Number(n) => Value::String(n.to_string()),
            other => other,
        })
    });

    register_json_in(
        &registry,
        Some(&mut conn),
        RegisterOptions::new().loads(loads),
    )
    .await
    .unwrap();

    assert_eq!(
        registry
            .typecast(Some(conn.codecs()), JSONARRAY_OID, Some("{1.50,NULL,\"\\\"x\\\"\"}"))
            .unwrap(),
        json!(["1.5", null, "x"])
    );
}

#[test]
fn test_round_trip() {
    let registry = TypeRegistry::new();
    let (json_caster, _) = register_default_json_in(&registry, None, true, None).unwrap();

    let values = [
        json!(null),
        json!(true),
        json!(-12),
        json!(3.25),
        json!("it's \"quoted\" \\ and ünïcode"),
        json!([1, [2, [3]], {"k": null}]),
        json!({"nested": {"list": [], "empty": {}}, "n": 1e10}),
    ];

    for value in values {
        let text = Json::new(value.clone()).dumps_in(&registry).unwrap();
        assert_eq!(json_caster.cast(Some(&text)).unwrap(), value);
    }
}
