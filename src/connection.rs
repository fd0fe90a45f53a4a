//! The connection surface needed for OID discovery and local registration.

use async_trait::async_trait;

use crate::error::JsonResult;
use crate::typecast::CodecTable;

/// Transaction status of a connection, as reported by `ReadyForQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Idle,    // 'I'
    InBlock, // 'T'
    Failed,  // 'E'
}

/// One result row; each column in text format, `None` for NULL.
pub type CatalogRow = Vec<Option<String>>;

/// A connection able to query the server catalog and hold its own typecasters.
///
/// A connection that is not in autocommit mode is expected to open a
/// transaction implicitly on [`execute`](Self::execute), moving its status to
/// [`TransactionStatus::InBlock`].
#[async_trait]
pub trait CatalogConnection: Send {
    fn status(&self) -> TransactionStatus;

    /// Server version as `server_version_num`, e.g. `160002`.
    fn server_version(&self) -> u32;

    fn autocommit(&self) -> bool;

    /// Run a statement, buffering its result rows.
    async fn execute(&mut self, sql: &str) -> JsonResult<()>;

    /// Take the next buffered row of the last statement.
    async fn fetch_one(&mut self) -> JsonResult<Option<CatalogRow>>;

    async fn rollback(&mut self) -> JsonResult<()>;

    /// Typecasters scoped to this connection.
    fn codecs(&self) -> &CodecTable;

    fn codecs_mut(&mut self) -> &mut CodecTable;
}
