//! Chef Server の node / client 削除の抽象

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    Deleted,
    NotFound,
}

impl fmt::Display for DeleteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteStatus::Deleted => f.write_str("deleted"),
            DeleteStatus::NotFound => f.write_str("not found"),
        }
    }
}

/// server mode のビルドで登録された node と client を削除する
#[async_trait]
pub trait RemoteIdentityStore: Send + Sync {
    async fn delete_node(&self, name: &str) -> Result<DeleteStatus>;

    async fn delete_client(&self, name: &str) -> Result<DeleteStatus>;
}
