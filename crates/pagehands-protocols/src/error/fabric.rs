//! Messaging fabric errors.

use thiserror::Error;

use super::{StoreError, VfsError};
use crate::types::TabId;

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("No receiver in tab {0}; the page worker is not injected")]
    NoReceiver(TabId),

    #[error("Cannot access this page: {0}")]
    PrivilegedPage(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("A plan is awaiting approval; approve or reject it first")]
    AwaitingApproval,

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal fabric error: {0}")]
    Internal(String),
}
