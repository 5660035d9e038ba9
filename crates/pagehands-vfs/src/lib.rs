//! Virtual filesystem core.
//!
//! Exposes a live page, its console, session artifacts, and persisted
//! scripts/styles as one path-addressable, versioned filesystem:
//! `/{domain}/{urlPath}/{leaf}`. Every file carries a monotone version;
//! writes and edits are optimistic and fail on version mismatch.

pub mod console;
pub mod dom;
pub mod kv;
pub mod page;
pub mod path;
pub mod route;
pub mod session;
pub mod store;
pub mod vfs;

pub use console::{ConsoleBuffer, ConsoleLevel};
pub use kv::{domain_key, FileKvStore, KeyValueStore, MemoryKvStore, StoreChange, VFS_KEY_PREFIX};
pub use page::PageDocument;
pub use path::{parse_path, PathKind, VirtualPath};
pub use route::{find_matching_routes, RouteMatch, RoutePattern};
pub use session::SessionArtifacts;
pub use store::{DomainState, DomainStore, EditRecord, PathEntry, StoredScript, VfsFile};
pub use vfs::{Vfs, MAX_READ_CHARS};
