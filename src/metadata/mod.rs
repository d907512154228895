// メタデータ管理モジュール
pub mod namespace;
pub mod types;

pub use namespace::{Namespace, NamespaceMap};
pub use types::{FileKind, FileMetadata, PERM_MASK, S_IFDIR, S_IFMT, S_IFREG};
