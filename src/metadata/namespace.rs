use super::types::FileMetadata;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// パス -> メタデータのマップ本体
///
/// ロックなしの操作のみを提供する。排他制御は[`Namespace`]が行い、
/// check-then-actが必要な呼び出し元は[`Namespace::lock`]でガードを
/// 取得して複数操作をまとめて実行する。
#[derive(Debug, Default)]
pub struct NamespaceMap {
    entries: HashMap<String, FileMetadata>,
}

impl NamespaceMap {
    /// パスが存在するか確認
    pub fn exists(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// メタデータを無条件に挿入 (上書き)
    ///
    /// 既存チェックは呼び出し元の責務。
    pub fn add(&mut self, path: &str, metadata: FileMetadata) {
        self.entries.insert(path.to_string(), metadata);
    }

    /// メタデータを削除。存在しなければ何もしない
    pub fn remove(&mut self, path: &str) {
        self.entries.remove(path);
    }

    /// メタデータのスナップショットを取得
    pub fn get(&self, path: &str) -> Option<FileMetadata> {
        self.entries.get(path).cloned()
    }

    /// メタデータを書き換える
    ///
    /// エントリが存在すればクロージャを適用してtrueを返す。
    pub fn update<F>(&mut self, path: &str, f: F) -> bool
    where
        F: FnOnce(&mut FileMetadata),
    {
        match self.entries.get_mut(path) {
            Some(meta) => {
                f(meta);
                true
            }
            None => false,
        }
    }

    /// 直下のエントリ名を列挙
    ///
    /// `path` の直下にある最初のパス要素を重複なしで返す。
    /// `path` 自身は含まれない。順序は不定。
    pub fn list(&self, path: &str) -> Vec<String> {
        let mut prefix = path.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }

        let mut names = Vec::new();
        for key in self.entries.keys() {
            if !key.starts_with(&prefix) || key == &prefix {
                continue;
            }
            let remaining = &key[prefix.len()..];
            let first = match remaining.find('/') {
                Some(pos) => &remaining[..pos],
                None => remaining,
            };
            if !first.is_empty() && !names.iter().any(|n| n == first) {
                names.push(first.to_string());
            }
        }

        names
    }

    /// エントリ数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// エントリが空かどうか
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// プロセス全体のネームスペース
///
/// 絶対パス文字列からメタデータレコードへのマップを単一のミューテックスで
/// 保護する。構築時にルートディレクトリ `/` (mode 0755, nlink 2) を登録する。
#[derive(Debug)]
pub struct Namespace {
    inner: Mutex<NamespaceMap>,
}

impl Namespace {
    /// ルートエントリ入りのネームスペースを作成
    pub fn new() -> Self {
        let mut map = NamespaceMap::default();
        map.add("/", FileMetadata::new_directory(0o755));

        Self {
            inner: Mutex::new(map),
        }
    }

    /// ネームスペース全体のロックを取得
    ///
    /// メタデータの読み書き両方を行う操作は、この1つのガードを操作全体に
    /// わたって保持することで原子性を保証する。
    pub fn lock(&self) -> MutexGuard<'_, NamespaceMap> {
        // ワーカー側のパニックはリクエスト単位で捕捉されるため、
        // ポイズニングされていてもマップ自体は一貫している
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// パスが存在するか確認
    pub fn exists(&self, path: &str) -> bool {
        self.lock().exists(path)
    }

    /// メタデータのスナップショットを取得
    pub fn get(&self, path: &str) -> Option<FileMetadata> {
        self.lock().get(path)
    }

    /// 直下のエントリ名を列挙
    pub fn list(&self, path: &str) -> Vec<String> {
        self.lock().list(path)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_present_at_construction() {
        let ns = Namespace::new();

        let root = ns.get("/").unwrap();
        assert!(root.is_directory());
        assert_eq!(root.permissions(), 0o755);
        assert_eq!(root.nlink, 2);
        assert_eq!(root.size, 0);
    }

    #[test]
    fn test_add_exists_remove() {
        let ns = Namespace::new();

        assert!(!ns.exists("/a"));

        ns.lock().add("/a", FileMetadata::new_file(0o644));
        assert!(ns.exists("/a"));

        ns.lock().remove("/a");
        assert!(!ns.exists("/a"));

        // 存在しないパスの削除は何も起こさない
        ns.lock().remove("/a");
    }

    #[test]
    fn test_get_returns_snapshot() {
        let ns = Namespace::new();
        ns.lock().add("/a", FileMetadata::new_file(0o644));

        let mut snapshot = ns.get("/a").unwrap();
        snapshot.size = 12345;

        // スナップショットの変更はネームスペースに反映されない
        assert_eq!(ns.get("/a").unwrap().size, 0);
    }

    #[test]
    fn test_update_in_place() {
        let ns = Namespace::new();
        ns.lock().add("/a", FileMetadata::new_file(0o644));

        assert!(ns.lock().update("/a", |m| m.size = 42));
        assert_eq!(ns.get("/a").unwrap().size, 42);

        assert!(!ns.lock().update("/missing", |m| m.size = 1));
    }

    #[test]
    fn test_list_immediate_children() {
        let ns = Namespace::new();
        let mut map = ns.lock();
        map.add("/d", FileMetadata::new_directory(0o755));
        map.add("/d/x", FileMetadata::new_file(0o644));
        map.add("/d/y", FileMetadata::new_file(0o644));
        map.add("/d/sub", FileMetadata::new_directory(0o755));
        map.add("/d/sub/deep", FileMetadata::new_file(0o644));
        map.add("/other", FileMetadata::new_file(0o644));
        drop(map);

        let mut names = ns.list("/d");
        names.sort();
        assert_eq!(names, vec!["sub", "x", "y"]);
    }

    #[test]
    fn test_list_root() {
        let ns = Namespace::new();
        let mut map = ns.lock();
        map.add("/a", FileMetadata::new_file(0o644));
        map.add("/b/c", FileMetadata::new_file(0o644));
        drop(map);

        let mut names = ns.list("/");
        names.sort();
        // "/b" 自体が未登録でも最初のパス要素として現れる
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_list_deduplicates() {
        let ns = Namespace::new();
        let mut map = ns.lock();
        map.add("/d/sub/a", FileMetadata::new_file(0o644));
        map.add("/d/sub/b", FileMetadata::new_file(0o644));
        drop(map);

        assert_eq!(ns.list("/d"), vec!["sub"]);
    }

    #[test]
    fn test_list_empty_and_missing() {
        let ns = Namespace::new();
        ns.lock().add("/d", FileMetadata::new_directory(0o755));

        assert!(ns.list("/d").is_empty());
        assert!(ns.list("/missing").is_empty());
    }

    #[test]
    fn test_list_does_not_match_name_prefix() {
        let ns = Namespace::new();
        let mut map = ns.lock();
        map.add("/dir", FileMetadata::new_directory(0o755));
        map.add("/dirx", FileMetadata::new_file(0o644));
        map.add("/dir/in", FileMetadata::new_file(0o644));
        drop(map);

        // "/dirx" は "/dir/" 配下ではない
        assert_eq!(ns.list("/dir"), vec!["in"]);
    }
}
