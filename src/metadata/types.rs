use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// ファイルタイプを示すモードビットのマスク
pub const S_IFMT: u32 = 0o170000;

/// 通常ファイル
pub const S_IFREG: u32 = 0o100000;

/// ディレクトリ
pub const S_IFDIR: u32 = 0o040000;

/// パーミッションビットのマスク (setuid/setgid/stickyを含む12ビット)
pub const PERM_MASK: u32 = 0o7777;

/// 現在時刻をUNIX秒で取得
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// ファイル種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Regular,
    Directory,
}

/// ファイルメタデータ
///
/// ネームスペース内の1パスに対応するレコード。呼び出し元には常に
/// スナップショット (クローン) として返され、共有されることはない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    /// ファイルタイプビット + 12ビットパーミッション
    pub mode: u32,

    /// リンクカウント (通常ファイル: 1, ディレクトリ: 2)
    pub nlink: u32,

    /// 所有者UID
    pub uid: u32,

    /// 所有者GID
    pub gid: u32,

    /// 論理サイズ (バイト)。ディレクトリは常に0
    pub size: u64,

    /// 最終アクセス時刻 (UNIX秒)
    pub atime: i64,

    /// 最終内容更新時刻 (UNIX秒)
    pub mtime: i64,

    /// 最終メタデータ変更時刻 (UNIX秒)
    pub ctime: i64,
}

impl FileMetadata {
    /// 通常ファイルのメタデータを作成
    ///
    /// 所有者は呼び出しプロセスのuid/gid、タイムスタンプは全て現在時刻。
    pub fn new_file(mode: u32) -> Self {
        Self::new(S_IFREG | (mode & PERM_MASK), 1)
    }

    /// ディレクトリのメタデータを作成
    ///
    /// nlinkは "." と ".." の分で2。
    pub fn new_directory(mode: u32) -> Self {
        Self::new(S_IFDIR | (mode & PERM_MASK), 2)
    }

    fn new(mode: u32, nlink: u32) -> Self {
        let now = unix_now();
        Self {
            mode,
            nlink,
            uid: process_uid(),
            gid: process_gid(),
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// ファイル種別を取得
    pub fn kind(&self) -> FileKind {
        if self.mode & S_IFMT == S_IFDIR {
            FileKind::Directory
        } else {
            FileKind::Regular
        }
    }

    /// 通常ファイルかどうか
    pub fn is_regular(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    /// ディレクトリかどうか
    pub fn is_directory(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// パーミッションビットを取得
    pub fn permissions(&self) -> u32 {
        self.mode & PERM_MASK
    }

    /// パーミッションを変更 (タイプビットは保持)、ctimeを更新
    pub fn set_permissions(&mut self, mode: u32) {
        self.mode = (self.mode & S_IFMT) | (mode & PERM_MASK);
        self.ctime = unix_now();
    }

    /// 所有者を変更、ctimeを更新
    pub fn set_owner(&mut self, uid: u32, gid: u32) {
        self.uid = uid;
        self.gid = gid;
        self.ctime = unix_now();
    }

    /// アクセス時刻を現在時刻に更新
    pub fn touch_atime(&mut self) {
        self.atime = unix_now();
    }

    /// 内容更新時刻を現在時刻に更新
    pub fn touch_mtime(&mut self) {
        self.mtime = unix_now();
    }
}

/// 呼び出しプロセスのUID
pub fn process_uid() -> u32 {
    // SAFETY: getuid(2)は常に成功し、副作用を持たない
    unsafe { libc::getuid() }
}

/// 呼び出しプロセスのGID
pub fn process_gid() -> u32 {
    // SAFETY: getgid(2)は常に成功し、副作用を持たない
    unsafe { libc::getgid() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_mode() {
        let meta = FileMetadata::new_file(0o644);

        assert!(meta.is_regular());
        assert!(!meta.is_directory());
        assert_eq!(meta.kind(), FileKind::Regular);
        assert_eq!(meta.mode, S_IFREG | 0o644);
        assert_eq!(meta.permissions(), 0o644);
        assert_eq!(meta.nlink, 1);
        assert_eq!(meta.size, 0);
    }

    #[test]
    fn test_new_directory_mode() {
        let meta = FileMetadata::new_directory(0o755);

        assert!(meta.is_directory());
        assert_eq!(meta.kind(), FileKind::Directory);
        assert_eq!(meta.mode, S_IFDIR | 0o755);
        assert_eq!(meta.permissions(), 0o755);
        assert_eq!(meta.nlink, 2);
    }

    #[test]
    fn test_mode_masks_extra_bits() {
        // タイプビットを含む値を渡されてもパーミッション部分のみ採用する
        let meta = FileMetadata::new_file(S_IFDIR | 0o4755);
        assert!(meta.is_regular());
        assert_eq!(meta.permissions(), 0o4755);
    }

    #[test]
    fn test_set_permissions_preserves_type() {
        let mut meta = FileMetadata::new_directory(0o755);
        meta.set_permissions(0o700);

        assert!(meta.is_directory());
        assert_eq!(meta.permissions(), 0o700);
    }

    #[test]
    fn test_set_owner() {
        let mut meta = FileMetadata::new_file(0o644);
        meta.set_owner(1234, 5678);

        assert_eq!(meta.uid, 1234);
        assert_eq!(meta.gid, 5678);
    }

    #[test]
    fn test_timestamps_initialized() {
        let meta = FileMetadata::new_file(0o644);

        assert!(meta.atime > 0);
        assert_eq!(meta.atime, meta.mtime);
        assert_eq!(meta.mtime, meta.ctime);
    }
}
