//! アクセラレータAPIのエラー型とブリッジ向けのエラーコード変換
//!
//! コアAPIは`Result`を返すが、カーネルブリッジ側の規約は
//! 「0または転送バイト数が成功、負の整数がエラー」であるため、
//! 各エラー種別をPOSIX風の負のコードにマッピングする。

use crate::drive::DriveError;

/// ファイルシステム操作のエラー
#[derive(Debug, Clone, thiserror::Error)]
pub enum FsError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Is a directory: {0}")]
    IsDirectory(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Operation timed out: {0}")]
    TimedOut(String),

    #[error("Device busy: {0}")]
    Busy(String),
}

pub type FsResult<T> = Result<T, FsError>;

/// POSIX風エラーコード (負値)
pub mod errno {
    pub const SUCCESS: i32 = 0;
    pub const ENOENT: i32 = -2;
    pub const EIO: i32 = -5;
    pub const EBUSY: i32 = -16;
    pub const EEXIST: i32 = -17;
    pub const ENOTDIR: i32 = -20;
    pub const EISDIR: i32 = -21;
    pub const EINVAL: i32 = -22;
    pub const ENOTEMPTY: i32 = -39;
    pub const ETIMEDOUT: i32 = -110;
}

impl FsError {
    /// 対応する負のエラーコード
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => errno::ENOENT,
            FsError::AlreadyExists(_) => errno::EEXIST,
            FsError::IsDirectory(_) => errno::EISDIR,
            FsError::NotADirectory(_) => errno::ENOTDIR,
            FsError::NotEmpty(_) => errno::ENOTEMPTY,
            FsError::InvalidArgument(_) => errno::EINVAL,
            FsError::Io(_) => errno::EIO,
            FsError::TimedOut(_) => errno::ETIMEDOUT,
            FsError::Busy(_) => errno::EBUSY,
        }
    }
}

impl From<DriveError> for FsError {
    fn from(e: DriveError) -> Self {
        match e {
            DriveError::NotFound(path) => FsError::NotFound(path),
            DriveError::Busy => FsError::Busy("drive queue is full".to_string()),
            DriveError::Timeout => FsError::TimedOut("drive operation deadline expired".to_string()),
            // 停止・キャンセル・内部エラーはブリッジにはI/Oエラーとして見せる
            DriveError::ShuttingDown => FsError::Io("drive is shutting down".to_string()),
            DriveError::Canceled => FsError::Io("drive request was canceled".to_string()),
            DriveError::Internal(msg) => FsError::Io(msg),
        }
    }
}

/// `Result`をブリッジ規約のエラーコードへ変換
///
/// 成功は0、失敗は対応する負のコード。
pub fn result_to_errno<T>(result: &FsResult<T>) -> i32 {
    match result {
        Ok(_) => errno::SUCCESS,
        Err(e) => e.errno(),
    }
}
