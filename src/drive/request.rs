use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

/// ドライブが処理するI/O種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoType {
    Create,
    Read,
    Write,
    Delete,
    Truncate,
    Mkdir,
    Rmdir,
    Rename,
    Chmod,
    Chown,
    Utimens,
}

/// ドライブへのI/Oコマンド
///
/// READ/WRITE/TRUNCATE/DELETEのみがドライブのストレージを操作する。
/// 残りの種別は通知のみで、ドライブ側の状態は変化しない (メタデータは
/// ネームスペースが管理する)。
#[derive(Debug, Clone)]
pub enum IoCommand {
    Create { path: String },
    Read { path: String, size: u64, offset: u64 },
    Write { path: String, data: Vec<u8>, offset: u64 },
    Delete { path: String },
    Truncate { path: String, size: u64 },
    Mkdir { path: String },
    Rmdir { path: String },
    Rename { from: String, to: String },
    Chmod { path: String },
    Chown { path: String },
    Utimens { path: String },
}

impl IoCommand {
    /// コマンドのI/O種別
    pub fn io_type(&self) -> IoType {
        match self {
            IoCommand::Create { .. } => IoType::Create,
            IoCommand::Read { .. } => IoType::Read,
            IoCommand::Write { .. } => IoType::Write,
            IoCommand::Delete { .. } => IoType::Delete,
            IoCommand::Truncate { .. } => IoType::Truncate,
            IoCommand::Mkdir { .. } => IoType::Mkdir,
            IoCommand::Rmdir { .. } => IoType::Rmdir,
            IoCommand::Rename { .. } => IoType::Rename,
            IoCommand::Chmod { .. } => IoType::Chmod,
            IoCommand::Chown { .. } => IoType::Chown,
            IoCommand::Utimens { .. } => IoType::Utimens,
        }
    }

    /// 対象パス (RENAMEは移動元)
    pub fn path(&self) -> &str {
        match self {
            IoCommand::Create { path }
            | IoCommand::Read { path, .. }
            | IoCommand::Write { path, .. }
            | IoCommand::Delete { path }
            | IoCommand::Truncate { path, .. }
            | IoCommand::Mkdir { path }
            | IoCommand::Rmdir { path }
            | IoCommand::Chmod { path }
            | IoCommand::Chown { path }
            | IoCommand::Utimens { path } => path,
            IoCommand::Rename { from, .. } => from,
        }
    }
}

/// ドライブエラー
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriveError {
    #[error("Path not found on drive: {0}")]
    NotFound(String),

    #[error("Request queue is full")]
    Busy,

    #[error("Drive is shutting down")]
    ShuttingDown,

    #[error("Operation timed out")]
    Timeout,

    #[error("Request was canceled before completion")]
    Canceled,

    #[error("Internal drive error: {0}")]
    Internal(String),
}

pub type DriveResult<T> = Result<T, DriveError>;

/// ドライブワーカーが完了時に返す結果
#[derive(Debug, Clone, Default)]
pub struct DriveOutput {
    /// 転送バイト数
    pub bytes: usize,

    /// READの場合の読み出しデータ (それ以外は空)
    pub data: Vec<u8>,
}

impl DriveOutput {
    /// データなしの完了 (WRITEのバイト数報告など)
    pub fn bytes(bytes: usize) -> Self {
        Self { bytes, data: Vec::new() }
    }

    /// READデータ付きの完了
    pub fn data(data: Vec<u8>) -> Self {
        Self { bytes: data.len(), data }
    }
}

/// 完了ハンドルのペアを作成
///
/// ワーカーが[`IoCompleter`]で結果を書き込み、発行側が[`IoWaiter`]で
/// デッドライン付きで待つ。待ち側が先にドロップしていても書き込みは
/// 単に破棄される (ワーカーは落ちない)。
pub fn completion_pair() -> (IoCompleter, IoWaiter) {
    let (tx, rx) = mpsc::sync_channel(1);
    (IoCompleter { tx }, IoWaiter { rx })
}

/// 完了通知の書き込み側
#[derive(Debug)]
pub struct IoCompleter {
    tx: SyncSender<DriveResult<DriveOutput>>,
}

impl IoCompleter {
    /// リクエストを完了させる
    ///
    /// 受信側がタイムアウトで離脱済みの場合は何もしない。
    pub fn complete(self, result: DriveResult<DriveOutput>) {
        let _ = self.tx.send(result);
    }
}

/// 完了通知の待ち受け側
#[derive(Debug)]
pub struct IoWaiter {
    rx: Receiver<DriveResult<DriveOutput>>,
}

impl IoWaiter {
    /// デッドライン付きで完了を待つ
    ///
    /// デッドライン超過は[`DriveError::Timeout`]、完了前にワーカー側が
    /// ハンドルを失った場合は[`DriveError::Canceled`]になる。
    pub fn wait(self, deadline: Duration) -> DriveResult<DriveOutput> {
        match self.rx.recv_timeout(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(DriveError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(DriveError::Canceled),
        }
    }
}

/// キューに載せる1件のリクエスト
#[derive(Debug)]
pub struct IoRequest {
    /// 実行するコマンド
    pub command: IoCommand,

    /// 完了ハンドル (不要な発行元はNone)
    pub completion: Option<IoCompleter>,
}

impl IoRequest {
    /// 完了通知付きのリクエストを作成
    pub fn new(command: IoCommand, completion: IoCompleter) -> Self {
        Self {
            command,
            completion: Some(completion),
        }
    }

    /// 完了通知なしのリクエストを作成
    pub fn fire_and_forget(command: IoCommand) -> Self {
        Self {
            command,
            completion: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_roundtrip() {
        let (completer, waiter) = completion_pair();
        completer.complete(Ok(DriveOutput::bytes(42)));

        let output = waiter.wait(Duration::from_secs(1)).unwrap();
        assert_eq!(output.bytes, 42);
        assert!(output.data.is_empty());
    }

    #[test]
    fn test_wait_timeout() {
        let (_completer, waiter) = completion_pair();

        let result = waiter.wait(Duration::from_millis(10));
        assert!(matches!(result, Err(DriveError::Timeout)));
    }

    #[test]
    fn test_complete_after_waiter_dropped_is_noop() {
        let (completer, waiter) = completion_pair();
        drop(waiter);

        // 受信側が消えていてもパニックしない
        completer.complete(Ok(DriveOutput::bytes(1)));
    }

    #[test]
    fn test_wait_on_dropped_completer_is_canceled() {
        let (completer, waiter) = completion_pair();
        drop(completer);

        let result = waiter.wait(Duration::from_millis(10));
        assert!(matches!(result, Err(DriveError::Canceled)));
    }

    #[test]
    fn test_command_io_type() {
        let cmd = IoCommand::Read {
            path: "/a".to_string(),
            size: 10,
            offset: 0,
        };
        assert_eq!(cmd.io_type(), IoType::Read);
        assert_eq!(cmd.path(), "/a");

        let cmd = IoCommand::Rename {
            from: "/a".to_string(),
            to: "/b".to_string(),
        };
        assert_eq!(cmd.io_type(), IoType::Rename);
        assert_eq!(cmd.path(), "/a");
    }
}
