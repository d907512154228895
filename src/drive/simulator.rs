use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::request::{DriveError, DriveOutput, DriveResult, IoCommand, IoRequest, IoType};

/// I/O種別ごとの人工レイテンシ
#[derive(Debug, Clone)]
pub struct LatencyProfile {
    pub read: Duration,
    pub write: Duration,
    pub truncate: Duration,
    pub rename: Duration,
    pub other: Duration,
}

impl LatencyProfile {
    /// レイテンシなしのプロファイル (テスト用)
    pub fn zero() -> Self {
        Self {
            read: Duration::ZERO,
            write: Duration::ZERO,
            truncate: Duration::ZERO,
            rename: Duration::ZERO,
            other: Duration::ZERO,
        }
    }

    /// ミリ秒指定でプロファイルを作成
    pub fn from_millis(read: u64, write: u64, truncate: u64, rename: u64, other: u64) -> Self {
        Self {
            read: Duration::from_millis(read),
            write: Duration::from_millis(write),
            truncate: Duration::from_millis(truncate),
            rename: Duration::from_millis(rename),
            other: Duration::from_millis(other),
        }
    }

    /// I/O種別に対応するレイテンシ
    pub fn for_op(&self, op: IoType) -> Duration {
        match op {
            IoType::Read => self.read,
            IoType::Write => self.write,
            IoType::Truncate => self.truncate,
            IoType::Rename => self.rename,
            _ => self.other,
        }
    }
}

impl Default for LatencyProfile {
    /// READ 2ms / WRITE 3ms / TRUNCATE 2ms / RENAME 2ms / その他 1ms
    fn default() -> Self {
        Self::from_millis(2, 3, 2, 2, 1)
    }
}

/// キュー状態 (リクエスト列 + 停止フラグ)
#[derive(Debug, Default)]
struct QueueState {
    requests: VecDeque<IoRequest>,
    stopping: bool,
}

/// ワーカーと発行側で共有する状態
struct DriveShared {
    id: usize,
    queue: Mutex<QueueState>,
    available: Condvar,
    storage: RwLock<HashMap<String, Vec<u8>>>,
    queue_capacity: usize,
    latency: LatencyProfile,
}

/// シミュレートされたSSDドライブ
///
/// 有界FIFOキューと1本のワーカースレッドを持ち、パス -> バイト列の
/// インメモリマップをストレージとして操作する。各リクエストは種別ごとの
/// 人工レイテンシの後にストレージロック下で実行され、完了ハンドルに
/// 結果が書き込まれる。
///
/// キューが満杯のときの投入は即座にbusyで失敗し、ブロックしない。
/// 停止後の投入はshutting-downで失敗する。
pub struct Drive {
    shared: Arc<DriveShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drive {
    /// デフォルト設定 (容量1000、仕様どおりのレイテンシ) でドライブを作成
    pub fn new(id: usize) -> Self {
        Self::with_options(id, 1000, LatencyProfile::default())
    }

    /// キュー容量とレイテンシを指定してドライブを作成
    ///
    /// ワーカースレッドは構築時に起動する。
    pub fn with_options(id: usize, queue_capacity: usize, latency: LatencyProfile) -> Self {
        tracing::info!("Initializing drive {}", id);

        let shared = Arc::new(DriveShared {
            id,
            queue: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            storage: RwLock::new(HashMap::new()),
            queue_capacity,
            latency,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(format!("drive-{}", id))
            .spawn(move || worker_shared.run())
            .expect("failed to spawn drive worker thread");

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// ドライブID
    pub fn id(&self) -> usize {
        self.shared.id
    }

    /// リクエストを投入
    ///
    /// キュー満杯時は[`DriveError::Busy`]、停止中は
    /// [`DriveError::ShuttingDown`]で即座に失敗する。どちらの場合も
    /// リクエストの完了ハンドルに同じエラーが書き込まれるため、
    /// 待ち側が宙吊りになることはない。
    pub fn submit(&self, request: IoRequest) -> DriveResult<()> {
        let mut queue = self.lock_queue();

        if queue.stopping {
            drop(queue);
            if let Some(completion) = request.completion {
                completion.complete(Err(DriveError::ShuttingDown));
            }
            return Err(DriveError::ShuttingDown);
        }

        if queue.requests.len() >= self.shared.queue_capacity {
            drop(queue);
            tracing::warn!("Drive {} queue is full, rejecting request", self.shared.id);
            if let Some(completion) = request.completion {
                completion.complete(Err(DriveError::Busy));
            }
            return Err(DriveError::Busy);
        }

        queue.requests.push_back(request);
        drop(queue);
        self.shared.available.notify_one();
        Ok(())
    }

    /// 現在のキュー長
    pub fn queue_len(&self) -> usize {
        self.lock_queue().requests.len()
    }

    /// このドライブに格納されているパス数
    pub fn storage_len(&self) -> usize {
        self.shared.read_storage().len()
    }

    /// 指定パスの格納バイト数 (未格納ならNone)
    pub fn stored_size(&self, path: &str) -> Option<usize> {
        self.shared.read_storage().get(path).map(|d| d.len())
    }

    /// ドライブを停止してワーカーを合流させる
    ///
    /// 停止フラグを立てた後もキュー内のリクエストは実行し切ってから
    /// ワーカーが終了する。以降の投入はshutting-downで失敗する。
    pub fn shutdown(&self) {
        {
            let mut queue = self.lock_queue();
            if queue.stopping {
                return;
            }
            queue.stopping = true;
        }
        self.shared.available.notify_all();

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Drive {} worker exited abnormally", self.shared.id);
            }
        }
        tracing::info!("Drive {} shut down", self.shared.id);
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.shared.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Drive {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl DriveShared {
    /// ワーカーループ
    ///
    /// キューからリクエストを1件ずつ取り出し、レイテンシ分スリープして
    /// 実行し、完了ハンドルを埋める。実行中のパニックはリクエスト単位で
    /// 捕捉してI/Oエラーに変換し、ワーカー自体は回り続ける。
    fn run(self: Arc<Self>) {
        tracing::debug!("Drive {} worker started", self.id);

        loop {
            let request = {
                let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
                loop {
                    if let Some(request) = queue.requests.pop_front() {
                        break request;
                    }
                    if queue.stopping {
                        tracing::debug!("Drive {} worker exiting", self.id);
                        return;
                    }
                    queue = self
                        .available
                        .wait(queue)
                        .unwrap_or_else(|e| e.into_inner());
                }
            };

            thread::sleep(self.latency.for_op(request.command.io_type()));

            let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute(&request.command)))
                .unwrap_or_else(|_| {
                    tracing::error!(
                        "Drive {} worker panicked while executing {:?}",
                        self.id,
                        request.command.io_type()
                    );
                    Err(DriveError::Internal("request execution panicked".to_string()))
                });

            if let Some(completion) = request.completion {
                completion.complete(result);
            }
        }
    }

    /// 1件のコマンドをストレージロック下で実行
    fn execute(&self, command: &IoCommand) -> DriveResult<DriveOutput> {
        match command {
            IoCommand::Read { path, size, offset } => {
                let storage = self.read_storage();
                let data = storage
                    .get(path)
                    .ok_or_else(|| DriveError::NotFound(path.clone()))?;

                let offset = (*offset as usize).min(data.len());
                let available = data.len() - offset;
                let to_read = (*size as usize).min(available);
                let out = data[offset..offset + to_read].to_vec();

                tracing::trace!(
                    "Drive {} read {} bytes from {} (offset={})",
                    self.id,
                    to_read,
                    path,
                    offset
                );
                Ok(DriveOutput::data(out))
            }
            IoCommand::Write { path, data, offset } => {
                let mut storage = self.write_storage();
                let buffer = storage.entry(path.clone()).or_default();

                let offset = *offset as usize;
                let end = offset + data.len();
                if end > buffer.len() {
                    // 末尾との間隙はゼロで埋めて伸長する
                    buffer.resize(end, 0);
                }
                buffer[offset..end].copy_from_slice(data);

                tracing::trace!(
                    "Drive {} wrote {} bytes to {} (offset={})",
                    self.id,
                    data.len(),
                    path,
                    offset
                );
                Ok(DriveOutput::bytes(data.len()))
            }
            IoCommand::Truncate { path, size } => {
                let mut storage = self.write_storage();
                let buffer = storage
                    .get_mut(path)
                    .ok_or_else(|| DriveError::NotFound(path.clone()))?;

                buffer.resize(*size as usize, 0);
                tracing::trace!("Drive {} truncated {} to {} bytes", self.id, path, size);
                Ok(DriveOutput::bytes(0))
            }
            IoCommand::Delete { path } => {
                let mut storage = self.write_storage();
                storage.remove(path);
                tracing::trace!("Drive {} deleted {}", self.id, path);
                Ok(DriveOutput::bytes(0))
            }
            // メタデータ系はネームスペースが管理するため、ここでは通知のみ
            IoCommand::Create { path }
            | IoCommand::Mkdir { path }
            | IoCommand::Rmdir { path }
            | IoCommand::Chmod { path }
            | IoCommand::Chown { path }
            | IoCommand::Utimens { path } => {
                tracing::trace!(
                    "Drive {} acknowledged {:?} for {}",
                    self.id,
                    command.io_type(),
                    path
                );
                Ok(DriveOutput::bytes(0))
            }
            IoCommand::Rename { from, to } => {
                tracing::trace!("Drive {} acknowledged rename {} -> {}", self.id, from, to);
                Ok(DriveOutput::bytes(0))
            }
        }
    }

    fn read_storage(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<u8>>> {
        self.storage.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_storage(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<u8>>> {
        self.storage.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::request::completion_pair;

    const WAIT: Duration = Duration::from_secs(5);

    fn test_drive(id: usize) -> Drive {
        Drive::with_options(id, 1000, LatencyProfile::zero())
    }

    fn submit_and_wait(drive: &Drive, command: IoCommand) -> DriveResult<DriveOutput> {
        let (completer, waiter) = completion_pair();
        drive.submit(IoRequest::new(command, completer))?;
        waiter.wait(WAIT)
    }

    #[test]
    fn test_write_then_read() {
        let drive = test_drive(0);

        let out = submit_and_wait(
            &drive,
            IoCommand::Write {
                path: "/f".to_string(),
                data: b"hello".to_vec(),
                offset: 0,
            },
        )
        .unwrap();
        assert_eq!(out.bytes, 5);

        let out = submit_and_wait(
            &drive,
            IoCommand::Read {
                path: "/f".to_string(),
                size: 5,
                offset: 0,
            },
        )
        .unwrap();
        assert_eq!(out.data, b"hello");
    }

    #[test]
    fn test_read_missing_path_fails() {
        let drive = test_drive(0);

        let result = submit_and_wait(
            &drive,
            IoCommand::Read {
                path: "/missing".to_string(),
                size: 1,
                offset: 0,
            },
        );
        assert!(matches!(result, Err(DriveError::NotFound(_))));
    }

    #[test]
    fn test_read_past_end_returns_empty() {
        let drive = test_drive(0);

        submit_and_wait(
            &drive,
            IoCommand::Write {
                path: "/f".to_string(),
                data: vec![1, 2, 3],
                offset: 0,
            },
        )
        .unwrap();

        let out = submit_and_wait(
            &drive,
            IoCommand::Read {
                path: "/f".to_string(),
                size: 10,
                offset: 100,
            },
        )
        .unwrap();
        assert_eq!(out.bytes, 0);
        assert!(out.data.is_empty());
    }

    #[test]
    fn test_write_gap_zero_fills() {
        let drive = test_drive(0);

        submit_and_wait(
            &drive,
            IoCommand::Write {
                path: "/f".to_string(),
                data: vec![0xAB; 4],
                offset: 8,
            },
        )
        .unwrap();

        let out = submit_and_wait(
            &drive,
            IoCommand::Read {
                path: "/f".to_string(),
                size: 12,
                offset: 0,
            },
        )
        .unwrap();
        assert_eq!(&out.data[..8], &[0u8; 8]);
        assert_eq!(&out.data[8..], &[0xAB; 4]);
    }

    #[test]
    fn test_truncate_shrink_and_grow() {
        let drive = test_drive(0);

        submit_and_wait(
            &drive,
            IoCommand::Write {
                path: "/f".to_string(),
                data: vec![0xFF; 8],
                offset: 0,
            },
        )
        .unwrap();

        submit_and_wait(
            &drive,
            IoCommand::Truncate {
                path: "/f".to_string(),
                size: 4,
            },
        )
        .unwrap();
        assert_eq!(drive.stored_size("/f"), Some(4));

        submit_and_wait(
            &drive,
            IoCommand::Truncate {
                path: "/f".to_string(),
                size: 6,
            },
        )
        .unwrap();
        let out = submit_and_wait(
            &drive,
            IoCommand::Read {
                path: "/f".to_string(),
                size: 6,
                offset: 0,
            },
        )
        .unwrap();
        assert_eq!(out.data, vec![0xFF, 0xFF, 0xFF, 0xFF, 0, 0]);
    }

    #[test]
    fn test_truncate_missing_path_fails() {
        let drive = test_drive(0);

        let result = submit_and_wait(
            &drive,
            IoCommand::Truncate {
                path: "/missing".to_string(),
                size: 0,
            },
        );
        assert!(matches!(result, Err(DriveError::NotFound(_))));
    }

    #[test]
    fn test_delete_removes_entry_and_is_idempotent() {
        let drive = test_drive(0);

        submit_and_wait(
            &drive,
            IoCommand::Write {
                path: "/f".to_string(),
                data: vec![1],
                offset: 0,
            },
        )
        .unwrap();
        assert_eq!(drive.storage_len(), 1);

        submit_and_wait(&drive, IoCommand::Delete { path: "/f".to_string() }).unwrap();
        assert_eq!(drive.storage_len(), 0);

        // 存在しないパスのDELETEも成功する
        submit_and_wait(&drive, IoCommand::Delete { path: "/f".to_string() }).unwrap();
    }

    #[test]
    fn test_advisory_ops_complete_without_state_change() {
        let drive = test_drive(0);

        for command in [
            IoCommand::Create { path: "/f".to_string() },
            IoCommand::Mkdir { path: "/d".to_string() },
            IoCommand::Rmdir { path: "/d".to_string() },
            IoCommand::Chmod { path: "/f".to_string() },
            IoCommand::Chown { path: "/f".to_string() },
            IoCommand::Utimens { path: "/f".to_string() },
            IoCommand::Rename { from: "/f".to_string(), to: "/g".to_string() },
        ] {
            let out = submit_and_wait(&drive, command).unwrap();
            assert_eq!(out.bytes, 0);
        }
        assert_eq!(drive.storage_len(), 0);
    }

    #[test]
    fn test_queue_full_rejects_with_busy() {
        // 容量2の小さいキュー + 遅いレイテンシで飽和させる
        let drive = Drive::with_options(0, 2, LatencyProfile::from_millis(0, 200, 0, 0, 0));

        let mut waiters = Vec::new();
        let mut busy = 0;
        for _ in 0..8 {
            let (completer, waiter) = completion_pair();
            let request = IoRequest::new(
                IoCommand::Write {
                    path: "/f".to_string(),
                    data: vec![0u8; 16],
                    offset: 0,
                },
                completer,
            );
            match drive.submit(request) {
                Ok(()) => waiters.push(waiter),
                Err(DriveError::Busy) => {
                    busy += 1;
                    waiters.push(waiter);
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert!(busy > 0, "expected at least one busy rejection");

        // busyで弾かれた分も含め、全ての待ちが速やかに解決する
        for waiter in waiters {
            let _ = waiter.wait(WAIT);
        }
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let drive = test_drive(0);
        drive.shutdown();

        let (completer, waiter) = completion_pair();
        let result = drive.submit(IoRequest::new(
            IoCommand::Delete { path: "/f".to_string() },
            completer,
        ));
        assert!(matches!(result, Err(DriveError::ShuttingDown)));
        assert!(matches!(
            waiter.wait(Duration::from_millis(100)),
            Err(DriveError::ShuttingDown)
        ));
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let drive = test_drive(0);

        let (completer, waiter) = completion_pair();
        drive
            .submit(IoRequest::new(
                IoCommand::Write {
                    path: "/f".to_string(),
                    data: vec![7; 3],
                    offset: 0,
                },
                completer,
            ))
            .unwrap();

        drive.shutdown();

        // 停止前に投入済みのリクエストは完了している
        let out = waiter.wait(Duration::from_millis(100)).unwrap();
        assert_eq!(out.bytes, 3);
        assert_eq!(drive.stored_size("/f"), Some(3));
    }

    #[test]
    fn test_concurrent_reads_shared_lock() {
        let drive = Arc::new(test_drive(0));

        submit_and_wait(
            &drive,
            IoCommand::Write {
                path: "/f".to_string(),
                data: vec![9; 64],
                offset: 0,
            },
        )
        .unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let drive = Arc::clone(&drive);
            handles.push(thread::spawn(move || {
                for _ in 0..16 {
                    let (completer, waiter) = completion_pair();
                    drive
                        .submit(IoRequest::new(
                            IoCommand::Read {
                                path: "/f".to_string(),
                                size: 64,
                                offset: 0,
                            },
                            completer,
                        ))
                        .unwrap();
                    let out = waiter.wait(WAIT).unwrap();
                    assert_eq!(out.data, vec![9; 64]);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
