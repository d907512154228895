use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// プライマリドライブを迂回させるpending数のしきい値
pub const MAX_PENDING_OPS: usize = 1000;

/// ドライブごとの負荷カウンタ
///
/// 全てロックフリーのアトミクス。平均レイテンシはf64のビット表現を
/// AtomicU64に格納する。
#[derive(Debug, Default)]
struct DriveStats {
    /// 実行中 (投入済み・未記録) のオペレーション数
    pending_ops: AtomicUsize,

    /// 累計転送バイト数
    total_bytes: AtomicU64,

    /// 平均レイテンシ (ミリ秒, f64ビット表現)
    avg_latency_bits: AtomicU64,
}

/// 統計のスナップショット
#[derive(Debug, Clone, Copy)]
pub struct DriveStatsSnapshot {
    pub pending_ops: usize,
    pub total_bytes: u64,
    pub avg_latency_ms: f64,
}

/// ロードバランサ
///
/// ハッシュで決まったプライマリドライブが過負荷のときだけ、最もpendingの
/// 少ないドライブへ迂回させる。選択は助言的なルーティングであり、データが
/// 過去にどこへ置かれたかは追跡しない。
pub struct LoadBalancer {
    stats: Vec<DriveStats>,
    max_pending_ops: usize,
}

impl LoadBalancer {
    /// ドライブ数を指定してロードバランサを作成
    pub fn new(num_drives: usize) -> Self {
        Self::with_threshold(num_drives, MAX_PENDING_OPS)
    }

    /// 迂回しきい値を指定してロードバランサを作成
    pub fn with_threshold(num_drives: usize, max_pending_ops: usize) -> Self {
        let stats = (0..num_drives).map(|_| DriveStats::default()).collect();
        Self {
            stats,
            max_pending_ops,
        }
    }

    /// ドライブ数
    pub fn num_drives(&self) -> usize {
        self.stats.len()
    }

    /// オペレーション開始を記録 (pendingをインクリメント)
    pub fn start_operation(&self, drive_id: usize) {
        if let Some(stats) = self.stats.get(drive_id) {
            stats.pending_ops.fetch_add(1, Ordering::Relaxed);
        } else {
            tracing::error!("Invalid drive ID in start_operation: {}", drive_id);
        }
    }

    /// オペレーション完了を記録
    ///
    /// バイト数を加算し、レイテンシを平均に畳み込み、pendingを減らす。
    /// pendingのアンダーフローは検出してログに残す。
    pub fn record_operation(&self, drive_id: usize, bytes: u64, elapsed: Duration) {
        let Some(stats) = self.stats.get(drive_id) else {
            tracing::error!("Invalid drive ID in record_operation: {}", drive_id);
            return;
        };

        stats.total_bytes.fetch_add(bytes, Ordering::Relaxed);

        let elapsed_ms = elapsed.as_secs_f64() * 1e3;
        let _ = stats
            .avg_latency_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let old = f64::from_bits(bits);
                Some(((old + elapsed_ms) / 2.0).to_bits())
            });

        let old_pending = stats.pending_ops.fetch_sub(1, Ordering::Relaxed);
        if old_pending == 0 {
            tracing::error!("Pending ops underflow for drive {}", drive_id);
        }

        if elapsed_ms > 100.0 {
            tracing::info!(
                "High latency operation on drive {}: {:.2}ms",
                drive_id,
                elapsed_ms
            );
        }
    }

    /// 実効ドライブを選択
    ///
    /// プライマリのpendingがしきい値未満ならプライマリをそのまま返す。
    /// 過負荷なら全ドライブを走査して最小pendingのドライブを返す
    /// (同値なら先に見つかった低いインデックスが勝つ)。
    pub fn select_drive(&self, primary: usize, _size: u64) -> usize {
        let Some(primary_stats) = self.stats.get(primary) else {
            tracing::error!("Invalid primary drive index: {}", primary);
            return 0;
        };

        let primary_pending = primary_stats.pending_ops.load(Ordering::Relaxed);
        if primary_pending < self.max_pending_ops {
            return primary;
        }

        let mut selected = primary;
        let mut min_ops = primary_pending;
        for (i, stats) in self.stats.iter().enumerate() {
            let pending = stats.pending_ops.load(Ordering::Relaxed);
            if pending < min_ops {
                min_ops = pending;
                selected = i;
            }
        }

        if selected != primary {
            tracing::debug!(
                "Load balanced: redirecting from drive {} to {}",
                primary,
                selected
            );
        }

        selected
    }

    /// 実行中のオペレーション数
    pub fn pending_ops(&self, drive_id: usize) -> usize {
        self.stats
            .get(drive_id)
            .map(|s| s.pending_ops.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// 累計転送バイト数
    pub fn total_bytes(&self, drive_id: usize) -> u64 {
        self.stats
            .get(drive_id)
            .map(|s| s.total_bytes.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// 平均レイテンシ (ミリ秒)
    pub fn avg_latency_ms(&self, drive_id: usize) -> f64 {
        self.stats
            .get(drive_id)
            .map(|s| f64::from_bits(s.avg_latency_bits.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    /// ドライブ統計のスナップショットを取得
    pub fn snapshot(&self, drive_id: usize) -> DriveStatsSnapshot {
        DriveStatsSnapshot {
            pending_ops: self.pending_ops(drive_id),
            total_bytes: self.total_bytes(drive_id),
            avg_latency_ms: self.avg_latency_ms(drive_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_primary_when_idle() {
        let lb = LoadBalancer::new(4);

        assert_eq!(lb.select_drive(2, 4096), 2);
        assert_eq!(lb.select_drive(0, 0), 0);
    }

    #[test]
    fn test_redirect_when_primary_hot() {
        let lb = LoadBalancer::with_threshold(4, 2);

        // ドライブ1を飽和させる
        lb.start_operation(1);
        lb.start_operation(1);
        // ドライブ0にも少し負荷をかける
        lb.start_operation(0);

        // 最小pending (0) のうち最初に見つかるのはドライブ2
        assert_eq!(lb.select_drive(1, 4096), 2);
    }

    #[test]
    fn test_tie_breaks_to_lowest_index() {
        let lb = LoadBalancer::with_threshold(4, 1);

        lb.start_operation(2);
        // 全候補のpendingが0なのでインデックス0が選ばれる
        assert_eq!(lb.select_drive(2, 0), 0);
    }

    #[test]
    fn test_record_operation_updates_counters() {
        let lb = LoadBalancer::new(2);

        lb.start_operation(0);
        assert_eq!(lb.pending_ops(0), 1);

        lb.record_operation(0, 4096, Duration::from_millis(10));
        assert_eq!(lb.pending_ops(0), 0);
        assert_eq!(lb.total_bytes(0), 4096);
        assert!(lb.avg_latency_ms(0) > 0.0);
    }

    #[test]
    fn test_latency_average_folds() {
        let lb = LoadBalancer::new(1);

        lb.start_operation(0);
        lb.record_operation(0, 0, Duration::from_millis(10));
        let first = lb.avg_latency_ms(0);

        lb.start_operation(0);
        lb.record_operation(0, 0, Duration::from_millis(30));
        let second = lb.avg_latency_ms(0);

        // (old + new) / 2 の単純平均
        assert!((first - 5.0).abs() < 1.0);
        assert!((second - (first + 30.0) / 2.0).abs() < 1.0);
    }

    #[test]
    fn test_underflow_does_not_panic() {
        let lb = LoadBalancer::new(1);

        // startなしのrecordはログに残るだけでクラッシュしない
        lb.record_operation(0, 0, Duration::from_millis(1));
    }

    #[test]
    fn test_invalid_indices_are_tolerated() {
        let lb = LoadBalancer::new(2);

        lb.start_operation(99);
        lb.record_operation(99, 1, Duration::from_millis(1));
        assert_eq!(lb.select_drive(99, 0), 0);
        assert_eq!(lb.pending_ops(99), 0);
    }

    #[test]
    fn test_concurrent_counting() {
        use std::sync::Arc;
        use std::thread;

        let lb = Arc::new(LoadBalancer::new(2));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let lb = Arc::clone(&lb);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    lb.start_operation(0);
                    lb.record_operation(0, 1, Duration::from_micros(10));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(lb.pending_ops(0), 0);
        assert_eq!(lb.total_bytes(0), 4000);
    }
}
