//! stripefs Performance Analysis Tool
//!
//! A standalone workload driver for the storage accelerator. Runs a
//! sequential write/read pass over one large striped file, then a
//! concurrent-writers pass with one file per thread, and prints
//! throughput plus per-drive statistics.
//!
//! Usage:
//!   stripefs_perf --drives 16 --payload-size 4194304 --writers 4

use clap::Parser;
use stripefs::accelerator::StorageAccelerator;
use stripefs::config::AcceleratorConfig;
use stripefs::logging;

use std::sync::Arc;
use std::time::{Duration, Instant};

/// stripefs Performance Analysis Tool
#[derive(Parser)]
#[command(name = "stripefs_perf")]
#[command(about = "Workload driver for the stripefs storage accelerator")]
struct Args {
    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Number of simulated drives (overrides config)
    #[arg(long)]
    drives: Option<usize>,

    /// Hash seed string (overrides config)
    #[arg(long)]
    seed: Option<String>,

    /// Payload size in bytes for the sequential pass
    #[arg(long, default_value = "4194304")]
    payload_size: usize,

    /// Number of concurrent writer threads
    #[arg(long, default_value = "4")]
    writers: usize,

    /// Write iterations per writer thread
    #[arg(long, default_value = "100")]
    iterations: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Benchmark statistics
#[derive(Debug, Default)]
struct BenchmarkStats {
    latencies: Vec<Duration>,
    total_bytes: u64,
}

impl BenchmarkStats {
    fn record(&mut self, latency: Duration, bytes: u64) {
        self.latencies.push(latency);
        self.total_bytes += bytes;
    }

    fn report(&self, name: &str, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let mb = self.total_bytes as f64 / (1024.0 * 1024.0);
        let avg_ms = if self.latencies.is_empty() {
            0.0
        } else {
            self.latencies.iter().map(|d| d.as_secs_f64()).sum::<f64>()
                / self.latencies.len() as f64
                * 1e3
        };

        println!(
            "{:<24} {:>10.2} MB {:>10.2} MB/s {:>8.2} ms avg ({} ops)",
            name,
            mb,
            if secs > 0.0 { mb / secs } else { 0.0 },
            avg_ms,
            self.latencies.len()
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    logging::init(&args.log_level);

    let mut config = match &args.config {
        Some(path) => AcceleratorConfig::from_file(path)?,
        None => AcceleratorConfig::default(),
    };
    if let Some(drives) = args.drives {
        config.accelerator.num_drives = drives;
    }
    if let Some(seed) = &args.seed {
        config.accelerator.hash_seed = seed.clone();
    }
    config.validate()?;

    tracing::info!(
        "Starting workload: {} drives, payload {} bytes, {} writers x {} iterations",
        config.accelerator.num_drives,
        args.payload_size,
        args.writers,
        args.iterations
    );

    let fs = Arc::new(StorageAccelerator::with_config(&config));
    let block_size = config.accelerator.block_size;

    // Sequential pass: one large striped file
    let payload: Vec<u8> = (0..args.payload_size).map(|i| (i % 251) as u8).collect();
    fs.create_file("/perf/seq.bin", 0o644)
        .map_err(|e| format!("create failed: {}", e))?;

    let mut write_stats = BenchmarkStats::default();
    let started = Instant::now();
    let mut offset = 0u64;
    for chunk in payload.chunks(block_size * 16) {
        let op_start = Instant::now();
        let written = fs
            .write_file("/perf/seq.bin", chunk, offset)
            .map_err(|e| format!("write failed: {}", e))?;
        write_stats.record(op_start.elapsed(), written as u64);
        offset += written as u64;
    }
    write_stats.report("sequential write", started.elapsed());

    let mut read_stats = BenchmarkStats::default();
    let mut buf = vec![0u8; args.payload_size];
    let started = Instant::now();
    let op_start = Instant::now();
    let read = fs
        .read_file("/perf/seq.bin", &mut buf, 0)
        .map_err(|e| format!("read failed: {}", e))?;
    read_stats.record(op_start.elapsed(), read as u64);
    read_stats.report("sequential read", started.elapsed());

    if buf[..read] != payload[..read] {
        return Err("read-back verification failed".into());
    }

    // Concurrent pass: one small file per writer thread
    let started = Instant::now();
    let mut handles = Vec::new();
    for writer in 0..args.writers {
        let fs = Arc::clone(&fs);
        let iterations = args.iterations;
        handles.push(std::thread::spawn(move || -> Result<u64, String> {
            let path = format!("/perf/writer_{}", writer);
            fs.create_file(&path, 0o644)
                .map_err(|e| format!("create failed: {}", e))?;

            let mut bytes = 0u64;
            for i in 0..iterations {
                let data = vec![(i % 256) as u8; 1024];
                bytes += fs
                    .write_file(&path, &data, 0)
                    .map_err(|e| format!("write failed: {}", e))? as u64;
            }
            Ok(bytes)
        }));
    }

    let mut concurrent_stats = BenchmarkStats::default();
    for handle in handles {
        concurrent_stats.total_bytes += handle.join().expect("writer thread panicked")?;
    }
    concurrent_stats.report("concurrent writes", started.elapsed());

    // Per-drive summary
    println!("\n{:<8} {:>12} {:>12} {:>14}", "drive", "stored paths", "bytes served", "avg latency");
    for i in 0..fs.num_drives() {
        let stats = fs.balancer().snapshot(i);
        let stored = fs.drive(i).map(|d| d.storage_len()).unwrap_or(0);
        println!(
            "{:<8} {:>12} {:>12} {:>11.2} ms",
            i, stored, stats.total_bytes, stats.avg_latency_ms
        );
    }

    fs.shutdown();
    Ok(())
}
