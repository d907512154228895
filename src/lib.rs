//! stripefs - A Striped In-Memory Filesystem Core over Simulated SSDs
//!
//! stripefs presents a POSIX-like directory tree whose file contents are
//! striped across a fixed bank of simulated solid-state drives. It is the
//! core behind a userspace-filesystem bridge: the bridge translates kernel
//! upcalls into calls on a central storage accelerator, which routes
//! block-level work to one of N drives by keyed hashing and rebalances at
//! runtime when the primary drive is overloaded. It features:
//!
//! - **Block-Level Routing**: Reads and writes are split into 4KB chunks;
//!   each chunk is routed independently by a keyed hash of `path:offset`,
//!   so large files spread across the whole drive bank
//! - **Simulated Drives**: Each drive owns a bounded request queue, one
//!   worker thread, an in-memory byte store behind a reader/writer lock,
//!   and a per-operation artificial latency profile
//! - **Load Balancing**: Lock-free per-drive counters (pending ops, bytes
//!   served, average latency) redirect traffic away from hot drives
//! - **Path-Keyed Namespace**: One mutex-guarded map from absolute path to
//!   POSIX-style metadata; directory structure is implicit in the paths
//! - **Completion Handles**: Every drive request carries a one-shot
//!   completion the submitter awaits with a deadline; abandoned results
//!   are discarded instead of crashing the worker
//!
//! # Architecture
//!
//! stripefs consists of several key components:
//!
//! - **Accelerator** ([`accelerator`]): The top-level object exposing the
//!   filesystem API; owns the hasher, namespace, load balancer and drives,
//!   and implements routing and cross-drive migration during rename
//! - **Drive Subsystem** ([`drive`]): Request/completion types and the
//!   simulated SSD with its queue, worker and storage map
//! - **Namespace** ([`metadata`]): File metadata records and the
//!   process-wide path map with its single mutex
//! - **Load Balancer** ([`balancer`]): Atomic per-drive statistics and
//!   drive selection
//! - **Hashing** ([`hashing`]): Deterministic 64-bit keyed hashing for
//!   whole-file and chunk placement
//!
//! # Example
//!
//! ```rust,no_run
//! use stripefs::accelerator::StorageAccelerator;
//!
//! let fs = StorageAccelerator::new(16, "default_seed");
//!
//! fs.create_file("/hello.txt", 0o644)?;
//! fs.write_file("/hello.txt", b"Hello, stripefs!", 0)?;
//!
//! let mut buf = [0u8; 16];
//! let n = fs.read_file("/hello.txt", &mut buf, 0)?;
//! assert_eq!(&buf[..n], b"Hello, stripefs!");
//! # Ok::<(), stripefs::accelerator::FsError>(())
//! ```

pub mod accelerator;
pub mod balancer;
pub mod config;
pub mod constants;
pub mod drive;
pub mod hashing;
pub mod logging;
pub mod metadata;
