//! Storage accelerator: the top-level coordinator
//!
//! This module provides the full filesystem-facing API. It owns the keyed
//! hasher, the namespace, the load balancer and the fixed bank of simulated
//! drives, and implements block-level routing of read/write traffic plus
//! cross-drive data migration during rename.
//!
//! Routing works on two levels:
//!
//! - **Whole-file routing** for single-shot drive work (DELETE, TRUNCATE):
//!   `hash(path) % num_drives`.
//! - **Block routing** for read/write: the I/O is split into chunks of at
//!   most the configured block size; each chunk at absolute offset `o` is
//!   keyed as `"{path}:{o}"` and hashed independently, so a large file
//!   spreads across the drive bank.
//!
//! Operations that both read and modify metadata hold the namespace lock
//! for their entire duration, including any drive I/O they issue, so
//! external observers see whole operations or nothing.

pub mod error;

pub use error::{errno, result_to_errno, FsError, FsResult};

use std::time::{Duration, Instant};

use crate::balancer::LoadBalancer;
use crate::config::AcceleratorConfig;
use crate::constants::MAX_PATH_LENGTH;
use crate::drive::{
    completion_pair, Drive, DriveError, DriveOutput, DriveResult, IoCommand, IoRequest,
};
use crate::hashing::KeyedHasher;
use crate::metadata::{FileMetadata, Namespace};

/// The storage accelerator
///
/// Construction spins up one worker thread per drive; [`shutdown`]
/// (or drop) stops them again. All operations are safe to call from
/// multiple threads.
///
/// [`shutdown`]: StorageAccelerator::shutdown
pub struct StorageAccelerator {
    hasher: KeyedHasher,
    namespace: Namespace,
    balancer: LoadBalancer,
    drives: Vec<Drive>,
    block_size: usize,
    op_deadline: Duration,
}

impl StorageAccelerator {
    /// Create an accelerator with the given drive count and hash seed,
    /// defaults for everything else.
    pub fn new(num_drives: usize, hash_seed: &str) -> Self {
        let mut config = AcceleratorConfig::default();
        config.accelerator.num_drives = num_drives;
        config.accelerator.hash_seed = hash_seed.to_string();
        Self::with_config(&config)
    }

    /// Create an accelerator from a full configuration
    pub fn with_config(config: &AcceleratorConfig) -> Self {
        let num_drives = config.accelerator.num_drives;
        assert!(num_drives > 0, "accelerator requires at least one drive");

        tracing::info!(
            "Initializing storage accelerator with {} drives (seed={:?}, block_size={})",
            num_drives,
            config.accelerator.hash_seed,
            config.accelerator.block_size
        );

        let latency = config.drive.latency_profile();
        let drives = (0..num_drives)
            .map(|id| Drive::with_options(id, config.drive.queue_capacity, latency.clone()))
            .collect();

        Self {
            hasher: KeyedHasher::new(&config.accelerator.hash_seed),
            namespace: Namespace::new(),
            balancer: LoadBalancer::with_threshold(num_drives, config.drive.max_pending_ops),
            drives,
            block_size: config.accelerator.block_size,
            op_deadline: Duration::from_millis(config.accelerator.op_timeout_ms),
        }
    }

    /// Number of drives in the bank
    pub fn num_drives(&self) -> usize {
        self.drives.len()
    }

    /// Access a drive by index (introspection for tooling and tests)
    pub fn drive(&self, index: usize) -> Option<&Drive> {
        self.drives.get(index)
    }

    /// Access the load balancer counters
    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    /// Stop all drive workers
    ///
    /// Queued requests are drained before each worker exits; submissions
    /// racing with the shutdown complete with an error instead of hanging.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down storage accelerator");
        for drive in &self.drives {
            drive.shutdown();
        }
    }

    // ---- metadata operations -------------------------------------------

    /// Create a regular file
    pub fn create_file(&self, path: &str, mode: u32) -> FsResult<()> {
        self.validate_path(path)?;
        let mut ns = self.namespace.lock();

        if ns.exists(path) {
            tracing::error!("Create file failed: {} already exists", path);
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        ns.add(path, FileMetadata::new_file(mode));
        tracing::info!("File created: {}", path);
        Ok(())
    }

    /// Create a directory
    pub fn create_directory(&self, path: &str, mode: u32) -> FsResult<()> {
        self.validate_path(path)?;
        let mut ns = self.namespace.lock();

        if ns.exists(path) {
            tracing::error!("Create directory failed: {} already exists", path);
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        ns.add(path, FileMetadata::new_directory(mode));
        tracing::info!("Directory created: {}", path);
        Ok(())
    }

    /// Delete a regular file
    ///
    /// The primary drive is told to drop its stored bytes before the
    /// namespace entry goes away; a deadline expiry leaves the namespace
    /// unchanged and surfaces as timed-out.
    pub fn delete_file(&self, path: &str) -> FsResult<()> {
        self.validate_path(path)?;
        let mut ns = self.namespace.lock();

        let meta = ns
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if !meta.is_regular() {
            tracing::error!("Delete file failed: {} is not a regular file", path);
            return Err(FsError::IsDirectory(path.to_string()));
        }

        let primary = self.primary_for_path(path);
        self.submit_and_wait(primary, IoCommand::Delete { path: path.to_string() })?;

        ns.remove(path);
        tracing::info!("File deleted: {}", path);
        Ok(())
    }

    /// Remove an empty directory
    pub fn remove_directory(&self, path: &str) -> FsResult<()> {
        self.validate_path(path)?;
        let mut ns = self.namespace.lock();

        let meta = ns
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if !meta.is_directory() {
            tracing::error!("Remove directory failed: {} is not a directory", path);
            return Err(FsError::NotADirectory(path.to_string()));
        }
        if !ns.list(path).is_empty() {
            tracing::error!("Remove directory failed: {} is not empty", path);
            return Err(FsError::NotEmpty(path.to_string()));
        }

        ns.remove(path);
        tracing::info!("Directory removed: {}", path);
        Ok(())
    }

    /// Rename a file or empty directory
    ///
    /// Regular-file content is migrated chunk by chunk because every chunk
    /// key embeds the path: data written under the old name is unreachable
    /// under the new one until it has been copied to the drives the new
    /// name's chunk keys hash to. The namespace lock is held for the whole
    /// operation, so no partial state is observable; on any migration
    /// failure the namespace is left unchanged.
    pub fn rename(&self, from: &str, to: &str, _flags: u32) -> FsResult<()> {
        self.validate_path(from)?;
        self.validate_path(to)?;
        let mut ns = self.namespace.lock();

        let src_meta = ns
            .get(from)
            .ok_or_else(|| FsError::NotFound(from.to_string()))?;
        if ns.exists(to) {
            tracing::error!("Rename failed: destination {} already exists", to);
            return Err(FsError::AlreadyExists(to.to_string()));
        }
        if src_meta.is_directory() {
            if !ns.list(from).is_empty() {
                tracing::error!("Rename failed: {} is a non-empty directory", from);
                return Err(FsError::InvalidArgument(format!(
                    "cannot rename non-empty directory {}",
                    from
                )));
            }
        } else if src_meta.size > 0 {
            self.migrate_file_data(from, to, src_meta.size)?;
        }

        if src_meta.is_regular() {
            // Drop the source bytes on the whole-file primary. Chunks that
            // landed elsewhere stay behind as unobservable residue.
            let src_primary = self.primary_for_path(from);
            self.submit_and_wait(src_primary, IoCommand::Delete { path: from.to_string() })
                .map_err(|e| {
                    tracing::error!("Rename failed: source cleanup on drive {}: {}", src_primary, e);
                    FsError::Io(format!("rename cleanup failed: {}", e))
                })?;
        }

        ns.add(to, src_meta);
        ns.remove(from);
        tracing::info!("Renamed {} to {}", from, to);
        Ok(())
    }

    /// Change permission bits, preserving the file-type bits
    pub fn chmod(&self, path: &str, mode: u32) -> FsResult<()> {
        self.validate_path(path)?;
        let mut ns = self.namespace.lock();

        if !ns.update(path, |meta| meta.set_permissions(mode)) {
            tracing::error!("Chmod failed: {} does not exist", path);
            return Err(FsError::NotFound(path.to_string()));
        }
        tracing::debug!("Changed mode of {} to {:o}", path, mode & 0o7777);
        Ok(())
    }

    /// Change ownership
    pub fn chown(&self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        self.validate_path(path)?;
        let mut ns = self.namespace.lock();

        if !ns.update(path, |meta| meta.set_owner(uid, gid)) {
            tracing::error!("Chown failed: {} does not exist", path);
            return Err(FsError::NotFound(path.to_string()));
        }
        tracing::debug!("Changed owner of {} to uid={}, gid={}", path, uid, gid);
        Ok(())
    }

    /// Truncate a regular file
    ///
    /// The primary drive resizes its stored bytes first; metadata is
    /// updated only after the drive reports success.
    pub fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        self.validate_path(path)?;
        let mut ns = self.namespace.lock();

        let meta = ns
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if !meta.is_regular() {
            tracing::error!("Truncate failed: {} is not a regular file", path);
            return Err(FsError::IsDirectory(path.to_string()));
        }

        let primary = self.primary_for_path(path);
        self.submit_and_wait(primary, IoCommand::Truncate { path: path.to_string(), size })?;

        ns.update(path, |meta| {
            meta.size = size;
            meta.touch_mtime();
            meta.ctime = crate::metadata::types::unix_now();
        });
        tracing::info!("Truncated {} to {} bytes", path, size);
        Ok(())
    }

    /// Set access and modification times explicitly
    pub fn utimens(&self, path: &str, atime: i64, mtime: i64) -> FsResult<()> {
        self.validate_path(path)?;
        let mut ns = self.namespace.lock();

        if !ns.update(path, |meta| {
            meta.atime = atime;
            meta.mtime = mtime;
        }) {
            tracing::error!("Utimens failed: {} does not exist", path);
            return Err(FsError::NotFound(path.to_string()));
        }
        tracing::debug!("Updated timestamps of {}", path);
        Ok(())
    }

    /// Whether a path exists in the namespace
    pub fn exists(&self, path: &str) -> bool {
        self.namespace.exists(path)
    }

    /// Snapshot of a path's metadata, if present
    pub fn get_metadata(&self, path: &str) -> Option<FileMetadata> {
        self.namespace.get(path)
    }

    /// Immediate children of a directory path (deduplicated, unordered)
    pub fn list_directory(&self, path: &str) -> Vec<String> {
        self.namespace.list(path)
    }

    // ---- data operations -----------------------------------------------

    /// Read file content at an offset
    ///
    /// The request is capped to the file's logical size, split into
    /// block-sized chunks and routed chunk by chunk. A chunk whose target
    /// drive holds no bytes (or fewer than requested) reads as zeros: the
    /// logical size lives in the namespace, drive storage is sparse.
    pub fn read_file(&self, path: &str, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        self.validate_path(path)?;
        let mut ns = self.namespace.lock();

        let meta = ns
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;

        if offset >= meta.size {
            ns.update(path, |meta| meta.touch_atime());
            return Ok(0);
        }

        let capped = buf.len().min((meta.size - offset) as usize);
        let mut total = 0usize;

        while total < capped {
            let chunk_offset = offset + total as u64;
            let chunk_len = (capped - total).min(self.block_size);
            let drive_id = self.route_chunk(path, chunk_offset, chunk_len as u64);

            self.balancer.start_operation(drive_id);
            let started = Instant::now();
            let result = self.submit_and_wait(
                drive_id,
                IoCommand::Read {
                    path: path.to_string(),
                    size: chunk_len as u64,
                    offset: chunk_offset,
                },
            );
            let elapsed = started.elapsed();

            match result {
                Ok(output) => {
                    self.balancer
                        .record_operation(drive_id, output.bytes as u64, elapsed);
                    let got = output.data.len().min(chunk_len);
                    buf[total..total + got].copy_from_slice(&output.data[..got]);
                    buf[total + got..total + chunk_len].fill(0);
                    total += chunk_len;
                }
                Err(DriveError::NotFound(_)) => {
                    // Sparse chunk: nothing ever landed on this drive
                    self.balancer.record_operation(drive_id, 0, elapsed);
                    buf[total..total + chunk_len].fill(0);
                    total += chunk_len;
                }
                Err(e) => {
                    self.balancer.record_operation(drive_id, 0, elapsed);
                    tracing::error!("Read failed on drive {} for {}: {}", drive_id, path, e);
                    if total > 0 {
                        break;
                    }
                    return Err(e.into());
                }
            }
        }

        ns.update(path, |meta| meta.touch_atime());
        tracing::debug!("Read {} bytes from {} (offset={})", total, path, offset);
        Ok(total)
    }

    /// Write file content at an offset
    ///
    /// Split and routed like [`read_file`]; on success the logical size
    /// grows to cover the written range and mtime is refreshed. If a chunk
    /// fails after earlier chunks succeeded, the partial byte count is
    /// returned instead of an error.
    ///
    /// [`read_file`]: StorageAccelerator::read_file
    pub fn write_file(&self, path: &str, data: &[u8], offset: u64) -> FsResult<usize> {
        self.validate_path(path)?;
        let mut ns = self.namespace.lock();

        if !ns.exists(path) {
            tracing::error!("Write failed: {} does not exist", path);
            return Err(FsError::NotFound(path.to_string()));
        }

        let mut total = 0usize;
        let mut failure: Option<DriveError> = None;

        while total < data.len() {
            let chunk_offset = offset + total as u64;
            let chunk_len = (data.len() - total).min(self.block_size);
            let drive_id = self.route_chunk(path, chunk_offset, chunk_len as u64);

            self.balancer.start_operation(drive_id);
            let started = Instant::now();
            let result = self.submit_and_wait(
                drive_id,
                IoCommand::Write {
                    path: path.to_string(),
                    data: data[total..total + chunk_len].to_vec(),
                    offset: chunk_offset,
                },
            );
            let elapsed = started.elapsed();

            match result {
                Ok(output) => {
                    self.balancer
                        .record_operation(drive_id, output.bytes as u64, elapsed);
                    if output.bytes == 0 {
                        break;
                    }
                    total += output.bytes.min(chunk_len);
                }
                Err(e) => {
                    self.balancer.record_operation(drive_id, 0, elapsed);
                    tracing::error!("Write failed on drive {} for {}: {}", drive_id, path, e);
                    failure = Some(e);
                    break;
                }
            }
        }

        if total == 0 {
            if let Some(e) = failure {
                return Err(e.into());
            }
        }

        let end = offset + total as u64;
        ns.update(path, |meta| {
            meta.touch_mtime();
            if end > meta.size {
                meta.size = end;
            }
        });

        tracing::debug!("Wrote {} bytes to {} (offset={})", total, path, offset);
        Ok(total)
    }

    // ---- routing helpers -----------------------------------------------

    /// Whole-file primary drive for a path
    fn primary_for_path(&self, path: &str) -> usize {
        let index = (self.hasher.hash(path.as_bytes()) % self.drives.len() as u64) as usize;
        tracing::trace!("Path {} mapped to drive {}", path, index);
        index
    }

    /// Primary drive for a chunk key `"{path}:{offset}"`
    fn primary_for_chunk(&self, path: &str, offset: u64) -> usize {
        let key = format!("{}:{}", path, offset);
        (self.hasher.hash(key.as_bytes()) % self.drives.len() as u64) as usize
    }

    /// Effective drive for a chunk, after load balancing
    fn route_chunk(&self, path: &str, offset: u64, size: u64) -> usize {
        let primary = self.primary_for_chunk(path, offset);
        self.balancer.select_drive(primary, size)
    }

    /// Submit a command to a drive and await its completion
    fn submit_and_wait(&self, drive_id: usize, command: IoCommand) -> DriveResult<DriveOutput> {
        let (completer, waiter) = completion_pair();
        self.drives[drive_id].submit(IoRequest::new(command, completer))?;
        waiter.wait(self.op_deadline)
    }

    /// Copy a regular file's bytes from its old chunk locations to the new ones
    ///
    /// Chunk keys embed the path, so the source and destination drive of
    /// each block are determined independently by the two names. Reads use
    /// the same sparse semantics as [`read_file`]; writes that fail abort
    /// the migration.
    ///
    /// [`read_file`]: StorageAccelerator::read_file
    fn migrate_file_data(&self, from: &str, to: &str, size: u64) -> FsResult<()> {
        let mut moved = 0u64;
        while moved < size {
            let chunk_len = (size - moved).min(self.block_size as u64);

            let src_drive = self.primary_for_chunk(from, moved);
            let mut chunk = match self.submit_and_wait(
                src_drive,
                IoCommand::Read {
                    path: from.to_string(),
                    size: chunk_len,
                    offset: moved,
                },
            ) {
                Ok(output) => output.data,
                Err(DriveError::NotFound(_)) => Vec::new(),
                Err(e) => {
                    tracing::error!("Rename failed: error reading {} from drive {}: {}", from, src_drive, e);
                    return Err(FsError::Io(format!("rename migration read failed: {}", e)));
                }
            };
            // Sparse source chunks copy over as zeros
            chunk.resize(chunk_len as usize, 0);

            let dst_drive = self.primary_for_chunk(to, moved);
            self.submit_and_wait(
                dst_drive,
                IoCommand::Write {
                    path: to.to_string(),
                    data: chunk,
                    offset: moved,
                },
            )
            .map_err(|e| {
                tracing::error!("Rename failed: error writing {} to drive {}: {}", to, dst_drive, e);
                FsError::Io(format!("rename migration write failed: {}", e))
            })?;

            moved += chunk_len;
        }

        tracing::debug!("Migrated {} bytes from {} to {}", moved, from, to);
        Ok(())
    }

    /// Reject empty, relative or oversized paths
    fn validate_path(&self, path: &str) -> FsResult<()> {
        if path.is_empty() || !path.starts_with('/') {
            return Err(FsError::InvalidArgument(format!(
                "path must be absolute: {:?}",
                path
            )));
        }
        if path.len() > MAX_PATH_LENGTH {
            return Err(FsError::InvalidArgument(format!(
                "path exceeds {} bytes",
                MAX_PATH_LENGTH
            )));
        }
        Ok(())
    }
}

impl Drop for StorageAccelerator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
