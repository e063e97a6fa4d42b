// logging/packets.rs — process-wide packet capture
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use chrono::Utc;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use world_protocol::WorldPacket;

use super::record::{self, Direction, Header};
use crate::config::CaptureConfig;
use crate::errors::CaptureError;

static CONFIG: OnceCell<CaptureConfig> = OnceCell::new();
static INSTANCE: OnceCell<PacketLog> = OnceCell::new();

/// Install the configuration used by [`PacketLog::instance`]. Only the first
/// call wins; returns false if a configuration was already installed.
pub fn configure(config: CaptureConfig) -> bool {
    CONFIG.set(config).is_ok()
}

/// Lifecycle of a [`PacketLog`]. `Enabled`, `Disabled` and `Closed` never
/// go back to an earlier state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Uninitialized = 0,
    Initializing = 1,
    Enabled = 2,
    Disabled = 3,
    Closed = 4,
}

impl CaptureState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => CaptureState::Uninitialized,
            1 => CaptureState::Initializing,
            2 => CaptureState::Enabled,
            3 => CaptureState::Disabled,
            _ => CaptureState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub records_written: u64,
    pub bytes_written: u64,
    pub write_failures: u64,
}

struct Sink {
    file: File,
    /// Reused encode buffer; one record at a time.
    scratch: Vec<u8>,
    /// End of the last complete record.
    offset: u64,
}

/// Records every packet handed to [`log_packet`](Self::log_packet) into one
/// binary capture file.
///
/// Setup runs once, on the first [`initialize`](Self::initialize); racing
/// callers block until it finishes. Afterwards writers only contend on the
/// file lock. Nothing here returns an error to the caller: failures turn into
/// "capture off" or a bumped failure counter.
pub struct PacketLog {
    config: CaptureConfig,
    state: AtomicU8,
    init: OnceCell<()>,
    sink: Mutex<Option<Sink>>,
    records_written: AtomicU64,
    bytes_written: AtomicU64,
    write_failures: AtomicU64,
    warned: AtomicBool,
}

impl PacketLog {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(CaptureState::Uninitialized as u8),
            init: OnceCell::new(),
            sink: Mutex::new(None),
            records_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            warned: AtomicBool::new(false),
        }
    }

    /// The process-wide instance, built on first access from the configuration
    /// passed to [`configure`] (capture disabled if none was installed).
    ///
    /// Statics are never dropped, so call [`shutdown`](Self::shutdown) at
    /// process teardown to flush and close the file.
    pub fn instance() -> &'static PacketLog {
        INSTANCE.get_or_init(|| PacketLog::new(CONFIG.get().cloned().unwrap_or_default()))
    }

    pub fn initialize(&self) {
        self.init.get_or_init(|| {
            if self
                .state
                .compare_exchange(
                    CaptureState::Uninitialized as u8,
                    CaptureState::Initializing as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
            {
                // shut down before anyone initialized it
                return;
            }

            let Some(path) = self.config.capture_path() else {
                info!("packet capture disabled by configuration");
                self.finish_init(CaptureState::Disabled);
                return;
            };

            if let Err(e) = self.open(&path) {
                warn!(error = %e, "packet capture disabled");
                self.finish_init(CaptureState::Disabled);
            }
        });
    }

    fn open(&self, path: &Path) -> Result<(), CaptureError> {
        // shutdown() moves the state under this lock; nothing is created after it
        let mut guard = self.sink.lock();
        if self.state() != CaptureState::Initializing {
            return Ok(());
        }

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| CaptureError::Open {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| CaptureError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let header = Header::new(self.config.build, &self.config.locale).encode();
        file.write_all(&header)?;

        *guard = Some(Sink {
            file,
            scratch: Vec::with_capacity(256),
            offset: header.len() as u64,
        });
        self.finish_init(CaptureState::Enabled);
        info!(path = %path.display(), "packet capture enabled");
        Ok(())
    }

    fn finish_init(&self, next: CaptureState) -> bool {
        self.state
            .compare_exchange(
                CaptureState::Initializing as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Cheap check for the hot path; no lock taken.
    #[inline]
    pub fn can_log_packet(&self) -> bool {
        self.state() == CaptureState::Enabled
    }

    #[inline]
    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Append one record. A no-op unless capture is enabled.
    pub fn log_packet(&self, packet: &WorldPacket, direction: Direction, addr: IpAddr, port: u16) {
        if !self.can_log_packet() {
            return;
        }

        let mut guard = self.sink.lock();
        let Some(sink) = guard.as_mut() else {
            return;
        };

        sink.scratch.clear();
        let timestamp_us = Utc::now().timestamp_micros();
        let result = record::encode_record(
            &mut sink.scratch,
            timestamp_us,
            direction,
            addr,
            port,
            packet.opcode(),
            packet.payload(),
        )
        .and_then(|()| sink.file.write_all(&sink.scratch).map_err(CaptureError::from));

        match result {
            Ok(()) => {
                let n = sink.scratch.len() as u64;
                sink.offset += n;
                self.records_written.fetch_add(1, Ordering::Relaxed);
                self.bytes_written.fetch_add(n, Ordering::Relaxed);
                trace!(?direction, opcode = packet.opcode(), len = packet.len(), "packet captured");
            }
            Err(e) => {
                self.record_failure(&e);
                // drop whatever part of the record made it to disk
                let offset = sink.offset;
                let rollback = sink
                    .file
                    .set_len(offset)
                    .and_then(|()| sink.file.seek(SeekFrom::Start(offset)));
                if let Err(e) = rollback {
                    // later records would land after a torn one
                    *guard = None;
                    self.state.store(CaptureState::Closed as u8, Ordering::Release);
                    warn!(error = %e, "packet capture stopped: could not discard a partial record");
                }
            }
        }
    }

    fn record_failure(&self, e: &CaptureError) {
        let n = self.write_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!(error = %e, "packet capture write failed; further failures are only counted");
        } else {
            debug!(failures = n, "packet capture write failed");
        }
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Flush and close the capture file. Terminal: later calls to
    /// `initialize` and `log_packet` do nothing.
    pub fn shutdown(&self) {
        let mut guard = self.sink.lock();
        self.state.store(CaptureState::Closed as u8, Ordering::Release);
        if let Some(mut sink) = guard.take() {
            if let Err(e) = sink.file.flush().and_then(|()| sink.file.sync_all()) {
                warn!(error = %e, "packet capture close failed");
            }
            debug!(bytes = sink.offset, "packet capture closed");
        }
    }
}

impl Drop for PacketLog {
    fn drop(&mut self) {
        self.shutdown();
    }
}
