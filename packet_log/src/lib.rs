//! Binary packet capture for the world server.
//!
//! A connection thread asks [`PacketLog::can_log_packet`] and, if capture is
//! on, hands each inbound or outbound packet to [`PacketLog::log_packet`].
//! Records land in one file behind a single lock; see [`logging::record`]
//! for the on-disk layout.
//!
//! ```no_run
//! use packet_log::{configure, CaptureConfig, Direction, PacketLog};
//! use world_protocol::WorldPacket;
//!
//! configure(CaptureConfig { enabled: true, ..Default::default() });
//! let log = PacketLog::instance();
//! log.initialize();
//!
//! if log.can_log_packet() {
//!     let pkt = WorldPacket::new(0x1DC, vec![0, 0, 0, 1]);
//!     log.log_packet(&pkt, Direction::ClientToServer, "127.0.0.1".parse().unwrap(), 8085);
//! }
//! log.shutdown();
//! ```

pub mod config;
pub mod errors;
pub mod logging;

pub use config::CaptureConfig;
pub use errors::{CaptureError, ConfigError, DecodeError};
pub use logging::packets::{configure, CaptureState, CaptureStats, PacketLog};
pub use logging::record::{decode_capture, Direction, Header, PacketRecord};
