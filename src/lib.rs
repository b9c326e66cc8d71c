/// wlan_csma_core - CSMA/CA medium access and frame-exchange core
///
/// Implements the medium-access and frame-exchange subsystem of a
/// simulated IEEE-802.11-style WLAN: two half-duplex virtual channels,
/// the station's CSMA/CA sender, the AP's receiver, inter-frame-space
/// timing, per-station timers, and delivery of validated payloads to
/// the destination station.
///
/// # Design Principles
/// - Byte-exact framing and CRC, ported from the reference protocol
/// - Cooperative async workers over tokio, no OS threads or signals
/// - Minimal external dependencies, each earning its place

pub mod errors;
pub mod config;
pub mod contracts;
pub mod medium;
pub mod timer;
pub mod ack_manager;
pub mod transmitter;
pub mod receiver;
pub mod station;
pub mod dispatcher;
pub mod logging;

pub use config::RuntimeConfig;
pub use contracts::{StationName, RtsFrame, CtsAckFrame, DataFrame, FrameSubtype, SendJob};
pub use dispatcher::{Dispatcher, Task};
pub use errors::{SimError, Result};
pub use logging::StationLogLayer;

/// RTS subtype value carried in the FC field.
pub const RTS_SUBTYPE: u16 = 0x0B00;

/// CTS subtype value carried in the FC field.
pub const CTS_SUBTYPE: u16 = 0x0C00;

/// ACK subtype value carried in the FC field.
pub const ACK_SUBTYPE: u16 = 0x0D00;

/// Maximum payload size a DATA frame may carry.
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// Upper bound on the retry counter K; the 32nd failed attempt
/// abandons the send job.
pub const K_MAX: u32 = 32;

/// Default inter-frame-space, used when a station does not specify one.
pub const DEFAULT_IFS: std::time::Duration = std::time::Duration::from_millis(200);

/// Per-attempt timer length while awaiting CTS or ACK.
pub const WAIT_TIME: std::time::Duration = std::time::Duration::from_secs(2);

/// Backoff slot granularity; `R * TIME_SLOT` is the sleep before the
/// next attempt. 50us keeps a fully exhausted backoff window
/// (`K` near `K_MAX`) resolving in well under a second while still
/// giving concurrent senders a wide enough window to actually
/// interleave instead of winning the medium in lockstep.
pub const TIME_SLOT: std::time::Duration = std::time::Duration::from_micros(50);
