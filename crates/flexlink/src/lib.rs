//! Client driver for GNSS receivers speaking the binary log protocol over TCP.
//!
//! flexlink reassembles receiver frames out of the raw byte stream, decodes
//! and builds packets with a typed big-endian codec, and routes decoded logs
//! to handlers registered per opcode.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connection to the receiver
//! - [`frame`]: wire header, checksum, packets and stream reassembly
//! - [`client`]: dispatcher and connection loop (behind `client` feature)
//! - [`logging`]: `tracing-subscriber` setup (behind `logging` feature)

/// Re-export transport types.
pub mod transport {
    pub use flexlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use flexlink_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use flexlink_client::*;
}

#[cfg(feature = "logging")]
pub mod logging;
