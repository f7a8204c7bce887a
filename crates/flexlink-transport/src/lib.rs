//! TCP transport to GNSS receivers.
//!
//! Receivers expose their binary log protocol on a raw TCP port (for example
//! the ICOM/ETH ports of an OEM6 card). This is the lowest layer of flexlink:
//! everything else reads from and writes to the [`DeviceStream`] provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::DeviceStream;
pub use tcp::TcpTransport;
