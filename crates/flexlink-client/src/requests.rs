//! Builders for outbound `LOG` command packets.
//!
//! `LOG` payload layout:
//!
//! ```text
//! port (u32) | message id (u16) | message type (i8) | reserved (i8)
//! trigger (u32) | period (f64) | offset (f64) | hold (u32)
//! ```

use flexlink_frame::{opcode, MessageType, Packet, Result};

/// When the receiver emits a requested log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LogTrigger {
    /// Each time new data is available.
    OnNew = 0,
    OnChanged = 1,
    /// Periodically, every `period` seconds.
    OnTime = 2,
    OnNext = 3,
    Once = 4,
    OnMark = 5,
    /// Stop a log previously requested on the port.
    Stop = 6,
}

/// A `LOG` command.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRequest {
    /// Port the log is emitted on; also used as the header port address.
    pub port: u8,
    /// Opcode of the requested log.
    pub message: u16,
    pub message_type: MessageType,
    pub trigger: LogTrigger,
    /// Seconds between logs for [`LogTrigger::OnTime`].
    pub period: f64,
    pub offset: f64,
    /// Keep the log across an `UNLOGALL`.
    pub hold: bool,
}

impl LogRequest {
    pub fn new(port: u8, message: u16, trigger: LogTrigger) -> Self {
        Self {
            port,
            message,
            message_type: MessageType::default(),
            trigger,
            period: 0.0,
            offset: 0.0,
            hold: false,
        }
    }

    /// Periodic log every `period` seconds.
    pub fn on_time(port: u8, message: u16, period: f64) -> Self {
        Self {
            period,
            ..Self::new(port, message, LogTrigger::OnTime)
        }
    }

    /// Build the outbound packet.
    pub fn to_packet(&self) -> Result<Packet> {
        let mut packet = Packet::new(opcode::LOG, self.port);
        packet.set_message_type(self.message_type)?;
        packet.write_u32(self.port as u32)?;
        packet.write_u16(self.message)?;
        packet.write_i8(self.message_type.bits() as i8)?;
        packet.write_i8(0)?;
        packet.write_u32(self.trigger as u32)?;
        packet.write_f64(self.period)?;
        packet.write_f64(self.offset)?;
        packet.write_u32(self.hold as u32)?;
        Ok(packet)
    }
}

/// Request `BESTPOS` every `period` seconds on `port`.
pub fn best_position_on_time(port: u8, period: f64) -> Result<Packet> {
    LogRequest::on_time(port, opcode::BESTPOS, period).to_packet()
}

/// Stop the `log` output previously requested on `port`.
pub fn stop_log(port: u8, log: u16) -> Result<Packet> {
    LogRequest::new(port, log, LogTrigger::Stop).to_packet()
}
