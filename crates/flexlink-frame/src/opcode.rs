//! Message identifiers carried in the header opcode field.
//!
//! Commands are sent to the receiver; logs come back from it. The table is
//! open: any `u16` is a valid opcode on the wire and the dispatcher accepts
//! registrations for values not listed here.

/// Request a log on a port.
pub const LOG: u16 = 1;

/// List of system logs.
pub const LOGLIST: u16 = 5;

/// GPS ephemeris data.
pub const GPSEPHEM: u16 = 7;

/// Remove one log from a port.
pub const UNLOG: u16 = 36;

/// Receiver hardware and software versions.
pub const VERSION: u16 = 37;

/// Remove every log from a port.
pub const UNLOGALL: u16 = 38;

/// Best available position solution.
pub const BESTPOS: u16 = 42;

/// Satellite visibility.
pub const SATVIS: u16 = 72;

/// Self-test status.
pub const RXSTATUS: u16 = 93;

/// Best available velocity.
pub const BESTVEL: u16 = 99;

/// Pseudorange velocity.
pub const PSRVEL: u16 = 100;

/// Receiver time.
pub const TIME: u16 = 101;

pub const PASSCOM1: u16 = 233;
pub const PASSCOM2: u16 = 234;
pub const PASSCOM3: u16 = 235;

pub const ETHSTATUS: u16 = 1288;
pub const IPSTATUS: u16 = 1289;
pub const IPSTATS: u16 = 1669;

/// Returns a human-readable name for an opcode.
pub fn opcode_name(id: u16) -> &'static str {
    match id {
        LOG => "LOG",
        LOGLIST => "LOGLIST",
        GPSEPHEM => "GPSEPHEM",
        UNLOG => "UNLOG",
        VERSION => "VERSION",
        UNLOGALL => "UNLOGALL",
        BESTPOS => "BESTPOS",
        SATVIS => "SATVIS",
        RXSTATUS => "RXSTATUS",
        BESTVEL => "BESTVEL",
        PSRVEL => "PSRVEL",
        TIME => "TIME",
        PASSCOM1 => "PASSCOM1",
        PASSCOM2 => "PASSCOM2",
        PASSCOM3 => "PASSCOM3",
        ETHSTATUS => "ETHSTATUS",
        IPSTATUS => "IPSTATUS",
        IPSTATS => "IPSTATS",
        _ => "UNKNOWN",
    }
}

/// Returns true if the opcode is a command sent to the receiver rather than a log.
pub fn is_command(id: u16) -> bool {
    matches!(id, LOG | UNLOG | UNLOGALL)
}
