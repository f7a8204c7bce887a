//! Port identifiers for the header port-address field and `LOG` requests.
//!
//! The `_ALL` values address every virtual port of a physical interface.

pub const NO_PORTS: u8 = 0;
pub const COM1_ALL: u8 = 1;
pub const COM2_ALL: u8 = 2;
pub const COM3_ALL: u8 = 3;
/// The port the command arrived on.
pub const THISPORT_ALL: u8 = 6;
pub const FILE_ALL: u8 = 7;
pub const ALL_PORTS: u8 = 8;
pub const XCOM1_ALL: u8 = 9;
pub const XCOM2_ALL: u8 = 10;
pub const USB1_ALL: u8 = 13;
pub const USB2_ALL: u8 = 14;
pub const USB3_ALL: u8 = 15;
pub const AUX_ALL: u8 = 16;
pub const XCOM3_ALL: u8 = 17;
pub const COM4_ALL: u8 = 19;
/// Ethernet interface. Default for TCP connections.
pub const ETH1_ALL: u8 = 20;
pub const IMU_ALL: u8 = 21;
pub const ICOM1_ALL: u8 = 23;
pub const ICOM2_ALL: u8 = 24;

/// Returns a human-readable name for a port identifier.
pub fn port_name(id: u8) -> &'static str {
    match id {
        NO_PORTS => "NO_PORTS",
        COM1_ALL => "COM1_ALL",
        COM2_ALL => "COM2_ALL",
        COM3_ALL => "COM3_ALL",
        THISPORT_ALL => "THISPORT_ALL",
        FILE_ALL => "FILE_ALL",
        ALL_PORTS => "ALL_PORTS",
        XCOM1_ALL => "XCOM1_ALL",
        XCOM2_ALL => "XCOM2_ALL",
        USB1_ALL => "USB1_ALL",
        USB2_ALL => "USB2_ALL",
        USB3_ALL => "USB3_ALL",
        AUX_ALL => "AUX_ALL",
        XCOM3_ALL => "XCOM3_ALL",
        COM4_ALL => "COM4_ALL",
        ETH1_ALL => "ETH1_ALL",
        IMU_ALL => "IMU_ALL",
        ICOM1_ALL => "ICOM1_ALL",
        ICOM2_ALL => "ICOM2_ALL",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(port_name(ETH1_ALL), "ETH1_ALL");
        assert_eq!(port_name(THISPORT_ALL), "THISPORT_ALL");
        assert_eq!(port_name(200), "UNKNOWN");
    }
}
