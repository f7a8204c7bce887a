use std::sync::Arc;

use flexlink_frame::{opcode, Packet};
use serde::Serialize;

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::handler::PacketHandler;

/// Decoded `BESTPOS` log: the receiver's best available position solution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BestPosition {
    pub solution_status: u32,
    pub position_type: u32,
    /// Degrees.
    pub latitude: f64,
    /// Degrees.
    pub longitude: f64,
    /// Metres above mean sea level.
    pub height: f64,
    /// Geoid separation, metres.
    pub undulation: f32,
    pub datum_id: u32,
    /// Standard deviations, metres.
    pub latitude_sd: f32,
    pub longitude_sd: f32,
    pub height_sd: f32,
    pub station_id: [u8; 4],
    /// Seconds.
    pub differential_age: f32,
    /// Seconds.
    pub solution_age: f32,
    pub satellites_tracked: u8,
    pub satellites_in_solution: u8,
}

impl BestPosition {
    /// Decode from the start of a sealed `BESTPOS` packet. Trailing fields are ignored.
    pub fn decode(packet: &mut Packet) -> flexlink_frame::Result<Self> {
        packet.seek(0)?;
        Ok(Self {
            solution_status: packet.read_u32()?,
            position_type: packet.read_u32()?,
            latitude: packet.read_f64()?,
            longitude: packet.read_f64()?,
            height: packet.read_f64()?,
            undulation: packet.read_f32()?,
            datum_id: packet.read_u32()?,
            latitude_sd: packet.read_f32()?,
            longitude_sd: packet.read_f32()?,
            height_sd: packet.read_f32()?,
            station_id: {
                let raw = packet.read_bytes(4)?;
                [raw[0], raw[1], raw[2], raw[3]]
            },
            differential_age: packet.read_f32()?,
            solution_age: packet.read_f32()?,
            satellites_tracked: packet.read_u8()?,
            satellites_in_solution: packet.read_u8()?,
        })
    }

    /// Append the fields to a building packet, in log order.
    pub fn encode(&self, packet: &mut Packet) -> flexlink_frame::Result<()> {
        packet.write_u32(self.solution_status)?;
        packet.write_u32(self.position_type)?;
        packet.write_f64(self.latitude)?;
        packet.write_f64(self.longitude)?;
        packet.write_f64(self.height)?;
        packet.write_f32(self.undulation)?;
        packet.write_u32(self.datum_id)?;
        packet.write_f32(self.latitude_sd)?;
        packet.write_f32(self.longitude_sd)?;
        packet.write_f32(self.height_sd)?;
        packet.write_bytes(&self.station_id)?;
        packet.write_f32(self.differential_age)?;
        packet.write_f32(self.solution_age)?;
        packet.write_u8(self.satellites_tracked)?;
        packet.write_u8(self.satellites_in_solution)
    }

    /// Base station id with trailing NULs removed.
    pub fn station(&self) -> String {
        let end = self
            .station_id
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.station_id.len());
        String::from_utf8_lossy(&self.station_id[..end]).into_owned()
    }
}

/// Consumer of decoded positions.
pub type PositionCallback = Arc<dyn Fn(BestPosition) + Send + Sync>;

/// Decodes `BESTPOS` and hands the result to a callback on completion.
pub struct BestPositionHandler {
    callback: PositionCallback,
    current: Option<BestPosition>,
}

impl BestPositionHandler {
    pub fn new(callback: PositionCallback) -> Self {
        Self {
            callback,
            current: None,
        }
    }
}

impl PacketHandler for BestPositionHandler {
    fn decode(&mut self, packet: &mut Packet) -> Result<()> {
        self.current = Some(BestPosition::decode(packet)?);
        Ok(())
    }

    fn complete(&mut self) {
        if let Some(position) = self.current.take() {
            (self.callback)(position);
        }
    }
}

/// Route `BESTPOS` logs on `dispatcher` to `callback`.
pub fn register_best_position<F>(dispatcher: &Dispatcher, callback: F, overwrite: bool) -> Result<()>
where
    F: Fn(BestPosition) + Send + Sync + 'static,
{
    let callback: PositionCallback = Arc::new(callback);
    dispatcher.register_fn(
        opcode::BESTPOS,
        move || BestPositionHandler::new(Arc::clone(&callback)),
        overwrite,
    )
}
