use std::sync::Arc;

use flexlink_frame::Packet;

use crate::error::Result;

/// Decoder for one inbound message type.
///
/// A fresh handler is built for every dispatched packet, so implementations
/// can keep per-message state in `self` without it leaking between packets.
pub trait PacketHandler: Send {
    /// Read the packet's fields. The packet is sealed with its cursor at the
    /// start of the payload.
    fn decode(&mut self, packet: &mut Packet) -> Result<()>;

    /// Called once after a successful [`decode`](Self::decode), typically to
    /// deliver the decoded result.
    fn complete(&mut self);
}

/// Builds a new handler per dispatched packet.
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn PacketHandler> + Send + Sync>;

/// Wrap a constructor function as a [`HandlerFactory`].
pub fn factory<H, F>(make: F) -> HandlerFactory
where
    H: PacketHandler + 'static,
    F: Fn() -> H + Send + Sync + 'static,
{
    Arc::new(move || Box::new(make()) as Box<dyn PacketHandler>)
}
