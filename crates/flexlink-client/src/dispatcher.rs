use std::collections::HashMap;
use std::sync::RwLock;

use flexlink_frame::opcode::opcode_name;
use flexlink_frame::Packet;
use tracing::{debug, trace};

use crate::error::{ClientError, Result};
use crate::handler::{factory, HandlerFactory, PacketHandler};

/// Opcode → handler-factory registry.
///
/// Constructed explicitly and shared (usually behind an `Arc`) with every
/// connection that should route to it. Registration and lookup may happen
/// concurrently from any thread; handlers run outside the table lock.
pub struct Dispatcher {
    factories: RwLock<HashMap<u16, HandlerFactory>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register `factory` for `opcode`.
    ///
    /// Fails with `Registration` if the opcode is taken and `overwrite` is
    /// false; with `overwrite` the previous factory is replaced.
    pub fn register(&self, opcode: u16, factory: HandlerFactory, overwrite: bool) -> Result<()> {
        let mut factories = self
            .factories
            .write()
            .map_err(|_| ClientError::LockPoisoned("dispatcher registry"))?;

        if !overwrite && factories.contains_key(&opcode) {
            return Err(ClientError::Registration { opcode });
        }
        factories.insert(opcode, factory);
        debug!(opcode, name = opcode_name(opcode), "handler registered");
        Ok(())
    }

    /// Register a handler constructor for `opcode`.
    pub fn register_fn<H, F>(&self, opcode: u16, make: F, overwrite: bool) -> Result<()>
    where
        H: PacketHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.register(opcode, factory(make), overwrite)
    }

    /// Remove the factory for `opcode`. Returns whether one was registered.
    pub fn unregister(&self, opcode: u16) -> Result<bool> {
        let mut factories = self
            .factories
            .write()
            .map_err(|_| ClientError::LockPoisoned("dispatcher registry"))?;
        Ok(factories.remove(&opcode).is_some())
    }

    pub fn contains(&self, opcode: u16) -> Result<bool> {
        let factories = self
            .factories
            .read()
            .map_err(|_| ClientError::LockPoisoned("dispatcher registry"))?;
        Ok(factories.contains_key(&opcode))
    }

    /// Registered opcodes, ascending.
    pub fn opcodes(&self) -> Result<Vec<u16>> {
        let factories = self
            .factories
            .read()
            .map_err(|_| ClientError::LockPoisoned("dispatcher registry"))?;
        let mut opcodes: Vec<u16> = factories.keys().copied().collect();
        opcodes.sort_unstable();
        Ok(opcodes)
    }

    /// Route `packet` to a fresh handler for its opcode.
    ///
    /// Returns `Ok(false)` without doing anything when no handler is
    /// registered; unknown opcodes are not errors. A decode failure is
    /// returned and the handler's completion step is skipped.
    pub fn process(&self, packet: &mut Packet) -> Result<bool> {
        let opcode = packet.opcode();
        let factory = {
            let factories = self
                .factories
                .read()
                .map_err(|_| ClientError::LockPoisoned("dispatcher registry"))?;
            match factories.get(&opcode) {
                Some(factory) => factory.clone(),
                None => {
                    trace!(opcode, "no handler registered");
                    return Ok(false);
                }
            }
        };

        let mut handler = factory();
        handler.decode(packet)?;
        handler.complete();
        Ok(true)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("Dispatcher");
        if let Ok(opcodes) = self.opcodes() {
            dbg.field("opcodes", &opcodes);
        }
        dbg.finish()
    }
}
