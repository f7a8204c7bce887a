use std::sync::Mutex;

use crate::error::{ClientError, Result};

/// Ordered queue shared between producers and the connection worker.
///
/// [`drain`](Self::drain) swaps the contents for an empty vector under the
/// lock, so producers only ever wait for a push or a swap, never for the
/// consumer to finish processing a batch.
#[derive(Debug)]
pub struct PacketQueue<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for PacketQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PacketQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, item: T) -> Result<()> {
        self.items
            .lock()
            .map_err(|_| ClientError::LockPoisoned("packet queue"))?
            .push(item);
        Ok(())
    }

    /// Take everything queued so far, in push order.
    pub fn drain(&self) -> Result<Vec<T>> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| ClientError::LockPoisoned("packet queue"))?;
        Ok(std::mem::take(&mut *items))
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
