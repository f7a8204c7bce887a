use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// Per-connection counters, updated by the worker and readable from any thread.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Complete frames produced by the reassembler
    pub frames_received: AtomicU64,
    /// Frames dropped for a checksum mismatch
    pub frames_dropped: AtomicU64,
    /// Packets handed to a registered handler
    pub packets_dispatched: AtomicU64,
    /// Outbound packets written to the socket
    pub packets_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_in(&self, count: usize) {
        self.bytes_received.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_dispatched(&self) {
        self.packets_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_sent(&self, byte_count: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    /// Get current counters snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            packets_dispatched: self.packets_dispatched.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let snapshot = self.snapshot();
        info!(
            frames_received = snapshot.frames_received,
            frames_dropped = snapshot.frames_dropped,
            packets_dispatched = snapshot.packets_dispatched,
            packets_sent = snapshot.packets_sent,
            bytes_received = snapshot.bytes_received,
            bytes_sent = snapshot.bytes_sent,
            "connection stats"
        );
    }
}

/// Snapshot of connection counters at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub packets_dispatched: u64,
    pub packets_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ConnectionStats::new();
        stats.bytes_in(100);
        stats.bytes_in(20);
        stats.frame_received();
        stats.frame_received();
        stats.frame_dropped();
        stats.packet_dispatched();
        stats.packet_sent(32);

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                frames_received: 2,
                frames_dropped: 1,
                packets_dispatched: 1,
                packets_sent: 1,
                bytes_received: 120,
                bytes_sent: 32,
            }
        );
    }
}
