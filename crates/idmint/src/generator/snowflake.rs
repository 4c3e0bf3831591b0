use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    node_id_from_interfaces, IdEmitter, Result, SnowflakeId, TimeSource, GENERATOR_EPOCH_MS,
};

/// The baseline snowflake strategy.
///
/// State is two atomics (`last_timestamp`, `sequence`) plus an immutable node
/// id derived from the host's network identity. Within a millisecond the
/// sequence is fetch-added; when it wraps, the caller spin-waits for the next
/// tick. A wall clock observed *behind* the last issued tick fails the call:
/// the generator logs and emits the zero sentinel without retrying.
///
/// The split atomics do not compose atomically: two racing threads may lose
/// one `last_timestamp`/`sequence` update per tick. Uniqueness still holds
/// because the sequence only grows within a tick where it is not reset. For a
/// strictly linearizable variant see [`HlcSnowflakeGenerator`], which CASes a
/// single packed word.
///
/// [`HlcSnowflakeGenerator`]: crate::HlcSnowflakeGenerator
pub struct SnowflakeGenerator<C> {
    node_id: u64,
    sequence: AtomicU64,
    last_timestamp: AtomicU64,
    clock: C,
}

impl<C> SnowflakeGenerator<C>
where
    C: TimeSource,
{
    /// Creates a generator whose node id is derived from the first
    /// non-loopback IPv4 interface.
    pub fn new(clock: C) -> Self {
        Self::with_node_id(node_id_from_interfaces(SnowflakeId::MAX_MID), clock)
    }

    /// Creates a generator with an explicit node id (masked to 10 bits).
    pub fn with_node_id(node_id: u64, clock: C) -> Self {
        Self {
            node_id: node_id & SnowflakeId::MAX_MID,
            sequence: AtomicU64::new(0),
            last_timestamp: AtomicU64::new(0),
            clock,
        }
    }

    /// The node id packed into every emitted identifier.
    #[must_use]
    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    /// Spin-waits until the clock advances past `last_ts`.
    fn wait_for_next_millis(&self, last_ts: u64) -> u64 {
        let mut timestamp = self.clock.current_millis();
        while timestamp <= last_ts {
            core::hint::spin_loop();
            timestamp = self.clock.current_millis();
        }
        timestamp
    }

    /// Emits the next identifier, or the zero sentinel on clock regression.
    pub fn next_id(&self) -> SnowflakeId {
        let mut timestamp = self.clock.current_millis();
        let last_ts = self.last_timestamp.load(Ordering::SeqCst);

        if timestamp < last_ts {
            tracing::error!(
                now = timestamp,
                last = last_ts,
                "clock moved backwards; refusing to generate id"
            );
            return SnowflakeId::from_raw(0);
        }

        if timestamp == last_ts {
            let sequence = (self.sequence.fetch_add(1, Ordering::SeqCst) + 1) & SnowflakeId::MAX_LOW;
            if sequence == 0 {
                // Tick exhausted: burn until the clock moves on.
                timestamp = self.wait_for_next_millis(last_ts);
            }
        } else {
            self.sequence.store(0, Ordering::SeqCst);
        }

        self.last_timestamp.store(timestamp, Ordering::SeqCst);

        SnowflakeId::from_parts(
            timestamp.saturating_sub(GENERATOR_EPOCH_MS),
            self.node_id,
            self.sequence.load(Ordering::SeqCst),
        )
    }
}

impl<C> IdEmitter for SnowflakeGenerator<C>
where
    C: TimeSource + Send + Sync,
{
    fn next_id(&self) -> Result<u64> {
        Ok(self.next_id().to_raw())
    }
}
