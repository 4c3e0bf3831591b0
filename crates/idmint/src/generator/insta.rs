use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    node_id_from_interfaces, Error, IdEmitter, InstaId, Result, TimeSource, GENERATOR_EPOCH_MS,
};

/// The Instagram-style variant: same control flow as the baseline with a
/// 13-bit shard field and a 10-bit sequence.
///
/// Unlike the baseline, a clock regression here is a hard error rather than a
/// sentinel: the shard layout was designed for database-adjacent callers that
/// must not ingest a zero key.
pub struct InstaSnowflakeGenerator<C> {
    shard_id: u64,
    sequence: AtomicU64,
    last_timestamp: AtomicU64,
    clock: C,
}

impl<C> InstaSnowflakeGenerator<C>
where
    C: TimeSource,
{
    pub fn new(clock: C) -> Self {
        Self::with_shard_id(node_id_from_interfaces(InstaId::MAX_MID), clock)
    }

    /// Creates a generator with an explicit shard id (masked to 13 bits).
    pub fn with_shard_id(shard_id: u64, clock: C) -> Self {
        Self {
            shard_id: shard_id & InstaId::MAX_MID,
            sequence: AtomicU64::new(0),
            last_timestamp: AtomicU64::new(0),
            clock,
        }
    }

    fn wait_for_next_millis(&self, last_ts: u64) -> u64 {
        let mut timestamp = self.clock.current_millis();
        while timestamp <= last_ts {
            core::hint::spin_loop();
            timestamp = self.clock.current_millis();
        }
        timestamp
    }

    /// Emits the next identifier.
    ///
    /// # Errors
    ///
    /// [`Error::ClockRegressed`] when the wall clock reads earlier than the
    /// last issued tick. Never retried.
    pub fn try_next_id(&self) -> Result<InstaId> {
        let mut timestamp = self.clock.current_millis();
        let last_ts = self.last_timestamp.load(Ordering::SeqCst);

        if timestamp < last_ts {
            tracing::error!(
                now = timestamp,
                last = last_ts,
                "clock moved backwards; refusing to generate id"
            );
            return Err(Error::ClockRegressed);
        }

        if timestamp == last_ts {
            let sequence = (self.sequence.fetch_add(1, Ordering::SeqCst) + 1) & InstaId::MAX_LOW;
            if sequence == 0 {
                timestamp = self.wait_for_next_millis(last_ts);
            }
        } else {
            self.sequence.store(0, Ordering::SeqCst);
        }

        self.last_timestamp.store(timestamp, Ordering::SeqCst);

        Ok(InstaId::from_parts(
            timestamp.saturating_sub(GENERATOR_EPOCH_MS),
            self.shard_id,
            self.sequence.load(Ordering::SeqCst),
        ))
    }
}

impl<C> IdEmitter for InstaSnowflakeGenerator<C>
where
    C: TimeSource + Send + Sync,
{
    fn next_id(&self) -> Result<u64> {
        Ok(self.try_next_id()?.to_raw())
    }
}
