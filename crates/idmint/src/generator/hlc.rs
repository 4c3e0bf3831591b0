use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    node_id_from_interfaces, IdEmitter, Result, SnowflakeId, TimeSource, GENERATOR_EPOCH_MS,
};

/// Snowflake emission driven by a hybrid logical clock.
///
/// The whole mutable state is one atomic word packing
/// `(logical_timestamp << 12) | sequence`, advanced with a CAS loop:
///
/// - wall clock ahead of logical time: adopt it, reset the sequence;
/// - wall clock equal or behind (skew): keep logical time, bump the
///   sequence, and on sequence overflow advance logical time artificially.
///
/// Logical timestamps are strictly monotonic, the loop is lock-free, and a
/// bounded clock regression costs nothing: emission continues on logical
/// time until the wall clock re-converges. Contrast with the baseline
/// generator, which refuses to emit while the clock is behind.
pub struct HlcSnowflakeGenerator<C> {
    node_id: u64,
    /// Packs `(logical_ts_ms << LOW_BITS) | sequence`.
    state: AtomicU64,
    clock: C,
}

impl<C> HlcSnowflakeGenerator<C>
where
    C: TimeSource,
{
    pub fn new(clock: C) -> Self {
        Self::with_node_id(node_id_from_interfaces(SnowflakeId::MAX_MID), clock)
    }

    /// Creates a generator with an explicit node id (masked to 10 bits),
    /// seeding logical time from the current wall clock.
    pub fn with_node_id(node_id: u64, clock: C) -> Self {
        let physical = clock.current_millis();
        Self {
            node_id: node_id & SnowflakeId::MAX_MID,
            state: AtomicU64::new(physical << SnowflakeId::LOW_BITS),
            clock,
        }
    }

    /// Emits the next identifier. Lock-free; never blocks, never fails.
    pub fn next_id(&self) -> SnowflakeId {
        let mut current = self.state.load(Ordering::Acquire);

        loop {
            let last_ts = current >> SnowflakeId::LOW_BITS;
            let sequence = current & SnowflakeId::MAX_LOW;

            let physical = self.clock.current_millis();

            let (next_ts, next_seq) = if physical > last_ts {
                (physical, 0)
            } else if sequence < SnowflakeId::MAX_LOW {
                (last_ts, sequence + 1)
            } else {
                // Sequence exhausted under skew: advance logical time past
                // the wall clock.
                (last_ts + 1, 0)
            };

            let next = (next_ts << SnowflakeId::LOW_BITS) | next_seq;
            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    return SnowflakeId::from_parts(
                        next_ts.saturating_sub(GENERATOR_EPOCH_MS),
                        self.node_id,
                        next_seq,
                    );
                }
                // Another thread won the race; retry against its state.
                Err(observed) => current = observed,
            }
        }
    }
}

impl<C> IdEmitter for HlcSnowflakeGenerator<C>
where
    C: TimeSource + Send + Sync,
{
    fn next_id(&self) -> Result<u64> {
        Ok(self.next_id().to_raw())
    }
}
