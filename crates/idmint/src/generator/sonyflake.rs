use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    node_id_from_interfaces, Error, IdEmitter, Result, SonyflakeId, TimeSource,
    SONYFLAKE_EPOCH_TICKS,
};

/// Width of one Sonyflake time unit in wall-clock milliseconds.
const TICK_MS: u64 = 10;

/// The Sonyflake variant: 39 bits of 10-millisecond ticks, an 8-bit
/// sequence, and a 16-bit machine id in the low bits.
///
/// The coarser tick trades peak per-tick throughput (256 ids per 10 ms) for
/// a far longer epoch horizon and a much larger machine-id space. Regression
/// and overflow semantics mirror the Instagram variant: hard error, spin-wait.
pub struct SonyflakeGenerator<C> {
    machine_id: u64,
    sequence: AtomicU64,
    last_timestamp: AtomicU64,
    clock: C,
}

impl<C> SonyflakeGenerator<C>
where
    C: TimeSource,
{
    pub fn new(clock: C) -> Self {
        Self::with_machine_id(node_id_from_interfaces(SonyflakeId::MAX_LOW), clock)
    }

    /// Creates a generator with an explicit machine id (masked to 16 bits).
    pub fn with_machine_id(machine_id: u64, clock: C) -> Self {
        Self {
            machine_id: machine_id & SonyflakeId::MAX_LOW,
            sequence: AtomicU64::new(0),
            last_timestamp: AtomicU64::new(0),
            clock,
        }
    }

    fn current_tick(&self) -> u64 {
        self.clock.current_millis() / TICK_MS
    }

    fn wait_for_next_tick(&self, last_ts: u64) -> u64 {
        let mut timestamp = self.current_tick();
        while timestamp <= last_ts {
            core::hint::spin_loop();
            timestamp = self.current_tick();
        }
        timestamp
    }

    /// Emits the next identifier.
    ///
    /// # Errors
    ///
    /// [`Error::ClockRegressed`] when the tick counter reads earlier than the
    /// last issued tick.
    pub fn try_next_id(&self) -> Result<SonyflakeId> {
        let mut timestamp = self.current_tick();
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
            let sequence =
                (self.sequence.fetch_add(1, Ordering::SeqCst) + 1) & SonyflakeId::MAX_MID;
            if sequence == 0 {
                timestamp = self.wait_for_next_tick(last_ts);
            }
        } else {
            self.sequence.store(0, Ordering::SeqCst);
        }

        self.last_timestamp.store(timestamp, Ordering::SeqCst);

        Ok(SonyflakeId::from_parts(
            timestamp.saturating_sub(SONYFLAKE_EPOCH_TICKS),
            self.sequence.load(Ordering::SeqCst),
            self.machine_id,
        ))
    }
}

impl<C> IdEmitter for SonyflakeGenerator<C>
where
    C: TimeSource + Send + Sync,
{
    fn next_id(&self) -> Result<u64> {
        Ok(self.try_next_id()?.to_raw())
    }
}
