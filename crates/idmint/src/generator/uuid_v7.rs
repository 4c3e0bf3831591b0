use crate::{Error, IdEmitter, RandSource, Result, TimeSource, Uuid128};

/// Version-7 UUIDs: a 48-bit Unix millisecond prefix over 74 random bits.
///
/// Time-ordered like the snowflake family but coordination-free: there is no
/// per-process identifier and no sequence, so cross-process uniqueness is
/// only as strong as 74 bits of entropy per millisecond.
pub struct UuidV7Generator<C, R> {
    clock: C,
    rng: R,
}

impl<C, R> UuidV7Generator<C, R>
where
    C: TimeSource,
    R: RandSource,
{
    pub fn new(clock: C, rng: R) -> Self {
        Self { clock, rng }
    }

    pub fn next_uuid(&self) -> Uuid128 {
        let timestamp = self.clock.current_millis();
        let rand_a = self.rng.next_u64();
        let rand_b = self.rng.next_u64();

        // unix_ts_ms(48) | ver(4) | rand_a(12) over the high half,
        // var(2) | rand_b(62) over the low half.
        let hi = (timestamp << 16) | 0x7000 | (rand_a & 0x0FFF);
        let lo = 0x8000_0000_0000_0000 | (rand_b & 0x3FFF_FFFF_FFFF_FFFF);

        Uuid128::from_halves(hi, lo)
    }
}

impl<C, R> IdEmitter for UuidV7Generator<C, R>
where
    C: TimeSource + Send + Sync,
    R: RandSource + Send + Sync,
{
    fn next_id(&self) -> Result<u64> {
        Err(Error::NotNumeric)
    }

    fn next_id_string(&self) -> Result<String> {
        Ok(self.next_uuid().to_string())
    }
}
