use crate::{Error, IdEmitter, RandSource, Result, Uuid128};

/// Version-4 UUIDs: 122 random bits, no ordering, no coordination.
///
/// Uniqueness rests entirely on collision resistance of the random source.
pub struct UuidV4Generator<R> {
    rng: R,
}

impl<R> UuidV4Generator<R>
where
    R: RandSource,
{
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draws two random words and forces the version and variant bits.
    pub fn next_uuid(&self) -> Uuid128 {
        let hi = self.rng.next_u64();
        let lo = self.rng.next_u64();

        // Version 4 in the 13th hex digit, variant `10` atop the low half.
        let hi = (hi & 0xFFFF_FFFF_FFFF_0FFF) | 0x0000_0000_0000_4000;
        let lo = (lo & 0x3FFF_FFFF_FFFF_FFFF) | 0x8000_0000_0000_0000;

        Uuid128::from_halves(hi, lo)
    }
}

impl<R> IdEmitter for UuidV4Generator<R>
where
    R: RandSource + Send + Sync,
{
    fn next_id(&self) -> Result<u64> {
        Err(Error::NotNumeric)
    }

    fn next_id_string(&self) -> Result<String> {
        Ok(self.next_uuid().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::uuid_test_support::{assert_canonical_uuid, ScriptedRandom};
    use crate::ThreadRandom;

    #[test]
    fn version_and_variant_bits_are_forced() {
        let generator = UuidV4Generator::new(ScriptedRandom::with_words(vec![u64::MAX, u64::MAX]));
        let uuid = generator.next_uuid();

        assert_eq!(uuid.version(), 4);
        assert_eq!(uuid.variant(), 0b10);
        assert_eq!(uuid.to_string(), "ffffffff-ffff-4fff-bfff-ffffffffffff");
    }

    #[test]
    fn all_zero_entropy_still_carries_version_and_variant() {
        let generator = UuidV4Generator::new(ScriptedRandom::with_words(vec![0, 0]));
        assert_eq!(
            generator.next_uuid().to_string(),
            "00000000-0000-4000-8000-000000000000"
        );
    }

    #[test]
    fn rendering_matches_the_rfc_v4_shape() {
        let generator = UuidV4Generator::new(ThreadRandom);
        for _ in 0..64 {
            assert_canonical_uuid(&generator.next_uuid().to_string(), '4');
        }
    }

    #[test]
    fn integer_emission_is_rejected() {
        let generator = UuidV4Generator::new(ThreadRandom);
        assert!(matches!(
            IdEmitter::next_id(&generator),
            Err(Error::NotNumeric)
        ));
    }
}
