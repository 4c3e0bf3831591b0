mod etcd;
mod hlc;
mod insta;
mod segment;
mod snowflake;
mod sonyflake;
mod spanner;
mod ticket;
mod uuid_v4;
mod uuid_v7;

pub use etcd::*;
pub use hlc::*;
pub use insta::*;
pub use segment::*;
pub use snowflake::*;
pub use sonyflake::*;
pub use spanner::*;
pub use ticket::*;
pub use uuid_v4::*;
pub use uuid_v7::*;

#[cfg(test)]
pub(crate) mod test_clock;
#[cfg(test)]
pub(crate) mod uuid_test_support;

use std::str::FromStr;

use crate::{
    DbConfig, EtcdConfig, HttpClient, Result, SpannerConfig, ThreadRandom, WallClock,
};

/// The emission capability consumed by the IPC layer.
///
/// Implementations are shared objects called from many threads for the whole
/// process lifetime. Numeric strategies serialize their packed word as
/// decimal; textual strategies override [`next_id_string`] and report
/// [`Error::NotNumeric`] for the integer operation.
///
/// [`next_id_string`]: IdEmitter::next_id_string
/// [`Error::NotNumeric`]: crate::Error::NotNumeric
pub trait IdEmitter: Send + Sync {
    /// The next identifier as a packed 64-bit integer.
    fn next_id(&self) -> Result<u64>;

    /// The next identifier rendered as the byte sequence written to the wire.
    fn next_id_string(&self) -> Result<String> {
        Ok(self.next_id()?.to_string())
    }
}

/// Strategy selected at process start via `GENERATOR_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorKind {
    #[default]
    Snowflake,
    HlcSnowflake,
    InstaSnowflake,
    Sonyflake,
    UuidV4,
    UuidV7,
    DbAutoInc,
    DualBuffer,
    EtcdSnowflake,
    Spanner,
    SpannerTrueTime,
}

impl GeneratorKind {
    /// Reads `GENERATOR_TYPE`; absent or unrecognized values select the
    /// default snowflake strategy.
    pub fn from_env() -> Self {
        std::env::var("GENERATOR_TYPE")
            .map(|value| value.parse().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl FromStr for GeneratorKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "HLC_SNOWFLAKE" => Self::HlcSnowflake,
            "INSTA_SNOWFLAKE" => Self::InstaSnowflake,
            "SONYFLAKE" => Self::Sonyflake,
            "UUIDV4" => Self::UuidV4,
            "UUIDV7" => Self::UuidV7,
            "DB_AUTO_INC" => Self::DbAutoInc,
            "DUAL_BUFFER" => Self::DualBuffer,
            "ETCD_SNOWFLAKE" => Self::EtcdSnowflake,
            "SPANNER" => Self::Spanner,
            "SPANNER_TRUETIME" => Self::SpannerTrueTime,
            // Includes "SNOWFLAKE": anything unrecognized maps to the default.
            _ => Self::Snowflake,
        })
    }
}

impl std::fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Snowflake => "SNOWFLAKE",
            Self::HlcSnowflake => "HLC_SNOWFLAKE",
            Self::InstaSnowflake => "INSTA_SNOWFLAKE",
            Self::Sonyflake => "SONYFLAKE",
            Self::UuidV4 => "UUIDV4",
            Self::UuidV7 => "UUIDV7",
            Self::DbAutoInc => "DB_AUTO_INC",
            Self::DualBuffer => "DUAL_BUFFER",
            Self::EtcdSnowflake => "ETCD_SNOWFLAKE",
            Self::Spanner => "SPANNER",
            Self::SpannerTrueTime => "SPANNER_TRUETIME",
        })
    }
}

/// Wires up the selected strategy with production clocks, randomness and
/// coordinator transports.
///
/// Strategies that depend on an external coordinator perform their gating
/// startup work here (lease claim, initial segment fetch, session creation);
/// any failure aborts construction.
pub fn build_generator(kind: GeneratorKind) -> Result<Box<dyn IdEmitter>> {
    Ok(match kind {
        GeneratorKind::Snowflake => Box::new(SnowflakeGenerator::new(WallClock)),
        GeneratorKind::HlcSnowflake => Box::new(HlcSnowflakeGenerator::new(WallClock)),
        GeneratorKind::InstaSnowflake => Box::new(InstaSnowflakeGenerator::new(WallClock)),
        GeneratorKind::Sonyflake => Box::new(SonyflakeGenerator::new(WallClock)),
        GeneratorKind::UuidV4 => Box::new(UuidV4Generator::new(ThreadRandom)),
        GeneratorKind::UuidV7 => Box::new(UuidV7Generator::new(WallClock, ThreadRandom)),
        GeneratorKind::DbAutoInc => {
            let store = MySqlTicketStore::connect(&DbConfig::ticket_from_env())?;
            Box::new(TicketGenerator::new(store))
        }
        GeneratorKind::DualBuffer => {
            let store = MySqlSegmentStore::connect(&DbConfig::segment_from_env())?;
            Box::new(DualBufferGenerator::start(store)?)
        }
        GeneratorKind::EtcdSnowflake => Box::new(EtcdSnowflakeGenerator::claim(
            HttpClient::new()?,
            &EtcdConfig::from_env(),
            WallClock,
        )?),
        GeneratorKind::Spanner => Box::new(SpannerSequenceGenerator::connect(
            HttpClient::new()?,
            &SpannerConfig::from_env(),
        )?),
        GeneratorKind::SpannerTrueTime => Box::new(SpannerTrueTimeGenerator::connect(
            HttpClient::new()?,
            &SpannerConfig::from_env(),
            &ThreadRandom,
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_parse_round_trip() {
        for kind in [
            GeneratorKind::Snowflake,
            GeneratorKind::HlcSnowflake,
            GeneratorKind::InstaSnowflake,
            GeneratorKind::Sonyflake,
            GeneratorKind::UuidV4,
            GeneratorKind::UuidV7,
            GeneratorKind::DbAutoInc,
            GeneratorKind::DualBuffer,
            GeneratorKind::EtcdSnowflake,
            GeneratorKind::Spanner,
            GeneratorKind::SpannerTrueTime,
        ] {
            assert_eq!(kind.to_string().parse::<GeneratorKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_values_fall_back_to_snowflake() {
        assert_eq!(
            "MYSTERY_MACHINE".parse::<GeneratorKind>().unwrap(),
            GeneratorKind::Snowflake
        );
        assert_eq!(GeneratorKind::default(), GeneratorKind::Snowflake);
    }
}
