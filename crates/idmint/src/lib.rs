//! Pluggable distributed unique-ID generation.
//!
//! This crate implements a family of ID generation strategies behind a single
//! emission capability, [`IdEmitter`]. A sidecar process picks one strategy at
//! startup (see [`GeneratorKind`]) and serves identifiers to co-located
//! workers over a connection-oriented socket.
//!
//! Three coordination regimes are covered:
//!
//! - **Time-sharded**: a local timestamp, a per-process identifier and an
//!   intra-tick sequence are packed into a 64-bit word
//!   ([`SnowflakeGenerator`], [`InstaSnowflakeGenerator`],
//!   [`SonyflakeGenerator`], [`HlcSnowflakeGenerator`]) or a 128-bit UUID
//!   ([`UuidV7Generator`]).
//! - **Externally coordinated**: an authoritative counter or a leased node
//!   identifier lives in an external store ([`TicketGenerator`],
//!   [`DualBufferGenerator`], [`EtcdSnowflakeGenerator`],
//!   [`SpannerSequenceGenerator`], [`SpannerTrueTimeGenerator`]).
//! - **Purely random**: probabilistic collision resistance
//!   ([`UuidV4Generator`]).
//!
//! Wall-clock and randomness are injected through the [`TimeSource`] and
//! [`RandSource`] seams so every strategy is testable with deterministic
//! inputs.

mod config;
mod error;
mod generator;
mod http;
mod id;
mod net;
mod random;
mod time;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::http::*;
pub use crate::id::*;
pub use crate::net::*;
pub use crate::random::*;
pub use crate::time::*;
