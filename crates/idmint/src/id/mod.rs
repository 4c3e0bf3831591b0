mod layout;
mod uuid;

pub use uuid::*;

use crate::define_layout64;

define_layout64!(
    /// Classic snowflake layout: 41-bit millisecond timestamp, 10-bit node
    /// id, 12-bit intra-tick sequence.
    ///
    /// Shared by the baseline, HLC and etcd-coordinated strategies.
    SnowflakeId,
    reserved: 1,
    timestamp: 41,
    node: 10,
    sequence: 12
);

define_layout64!(
    /// Instagram-style layout: a wider 13-bit shard field paid for with a
    /// 10-bit sequence.
    InstaId,
    reserved: 1,
    timestamp: 41,
    shard: 13,
    sequence: 10
);

define_layout64!(
    /// Sonyflake layout: 39 bits of 10-millisecond ticks, then the sequence,
    /// with the 16-bit machine id in the **low** bits.
    SonyflakeId,
    reserved: 1,
    timestamp: 39,
    sequence: 8,
    machine: 16
);
