use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;

use crate::{
    EtcdConfig, Error, HttpPost, IdEmitter, Result, SnowflakeGenerator, SnowflakeId, TimeSource,
};

/// Lease TTL requested from the coordinator.
const LEASE_TTL_SECS: u64 = 10;

/// Keep-alive cadence; a third of the TTL so two posts may be lost before
/// the lease lapses.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(3);

/// Key prefix under which node slots are claimed.
const NODE_KEY_PREFIX: &str = "uuid-generator/node";

#[derive(Deserialize)]
struct LeaseGrantResponse {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Deserialize)]
struct TxnResponse {
    #[serde(default)]
    succeeded: bool,
}

/// Snowflake emission with a coordinator-leased node id.
///
/// At startup the generator grants itself a 10-second lease, then scans the
/// node keyspace `uuid-generator/node/{0..=1023}` with compare-and-swap
/// transactions (`CREATE(key) == 0` → `PUT(key, "1", lease)`) until one
/// claim succeeds. A background task refreshes the lease every 3 seconds for
/// the process lifetime; emission itself is the baseline snowflake algorithm
/// under the claimed id.
///
/// Lease loss is deliberately not observed: the keep-alive retries on
/// transport errors and logs, but a revoked lease is never re-claimed.
pub struct EtcdSnowflakeGenerator<C, H> {
    snowflake: SnowflakeGenerator<C>,
    lease_id: String,
    _transport: Arc<H>,
    keepalive: Option<JoinHandle<()>>,
    /// Dropped on shutdown to wake the keep-alive out of its sleep.
    stop: Option<mpsc::Sender<()>>,
}

impl<C, H> EtcdSnowflakeGenerator<C, H>
where
    C: TimeSource,
    H: HttpPost + 'static,
{
    /// Claims a node id against the coordinator and starts the keep-alive.
    ///
    /// # Errors
    ///
    /// - [`Error::CoordinatorUnavailable`] / [`Error::MalformedResponse`]
    ///   when the lease grant or a claim transaction fails outright.
    /// - [`Error::NodeIdExhausted`] when all 1024 slots are already held.
    pub fn claim(transport: H, config: &EtcdConfig, clock: C) -> Result<Self> {
        let transport = Arc::new(transport);
        let endpoint = config.endpoint();

        let lease_id = grant_lease(transport.as_ref(), &endpoint)?;
        let node_id = claim_node_id(transport.as_ref(), &endpoint, &lease_id)?;
        tracing::info!(node_id, lease_id = %lease_id, "claimed node id from coordinator");

        let (stop, stopped) = mpsc::channel();
        let keepalive = {
            let transport = Arc::clone(&transport);
            let lease_id = lease_id.clone();
            thread::Builder::new()
                .name("lease-keepalive".into())
                .spawn(move || keep_alive_lease(transport.as_ref(), &endpoint, &lease_id, &stopped))
                .map_err(Error::coordinator)?
        };

        Ok(Self {
            snowflake: SnowflakeGenerator::with_node_id(node_id, clock),
            lease_id,
            _transport: transport,
            keepalive: Some(keepalive),
            stop: Some(stop),
        })
    }

    /// The lease backing this generator's node-id claim.
    #[must_use]
    pub fn lease_id(&self) -> &str {
        &self.lease_id
    }

    /// The claimed node id.
    #[must_use]
    pub fn node_id(&self) -> u64 {
        self.snowflake.node_id()
    }

    /// Emits the next identifier; semantics are the baseline snowflake's.
    pub fn next_id(&self) -> SnowflakeId {
        self.snowflake.next_id()
    }
}

fn grant_lease<H: HttpPost + ?Sized>(transport: &H, endpoint: &str) -> Result<String> {
    let response = transport.post_json(
        &format!("{endpoint}/lease/grant"),
        &json!({ "TTL": LEASE_TTL_SECS }),
    )?;
    let grant: LeaseGrantResponse = serde_json::from_value(response)
        .map_err(|err| Error::MalformedResponse(format!("lease grant: {err}")))?;
    Ok(grant.id)
}

fn claim_node_id<H: HttpPost + ?Sized>(
    transport: &H,
    endpoint: &str,
    lease_id: &str,
) -> Result<u64> {
    let url = format!("{endpoint}/kv/txn");
    let value = BASE64.encode("1");

    for candidate in 0..=SnowflakeId::MAX_MID {
        let key = BASE64.encode(format!("{NODE_KEY_PREFIX}/{candidate}"));
        let txn = json!({
            "compare": [{
                "target": "CREATE",
                "key": key,
                "createRevision": 0,
            }],
            "success": [{
                "requestPut": { "key": key, "value": value, "lease": lease_id },
            }],
        });

        let response = transport.post_json(&url, &txn)?;
        let outcome: TxnResponse = serde_json::from_value(response)
            .map_err(|err| Error::MalformedResponse(format!("claim txn: {err}")))?;
        if outcome.succeeded {
            return Ok(candidate);
        }
    }

    Err(Error::NodeIdExhausted(SnowflakeId::MAX_MID + 1))
}

fn keep_alive_lease<H: HttpPost + ?Sized>(
    transport: &H,
    endpoint: &str,
    lease_id: &str,
    stopped: &mpsc::Receiver<()>,
) {
    let url = format!("{endpoint}/lease/keepalive");
    let body = json!({ "ID": lease_id });

    loop {
        match stopped.recv_timeout(KEEPALIVE_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => {
                if let Err(err) = transport.post_json(&url, &body) {
                    // Retried on the next tick; the lease survives two misses.
                    tracing::warn!(error = %err, lease_id, "lease keep-alive failed");
                }
            }
            // Sender dropped or an explicit stop: shut down.
            _ => return,
        }
    }
}

impl<C, H> IdEmitter for EtcdSnowflakeGenerator<C, H>
where
    C: TimeSource + Send + Sync,
    H: HttpPost + 'static,
{
    fn next_id(&self) -> Result<u64> {
        Ok(self.next_id().to_raw())
    }
}

impl<C, H> Drop for EtcdSnowflakeGenerator<C, H> {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(keepalive) = self.keepalive.take() {
            let _ = keepalive.join();
        }
    }
}
