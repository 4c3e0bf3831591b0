use std::sync::Mutex;

use serde_json::{json, Value};

use crate::{Error, HttpPost, IdEmitter, RandSource, Result, SpannerConfig};

const SEQUENCE_SQL: &str = "SELECT GET_NEXT_SEQUENCE_VALUE(SEQUENCE uuid_sequence)";

/// Creates a session and returns its bare id (last path segment).
fn create_session<H: HttpPost>(transport: &H, database_url: &str) -> Result<String> {
    let response = transport.post_json(&format!("{database_url}/sessions"), &json!({}))?;
    let name = response
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedResponse("session name missing".into()))?;
    let session = name.rsplit('/').next().unwrap_or(name).to_string();
    tracing::info!(session = %session, "created coordinator session");
    Ok(session)
}

/// Ids drawn from a server-side `SEQUENCE` object on a Spanner-compatible
/// endpoint.
///
/// Each call runs `GET_NEXT_SEQUENCE_VALUE` inside an inline read-write
/// transaction and commits it, serialized behind a mutex because the session
/// supports one transaction at a time.
pub struct SpannerSequenceGenerator<H> {
    transport: H,
    database_url: String,
    session: String,
    txn_lock: Mutex<()>,
}

impl<H> SpannerSequenceGenerator<H>
where
    H: HttpPost,
{
    /// Creates the session the generator will run transactions on.
    pub fn connect(transport: H, config: &SpannerConfig) -> Result<Self> {
        let database_url = config.database_url();
        let session = create_session(&transport, &database_url)?;
        Ok(Self {
            transport,
            database_url,
            session,
            txn_lock: Mutex::new(()),
        })
    }

    /// Fetches and commits the next sequence value.
    pub fn next_id(&self) -> Result<u64> {
        let _guard = self.txn_lock.lock()?;

        let execute_url = format!("{}/sessions/{}:executeSql", self.database_url, self.session);
        let response = self.transport.post_json(
            &execute_url,
            &json!({
                "sql": SEQUENCE_SQL,
                "transaction": { "begin": { "readWrite": {} } },
            }),
        )?;

        let txn_id = response
            .pointer("/metadata/transaction/id")
            .and_then(Value::as_str);
        let value = response
            .pointer("/rows/0/0")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedResponse("sequence value missing from rows".into()))?;
        let id = value
            .parse()
            .map_err(|_| Error::MalformedResponse(format!("sequence value not numeric: {value}")))?;

        // The value only becomes durable once the transaction commits.
        if let Some(txn_id) = txn_id {
            let commit_url = format!("{}/sessions/{}:commit", self.database_url, self.session);
            self.transport
                .post_json(&commit_url, &json!({ "transactionId": txn_id }))?;
        }

        Ok(id)
    }
}

impl<H> IdEmitter for SpannerSequenceGenerator<H>
where
    H: HttpPost,
{
    fn next_id(&self) -> Result<u64> {
        self.next_id()
    }
}

/// TrueTime-composite textual ids: `{shard}-{commit_timestamp}-{txn_prefix}`.
///
/// Per call, an empty read-write transaction is begun and committed; the
/// server-reported commit timestamp carries the ordering and the first eight
/// characters of the transaction id disambiguate commits sharing a
/// timestamp. The four-hex-digit shard id, drawn once at construction,
/// distinguishes concurrent generator instances.
pub struct SpannerTrueTimeGenerator<H> {
    transport: H,
    database_url: String,
    session: String,
    shard_id: String,
    txn_lock: Mutex<()>,
}

impl<H> SpannerTrueTimeGenerator<H>
where
    H: HttpPost,
{
    pub fn connect(transport: H, config: &SpannerConfig, rng: &dyn RandSource) -> Result<Self> {
        let database_url = config.database_url();
        let session = create_session(&transport, &database_url)?;
        let shard_id = format!("{:04x}", rng.next_u64() & 0xFFFF);
        tracing::info!(shard_id = %shard_id, "assigned random shard id");
        Ok(Self {
            transport,
            database_url,
            session,
            shard_id,
            txn_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    /// Commits an empty transaction and composes the textual identifier.
    pub fn next_composite(&self) -> Result<String> {
        let _guard = self.txn_lock.lock()?;

        let begin_url = format!(
            "{}/sessions/{}:beginTransaction",
            self.database_url, self.session
        );
        let begin = self
            .transport
            .post_json(&begin_url, &json!({ "options": { "readWrite": {} } }))?;
        let txn_id = begin
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedResponse("transaction id missing".into()))?;

        let commit_url = format!("{}/sessions/{}:commit", self.database_url, self.session);
        let commit = self.transport.post_json(
            &commit_url,
            &json!({ "transactionId": txn_id, "mutations": [] }),
        )?;
        let commit_ts = commit
            .get("commitTimestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedResponse("commit timestamp missing".into()))?;

        // Transaction ids are long base64 blobs; eight characters suffice to
        // split timestamp ties.
        let txn_prefix: String = txn_id.chars().take(8).collect();
        Ok(format!("{}-{}-{}", self.shard_id, commit_ts, txn_prefix))
    }
}

impl<H> IdEmitter for SpannerTrueTimeGenerator<H>
where
    H: HttpPost,
{
    fn next_id(&self) -> Result<u64> {
        Err(Error::NotNumeric)
    }

    fn next_id_string(&self) -> Result<String> {
        self.next_composite()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::generator::uuid_test_support::ScriptedRandom;

    /// Scripted Spanner surface recording every posted request.
    struct MockSpanner {
        requests: Mutex<Vec<(String, Value)>>,
        sequence_value: u64,
        omit_rows: bool,
    }

    impl MockSpanner {
        fn with_sequence_value(value: u64) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                sequence_value: value,
                omit_rows: false,
            }
        }

        fn posted_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }
    }

    impl HttpPost for MockSpanner {
        fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));

            if url.ends_with("/sessions") {
                return Ok(serde_json::json!({
                    "name": "projects/p/instances/i/databases/d/sessions/session-123"
                }));
            }
            if url.ends_with(":executeSql") {
                if self.omit_rows {
                    return Ok(serde_json::json!({ "metadata": {} }));
                }
                return Ok(serde_json::json!({
                    "metadata": { "transaction": { "id": "dHhuLWFiY2RlZmdoaWprbG1ub3A=" } },
                    "rows": [[self.sequence_value.to_string()]],
                }));
            }
            if url.ends_with(":beginTransaction") {
                return Ok(serde_json::json!({ "id": "dHhuLWFiY2RlZmdoaWprbG1ub3A=" }));
            }
            if url.ends_with(":commit") {
                return Ok(serde_json::json!({
                    "commitTimestamp": "2026-02-03T10:15:30.123456789Z"
                }));
            }
            panic!("unexpected url {url}");
        }
    }

    fn test_config() -> SpannerConfig {
        SpannerConfig {
            emulator_host: "spanner:9020".into(),
            project_id: "p".into(),
            instance_id: "i".into(),
            database_id: "d".into(),
        }
    }

    #[test]
    fn sequence_value_is_parsed_and_committed() {
        let generator =
            SpannerSequenceGenerator::connect(MockSpanner::with_sequence_value(987_654), &test_config())
                .unwrap();

        assert_eq!(generator.next_id().unwrap(), 987_654);

        let urls = generator.transport.posted_urls();
        assert!(urls[0].ends_with("/databases/d/sessions"));
        assert!(urls[1].ends_with("/sessions/session-123:executeSql"));
        assert!(urls[2].ends_with("/sessions/session-123:commit"));

        let requests = generator.transport.requests.lock().unwrap();
        assert_eq!(requests[2].1["transactionId"], "dHhuLWFiY2RlZmdoaWprbG1ub3A=");
    }

    #[test]
    fn missing_rows_surface_a_malformed_response() {
        let mut transport = MockSpanner::with_sequence_value(1);
        transport.omit_rows = true;
        let generator = SpannerSequenceGenerator::connect(transport, &test_config()).unwrap();

        assert!(matches!(
            generator.next_id(),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn composite_id_glues_shard_timestamp_and_txn_prefix() {
        let rng = ScriptedRandom::with_words(vec![0xBEEF]);
        let generator =
            SpannerTrueTimeGenerator::connect(MockSpanner::with_sequence_value(1), &test_config(), &rng)
                .unwrap();

        assert_eq!(generator.shard_id(), "beef");
        assert_eq!(
            generator.next_composite().unwrap(),
            "beef-2026-02-03T10:15:30.123456789Z-dHhuLWFi"
        );
    }

    #[test]
    fn empty_commit_carries_no_mutations() {
        let rng = ScriptedRandom::with_words(vec![1]);
        let generator =
            SpannerTrueTimeGenerator::connect(MockSpanner::with_sequence_value(1), &test_config(), &rng)
                .unwrap();
        generator.next_composite().unwrap();

        let requests = generator.transport.requests.lock().unwrap();
        let commit = &requests.last().unwrap().1;
        assert_eq!(commit["mutations"], serde_json::json!([]));
    }

    #[test]
    fn shard_id_is_four_lowercase_hex_digits() {
        let rng = ScriptedRandom::with_words(vec![0x1_0000 + 0xA]);
        let generator =
            SpannerTrueTimeGenerator::connect(MockSpanner::with_sequence_value(1), &test_config(), &rng)
                .unwrap();

        // Only the low 16 bits survive.
        assert_eq!(generator.shard_id(), "000a");
    }
}
