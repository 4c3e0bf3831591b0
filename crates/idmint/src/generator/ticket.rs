use std::sync::Mutex;

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder};

use crate::{DbConfig, IdEmitter, Result};

const CREATE_TICKETS_TABLE: &str = "CREATE TABLE IF NOT EXISTS tickets (\
     id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, \
     stub CHAR(1) NOT NULL UNIQUE) ENGINE=InnoDB";

const TAKE_TICKET: &str = "REPLACE INTO tickets (stub) VALUES ('a')";

/// One ticket allocation round-trip against the authoritative counter.
///
/// Splitting the store from [`TicketGenerator`] keeps the retry discipline
/// testable without a live database.
pub trait TicketStore: Send {
    /// Replaces the stub row and returns the resulting auto-increment value.
    fn next_ticket(&mut self) -> Result<u64>;

    /// Tears down and re-establishes the coordinator connection.
    fn reconnect(&mut self) -> Result<()>;
}

/// The Flickr ticket-server strategy: a single-row table whose
/// auto-increment counter is the id authority.
///
/// Serial and blocking: one connection behind a mutex, one round-trip per
/// id. A failed allocation reconnects and retries exactly once; if the retry
/// also fails the call logs and emits the zero sentinel. Cross-master
/// uniqueness is the write proxy's problem (offset/step tuning), not ours.
pub struct TicketGenerator<S> {
    store: Mutex<S>,
}

impl<S> TicketGenerator<S>
where
    S: TicketStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Allocates the next ticket, retrying once over a fresh connection.
    pub fn next_id(&self) -> Result<u64> {
        let mut store = self.store.lock()?;

        let first_failure = match store.next_ticket() {
            Ok(id) => return Ok(id),
            Err(err) => err,
        };

        tracing::warn!(
            error = %first_failure,
            "ticket allocation failed; reconnecting for one retry"
        );
        if let Err(err) = store.reconnect() {
            tracing::error!(error = %err, "ticket reconnect failed; emitting sentinel");
            return Ok(0);
        }
        match store.next_ticket() {
            Ok(id) => Ok(id),
            Err(err) => {
                tracing::error!(error = %err, "ticket retry failed; emitting sentinel");
                Ok(0)
            }
        }
    }
}

impl<S> IdEmitter for TicketGenerator<S>
where
    S: TicketStore,
{
    fn next_id(&self) -> Result<u64> {
        self.next_id()
    }
}

/// Production [`TicketStore`] speaking to a MySQL-compatible server, usually
/// through the multi-master write proxy.
pub struct MySqlTicketStore {
    conn: Conn,
    opts: Opts,
}

impl MySqlTicketStore {
    /// Connects and ensures the tickets table exists.
    pub fn connect(config: &DbConfig) -> Result<Self> {
        let opts = Opts::from(
            OptsBuilder::new()
                .ip_or_hostname(Some(config.host.clone()))
                .tcp_port(config.port)
                .user(Some(config.user.clone()))
                .pass(Some(config.pass.clone()))
                .db_name(Some(config.name.clone())),
        );
        let conn = Self::open(&opts)?;
        Ok(Self { conn, opts })
    }

    fn open(opts: &Opts) -> Result<Conn> {
        let mut conn = Conn::new(opts.clone())?;
        conn.query_drop(CREATE_TICKETS_TABLE)?;
        Ok(conn)
    }
}

impl TicketStore for MySqlTicketStore {
    fn next_ticket(&mut self) -> Result<u64> {
        self.conn.query_drop(TAKE_TICKET)?;
        Ok(self.conn.last_insert_id())
    }

    fn reconnect(&mut self) -> Result<()> {
        self.conn = Self::open(&self.opts)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    /// A store scripted to fail its first `fail_first` allocations.
    struct FlakyStore {
        next: u64,
        failures_left: u32,
        reconnects: u32,
        reconnect_fails: bool,
    }

    impl FlakyStore {
        fn failing_first(failures: u32) -> Self {
            Self {
                next: 0,
                failures_left: failures,
                reconnects: 0,
                reconnect_fails: false,
            }
        }
    }

    impl TicketStore for FlakyStore {
        fn next_ticket(&mut self) -> Result<u64> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(Error::coordinator("connection dropped"));
            }
            self.next += 1;
            Ok(self.next)
        }

        fn reconnect(&mut self) -> Result<()> {
            self.reconnects += 1;
            if self.reconnect_fails {
                return Err(Error::coordinator("still unreachable"));
            }
            Ok(())
        }
    }

    #[test]
    fn healthy_store_hands_out_monotonic_tickets() {
        let generator = TicketGenerator::new(FlakyStore::failing_first(0));
        assert_eq!(generator.next_id().unwrap(), 1);
        assert_eq!(generator.next_id().unwrap(), 2);
        assert_eq!(generator.next_id().unwrap(), 3);
    }

    #[test]
    fn one_transient_failure_succeeds_on_the_retry() {
        let generator = TicketGenerator::new(FlakyStore::failing_first(1));

        assert_eq!(generator.next_id().unwrap(), 1);

        let store = generator.store.lock().unwrap();
        assert_eq!(store.reconnects, 1);
    }

    #[test]
    fn a_failed_retry_emits_the_sentinel() {
        let generator = TicketGenerator::new(FlakyStore::failing_first(2));

        assert_eq!(generator.next_id().unwrap(), 0);

        // The next call starts a fresh retry budget and recovers.
        assert_eq!(generator.next_id().unwrap(), 1);
    }

    #[test]
    fn a_failed_reconnect_emits_the_sentinel() {
        let mut store = FlakyStore::failing_first(1);
        store.reconnect_fails = true;
        let generator = TicketGenerator::new(store);

        assert_eq!(generator.next_id().unwrap(), 0);
    }
}
