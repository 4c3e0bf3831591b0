use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, TxOpts};

use crate::{DbConfig, Error, IdEmitter, Result};

/// Backoff before the fetcher retries a failed segment fetch.
const FETCH_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// A pre-allocated half-open range of identifiers owned by this process.
///
/// `current_id <= max_id + 1` always; `step` is fixed for the lifetime of
/// one fetch.
#[derive(Clone, Copy, Debug)]
struct Segment {
    current_id: u64,
    max_id: u64,
    step: u64,
    is_ready: bool,
}

impl Default for Segment {
    fn default() -> Self {
        Self {
            current_id: 1,
            max_id: 0,
            step: 1000,
            is_ready: false,
        }
    }
}

/// Coordinator-side allocation of the next `step`-sized id range.
///
/// Implementations must advance the authoritative counter atomically with
/// respect to other processes; the buffer logic on this side assumes ranges
/// never overlap.
pub trait SegmentStore: Send + 'static {
    /// Advances the counter by one step and returns the new `(max_id, step)`.
    fn allocate(&mut self) -> Result<(u64, u64)>;
}

/// Buffer state guarded by the buffer mutex. The store lives behind its own
/// lock so fetches never block consumers draining the active segment.
struct BufferState {
    segments: [Segment; 2],
    current_pos: usize,
    fetch_needed: bool,
    is_running: bool,
}

struct Shared<S> {
    state: Mutex<BufferState>,
    /// Wakes the background fetcher.
    fetch_cv: Condvar,
    /// Wakes consumers waiting for a segment to become ready.
    consume_cv: Condvar,
    store: Mutex<S>,
}

/// The dual-buffer strategy: ids are served from an in-memory segment while
/// a background fetcher refills the sibling segment before exhaustion.
///
/// Consumers allocate under the buffer mutex; when the active segment drops
/// to 20 % remaining the fetcher is signalled once (a single outstanding
/// `fetch_needed` flag prevents herd fetches). If both segments empty out,
/// consumers block on a condition variable for at most one fetch latency.
///
/// Construction performs one synchronous fetch; failure there aborts startup.
/// Dropping the generator signals the fetcher and joins it.
pub struct DualBufferGenerator<S> {
    shared: Arc<Shared<S>>,
    fetcher: Option<JoinHandle<()>>,
}

impl<S> DualBufferGenerator<S>
where
    S: SegmentStore,
{
    /// Runs the gating initial fetch and starts the background fetcher.
    pub fn start(store: S) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(BufferState {
                segments: [Segment::default(), Segment::default()],
                current_pos: 0,
                fetch_needed: false,
                is_running: true,
            }),
            fetch_cv: Condvar::new(),
            consume_cv: Condvar::new(),
            store: Mutex::new(store),
        });

        if !Self::fetch_segment(&shared, 0) {
            return Err(Error::coordinator("initial segment fetch failed"));
        }

        let fetcher = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("segment-fetcher".into())
                .spawn(move || Self::run_fetcher(&shared))
                .map_err(Error::coordinator)?
        };

        Ok(Self {
            shared,
            fetcher: Some(fetcher),
        })
    }

    /// Fetches one segment from the store and publishes it as ready.
    ///
    /// Takes only the store lock while talking to the coordinator; the buffer
    /// lock is taken briefly afterwards to publish the result.
    fn fetch_segment(shared: &Shared<S>, index: usize) -> bool {
        let fetched = {
            let Ok(mut store) = shared.store.lock() else {
                return false;
            };
            store.allocate()
        };

        match fetched {
            Ok((max_id, step)) => {
                let Ok(mut state) = shared.state.lock() else {
                    return false;
                };
                state.segments[index] = Segment {
                    current_id: max_id - step + 1,
                    max_id,
                    step,
                    is_ready: true,
                };
                tracing::debug!(index, max_id, step, "segment fetched");
                true
            }
            Err(err) => {
                tracing::error!(error = %err, index, "segment fetch failed");
                false
            }
        }
    }

    fn run_fetcher(shared: &Shared<S>) {
        loop {
            let next_pos = {
                let Ok(mut state) = shared.state.lock() else {
                    return;
                };
                while state.is_running && !state.fetch_needed {
                    state = match shared.fetch_cv.wait(state) {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                }
                if !state.is_running {
                    return;
                }
                1 - state.current_pos
                // Buffer lock released here; the fetch must not block
                // consumers still draining the active segment.
            };

            if Self::fetch_segment(shared, next_pos) {
                let Ok(mut state) = shared.state.lock() else {
                    return;
                };
                state.fetch_needed = false;
                shared.consume_cv.notify_all();
            } else {
                // fetch_needed stays set, so the next pass retries.
                thread::sleep(FETCH_RETRY_BACKOFF);
            }
        }
    }

    /// Allocates the next identifier, blocking while both segments are empty.
    pub fn next_id(&self) -> Result<u64> {
        let mut state = self.shared.state.lock()?;

        loop {
            if !state.is_running {
                return Err(Error::ShuttingDown);
            }

            let pos = state.current_pos;
            if state.segments[pos].current_id <= state.segments[pos].max_id {
                let id = state.segments[pos].current_id;
                state.segments[pos].current_id += 1;

                let segment = state.segments[pos];
                let remaining = segment.max_id + 1 - segment.current_id;
                let threshold = segment.step / 5;
                if remaining <= threshold
                    && !state.segments[1 - pos].is_ready
                    && !state.fetch_needed
                {
                    state.fetch_needed = true;
                    self.shared.fetch_cv.notify_one();
                }

                return Ok(id);
            }

            // Active segment exhausted: swap if the sibling is ready,
            // otherwise demand a fetch and wait it out.
            let next_pos = 1 - pos;
            if state.segments[next_pos].is_ready {
                state.segments[pos].is_ready = false;
                state.current_pos = next_pos;
            } else {
                if !state.fetch_needed {
                    state.fetch_needed = true;
                    self.shared.fetch_cv.notify_one();
                }
                state = self.shared.consume_cv.wait_while(state, |state| {
                    state.is_running && !state.segments[next_pos].is_ready
                })?;
            }
        }
    }
}

impl<S> IdEmitter for DualBufferGenerator<S>
where
    S: SegmentStore,
{
    fn next_id(&self) -> Result<u64> {
        self.next_id()
    }
}

impl<S> Drop for DualBufferGenerator<S> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.is_running = false;
        }
        self.shared.fetch_cv.notify_all();
        self.shared.consume_cv.notify_all();
        if let Some(fetcher) = self.fetcher.take() {
            let _ = fetcher.join();
        }
    }
}

/// Production [`SegmentStore`]: a transactional `UPDATE`+`SELECT` against the
/// `id_segments` table.
pub struct MySqlSegmentStore {
    conn: Conn,
    opts: Opts,
}

impl MySqlSegmentStore {
    pub fn connect(config: &DbConfig) -> Result<Self> {
        let opts = Opts::from(
            OptsBuilder::new()
                .ip_or_hostname(Some(config.host.clone()))
                .tcp_port(config.port)
                .user(Some(config.user.clone()))
                .pass(Some(config.pass.clone()))
                .db_name(Some(config.name.clone())),
        );
        let conn = Conn::new(opts.clone())?;
        Ok(Self { conn, opts })
    }

    fn try_allocate(&mut self) -> Result<(u64, u64)> {
        // Rolls back on drop if anything below errors out.
        let mut tx = self.conn.start_transaction(TxOpts::default())?;
        tx.query_drop("UPDATE id_segments SET max_id = max_id + step WHERE biz_tag = 'default'")?;
        let row: Option<(u64, u64)> =
            tx.query_first("SELECT max_id, step FROM id_segments WHERE biz_tag = 'default'")?;
        tx.commit()?;

        row.ok_or_else(|| Error::MalformedResponse("id_segments row missing".into()))
    }
}

impl SegmentStore for MySqlSegmentStore {
    fn allocate(&mut self) -> Result<(u64, u64)> {
        match self.try_allocate() {
            Ok(range) => Ok(range),
            Err(err) => {
                // One reconnect attempt; the fetcher handles further retries.
                tracing::warn!(error = %err, "segment fetch failed; re-establishing connection");
                self.conn = Conn::new(self.opts.clone())?;
                self.try_allocate()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Instant;

    use super::*;

    /// In-memory counter handing out consecutive, non-overlapping ranges.
    struct CountingStore {
        max_id: u64,
        step: u64,
        fetches: Arc<AtomicU64>,
        fail: bool,
    }

    impl CountingStore {
        fn with_step(step: u64) -> (Self, Arc<AtomicU64>) {
            let fetches = Arc::new(AtomicU64::new(0));
            (
                Self {
                    max_id: 0,
                    step,
                    fetches: Arc::clone(&fetches),
                    fail: false,
                },
                fetches,
            )
        }
    }

    impl SegmentStore for CountingStore {
        fn allocate(&mut self) -> Result<(u64, u64)> {
            if self.fail {
                return Err(Error::coordinator("segment table unreachable"));
            }
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.max_id += self.step;
            Ok((self.max_id, self.step))
        }
    }

    fn wait_for_fetches(fetches: &AtomicU64, expected: u64) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while fetches.load(Ordering::SeqCst) < expected {
            assert!(Instant::now() < deadline, "fetcher never reached {expected}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn two_hundred_fifty_allocations_cost_three_fetches() {
        let (store, fetches) = CountingStore::with_step(100);
        let generator = DualBufferGenerator::start(store).unwrap();

        let ids: Vec<u64> = (0..250).map(|_| generator.next_id().unwrap()).collect();

        assert_eq!(ids, (1..=250).collect::<Vec<u64>>());
        wait_for_fetches(&fetches, 3);
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn allocations_continue_across_segment_swaps() {
        let (store, _fetches) = CountingStore::with_step(10);
        let generator = DualBufferGenerator::start(store).unwrap();

        // Crosses nine swap boundaries; every id must still be consecutive.
        let ids: Vec<u64> = (0..100).map(|_| generator.next_id().unwrap()).collect();
        assert_eq!(ids, (1..=100).collect::<Vec<u64>>());
    }

    #[test]
    fn initial_fetch_failure_aborts_construction() {
        let (mut store, _fetches) = CountingStore::with_step(100);
        store.fail = true;

        assert!(DualBufferGenerator::start(store).is_err());
    }

    #[test]
    fn concurrent_consumers_split_the_ranges_without_overlap() {
        use std::collections::HashSet;

        let (store, _fetches) = CountingStore::with_step(64);
        let generator = Arc::new(DualBufferGenerator::start(store).unwrap());
        let seen = Arc::new(Mutex::new(HashSet::new()));

        thread::scope(|scope| {
            for _ in 0..4 {
                let generator = Arc::clone(&generator);
                let seen = Arc::clone(&seen);
                scope.spawn(move || {
                    for _ in 0..500 {
                        let id = generator.next_id().unwrap();
                        assert!(seen.lock().unwrap().insert(id), "duplicate id {id}");
                    }
                });
            }
        });

        assert_eq!(seen.lock().unwrap().len(), 2_000);
    }

    #[test]
    fn shutdown_joins_the_fetcher_promptly() {
        let (store, _fetches) = CountingStore::with_step(100);
        let generator = DualBufferGenerator::start(store).unwrap();
        generator.next_id().unwrap();

        let started = Instant::now();
        drop(generator);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
