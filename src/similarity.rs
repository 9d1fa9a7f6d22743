//! Fire-and-forget similarity submission for designed primers.
//!
//! Every surviving primer is submitted once to a similarity service (NCBI
//! BLAST by default). Only the **submission status string** is kept; alignment
//! results are never awaited and a failed submission never removes a pair.
//!
//! Submissions run as background tasks on a small `tokio` runtime owned by the
//! [`Dispatcher`]. A semaphore bounds how many run at once and each one is
//! capped by a timeout, so one slow service call cannot stall a request.
//!
//! ### Example
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taqpick::similarity::{Dispatcher, Disabled, STATUS_SKIPPED};
//! let d = Dispatcher::new(Arc::new(Disabled), 2, Duration::from_secs(1)).unwrap();
//! let pending = d.dispatch("ACGTACGTACGTACGTACGT");
//! assert_eq!(d.resolve(pending), STATUS_SKIPPED);
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

pub const STATUS_SUBMITTED: &str = "Submitted to NCBI BLAST";
pub const STATUS_FAILED: &str = "BLAST submission failed";
pub const STATUS_ERROR: &str = "BLAST submission error";
pub const STATUS_TIMED_OUT: &str = "BLAST submission timed out";
pub const STATUS_SKIPPED: &str = "BLAST submission skipped";

/// Public NCBI BLAST URL API endpoint.
pub const NCBI_BLAST_URL: &str = "https://blast.ncbi.nlm.nih.gov/Blast.cgi";

/// The similarity-check port. Implementations must not panic on service
/// failures; they report them through the returned status string.
pub trait SimilarityCheck: Send + Sync {
    fn submit(&self, primer: &str) -> String;
}

/// Submits `blastn` searches against `nt` through the BLAST URL API.
pub struct NcbiBlast {
    client: reqwest::blocking::Client,
    url: String,
}

impl NcbiBlast {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taqpick/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, url: url.into() })
    }
}

impl SimilarityCheck for NcbiBlast {
    fn submit(&self, primer: &str) -> String {
        let params = [("CMD", "Put"), ("PROGRAM", "blastn"), ("DATABASE", "nt"), ("QUERY", primer)];
        match self.client.get(&self.url).query(&params).send() {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => STATUS_SUBMITTED.to_string(),
            Ok(resp) => {
                log::warn!("BLAST submission for {primer} returned HTTP {}", resp.status());
                STATUS_FAILED.to_string()
            }
            Err(e) => {
                log::warn!("BLAST submission for {primer} failed: {e}");
                STATUS_ERROR.to_string()
            }
        }
    }
}

/// Offline stand-in that submits nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Disabled;

impl SimilarityCheck for Disabled {
    fn submit(&self, _primer: &str) -> String { STATUS_SKIPPED.to_string() }
}

/// A submission in flight; turn it into a status with [`Dispatcher::resolve`].
pub struct Pending {
    handle: JoinHandle<String>,
}

/// Bounded background pool for similarity submissions.
pub struct Dispatcher {
    runtime: Runtime,
    permits: Arc<Semaphore>,
    checker: Arc<dyn SimilarityCheck>,
    timeout: Duration,
}

impl Dispatcher {
    /// `concurrency` submissions may run at once (at least one).
    pub fn new(checker: Arc<dyn SimilarityCheck>, concurrency: usize, timeout: Duration) -> std::io::Result<Self> {
        let concurrency = concurrency.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(concurrency)
            .thread_name("taqpick-similarity")
            .enable_time()
            .build()?;
        Ok(Self { runtime, permits: Arc::new(Semaphore::new(concurrency)), checker, timeout })
    }

    /// Start a background submission for `primer`.
    ///
    /// The permit is held until `submit` returns, even after a timeout, and the
    /// timeout only starts once the blocking call is running.
    pub fn dispatch(&self, primer: &str) -> Pending {
        let permits = self.permits.clone();
        let checker = self.checker.clone();
        let primer = primer.to_string();
        let timeout = self.timeout;
        let handle = self.runtime.spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                return STATUS_ERROR.to_string();
            };
            let (started_tx, started_rx) = oneshot::channel();
            let job = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let _ = started_tx.send(());
                checker.submit(&primer)
            });
            if started_rx.await.is_err() {
                log::warn!("similarity check never started");
                return STATUS_ERROR.to_string();
            }
            match tokio::time::timeout(timeout, job).await {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    log::warn!("similarity check aborted: {e}");
                    STATUS_ERROR.to_string()
                }
                Err(_) => {
                    log::warn!("similarity check exceeded {timeout:?}");
                    STATUS_TIMED_OUT.to_string()
                }
            }
        });
        Pending { handle }
    }

    /// Wait for a submission's status. Never fails.
    ///
    /// Must be called from synchronous code, not from inside another runtime.
    pub fn resolve(&self, pending: Pending) -> String {
        self.runtime
            .block_on(pending.handle)
            .unwrap_or_else(|_| STATUS_ERROR.to_string())
    }
}

#[cfg(test)]
mod dispatcher_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Fixed(&'static str);
    impl SimilarityCheck for Fixed {
        fn submit(&self, _: &str) -> String { self.0.to_string() }
    }

    struct Slow;
    impl SimilarityCheck for Slow {
        fn submit(&self, _: &str) -> String {
            std::thread::sleep(Duration::from_millis(400));
            STATUS_SUBMITTED.to_string()
        }
    }

    struct Panics;
    impl SimilarityCheck for Panics {
        fn submit(&self, _: &str) -> String { panic!("service client bug") }
    }

    #[derive(Default)]
    struct Counting {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }
    impl SimilarityCheck for Counting {
        fn submit(&self, _: &str) -> String {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            STATUS_SUBMITTED.to_string()
        }
    }

    #[test]
    fn status_passes_through() {
        let d = Dispatcher::new(Arc::new(Fixed(STATUS_FAILED)), 2, Duration::from_secs(5)).unwrap();
        let p = d.dispatch("ACGT");
        assert_eq!(d.resolve(p), STATUS_FAILED);
    }

    #[test]
    fn slow_service_degrades_to_timeout_status() {
        let d = Dispatcher::new(Arc::new(Slow), 2, Duration::from_millis(20)).unwrap();
        let p = d.dispatch("ACGT");
        assert_eq!(d.resolve(p), STATUS_TIMED_OUT);
    }

    #[test]
    fn panicking_service_degrades_to_error_status() {
        let d = Dispatcher::new(Arc::new(Panics), 1, Duration::from_secs(5)).unwrap();
        let p = d.dispatch("ACGT");
        assert_eq!(d.resolve(p), STATUS_ERROR);
    }

    #[test]
    fn concurrency_is_bounded() {
        let checker = Arc::new(Counting::default());
        let d = Dispatcher::new(checker.clone(), 2, Duration::from_secs(5)).unwrap();
        let pending: Vec<Pending> = (0..6).map(|i| d.dispatch(&format!("PRIMER{i}"))).collect();
        for p in pending {
            assert_eq!(d.resolve(p), STATUS_SUBMITTED);
        }
        let peak = checker.peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 2, "peak concurrency {peak}");
    }

    struct Recording {
        started: Mutex<Vec<String>>,
    }
    impl SimilarityCheck for Recording {
        fn submit(&self, primer: &str) -> String {
            self.started.lock().unwrap().push(primer.to_string());
            std::thread::sleep(Duration::from_millis(300));
            STATUS_SUBMITTED.to_string()
        }
    }

    #[test]
    fn timeout_is_only_reported_for_started_submissions() {
        let checker = Arc::new(Recording { started: Mutex::new(Vec::new()) });
        let d = Dispatcher::new(checker.clone(), 1, Duration::from_millis(50)).unwrap();
        let primers = ["AAAACCCCGGGGTTTTACGT", "CCCCGGGGTTTTAAAAACGT", "GGGGTTTTAAAACCCCACGT"];
        let pending: Vec<Pending> = primers.iter().map(|p| d.dispatch(p)).collect();
        for (i, (primer, p)) in primers.iter().zip(pending).enumerate() {
            assert_eq!(d.resolve(p), STATUS_TIMED_OUT);
            let started = checker.started.lock().unwrap();
            assert!(started.iter().any(|s| s == primer), "{primer} reported before it was submitted");
            // one permit: the next submission waits for the previous call to return
            assert_eq!(started.len(), i + 1);
        }
    }

    #[test]
    fn disabled_checker_skips() {
        assert_eq!(Disabled.submit("ACGT"), STATUS_SKIPPED);
    }
}
