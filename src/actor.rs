//! Remote scraping jobs: start a run, wait for it, page through its dataset
//!
//! [`JobApi`] is the seam between the run orchestration and the hosted actor
//! platform. [`ApifyClient`] implements it over blocking HTTP.

use crate::config::{ActorInput, ApiConfig, PollPolicy};
use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle state of an actor run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
    Unknown(String),
}

impl RunStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "READY" => RunStatus::Queued,
            "RUNNING" => RunStatus::Running,
            "SUCCEEDED" => RunStatus::Succeeded,
            "FAILED" => RunStatus::Failed,
            "ABORTED" => RunStatus::Aborted,
            "TIMED-OUT" => RunStatus::TimedOut,
            other => RunStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Aborted | RunStatus::TimedOut
        )
    }
}

/// Status of a run and, once it succeeded, its dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub status: RunStatus,
    pub dataset_id: Option<String>,
}

/// Operations of the job control API
pub trait JobApi {
    /// Start a run and return its id
    fn start_run(&self, input: &ActorInput) -> Result<String, ApiError>;

    fn run_status(&self, run_id: &str) -> Result<RunInfo, ApiError>;

    /// One page of dataset items. An empty page means there are no more.
    fn fetch_page(&self, dataset_id: &str, offset: usize, limit: usize) -> Result<Vec<Value>, ApiError>;
}

impl<T: JobApi + ?Sized> JobApi for &T {
    fn start_run(&self, input: &ActorInput) -> Result<String, ApiError> {
        (**self).start_run(input)
    }

    fn run_status(&self, run_id: &str) -> Result<RunInfo, ApiError> {
        (**self).run_status(run_id)
    }

    fn fetch_page(&self, dataset_id: &str, offset: usize, limit: usize) -> Result<Vec<Value>, ApiError> {
        (**self).fetch_page(dataset_id, offset, limit)
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunData {
    id: String,
    status: String,
    default_dataset_id: Option<String>,
}

/// Blocking client for the Apify v2 API
pub struct ApifyClient {
    agent: ureq::Agent,
    config: ApiConfig,
}

impl ApifyClient {
    pub fn new(config: ApiConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        ApifyClient { agent, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn read_json<T: DeserializeOwned>(url: &str, response: ureq::Response) -> Result<T, ApiError> {
        response.into_json().map_err(|e| ApiError::decode(url, e))
    }

    fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let mut request = self.agent.get(url).query("token", &self.config.token);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(|e| ApiError::transport(url, e))?;
        Self::read_json(url, response)
    }
}

impl JobApi for ApifyClient {
    fn start_run(&self, input: &ActorInput) -> Result<String, ApiError> {
        let url = self.url(&format!("acts/{}/runs", self.config.actor_id));
        let body = serde_json::to_value(input)?;

        let response = self
            .agent
            .post(&url)
            .query("token", &self.config.token)
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(|e| ApiError::transport(&url, e))?;

        let run: Envelope<RunData> = Self::read_json(&url, response)?;
        Ok(run.data.id)
    }

    fn run_status(&self, run_id: &str) -> Result<RunInfo, ApiError> {
        let url = self.url(&format!("actor-runs/{}", run_id));
        let run: Envelope<RunData> = self.get(&url, &[])?;

        Ok(RunInfo {
            status: RunStatus::parse(&run.data.status),
            dataset_id: run.data.default_dataset_id,
        })
    }

    fn fetch_page(&self, dataset_id: &str, offset: usize, limit: usize) -> Result<Vec<Value>, ApiError> {
        let url = self.url(&format!("datasets/{}/items", dataset_id));
        let offset = offset.to_string();
        let limit = limit.to_string();
        self.get(&url, &[("offset", offset.as_str()), ("limit", limit.as_str())])
    }
}

/// Shared flag that stops a poll loop from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on cancellation. Returns `false`
    /// if cancelled.
    fn sleep(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(200);
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLICE.min(deadline - now));
        }
    }
}

/// Poll a run until it reaches a terminal status.
///
/// Returns the dataset id on success, `None` when the run failed, polling
/// gave up after `max_attempts`, or `cancel` fired. Transport errors count
/// as an attempt and are retried after the interval.
pub fn wait_for_completion<A: JobApi + ?Sized>(
    api: &A,
    run_id: &str,
    policy: &PollPolicy,
    cancel: &CancelToken,
) -> Option<String> {
    info!("Waiting for scraping to complete...");
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            warn!(run_id, "polling cancelled");
            return None;
        }

        attempts += 1;
        match api.run_status(run_id) {
            Ok(RunInfo { status: RunStatus::Succeeded, dataset_id }) => {
                if dataset_id.is_none() {
                    warn!(run_id, "run succeeded without a dataset id");
                } else {
                    info!("Scraping completed successfully!");
                }
                return dataset_id;
            }
            Ok(RunInfo { status, .. }) if status.is_terminal() => {
                warn!(run_id, status = ?status, "scraping did not succeed");
                return None;
            }
            Ok(RunInfo { status: RunStatus::Unknown(raw), .. }) => {
                warn!(run_id, status = %raw, "unknown run status");
            }
            Ok(RunInfo { status, .. }) => {
                info!(status = ?status, "Still running... waiting {:?}", policy.interval);
            }
            Err(e) => {
                warn!(run_id, error = %e, "error checking run status");
            }
        }

        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                warn!(run_id, attempts, "giving up on run after max attempts");
                return None;
            }
        }

        if !cancel.sleep(policy.interval) {
            warn!(run_id, "polling cancelled");
            return None;
        }
    }
}

/// Fetch every item of a dataset, page by page.
///
/// Pagination ends at the first empty page; there is no total-count check,
/// so a transient empty page ends the fetch early. A failed request also
/// ends it, keeping what was fetched so far.
pub fn fetch_all_items<A: JobApi + ?Sized>(api: &A, dataset_id: &str, limit: usize) -> Vec<Value> {
    // A zero limit would never move the offset
    let limit = limit.max(1);
    let mut items = Vec::new();
    let mut offset = 0;

    loop {
        match api.fetch_page(dataset_id, offset, limit) {
            Ok(page) if page.is_empty() => break,
            Ok(page) => {
                debug!(offset, count = page.len(), "fetched page");
                items.extend(page);
                offset += limit;
                info!("Fetched {} items so far...", items.len());
            }
            Err(e) => {
                warn!(dataset_id, error = %e, "error fetching dataset items");
                break;
            }
        }
    }

    items
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Scripted job API: statuses are returned in order, pages are sliced
    /// out of a fixed item list
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub statuses: RefCell<VecDeque<Result<RunInfo, ApiError>>>,
        pub items: Vec<Value>,
        pub fail_at_offset: Option<usize>,
        pub start_fails: bool,
        pub status_calls: RefCell<u32>,
        pub started: RefCell<Vec<ActorInput>>,
    }

    impl FakeApi {
        pub fn with_statuses(statuses: Vec<RunStatus>, dataset_id: &str) -> Self {
            let statuses = statuses
                .into_iter()
                .map(|status| {
                    let dataset_id = (status == RunStatus::Succeeded).then(|| dataset_id.to_string());
                    Ok(RunInfo { status, dataset_id })
                })
                .collect();
            FakeApi {
                statuses: RefCell::new(statuses),
                ..Default::default()
            }
        }
    }

    impl JobApi for FakeApi {
        fn start_run(&self, input: &ActorInput) -> Result<String, ApiError> {
            if self.start_fails {
                return Err(ApiError::transport("https://api.example.com", "connection refused"));
            }
            self.started.borrow_mut().push(input.clone());
            Ok("run-1".to_string())
        }

        fn run_status(&self, _run_id: &str) -> Result<RunInfo, ApiError> {
            *self.status_calls.borrow_mut() += 1;
            self.statuses.borrow_mut().pop_front().unwrap_or(Ok(RunInfo {
                status: RunStatus::Running,
                dataset_id: None,
            }))
        }

        fn fetch_page(&self, _dataset_id: &str, offset: usize, limit: usize) -> Result<Vec<Value>, ApiError> {
            if self.fail_at_offset == Some(offset) {
                return Err(ApiError::transport("https://api.example.com", "timed out"));
            }
            Ok(self.items.iter().skip(offset).take(limit).cloned().collect())
        }
    }

    fn fast_policy(max_attempts: Option<u32>) -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_attempts,
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(RunStatus::parse("READY"), RunStatus::Queued);
        assert_eq!(RunStatus::parse("SUCCEEDED"), RunStatus::Succeeded);
        assert_eq!(RunStatus::parse("TIMED-OUT"), RunStatus::TimedOut);
        assert_eq!(RunStatus::parse("ABORTING"), RunStatus::Unknown("ABORTING".to_string()));
        assert!(!RunStatus::Unknown("ABORTING".to_string()).is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_wait_until_succeeded() {
        let api = FakeApi::with_statuses(
            vec![RunStatus::Queued, RunStatus::Running, RunStatus::Succeeded],
            "ds-1",
        );
        let dataset = wait_for_completion(&api, "run-1", &fast_policy(None), &CancelToken::new());

        assert_eq!(dataset.as_deref(), Some("ds-1"));
        assert_eq!(*api.status_calls.borrow(), 3);
    }

    #[test]
    fn test_wait_stops_on_failure() {
        let api = FakeApi::with_statuses(vec![RunStatus::Running, RunStatus::Failed], "ds-1");
        let dataset = wait_for_completion(&api, "run-1", &fast_policy(None), &CancelToken::new());
        assert_eq!(dataset, None);
    }

    #[test]
    fn test_transport_errors_are_retried() {
        let api = FakeApi::with_statuses(vec![RunStatus::Succeeded], "ds-1");
        api.statuses
            .borrow_mut()
            .push_front(Err(ApiError::transport("https://api.example.com", "reset")));

        let dataset = wait_for_completion(&api, "run-1", &fast_policy(None), &CancelToken::new());

        assert_eq!(dataset.as_deref(), Some("ds-1"));
        assert_eq!(*api.status_calls.borrow(), 2);
    }

    #[test]
    fn test_max_attempts_bounds_polling() {
        let api = FakeApi::default();
        let dataset = wait_for_completion(&api, "run-1", &fast_policy(Some(4)), &CancelToken::new());

        assert_eq!(dataset, None);
        assert_eq!(*api.status_calls.borrow(), 4);
    }

    #[test]
    fn test_cancelled_before_polling() {
        let api = FakeApi::default();
        let cancel = CancelToken::new();
        cancel.cancel();

        assert_eq!(wait_for_completion(&api, "run-1", &fast_policy(None), &cancel), None);
        assert_eq!(*api.status_calls.borrow(), 0);
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });

        let started = Instant::now();
        assert!(!cancel.sleep(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_fetch_all_pages() {
        let api = FakeApi {
            items: (0..5).map(|i| json!({"summary": {"name": format!("wine {}", i)}})).collect(),
            ..Default::default()
        };
        let items = fetch_all_items(&api, "ds-1", 2);

        assert_eq!(items.len(), 5);
        assert_eq!(items[4]["summary"]["name"], "wine 4");
    }

    #[test]
    fn test_fetch_error_keeps_earlier_pages() {
        let api = FakeApi {
            items: (0..5).map(|i| json!({"id": i})).collect(),
            fail_at_offset: Some(4),
            ..Default::default()
        };
        let items = fetch_all_items(&api, "ds-1", 2);
        assert_eq!(items.len(), 4);
    }

    /// Serve one request with a bare 500 and hand back the request head
    fn serve_internal_error(listener: TcpListener) -> std::thread::JoinHandle<String> {
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
            String::from_utf8_lossy(&head).into_owned()
        })
    }

    #[test]
    fn test_client_error_does_not_leak_token() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = serve_internal_error(listener);

        let client = ApifyClient::new(ApiConfig {
            token: "SUPERSECRET".to_string(),
            base_url: format!("http://{}/v2", addr),
            timeout: Duration::from_secs(5),
            ..ApiConfig::new("")
        });
        let err = client.run_status("run-1").unwrap_err();
        let request = server.join().unwrap();

        assert!(request.contains("token=SUPERSECRET"));
        let message = err.to_string();
        assert!(matches!(err, ApiError::Transport { .. }));
        assert!(!message.contains("SUPERSECRET"), "token leaked: {}", message);
        assert!(message.contains("500"));
    }

    #[test]
    fn test_zero_page_size_still_advances() {
        let api = FakeApi {
            items: (0..3).map(|i| json!({"id": i})).collect(),
            ..Default::default()
        };
        let items = fetch_all_items(&api, "ds-1", 0);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_run_data_envelope() {
        let body = r#"{"data": {"id": "abc", "status": "SUCCEEDED", "defaultDatasetId": "ds-9", "actId": "x"}}"#;
        let run: Envelope<RunData> = serde_json::from_str(body).unwrap();
        assert_eq!(run.data.id, "abc");
        assert_eq!(run.data.status, "SUCCEEDED");
        assert_eq!(run.data.default_dataset_id.as_deref(), Some("ds-9"));
    }
}
