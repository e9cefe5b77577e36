use std::{future::Future, time::Duration};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use tracing::{debug, warn};
use wreq::header::{ACCEPT_LANGUAGE, REFERER, USER_AGENT};

use crate::{
    config::CrawlConfig,
    error::{FetchCause, FetchError},
    retry::{self, RetryPolicy},
};

/// One request for one listing page, without pacing or retries.
pub trait Transport {
    fn get_page(&self, page: u32) -> impl Future<Output = Result<String, FetchCause>>;
}

pub struct WreqTransport {
    client: wreq::Client,
    source_url: String,
    page_size: u32,
    user_agent: String,
}

impl WreqTransport {
    pub fn new(config: &CrawlConfig) -> Result<Self, wreq::Error> {
        let client = wreq::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            source_url: config.source_url.clone(),
            page_size: config.page_size,
            user_agent: config.user_agent.clone(),
        })
    }
}

impl Transport for WreqTransport {
    async fn get_page(&self, page: u32) -> Result<String, FetchCause> {
        let start = page * self.page_size;
        let resp = self
            .client
            .get(self.source_url.as_str())
            .header(USER_AGENT, self.user_agent.as_str())
            .header(REFERER, self.source_url.as_str())
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
            .query(&[("start", start.to_string()), ("filter", String::new())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchCause::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }
}

/// Spaces requests at least `delay` apart; the limiter's state is the time of
/// the last permitted request. A zero delay disables pacing.
pub struct Pacer {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { limiter: Quota::with_period(delay).map(RateLimiter::direct) }
    }

    pub async fn until_ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

pub struct Fetcher<T> {
    transport: T,
    pacer: Pacer,
    retry: RetryPolicy,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, delay: Duration, retry: RetryPolicy) -> Self {
        Self { transport, pacer: Pacer::new(delay), retry }
    }

    pub fn from_config(transport: T, config: &CrawlConfig) -> Self {
        Self::new(transport, config.delay, config.retry.clone())
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches listing page `page` (zero-based), pacing every attempt and
    /// retrying transient failures per the retry policy.
    pub async fn fetch(&self, page: u32) -> Result<String, FetchError> {
        debug!(page = page, "fetching listing page");

        let html = retry::retry(&self.retry, |attempt| async move {
            self.pacer.until_ready().await;
            let result = self.transport.get_page(page).await;
            if let Err(err) = &result {
                warn!(page = page, attempt = attempt, error = %err, "listing page request failed");
            }
            result
        })
        .await
        .map_err(|exhausted| FetchError {
            page,
            attempts: exhausted.attempts,
            cause: exhausted.last,
        })?;

        debug!(page = page, bytes = html.len(), "fetched listing page");
        Ok(html)
    }
}

#[cfg(test)]
pub mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::HashMap,
        time::Instant,
    };

    use super::*;

    /// Serves canned responses per page; each request pops the next one.
    /// Pages without a script answer with an empty listing.
    #[derive(Default)]
    pub struct ScriptedTransport {
        responses: RefCell<HashMap<u32, Vec<Result<String, u16>>>>,
        pub requests: Cell<u32>,
    }

    impl ScriptedTransport {
        pub fn page(self, page: u32, html: String) -> Self {
            self.respond(page, Ok(html))
        }

        pub fn fail(self, page: u32, status: u16) -> Self {
            self.respond(page, Err(status))
        }

        fn respond(self, page: u32, response: Result<String, u16>) -> Self {
            self.responses.borrow_mut().entry(page).or_default().push(response);
            self
        }
    }

    impl Transport for ScriptedTransport {
        async fn get_page(&self, page: u32) -> Result<String, FetchCause> {
            self.requests.set(self.requests.get() + 1);
            let mut responses = self.responses.borrow_mut();
            let queue = responses.entry(page).or_default();
            if queue.is_empty() {
                return Ok(crate::testing::listing_html(&[]));
            }
            queue.remove(0).map_err(FetchCause::Status)
        }
    }

    pub fn instant_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, initial_backoff: Duration::ZERO, max_backoff: Duration::ZERO }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let transport = ScriptedTransport::default()
            .fail(0, 503)
            .fail(0, 502)
            .page(0, "<ol class=\"grid_view\"></ol>".to_string());
        let fetcher = Fetcher::new(transport, Duration::ZERO, instant_retry(3));

        let html = fetcher.fetch(0).await.unwrap();
        assert!(html.contains("grid_view"));
        assert_eq!(fetcher.transport.requests.get(), 3);
    }

    #[tokio::test]
    async fn exhaustion_reports_page_and_last_cause() {
        let transport = ScriptedTransport::default().fail(2, 500).fail(2, 503).fail(2, 429);
        let fetcher = Fetcher::new(transport, Duration::ZERO, instant_retry(3));

        let err = fetcher.fetch(2).await.unwrap_err();
        assert_eq!(err.page, 2);
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.cause, FetchCause::Status(429)));
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let transport = ScriptedTransport::default().fail(0, 404);
        let fetcher = Fetcher::new(transport, Duration::ZERO, instant_retry(5));

        let err = fetcher.fetch(0).await.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(fetcher.transport.requests.get(), 1);
    }

    #[tokio::test]
    async fn malformed_source_url_fails_without_retrying() {
        let config = CrawlConfig {
            source_url: "not a url".to_string(),
            page_size: 25,
            max_pages: 10,
            limit: 100,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
            user_agent: "toplist-crawler-test".to_string(),
            retry: instant_retry(3),
        };
        let fetcher = Fetcher::from_config(WreqTransport::new(&config).unwrap(), &config);

        let err = fetcher.fetch(0).await.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(matches!(err.cause, FetchCause::Transport(_)));
    }

    #[tokio::test]
    async fn pacer_spaces_consecutive_requests() {
        let pacer = Pacer::new(Duration::from_millis(200));
        let started = Instant::now();
        pacer.until_ready().await;
        pacer.until_ready().await;
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn zero_delay_never_waits() {
        let pacer = Pacer::new(Duration::ZERO);
        let started = Instant::now();
        for _ in 0..20 {
            pacer.until_ready().await;
        }
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
