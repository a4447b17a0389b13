//! robots.txt policy, fetched lazily once per origin.
//!
//! The cache maps each origin to a `tokio::sync::OnceCell`. The first task
//! to ask about an origin fetches and parses its robots.txt; concurrent
//! askers await the same cell instead of issuing a second request. The map
//! lock is only held long enough to clone the cell's `Arc`.
//!
//! Fetch outcomes:
//! * 2xx: parsed with `texting_robots` for our user agent
//! * 401 / 403: the whole origin is denied
//! * anything else (404, 5xx, transport failure, unparsable body): allowed

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use texting_robots::Robot;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use super::http::HttpClient;
use super::limiter::RateLimiter;
use super::urls::origin;

const MAX_ROBOTS_BYTES: usize = 512 * 1024;

/// Parsed robots.txt rules for one origin.
pub enum RobotsPolicy {
    AllowAll,
    DenyAll,
    Rules(Box<Robot>),
}

impl RobotsPolicy {
    /// Parse a robots.txt body. Unparsable bodies allow everything.
    pub fn parse(user_agent: &str, body: &[u8]) -> Self {
        match Robot::new(user_agent, body) {
            Ok(robot) => RobotsPolicy::Rules(Box::new(robot)),
            Err(e) => {
                warn!("Ignoring unparsable robots.txt: {}", e);
                RobotsPolicy::AllowAll
            }
        }
    }

    pub fn allows(&self, url: &Url) -> bool {
        match self {
            RobotsPolicy::AllowAll => true,
            RobotsPolicy::DenyAll => false,
            RobotsPolicy::Rules(robot) => robot.allowed(url.as_str()),
        }
    }
}

impl fmt::Debug for RobotsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotsPolicy::AllowAll => f.write_str("AllowAll"),
            RobotsPolicy::DenyAll => f.write_str("DenyAll"),
            RobotsPolicy::Rules(_) => f.write_str("Rules(..)"),
        }
    }
}

/// Per-origin robots cache shared by the crawler.
pub struct RobotsCache {
    user_agent: String,
    origins: Mutex<HashMap<String, Arc<OnceCell<RobotsPolicy>>>>,
}

impl RobotsCache {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            origins: Mutex::new(HashMap::new()),
        }
    }

    /// `true` when robots.txt for `url`'s origin permits fetching it.
    pub async fn is_allowed(&self, url: &Url, client: &dyn HttpClient, limiter: &RateLimiter) -> bool {
        let key = origin(url);
        let cell = {
            let mut origins = self.origins.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(origins.entry(key.clone()).or_default())
        };
        let policy = cell
            .get_or_init(|| self.fetch_policy(&key, client, limiter))
            .await;
        policy.allows(url)
    }

    /// Number of origins whose robots.txt has been requested.
    pub fn origins_cached(&self) -> usize {
        self.origins.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    async fn fetch_policy(&self, origin: &str, client: &dyn HttpClient, limiter: &RateLimiter) -> RobotsPolicy {
        let robots_url = format!("{}/robots.txt", origin);
        limiter.acquire(origin).await;
        match client.get(&robots_url, Some(MAX_ROBOTS_BYTES)).await {
            Ok(resp) if resp.is_success() => {
                debug!("Loaded {} ({} bytes)", robots_url, resp.body.len());
                RobotsPolicy::parse(&self.user_agent, &resp.body)
            }
            Ok(resp) if resp.status == 401 || resp.status == 403 => {
                debug!("{} returned {}, denying origin", robots_url, resp.status);
                RobotsPolicy::DenyAll
            }
            Ok(resp) => {
                debug!("{} returned {}, allowing all", robots_url, resp.status);
                RobotsPolicy::AllowAll
            }
            Err(e) => {
                debug!("Could not fetch {}: {}, allowing all", robots_url, e);
                RobotsPolicy::AllowAll
            }
        }
    }
}
