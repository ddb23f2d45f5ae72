//! Per-run robots.txt policy gate
//!
//! A `RobotsGate` lives for one crawl run. It refreshes each site's
//! robots.txt at most once, persists what it learns on the site row, and
//! answers allow/deny questions from its cache.

use crate::robots::{CachedRobots, RobotsError};
use crate::storage::{GraphRepository, SiteRecord};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Robots.txt cache and fetcher scoped to one crawl run
pub struct RobotsGate {
    client: Client,
    agent_token: String,
    cache: Mutex<HashMap<String, CachedRobots>>,
    refreshed: Mutex<HashMap<String, Arc<OnceCell<()>>>>,
}

impl RobotsGate {
    /// Creates a gate
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client carrying the crawler User-Agent
    /// * `agent_token` - Product token robots rules are matched against
    pub fn new(client: Client, agent_token: impl Into<String>) -> Self {
        Self {
            client,
            agent_token: agent_token.into(),
            cache: Mutex::new(HashMap::new()),
            refreshed: Mutex::new(HashMap::new()),
        }
    }

    fn cache(&self) -> Result<MutexGuard<'_, HashMap<String, CachedRobots>>, RobotsError> {
        self.cache.lock().map_err(|_| RobotsError::LockPoisoned)
    }

    /// Loads the robots.txt persisted on a site row into the cache
    ///
    /// Does nothing when the host is already cached. Never touches the
    /// network.
    pub fn seed(&self, site: &SiteRecord) -> Result<(), RobotsError> {
        self.cache()?
            .entry(site.host.clone())
            .or_insert_with(|| CachedRobots::from_site(site));
        Ok(())
    }

    /// Fetches `{scheme}://{host}/robots.txt` and records the response
    ///
    /// Any HTTP response replaces the cached status and is persisted on the
    /// site; the body is only kept from a 200. A network failure keeps the
    /// cached body, marks its status unknown and persists nothing.
    ///
    /// # Returns
    ///
    /// * `Ok(u16)` - The HTTP status of the response
    /// * `Err(RobotsError)` - Network failure or persistence failure
    pub async fn refresh(
        &self,
        site: &SiteRecord,
        scheme: &str,
        repo: &dyn GraphRepository,
    ) -> Result<u16, RobotsError> {
        let url = format!("{}://{}/robots.txt", scheme, site.host);
        debug!("Fetching {}", url);

        let fetched = match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if status == 200 {
                    response.text().await.map(|body| (status, Some(body)))
                } else {
                    Ok((status, None))
                }
            }
            Err(e) => Err(e),
        };
        let (status, body) = match fetched {
            Ok(fetched) => fetched,
            Err(source) => {
                self.mark_unreachable(site)?;
                return Err(RobotsError::Fetch { url, source });
            }
        };

        repo.update_site_robots(site.id, body.as_deref(), status)
            .map_err(|source| RobotsError::Storage {
                host: site.host.clone(),
                source,
            })?;

        self.cache()?
            .entry(site.host.clone())
            .or_insert_with(|| CachedRobots::from_site(site))
            .apply_response(status, body.as_deref());

        debug!("robots.txt for {} answered {}", site.host, status);
        Ok(status)
    }

    /// Records that the host's robots.txt could not be reached this run
    ///
    /// The stored body is kept but the status becomes unknown, so the
    /// host is treated as having no robots.txt.
    fn mark_unreachable(&self, site: &SiteRecord) -> Result<(), RobotsError> {
        self.cache()?
            .entry(site.host.clone())
            .or_insert_with(|| CachedRobots::from_site(site))
            .mark_unreachable();
        Ok(())
    }

    /// Seeds and refreshes a site the first time this run sees it
    ///
    /// Concurrent callers for the same host wait for the one refresh. Only
    /// the caller that performed the refresh receives its error.
    pub async fn prepare(
        &self,
        site: &SiteRecord,
        scheme: &str,
        repo: &dyn GraphRepository,
    ) -> Result<(), RobotsError> {
        let cell = {
            let mut refreshed = self
                .refreshed
                .lock()
                .map_err(|_| RobotsError::LockPoisoned)?;
            Arc::clone(refreshed.entry(site.host.clone()).or_default())
        };

        let mut outcome = None;
        let slot = &mut outcome;
        cell.get_or_init(|| async move {
            *slot = Some(match self.seed(site) {
                Ok(()) => self.refresh(site, scheme, repo).await.map(|_| ()),
                Err(e) => Err(e),
            });
        })
        .await;

        match outcome {
            Some(Err(e)) => {
                warn!("{}; falling back to cached robots policy", e);
                Err(e)
            }
            _ => Ok(()),
        }
    }

    /// Checks if the crawler may fetch `url` on `host`
    ///
    /// Allowed unless the host's last robots.txt fetch returned 200 and its
    /// rules forbid the URL for this crawler's token.
    pub fn is_allowed(&self, host: &str, url: &str) -> bool {
        match self.cache() {
            Ok(cache) => cache
                .get(host)
                .map(|entry| entry.is_allowed(url, &self.agent_token))
                .unwrap_or(true),
            Err(_) => true,
        }
    }
}
