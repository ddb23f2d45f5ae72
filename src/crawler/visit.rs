//! Single page visit
//!
//! A visit takes one queued URL through normalization, site policy,
//! robots.txt, fetch, extraction and link recording. It never fails the
//! run: every problem ends as a `VisitOutcome`.

use crate::crawler::{FetchErrorKind, PageFetcher};
use crate::extract::ContentExtractor;
use crate::robots::RobotsGate;
use crate::state::PageState;
use crate::storage::{GraphRepository, PageRecord, PageUpdate, StorageResult};
use crate::url::{normalize, site_host, NormalizedUrl, Scope};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Why a visit stopped before fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    MalformedUrl,
    SiteBlocked,
    RobotsDisallowed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::MalformedUrl => "malformed URL",
            Self::SiteBlocked => "site blocked",
            Self::RobotsDisallowed => "disallowed by robots.txt",
        };
        f.write_str(label)
    }
}

/// Why a visit failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailReason {
    Fetch(FetchErrorKind),
    /// The repository rejected a read or write
    Storage,
    /// The visit task panicked
    Panic,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(kind) => write!(f, "fetch {}", kind),
            Self::Storage => f.write_str("storage error"),
            Self::Panic => f.write_str("visit panicked"),
        }
    }
}

/// Terminal state of one visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    /// HTML fetched, extracted, links recorded
    Extracted,
    /// Non-HTML response; status and content type recorded
    Fetched,
    Skipped(SkipReason),
    Failed(FailReason),
}

/// What a worker hands back to the coordinator
#[derive(Debug, Clone)]
pub struct VisitReport {
    pub url: String,
    /// Depth budget the URL was visited with
    pub remaining: u32,
    pub outcome: VisitOutcome,
    pub links_recorded: usize,
    /// Targets eligible for recursion, before de-duplication
    pub children: Vec<NormalizedUrl>,
    pub robots_failed: bool,
}

impl VisitReport {
    fn new(url: &str, remaining: u32, outcome: VisitOutcome) -> Self {
        Self {
            url: url.to_string(),
            remaining,
            outcome,
            links_recorded: 0,
            children: Vec::new(),
            robots_failed: false,
        }
    }
}

/// State shared by every worker of one crawl run
pub(crate) struct RunContext {
    pub repo: Arc<dyn GraphRepository>,
    pub fetcher: PageFetcher,
    pub extractor: Arc<dyn ContentExtractor>,
    pub robots: RobotsGate,
    /// Host of the seed; links elsewhere are external
    pub scope_host: String,
    pub include_external: bool,
}

impl RunContext {
    /// Visits `url` with `remaining` depth budget
    pub async fn visit(&self, url: String, remaining: u32) -> VisitReport {
        match self.process(&url, remaining).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("Storage error while visiting {}: {}", url, e);
                VisitReport::new(&url, remaining, VisitOutcome::Failed(FailReason::Storage))
            }
        }
    }

    fn skip(
        &self,
        page: &PageRecord,
        url: &str,
        remaining: u32,
        state: PageState,
        reason: SkipReason,
    ) -> StorageResult<VisitReport> {
        self.repo.update_page(
            page.id,
            &PageUpdate::Skipped {
                state,
                reason: reason.to_string(),
            },
        )?;
        Ok(VisitReport::new(url, remaining, VisitOutcome::Skipped(reason)))
    }

    async fn process(&self, url: &str, remaining: u32) -> StorageResult<VisitReport> {
        let target = match normalize(url, None) {
            Ok(target) => target,
            Err(e) => {
                tracing::debug!("Skipping malformed URL {}: {}", url, e);
                return Ok(VisitReport::new(
                    url,
                    remaining,
                    VisitOutcome::Skipped(SkipReason::MalformedUrl),
                ));
            }
        };
        let page_url = match target.to_url() {
            Ok(page_url) => page_url,
            Err(e) => {
                tracing::debug!("Skipping malformed URL {}: {}", url, e);
                return Ok(VisitReport::new(
                    url,
                    remaining,
                    VisitOutcome::Skipped(SkipReason::MalformedUrl),
                ));
            }
        };

        let site = self.repo.get_or_create_site(&target.host)?;
        let page = self
            .repo
            .get_or_create_page(site.id, &target.path, &target.scheme)?;

        if !site.status.allows_crawl() {
            tracing::info!("Site {} is {}, skipping {}", site.host, site.status, url);
            return self.skip(
                &page,
                url,
                remaining,
                PageState::SiteBlocked,
                SkipReason::SiteBlocked,
            );
        }

        let robots_failed = self
            .robots
            .prepare(&site, &target.scheme, self.repo.as_ref())
            .await
            .is_err();

        let absolute = target.absolute();
        if !self.robots.is_allowed(&site.host, &absolute) {
            tracing::info!("URL {} disallowed by robots.txt", absolute);
            let mut report = self.skip(
                &page,
                url,
                remaining,
                PageState::RobotsDisallowed,
                SkipReason::RobotsDisallowed,
            )?;
            report.robots_failed = robots_failed;
            return Ok(report);
        }

        let mut report = self
            .fetch_and_extract(&page, &site.host, &page_url, &absolute, remaining)
            .await?;
        report.robots_failed = robots_failed;
        if matches!(report.outcome, VisitOutcome::Extracted | VisitOutcome::Fetched) {
            self.repo.touch_site(site.id)?;
        }
        Ok(report)
    }

    /// Returns true if a response may be extracted as the requested page
    ///
    /// A redirect is only followed into extraction when it stays on the
    /// page's host and robots.txt allows where it landed. Off-host targets
    /// were never checked against their own robots.txt or the crawl scope.
    fn redirect_followable(&self, host: &str, requested: &url::Url, landed: &url::Url) -> bool {
        if landed == requested {
            return true;
        }
        match site_host(landed) {
            Some(landed_host) if landed_host == host => {
                self.robots.is_allowed(host, landed.as_str())
            }
            _ => false,
        }
    }

    async fn fetch_and_extract(
        &self,
        page: &PageRecord,
        host: &str,
        page_url: &url::Url,
        absolute: &str,
        remaining: u32,
    ) -> StorageResult<VisitReport> {
        let response = match self.fetcher.fetch(absolute).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", absolute, e);
                self.repo.update_page(
                    page.id,
                    &PageUpdate::Failed {
                        error: e.to_string(),
                    },
                )?;
                return Ok(VisitReport::new(
                    absolute,
                    remaining,
                    VisitOutcome::Failed(FailReason::Fetch(e.kind)),
                ));
            }
        };

        let landed = url::Url::parse(&response.final_url).unwrap_or_else(|_| page_url.clone());
        let followable = self.redirect_followable(host, page_url, &landed);
        if !followable || !response.is_html() {
            if followable {
                tracing::debug!(
                    "Not extracting {} ({})",
                    absolute,
                    response.content_type.as_deref().unwrap_or("no content type")
                );
            } else {
                tracing::info!(
                    "Not extracting {}: redirected to {}",
                    absolute,
                    response.final_url
                );
            }
            self.repo.update_page(
                page.id,
                &PageUpdate::Fetched {
                    status_code: response.status_code,
                    content_type: response.content_type.clone(),
                },
            )?;
            return Ok(VisitReport::new(absolute, remaining, VisitOutcome::Fetched));
        }

        // Relative links resolve against where the redirects ended
        let content = self.extractor.extract(&response.body, &landed);
        self.repo.update_page(
            page.id,
            &PageUpdate::Extracted {
                status_code: response.status_code,
                content_type: response.content_type.clone(),
                raw_body: String::from_utf8_lossy(&response.body).into_owned(),
                article: content.article_fields(),
            },
        )?;

        let mut edges = Vec::new();
        let mut targets = HashSet::new();
        let mut children = Vec::new();

        for anchor in &content.anchors {
            if anchor.is_fragment_only() {
                continue;
            }
            let link = match normalize(&anchor.href, Some(&landed)) {
                Ok(link) => link,
                Err(e) => {
                    tracing::debug!("Ignoring link {:?} on {}: {}", anchor.href, absolute, e);
                    continue;
                }
            };

            let to_site = self.repo.get_or_create_site(&link.host)?;
            let to_page = self
                .repo
                .get_or_create_page(to_site.id, &link.path, &link.scheme)?;
            if targets.insert(to_page.id) {
                edges.push((to_page.id, anchor.link_attrs()));
            }

            let scope = Scope::classify(&link.host, &self.scope_host);
            if remaining > 1 && scope.may_follow(self.include_external) && !anchor.is_nofollow() {
                children.push(link);
            }
        }

        let links = self.repo.replace_outgoing_links(page.id, &edges)?;
        tracing::info!(
            "Extracted {} ({}, {} links)",
            absolute,
            response.status_code,
            links.len()
        );

        Ok(VisitReport {
            url: absolute.to_string(),
            remaining,
            outcome: VisitOutcome::Extracted,
            links_recorded: links.len(),
            children,
            robots_failed: false,
        })
    }
}
