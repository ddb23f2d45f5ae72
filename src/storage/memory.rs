//! In-memory storage implementation
//!
//! Rows live in arenas indexed by ID, with lookup maps for the natural keys.
//! A single mutex guards the whole graph, so every call is atomic.

use crate::state::{PageState, SiteStatus};
use crate::storage::traits::{GraphRepository, StorageError, StorageResult};
use crate::storage::{LinkAttrs, LinkRecord, PageRecord, PageUpdate, SiteRecord};
use crate::url::canonical_host;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Graph {
    sites: Vec<SiteRecord>,
    site_index: HashMap<String, i64>,
    pages: Vec<PageRecord>,
    page_index: HashMap<(i64, String), i64>,
    /// Keyed by (from, to) so a page's outgoing links form one range
    links: BTreeMap<(i64, i64), LinkRecord>,
    next_link_id: i64,
}

impl Graph {
    fn site_mut(&mut self, site_id: i64) -> StorageResult<&mut SiteRecord> {
        usize::try_from(site_id - 1)
            .ok()
            .and_then(|index| self.sites.get_mut(index))
            .ok_or(StorageError::SiteNotFound(site_id))
    }

    fn page(&self, page_id: i64) -> StorageResult<&PageRecord> {
        usize::try_from(page_id - 1)
            .ok()
            .and_then(|index| self.pages.get(index))
            .ok_or(StorageError::PageNotFound(page_id))
    }

    fn page_mut(&mut self, page_id: i64) -> StorageResult<&mut PageRecord> {
        usize::try_from(page_id - 1)
            .ok()
            .and_then(|index| self.pages.get_mut(index))
            .ok_or(StorageError::PageNotFound(page_id))
    }

    fn outgoing(&self, from_page_id: i64) -> impl Iterator<Item = &LinkRecord> {
        self.links
            .range((from_page_id, i64::MIN)..=(from_page_id, i64::MAX))
            .map(|(_, link)| link)
    }

    fn upsert_link(
        &mut self,
        from_page_id: i64,
        to_page_id: i64,
        attrs: &LinkAttrs,
    ) -> StorageResult<LinkRecord> {
        self.page(from_page_id)?;
        self.page(to_page_id)?;

        if let Some(link) = self.links.get_mut(&(from_page_id, to_page_id)) {
            link.title = attrs.title.clone();
            link.rel = attrs.rel.clone();
            link.text = attrs.text.clone();
            return Ok(link.clone());
        }

        self.next_link_id += 1;
        let link = LinkRecord {
            id: self.next_link_id,
            from_page_id,
            to_page_id,
            title: attrs.title.clone(),
            rel: attrs.rel.clone(),
            text: attrs.text.clone(),
            created_at: now(),
        };
        self.links.insert((from_page_id, to_page_id), link.clone());
        self.page_mut(to_page_id)?.backlink_count += 1;
        Ok(link)
    }

    fn prune(&mut self, from_page_id: i64, keep: &[i64]) -> StorageResult<usize> {
        let keep: HashSet<i64> = keep.iter().copied().collect();
        let stale: Vec<(i64, i64)> = self
            .outgoing(from_page_id)
            .filter(|link| !keep.contains(&link.id))
            .map(|link| (link.from_page_id, link.to_page_id))
            .collect();

        for key in &stale {
            self.links.remove(key);
            let target = self.page_mut(key.1)?;
            target.backlink_count = target.backlink_count.saturating_sub(1);
        }
        Ok(stale.len())
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Reference in-memory repository
///
/// Used by tests and by embedders that do not need persistence.
#[derive(Default)]
pub struct MemoryRepository {
    graph: Mutex<Graph>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Graph>> {
        self.graph.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl GraphRepository for MemoryRepository {
    fn get_or_create_site(&self, host: &str) -> StorageResult<SiteRecord> {
        let host = canonical_host(host);
        let mut graph = self.lock()?;

        if let Some(&id) = graph.site_index.get(&host) {
            return Ok(graph.site_mut(id)?.clone());
        }

        let site = SiteRecord {
            id: graph.sites.len() as i64 + 1,
            host: host.clone(),
            robots_txt: None,
            robots_status: None,
            status: SiteStatus::Active,
            created_at: now(),
            last_crawled_at: None,
        };
        graph.site_index.insert(host, site.id);
        graph.sites.push(site.clone());
        Ok(site)
    }

    fn find_site(&self, host: &str) -> StorageResult<Option<SiteRecord>> {
        let host = canonical_host(host);
        let mut graph = self.lock()?;
        match graph.site_index.get(&host).copied() {
            Some(id) => Ok(Some(graph.site_mut(id)?.clone())),
            None => Ok(None),
        }
    }

    fn update_site_robots(
        &self,
        site_id: i64,
        body: Option<&str>,
        status: u16,
    ) -> StorageResult<()> {
        let mut graph = self.lock()?;
        let site = graph.site_mut(site_id)?;
        if let Some(body) = body {
            site.robots_txt = Some(body.to_string());
        }
        site.robots_status = Some(status);
        Ok(())
    }

    fn touch_site(&self, site_id: i64) -> StorageResult<()> {
        let mut graph = self.lock()?;
        graph.site_mut(site_id)?.last_crawled_at = Some(now());
        Ok(())
    }

    fn set_site_status(&self, site_id: i64, status: SiteStatus) -> StorageResult<()> {
        let mut graph = self.lock()?;
        graph.site_mut(site_id)?.status = status;
        Ok(())
    }

    fn get_or_create_page(
        &self,
        site_id: i64,
        path: &str,
        scheme: &str,
    ) -> StorageResult<PageRecord> {
        let mut graph = self.lock()?;
        graph.site_mut(site_id)?;

        let key = (site_id, path.to_string());
        if let Some(&id) = graph.page_index.get(&key) {
            return Ok(graph.page(id)?.clone());
        }

        let page = PageRecord {
            id: graph.pages.len() as i64 + 1,
            site_id,
            path: path.to_string(),
            scheme: scheme.to_string(),
            state: PageState::Discovered,
            status_code: None,
            content_type: None,
            raw_body: None,
            title: None,
            article_title: None,
            article_body: None,
            article_excerpt: None,
            top_image_url: None,
            keywords: Vec::new(),
            backlink_count: 0,
            error_message: None,
            created_at: now(),
            last_crawled_at: None,
        };
        graph.page_index.insert(key, page.id);
        graph.pages.push(page.clone());
        Ok(page)
    }

    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>> {
        let graph = self.lock()?;
        match graph.page_index.get(&(site_id, path.to_string())) {
            Some(&id) => Ok(Some(graph.page(id)?.clone())),
            None => Ok(None),
        }
    }

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        let graph = self.lock()?;
        graph.page(page_id).cloned()
    }

    fn update_page(&self, page_id: i64, update: &PageUpdate) -> StorageResult<()> {
        let mut graph = self.lock()?;
        let page = graph.page_mut(page_id)?;
        page.state = update.state();

        match update {
            PageUpdate::Skipped { reason, .. } => {
                page.error_message = Some(reason.clone());
            }
            PageUpdate::Failed { error } => {
                page.error_message = Some(error.clone());
            }
            PageUpdate::Fetched {
                status_code,
                content_type,
            } => {
                page.status_code = Some(*status_code);
                page.content_type = content_type.clone();
                page.raw_body = None;
                page.title = None;
                page.article_title = None;
                page.article_body = None;
                page.article_excerpt = None;
                page.top_image_url = None;
                page.keywords.clear();
                page.error_message = None;
                page.last_crawled_at = Some(now());
            }
            PageUpdate::Extracted {
                status_code,
                content_type,
                raw_body,
                article,
            } => {
                page.status_code = Some(*status_code);
                page.content_type = content_type.clone();
                page.raw_body = Some(raw_body.clone());
                page.title = article.title.clone();
                page.article_title = article.article_title.clone();
                page.article_body = article.article_body.clone();
                page.article_excerpt = article.article_excerpt.clone();
                page.top_image_url = article.top_image_url.clone();
                page.keywords = article.keywords.clone();
                page.error_message = None;
                page.last_crawled_at = Some(now());
            }
        }
        Ok(())
    }

    fn upsert_link(
        &self,
        from_page_id: i64,
        to_page_id: i64,
        attrs: &LinkAttrs,
    ) -> StorageResult<LinkRecord> {
        let mut graph = self.lock()?;
        graph.upsert_link(from_page_id, to_page_id, attrs)
    }

    fn prune_stale_links(&self, from_page_id: i64, keep: &[i64]) -> StorageResult<usize> {
        let mut graph = self.lock()?;
        graph.prune(from_page_id, keep)
    }

    fn replace_outgoing_links(
        &self,
        from_page_id: i64,
        edges: &[(i64, LinkAttrs)],
    ) -> StorageResult<Vec<LinkRecord>> {
        let mut graph = self.lock()?;
        graph.page(from_page_id)?;
        // Validate every target first so a bad edge leaves the graph untouched
        for (to_page_id, _) in edges {
            graph.page(*to_page_id)?;
        }

        let mut seen = HashSet::new();
        let mut links = Vec::with_capacity(edges.len());
        for (to_page_id, attrs) in edges {
            if seen.insert(*to_page_id) {
                links.push(graph.upsert_link(from_page_id, *to_page_id, attrs)?);
            }
        }

        let keep: Vec<i64> = links.iter().map(|link| link.id).collect();
        graph.prune(from_page_id, &keep)?;
        Ok(links)
    }

    fn outgoing_links(&self, from_page_id: i64) -> StorageResult<Vec<LinkRecord>> {
        let graph = self.lock()?;
        let mut links: Vec<LinkRecord> = graph.outgoing(from_page_id).cloned().collect();
        links.sort_by_key(|link| link.id);
        Ok(links)
    }

    fn count_sites(&self) -> StorageResult<u64> {
        Ok(self.lock()?.sites.len() as u64)
    }

    fn count_pages(&self) -> StorageResult<u64> {
        Ok(self.lock()?.pages.len() as u64)
    }

    fn count_links(&self) -> StorageResult<u64> {
        Ok(self.lock()?.links.len() as u64)
    }

    fn count_pages_by_state(&self, state: PageState) -> StorageResult<u64> {
        let graph = self.lock()?;
        Ok(graph.pages.iter().filter(|page| page.state == state).count() as u64)
    }
}
