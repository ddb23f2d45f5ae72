//! State module for pages and sites
//!
//! # Components
//!
//! - `PageState`: the last crawl outcome recorded on a page
//! - `SiteStatus`: operator-controlled lifecycle of a site

mod page_state;
mod site_status;

pub use page_state::PageState;
pub use site_status::SiteStatus;
