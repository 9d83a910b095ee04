//! Paginated collection responses.

use serde::{Deserialize, Serialize};

pub const MAX_PER_PAGE: u32 = 100;
pub const DEFAULT_USERS_PER_PAGE: u32 = 10;

/// `page` and `per_page` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// Page number, at least 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, falling back to `default` and capped at [`MAX_PER_PAGE`].
    pub fn per_page(&self, default: u32) -> u32 {
        self.per_page.unwrap_or(default).min(MAX_PER_PAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
    pub total_items: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub next: Option<String>,
    pub prev: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    #[serde(rename = "_meta")]
    pub meta: PageMeta,
    #[serde(rename = "_links")]
    pub links: PageLinks,
}

impl<T> Paginated<T> {
    /// Builds a page of `items` out of `total_items`.
    ///
    /// Links point back at `path`, keeping `extra_query` (already encoded,
    /// e.g. `q=hello`) in front of the paging parameters.
    pub fn new(
        items: Vec<T>,
        total_items: u64,
        page: u32,
        per_page: u32,
        path: &str,
        extra_query: Option<&str>,
    ) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total_items.div_ceil(per_page as u64)
        };
        let link = |page: u32| match extra_query {
            Some(extra) => format!("{}?{}&page={}&per_page={}", path, extra, page, per_page),
            None => format!("{}?page={}&per_page={}", path, page, per_page),
        };
        let links = PageLinks {
            self_link: link(page),
            next: ((page as u64) < total_pages).then(|| link(page + 1)),
            prev: (page > 1).then(|| link(page - 1)),
        };
        Paginated {
            items,
            meta: PageMeta {
                page,
                per_page,
                total_pages,
                total_items,
            },
            links,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
            links: self.links,
        }
    }
}
