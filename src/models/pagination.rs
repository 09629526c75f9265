use serde::Serialize;
use url::form_urlencoded;

/// Numbered links shown on each side of the current page.
const LINK_WINDOW: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

/// One page of results plus what templates need to draw the pager.
///
/// Query parameters registered with [`Page::appends`] are carried into every
/// generated URL so filters like `search` survive page changes.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    #[serde(skip)]
    appends: Vec<(String, String)>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PageLink {
    pub number: u32,
    pub url: String,
    pub active: bool,
    /// Pages were skipped between the previous link and this one.
    pub gap: bool,
}

#[derive(Debug, Serialize)]
pub struct PaginationLinks {
    pub current_page: u32,
    pub last_page: u32,
    pub total: u64,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    pub pages: Vec<PageLink>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            current_page: request.page,
            per_page: request.per_page,
            total,
            appends: Vec::new(),
        }
    }

    pub fn last_page(&self) -> u32 {
        let per_page = u64::from(self.per_page.max(1));
        let pages = (self.total + per_page - 1) / per_page;
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    pub fn appends(mut self, key: &str, value: &str) -> Self {
        self.appends.retain(|(k, _)| k != key);
        self.appends.push((key.to_string(), value.to_string()));
        self
    }

    pub fn url(&self, page: u32) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.appends {
            serializer.append_pair(key, value);
        }
        serializer.append_pair("page", &page.to_string());
        format!("?{}", serializer.finish())
    }

    pub fn links(&self) -> PaginationLinks {
        let last_page = self.last_page();
        let prev_url = (self.current_page > 1).then(|| self.url(self.current_page - 1));
        let next_url = (self.current_page < last_page).then(|| self.url(self.current_page + 1));
        let window_start = self.current_page.saturating_sub(LINK_WINDOW).max(1);
        let window_end = self.current_page.saturating_add(LINK_WINDOW).min(last_page);
        let mut numbers = vec![1];
        numbers.extend(window_start.max(2)..=window_end);
        if numbers.last() != Some(&last_page) {
            numbers.push(last_page);
        }

        let mut previous = 0;
        let pages = numbers
            .into_iter()
            .map(|number| {
                let link = PageLink {
                    number,
                    url: self.url(number),
                    active: number == self.current_page,
                    gap: number > previous + 1,
                };
                previous = number;
                link
            })
            .collect();

        PaginationLinks {
            current_page: self.current_page,
            last_page,
            total: self.total,
            prev_url,
            next_url,
            pages,
        }
    }
}
