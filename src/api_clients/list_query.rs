use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::form_urlencoded;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

const PAGE_PARAM: &str = "page";
const PAGE_SIZE_PARAM: &str = "pageSize";
const SEARCH_PARAM: &str = "search";
const SORT_PARAM: &str = "sort";
const ORDER_PARAM: &str = "order";
const RESERVED_PARAMS: [&str; 5] = [PAGE_PARAM, PAGE_SIZE_PARAM, SEARCH_PARAM, SORT_PARAM, ORDER_PARAM];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

/// Paging, search, sort and filter state of a list view.
///
/// Serializes to a query string deterministically: fixed parameter order,
/// filters sorted by name, defaults omitted. Parsing is lenient; malformed
/// values fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
    pub sort: Option<SortOrder>,
    pub filters: BTreeMap<String, String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            search: None,
            sort: None,
            filters: BTreeMap::new(),
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Changing the search resets paging to the first page
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.trim().is_empty() { None } else { Some(search) };
        self.page = DEFAULT_PAGE;
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortOrder {
            field: field.into(),
            direction,
        });
        self
    }

    /// Add a filter. Empty values remove it; reserved names are ignored.
    /// Changing filters resets paging to the first page.
    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if RESERVED_PARAMS.contains(&name.as_str()) {
            debug!("Ignoring filter with reserved name '{}'", name);
            return self;
        }
        if value.is_empty() {
            self.filters.remove(&name);
        } else {
            self.filters.insert(name, value);
        }
        self.page = DEFAULT_PAGE;
        self
    }

    /// Zero-based offset of the first row on the current page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());

        if self.page != DEFAULT_PAGE {
            serializer.append_pair(PAGE_PARAM, &self.page.to_string());
        }
        if self.page_size != DEFAULT_PAGE_SIZE {
            serializer.append_pair(PAGE_SIZE_PARAM, &self.page_size.to_string());
        }
        if let Some(search) = &self.search {
            serializer.append_pair(SEARCH_PARAM, search);
        }
        if let Some(sort) = &self.sort {
            serializer.append_pair(SORT_PARAM, &sort.field);
            serializer.append_pair(ORDER_PARAM, sort.direction.as_str());
        }
        for (name, value) in &self.filters {
            serializer.append_pair(name, value);
        }

        serializer.finish()
    }

    pub fn from_query_string(query: &str) -> Self {
        let mut list_query = Self::default();
        let mut sort_field = None;
        let mut direction = SortDirection::default();

        for (name, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match name.as_ref() {
                PAGE_PARAM => list_query.page = value.parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE),
                PAGE_SIZE_PARAM => {
                    list_query.page_size = value.parse::<u32>().ok().filter(|s| *s > 0).unwrap_or(DEFAULT_PAGE_SIZE)
                }
                SEARCH_PARAM if !value.trim().is_empty() => list_query.search = Some(value.into_owned()),
                SEARCH_PARAM => {}
                SORT_PARAM if !value.is_empty() => sort_field = Some(value.into_owned()),
                SORT_PARAM => {}
                ORDER_PARAM => direction = SortDirection::parse(&value).unwrap_or_default(),
                _ if !value.is_empty() => {
                    list_query.filters.insert(name.into_owned(), value.into_owned());
                }
                _ => {}
            }
        }

        list_query.sort = sort_field.map(|field| SortOrder { field, direction });
        list_query
    }

    /// Append the query string to a path, respecting an existing query
    pub fn apply_to_path(&self, path: &str) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            path.to_string()
        } else if path.contains('?') {
            format!("{}&{}", path, query)
        } else {
            format!("{}?{}", path, query)
        }
    }
}
