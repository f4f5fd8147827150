//! Read-side catalog queries.
//!
//! # Responsibility
//! - Paged product listings, product detail, procedure search and the
//!   sort/filter views used when composing products.
//! - Free functions over `&Connection`; nothing here writes.
//!
//! # Invariants
//! - `page >= 1` and `1 <= page_size <= MAX_PAGE_SIZE`.
//! - Standard products always precede event products in mixed listings.

use crate::db::DbError;
use crate::model::ProductKind;
use crate::repo::RepoError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod products;
pub mod search;
pub mod sort_filter;

pub use products::{
    list_products, product_detail, ElementDetail, GroupItemDetail, PackageDetail, ProductDetail,
    ProductSummary, SequenceStepDetail,
};
pub use search::{search_procedures, ProcedureHit, ProcedureScope, SearchStep};
pub use sort_filter::{filter_products, sort_products, ClassFilter, SortField, SortOrder};

pub const DEFAULT_PAGE_SIZE: u32 = 30;
pub const MAX_PAGE_SIZE: u32 = 1000;

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug)]
pub enum QueryError {
    InvalidPageSize(u32),
    /// Page zero, or a page past the last one when results exist.
    InvalidPage {
        page: u32,
        total_pages: u32,
    },
    EmptyQuery,
    InvalidArgument {
        name: &'static str,
        value: String,
    },
    MissingCriteria,
    NotFound(String),
    InvalidData(String),
    Repo(RepoError),
    Db(DbError),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPageSize(size) => {
                write!(f, "page_size must be within 1..={MAX_PAGE_SIZE}, got {size}")
            }
            Self::InvalidPage { page, total_pages } => {
                write!(f, "page {page} is out of range (total pages: {total_pages})")
            }
            Self::EmptyQuery => write!(f, "search text must not be empty"),
            Self::InvalidArgument { name, value } => write!(f, "invalid {name}: `{value}`"),
            Self::MissingCriteria => write!(f, "at least one filter criterion is required"),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::InvalidData(message) => write!(f, "invalid catalog data: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for QueryError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for QueryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> QueryResult<Self> {
        if page == 0 {
            return Err(QueryError::InvalidPage {
                page,
                total_pages: 0,
            });
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(QueryError::InvalidPageSize(page_size));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(self) -> u32 {
        self.page
    }

    pub fn page_size(self) -> u32 {
        self.page_size
    }

    fn offset(self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_count: usize,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    #[serde(rename = "data")]
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Cuts one page out of a fully materialized, already ordered result.
    pub(crate) fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let total_count = all.len();
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.page_size as usize)
            .collect();
        Self {
            items,
            pagination: Pagination {
                page: request.page,
                page_size: request.page_size,
                total_count,
                total_pages: total_pages(total_count, request.page_size),
            },
        }
    }

    /// Like [`Page::slice`], but a page past the end of a non-empty result
    /// is an error.
    pub(crate) fn slice_strict(all: Vec<T>, request: PageRequest) -> QueryResult<Self> {
        let total_pages = total_pages(all.len(), request.page_size);
        if total_pages > 0 && request.page > total_pages {
            return Err(QueryError::InvalidPage {
                page: request.page,
                total_pages,
            });
        }
        Ok(Self::slice(all, request))
    }
}

fn total_pages(total_count: usize, page_size: u32) -> u32 {
    total_count.div_ceil(page_size as usize) as u32
}

/// Which product tables a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductScope {
    #[default]
    All,
    Standard,
    Event,
}

impl ProductScope {
    pub fn parse(value: &str) -> QueryResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "standard" => Ok(Self::Standard),
            "event" => Ok(Self::Event),
            _ => Err(QueryError::InvalidArgument {
                name: "product_type",
                value: value.to_string(),
            }),
        }
    }

    /// Kinds in listing order.
    pub fn kinds(self) -> &'static [ProductKind] {
        match self {
            Self::All => &ProductKind::ALL,
            Self::Standard => &[ProductKind::Standard],
            Self::Event => &[ProductKind::Event],
        }
    }
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_contains(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
