//! Page normalization and paginated projections.
//!
//! # Invariants
//! - `page <= 0` is served as page 1 and `limit <= 0` as limit 10.
//! - `skip` is always derived from the normalized values.
//! - `total_pages = ceil(total_items / limit)`.

use crate::model::document::Document;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::error::RepoResult;
use crate::repo::store::{DocumentStore, Filter};
use serde::Serialize;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Normalized paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub limit: u32,
    pub skip: u64,
}

/// One page of mapped items plus paging metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub total_items: u64,
    pub total_pages: u64,
    pub page: u64,
    pub limit: u32,
    #[serde(rename = "data")]
    pub items: Vec<T>,
}

/// Normalizes raw page/limit values and derives `skip`.
pub fn paginate(raw_page: i64, raw_limit: i64) -> PageParams {
    let page = if raw_page <= 0 {
        DEFAULT_PAGE
    } else {
        raw_page.unsigned_abs()
    };
    let limit = if raw_limit <= 0 {
        DEFAULT_LIMIT
    } else {
        u32::try_from(raw_limit).unwrap_or(u32::MAX)
    };

    PageParams {
        page,
        limit,
        skip: (page - 1).saturating_mul(u64::from(limit)),
    }
}

/// Reads a query-string page/limit value.
///
/// Leading integer digits are honored (`"3abc"` is 3); anything else,
/// including an absent value, becomes 0 and is normalized by [`paginate`].
pub fn parse_page_param(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 0;
    };
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end]
        .parse::<i64>()
        .map(|value| sign * value)
        .unwrap_or(0)
}

/// Source of filtered, countable records.
pub trait PageSource {
    type Item;

    fn count(&self, filter: &Filter) -> RepoResult<u64>;
    fn find_page(&self, filter: &Filter, limit: u32, skip: u64) -> RepoResult<Vec<Self::Item>>;
}

impl<S: DocumentStore> PageSource for DocumentRepository<S> {
    type Item = Document;

    fn count(&self, filter: &Filter) -> RepoResult<u64> {
        DocumentRepository::count(self, filter)
    }

    fn find_page(&self, filter: &Filter, limit: u32, skip: u64) -> RepoResult<Vec<Document>> {
        self.find_by_filter(filter, Some(limit), Some(skip))
    }
}

/// Counts, slices and maps one page of `source`.
pub fn paginate_from_store<P, T, F>(
    source: &P,
    mapper: F,
    filter: &Filter,
    raw_page: i64,
    raw_limit: i64,
) -> RepoResult<PageResult<T>>
where
    P: PageSource,
    F: Fn(&P::Item) -> T,
{
    let params = paginate(raw_page, raw_limit);
    let total_items = source.count(filter)?;
    let records = source.find_page(filter, params.limit, params.skip)?;

    Ok(PageResult {
        total_items,
        total_pages: total_pages(total_items, params.limit),
        page: params.page,
        limit: params.limit,
        items: records.iter().map(mapper).collect(),
    })
}

/// Slices and maps one page of an in-memory sequence.
///
/// A page beyond the last one yields no items.
pub fn paginate_array<I, T, F>(
    items: &[I],
    mapper: F,
    raw_page: i64,
    raw_limit: i64,
) -> PageResult<T>
where
    F: Fn(&I) -> T,
{
    let params = paginate(raw_page, raw_limit);
    let total_items = items.len() as u64;
    let total_pages = total_pages(total_items, params.limit);

    let slice: &[I] = if params.page > total_pages {
        &[]
    } else {
        let start = usize::try_from(params.skip)
            .unwrap_or(items.len())
            .min(items.len());
        let end = start
            .saturating_add(params.limit as usize)
            .min(items.len());
        &items[start..end]
    };

    PageResult {
        total_items,
        total_pages,
        page: params.page,
        limit: params.limit,
        items: slice.iter().map(mapper).collect(),
    }
}

fn total_pages(total_items: u64, limit: u32) -> u64 {
    total_items.div_ceil(u64::from(limit))
}
