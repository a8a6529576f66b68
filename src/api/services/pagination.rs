//! Cursor pagination.
//!
//! Pages are cut over an internal, monotonically increasing sequence number that is
//! never exposed. Clients page with a public cursor instead: the `row_id` of a boundary
//! response, or the id of a boundary package. Each cursor costs one point lookup to
//! turn it back into a sequence number; cursors that resolve to nothing are ignored.
//!
//! One extra row is fetched beyond the page size to learn whether another page exists
//! in the direction of travel. The opposite direction is known from the cursor itself.
//! When the page edge falls inside a group of items sharing a cursor, the page grows
//! to cover the whole group.

use async_trait::async_trait;

use crate::storage::{SequenceRange, StorageError};

pub const PAGE_SIZE_PARAM: &str = "page[size]";
pub const AFTER_CURSOR_PARAM: &str = "page[afterCursor]";
pub const BEFORE_CURSOR_PARAM: &str = "page[beforeCursor]";

/// A page request as decoded from the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub size: usize,
    pub after: Option<String>,
    pub before: Option<String>,
}

impl PageRequest {
    /// Read `page[size]`, `page[afterCursor]` and `page[beforeCursor]`.
    /// Empty cursors count as absent.
    pub fn from_query(query: &[(String, String)], size: usize) -> Self {
        let cursor = |key: &str| {
            query_param(query, key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            size,
            after: cursor(AFTER_CURSOR_PARAM),
            before: cursor(BEFORE_CURSOR_PARAM),
        }
    }
}

/// One page of items plus whether neighbouring pages exist.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub has_next: bool,
    pub has_previous: bool,
}

/// A collection ordered by an internal sequence that can be paged by public cursor.
#[async_trait]
pub trait SequencedSource: Send + Sync {
    type Item: Send;

    /// Sequence to page forward from when `cursor` is the last item seen: the highest
    /// sequence carrying `cursor`.
    async fn sequence_after(&self, cursor: &str) -> Result<Option<i64>, StorageError>;

    /// Sequence to page backward from when `cursor` is the first item seen: the lowest
    /// sequence carrying `cursor`.
    async fn sequence_before(&self, cursor: &str) -> Result<Option<i64>, StorageError>;

    /// Ordered scan bounded by `range`.
    async fn scan(&self, range: SequenceRange) -> Result<Vec<Self::Item>, StorageError>;

    /// Public cursor of an item. Several items may share a cursor.
    fn cursor_of(item: &Self::Item) -> String;

    /// Internal sequence of an item.
    fn sequence_of(item: &Self::Item) -> i64;
}

/// Fetch one page from `source`.
///
/// `afterCursor` takes precedence when both cursors are supplied. A page always ends
/// on the last item carrying its final cursor and starts on the first item carrying
/// its first cursor, so following `next` and `previous` never skips items that share
/// a cursor. A page may run past `size` to reach that boundary.
pub async fn paginate<S>(
    source: &S,
    request: &PageRequest,
) -> Result<CursorPage<S::Item>, StorageError>
where
    S: SequencedSource + ?Sized,
{
    if let Some(cursor) = request.after.as_deref() {
        if let Some(after) = source.sequence_after(cursor).await? {
            let (items, has_next) = page_forward(source, Some(after), request.size).await?;
            return Ok(CursorPage {
                items,
                has_next,
                has_previous: true,
            });
        }
    } else if let Some(cursor) = request.before.as_deref() {
        if let Some(before) = source.sequence_before(cursor).await? {
            let (items, has_previous) = page_backward(source, before, request.size).await?;
            return Ok(CursorPage {
                items,
                has_next: true,
                has_previous,
            });
        }
    }

    let (items, has_next) = page_forward(source, None, request.size).await?;
    Ok(CursorPage {
        items,
        has_next,
        has_previous: false,
    })
}

/// Up to `size` items after `after`, completed to a cursor boundary, and whether more
/// items follow.
async fn page_forward<S>(
    source: &S,
    after: Option<i64>,
    size: usize,
) -> Result<(Vec<S::Item>, bool), StorageError>
where
    S: SequencedSource + ?Sized,
{
    let mut items = source
        .scan(SequenceRange {
            after,
            before: None,
            descending: false,
            limit: size + 1,
        })
        .await?;
    if items.len() <= size {
        return Ok((items, false));
    }
    items.truncate(size);

    // Pull in the rest of the boundary cursor's items, and anything interleaved with them.
    while let Some(last) = items.last() {
        let sequence = S::sequence_of(last);
        let Some(end) = source.sequence_after(&S::cursor_of(last)).await? else {
            break;
        };
        if end <= sequence {
            break;
        }
        let rest = source
            .scan(SequenceRange {
                after: Some(sequence),
                before: Some(end + 1),
                descending: false,
                limit: usize::MAX,
            })
            .await?;
        if rest.is_empty() {
            break;
        }
        items.extend(rest);
    }

    let has_next = match items.last() {
        Some(last) => !source
            .scan(SequenceRange {
                after: Some(S::sequence_of(last)),
                before: None,
                descending: false,
                limit: 1,
            })
            .await?
            .is_empty(),
        None => false,
    };
    Ok((items, has_next))
}

/// Up to `size` items before `before` in ascending order, completed to a cursor
/// boundary, and whether more items precede them.
async fn page_backward<S>(
    source: &S,
    before: i64,
    size: usize,
) -> Result<(Vec<S::Item>, bool), StorageError>
where
    S: SequencedSource + ?Sized,
{
    let mut items = source
        .scan(SequenceRange {
            after: None,
            before: Some(before),
            descending: true,
            limit: size + 1,
        })
        .await?;
    if items.len() <= size {
        items.reverse();
        return Ok((items, false));
    }
    items.truncate(size);
    items.reverse();

    while let Some(first) = items.first() {
        let sequence = S::sequence_of(first);
        let Some(start) = source.sequence_before(&S::cursor_of(first)).await? else {
            break;
        };
        if start >= sequence {
            break;
        }
        let mut earlier = source
            .scan(SequenceRange {
                after: Some(start - 1),
                before: Some(sequence),
                descending: false,
                limit: usize::MAX,
            })
            .await?;
        if earlier.is_empty() {
            break;
        }
        earlier.append(&mut items);
        items = earlier;
    }

    let has_previous = match items.first() {
        Some(first) => !source
            .scan(SequenceRange {
                after: None,
                before: Some(S::sequence_of(first)),
                descending: true,
                limit: 1,
            })
            .await?
            .is_empty(),
        None => false,
    };
    Ok((items, has_previous))
}

impl<T> CursorPage<T> {
    /// Cursor for the next page: the last item on this page.
    pub fn next_cursor(&self, cursor_of: impl Fn(&T) -> String) -> Option<String> {
        if self.has_next {
            self.items.last().map(cursor_of)
        } else {
            None
        }
    }

    /// Cursor for the previous page: the first item on this page.
    pub fn previous_cursor(&self, cursor_of: impl Fn(&T) -> String) -> Option<String> {
        if self.has_previous {
            self.items.first().map(cursor_of)
        } else {
            None
        }
    }
}

/// Builds `self`, `next` and `previous` links from the request URL.
#[derive(Debug, Clone)]
pub struct PageLinks {
    base: String,
    query: Vec<(String, String)>,
}

impl PageLinks {
    /// `base` is the absolute URL without query; `query` the decoded request parameters
    /// in their original order.
    pub fn new(base: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self {
            base: base.into(),
            query,
        }
    }

    /// The request URL without its query.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The request URL itself.
    pub fn current(&self) -> String {
        self.render(&self.query)
    }

    /// Link for the page after `cursor`. Clears any `beforeCursor`.
    pub fn after(&self, cursor: &str) -> String {
        self.render(&self.replace(AFTER_CURSOR_PARAM, BEFORE_CURSOR_PARAM, cursor))
    }

    /// Link for the page before `cursor`. Clears any `afterCursor`.
    pub fn before(&self, cursor: &str) -> String {
        self.render(&self.replace(BEFORE_CURSOR_PARAM, AFTER_CURSOR_PARAM, cursor))
    }

    fn replace(&self, set: &str, clear: &str, cursor: &str) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .query
            .iter()
            .filter(|(key, _)| key != set && key != clear)
            .cloned()
            .collect();
        query.push((set.to_string(), cursor.to_string()));
        query
    }

    fn render(&self, query: &[(String, String)]) -> String {
        if query.is_empty() {
            return self.base.clone();
        }
        let encoded: Vec<String> = query
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect();
        format!("{}?{}", self.base, encoded.join("&"))
    }
}

/// Last value of `key` in a decoded query.
pub fn query_param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .rev()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}
