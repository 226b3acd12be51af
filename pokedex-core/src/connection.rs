//! Relay-style connections over offset-addressable collections
//!
//! A caller fetches one physical page of rows (offset/limit against a
//! store) and hands it to [`connection_from_slice`] together with the
//! page's position inside the full, never-materialized collection. The
//! slicer trims the rows to the window the arguments ask for and computes
//! page info that stays correct for cursors outside the fetched rows.

use serde::{Deserialize, Serialize};

use crate::cursor;
use crate::error::{PaginationError, PaginationResult};

/// Arguments a connection field receives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageArguments {
    pub first: Option<i64>,
    pub after: Option<String>,
    pub last: Option<i64>,
    pub before: Option<String>,
}

impl PageArguments {
    /// Forward pagination: `first` items after `after`.
    pub fn forward(first: i64, after: Option<String>) -> Self {
        Self {
            first: Some(first),
            after,
            ..Self::default()
        }
    }

    /// Backward pagination: `last` items before `before`.
    pub fn backward(last: i64, before: Option<String>) -> Self {
        Self {
            last: Some(last),
            before,
            ..Self::default()
        }
    }

    /// Reject negative counts.
    pub fn validate(&self) -> PaginationResult<()> {
        if let Some(first) = self.first.filter(|n| *n < 0) {
            return Err(PaginationError::invalid_argument("first", first));
        }
        if let Some(last) = self.last.filter(|n| *n < 0) {
            return Err(PaginationError::invalid_argument("last", last));
        }
        Ok(())
    }
}

/// Where a fetched slice sits inside the full collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceMeta {
    slice_start: i64,
    total_length: i64,
}

impl SliceMeta {
    pub fn new(slice_start: i64, total_length: i64) -> PaginationResult<Self> {
        if slice_start < 0 {
            return Err(PaginationError::invalid_argument("sliceStart", slice_start));
        }
        if total_length < 0 {
            return Err(PaginationError::invalid_argument("totalLength", total_length));
        }
        Ok(Self {
            slice_start,
            total_length,
        })
    }

    pub fn slice_start(&self) -> i64 {
        self.slice_start
    }

    pub fn total_length(&self) -> i64 {
        self.total_length
    }
}

/// A node plus the cursor of its absolute position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: String,
}

/// Page boundaries and whether more items exist beyond them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

/// Paginated result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    /// Transform every node, keeping cursors and page info.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Connection<U> {
        Connection {
            edges: self
                .edges
                .into_iter()
                .map(|edge| Edge {
                    node: f(edge.node),
                    cursor: edge.cursor,
                })
                .collect(),
            page_info: self.page_info,
        }
    }

    /// Nodes in edge order.
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Absolute `[start, end)` bounds of a window plus the decoded cursors.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: i64,
    end: i64,
    after: i64,
    before: i64,
}

fn compute_window(
    args: &PageArguments,
    slice_start: i64,
    slice_end: i64,
    total_length: i64,
) -> PaginationResult<Window> {
    let before = cursor::offset_with_default(args.before.as_deref(), total_length);
    let after = cursor::offset_with_default(args.after.as_deref(), -1);

    // cursors come from clients and may decode to any non-negative offset
    let mut start = (slice_start - 1).max(after).max(-1).saturating_add(1);
    let mut end = slice_end.min(before).min(total_length);

    if let Some(first) = args.first {
        if first < 0 {
            return Err(PaginationError::invalid_argument("first", first));
        }
        end = end.min(start.saturating_add(first));
    }
    if let Some(last) = args.last {
        if last < 0 {
            return Err(PaginationError::invalid_argument("last", last));
        }
        start = start.max(end.saturating_sub(last));
    }

    Ok(Window {
        start,
        end,
        after,
        before,
    })
}

/// Absolute `[start, end)` range a store should fetch so that
/// [`connection_from_slice`] can serve `args` from a single page.
///
/// The range may be empty (`start == end`), in which case no rows are needed.
pub fn fetch_window(args: &PageArguments, total_length: i64) -> PaginationResult<(i64, i64)> {
    let meta = SliceMeta::new(0, total_length)?;
    let window = compute_window(args, 0, meta.total_length, meta.total_length)?;
    let start = window.start.min(meta.total_length);
    Ok((start, window.end.clamp(start, meta.total_length)))
}

/// Build a connection from a fetched slice of the collection.
///
/// `items` may be larger than the requested window; surplus rows on
/// either side are dropped.
pub fn connection_from_slice<T>(
    items: Vec<T>,
    args: &PageArguments,
    meta: SliceMeta,
) -> PaginationResult<Connection<T>> {
    let len = items.len() as i64;
    let slice_end = meta.slice_start.saturating_add(len);
    let window = compute_window(args, meta.slice_start, slice_end, meta.total_length)?;

    let lo = (window.start - meta.slice_start).clamp(0, len);
    let hi = (len - (slice_end - window.end)).clamp(0, len);

    let edges: Vec<Edge<T>> = if lo < hi {
        items
            .into_iter()
            .skip(lo as usize)
            .take((hi - lo) as usize)
            .enumerate()
            .map(|(i, node)| Edge {
                node,
                cursor: cursor::encode(window.start + i as i64),
            })
            .collect()
    } else {
        Vec::new()
    };

    let lower_bound = if args.after.is_some() {
        window.after.saturating_add(1)
    } else {
        0
    };
    let upper_bound = if args.before.is_some() {
        window.before
    } else {
        meta.total_length
    };

    let page_info = PageInfo {
        start_cursor: edges.first().map(|edge| edge.cursor.clone()),
        end_cursor: edges.last().map(|edge| edge.cursor.clone()),
        has_previous_page: args.last.is_some() && window.start > lower_bound,
        has_next_page: args.first.is_some() && window.end < upper_bound,
    };

    Ok(Connection { edges, page_info })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters() -> Vec<char> {
        "ABCDEFGHIJ".chars().collect()
    }

    fn full(args: PageArguments) -> Connection<char> {
        connection_from_slice(letters(), &args, SliceMeta::new(0, 10).unwrap()).unwrap()
    }

    fn indices<T>(conn: &Connection<T>) -> Vec<i64> {
        conn.edges
            .iter()
            .map(|edge| cursor::decode(&edge.cursor).unwrap())
            .collect()
    }

    #[test]
    fn first_three() {
        let conn = full(PageArguments::forward(3, None));
        assert_eq!(indices(&conn), vec![0, 1, 2]);
        assert_eq!(conn.nodes().copied().collect::<Vec<_>>(), vec!['A', 'B', 'C']);
        assert!(conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);
        assert_eq!(conn.page_info.start_cursor, Some(cursor::encode(0)));
        assert_eq!(conn.page_info.end_cursor, Some(cursor::encode(2)));
    }

    #[test]
    fn first_three_after_cursor() {
        let conn = full(PageArguments::forward(3, Some(cursor::encode(2))));
        assert_eq!(indices(&conn), vec![3, 4, 5]);
        assert!(conn.page_info.has_next_page);
    }

    #[test]
    fn last_five_reaches_end() {
        let conn = full(PageArguments::backward(5, None));
        assert_eq!(indices(&conn), vec![5, 6, 7, 8, 9]);
        assert!(conn.page_info.has_previous_page);
        assert!(!conn.page_info.has_next_page);
    }

    #[test]
    fn last_two_before_cursor() {
        let conn = full(PageArguments::backward(2, Some(cursor::encode(4))));
        assert_eq!(indices(&conn), vec![2, 3]);
        assert!(conn.page_info.has_previous_page);
    }

    #[test]
    fn negative_counts_are_rejected() {
        let err = connection_from_slice(
            letters(),
            &PageArguments::forward(-1, None),
            SliceMeta::new(0, 10).unwrap(),
        )
        .unwrap_err();
        assert_eq!(err, PaginationError::invalid_argument("first", -1));

        let err = connection_from_slice(
            letters(),
            &PageArguments::backward(-2, None),
            SliceMeta::new(0, 10).unwrap(),
        )
        .unwrap_err();
        assert_eq!(err, PaginationError::invalid_argument("last", -2));
    }

    #[test]
    fn negative_meta_is_rejected() {
        assert!(SliceMeta::new(-1, 10).is_err());
        assert!(SliceMeta::new(0, -1).is_err());
    }

    #[test]
    fn no_arguments_returns_everything() {
        let conn = full(PageArguments::default());
        assert_eq!(conn.len(), 10);
        assert!(!conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);
    }

    #[test]
    fn garbage_cursor_falls_back_to_default() {
        let conn = full(PageArguments::forward(2, Some("garbage".into())));
        assert_eq!(indices(&conn), vec![0, 1]);
    }

    #[test]
    fn empty_window_has_null_cursors() {
        let conn = full(PageArguments::forward(3, Some(cursor::encode(9))));
        assert!(conn.is_empty());
        assert_eq!(conn.page_info, PageInfo::default());

        let conn = full(PageArguments::forward(0, None));
        assert!(conn.is_empty());
        assert!(conn.page_info.has_next_page);
    }

    #[test]
    fn after_and_before_overlap_is_empty() {
        let args = PageArguments {
            first: Some(5),
            after: Some(cursor::encode(6)),
            before: Some(cursor::encode(3)),
            ..PageArguments::default()
        };
        let conn = full(args);
        assert!(conn.is_empty());
    }

    #[test]
    fn partial_slice_uses_absolute_cursors() {
        // rows 4..7 of a 10-row collection
        let rows = vec!['E', 'F', 'G'];
        let args = PageArguments::forward(2, Some(cursor::encode(3)));
        let conn = connection_from_slice(rows, &args, SliceMeta::new(4, 10).unwrap()).unwrap();
        assert_eq!(indices(&conn), vec![4, 5]);
        assert_eq!(conn.nodes().copied().collect::<Vec<_>>(), vec!['E', 'F']);
        assert!(conn.page_info.has_next_page);
    }

    #[test]
    fn oversized_slice_is_trimmed() {
        let args = PageArguments::forward(2, Some(cursor::encode(5)));
        let conn = connection_from_slice(letters(), &args, SliceMeta::new(0, 10).unwrap()).unwrap();
        assert_eq!(conn.nodes().copied().collect::<Vec<_>>(), vec!['G', 'H']);
    }

    #[test]
    fn before_cursor_outside_slice_yields_nothing() {
        let rows = vec!['K', 'L', 'M'];
        let args = PageArguments::backward(2, Some(cursor::encode(3)));
        let conn = connection_from_slice(rows, &args, SliceMeta::new(10, 20).unwrap()).unwrap();
        assert!(conn.is_empty());
    }

    #[test]
    fn fetch_window_matches_slicer() {
        let cases = vec![
            PageArguments::forward(3, None),
            PageArguments::forward(3, Some(cursor::encode(2))),
            PageArguments::backward(5, None),
            PageArguments::backward(2, Some(cursor::encode(4))),
            PageArguments::forward(20, Some(cursor::encode(7))),
        ];
        for args in cases {
            let (start, end) = fetch_window(&args, 10).unwrap();
            let rows: Vec<char> = letters()[start as usize..end as usize].to_vec();
            let paged = connection_from_slice(rows, &args, SliceMeta::new(start, 10).unwrap()).unwrap();
            assert_eq!(paged, full(args));
        }
    }

    #[test]
    fn huge_after_cursor_yields_empty_page() {
        let after = Some(cursor::encode(i64::MAX));

        let conn = full(PageArguments::forward(3, after.clone()));
        assert!(conn.is_empty());
        assert!(!conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);

        let args = PageArguments {
            last: Some(3),
            after,
            ..PageArguments::default()
        };
        assert_eq!(fetch_window(&args, 10).unwrap(), (10, 10));
        assert!(full(args).is_empty());
    }

    #[test]
    fn huge_before_cursor_is_bounded_by_total() {
        let args = PageArguments::backward(3, Some(cursor::encode(i64::MAX)));
        assert_eq!(fetch_window(&args, 10).unwrap(), (7, 10));

        let conn = full(args);
        assert_eq!(indices(&conn), vec![7, 8, 9]);
        assert!(conn.page_info.has_previous_page);
    }

    #[test]
    fn slice_starting_at_max_offset() {
        let args = PageArguments::forward(2, Some(cursor::encode(i64::MAX - 1)));
        let meta = SliceMeta::new(i64::MAX, 10).unwrap();
        let conn = connection_from_slice(Vec::<char>::new(), &args, meta).unwrap();
        assert!(conn.is_empty());
        assert!(!conn.page_info.has_next_page);
    }

    #[test]
    fn map_keeps_cursors() {
        let conn = full(PageArguments::forward(2, None)).map(|c| c.to_ascii_lowercase());
        assert_eq!(conn.nodes().copied().collect::<Vec<_>>(), vec!['a', 'b']);
        assert_eq!(indices(&conn), vec![0, 1]);
    }

    #[test]
    fn validate_checks_counts() {
        assert!(PageArguments::forward(0, None).validate().is_ok());
        assert!(PageArguments::backward(-1, None).validate().is_err());
    }
}
