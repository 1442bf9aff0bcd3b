//! Cursor pagination for the list methods.
//!
//! A cursor is the decimal string of a zero-based offset. A page size of
//! zero disables pagination.

use thiserror::Error;

/// A cursor that does not decode to an offset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid cursor: {0}")]
pub struct InvalidCursor(pub String);

/// One page of a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Entries on this page.
    pub items: Vec<T>,
    /// Cursor for the next page, if entries remain.
    pub next_cursor: Option<String>,
}

/// Decodes a cursor. `None` and the empty string mean offset 0.
///
/// # Errors
///
/// Returns [`InvalidCursor`] for anything but a non-negative integer.
pub fn decode_cursor(cursor: Option<&str>) -> Result<usize, InvalidCursor> {
    match cursor {
        None | Some("") => Ok(0),
        Some(c) => c.parse().map_err(|_| InvalidCursor(c.to_string())),
    }
}

/// Slices `items` into the page starting at `cursor`.
///
/// With `page_size == 0` the whole list is returned and no cursor is
/// produced. An offset past the end yields an empty page.
///
/// # Errors
///
/// Returns [`InvalidCursor`] if the cursor cannot be decoded.
pub fn paginate<T>(items: Vec<T>, page_size: usize, cursor: Option<&str>) -> Result<Page<T>, InvalidCursor> {
    if page_size == 0 {
        return Ok(Page {
            items,
            next_cursor: None,
        });
    }

    let offset = decode_cursor(cursor)?;
    let total = items.len();
    let end = offset.saturating_add(page_size);
    let next_cursor = (end < total).then(|| end.to_string());
    let items = items.into_iter().skip(offset).take(page_size).collect();

    Ok(Page { items, next_cursor })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_page_size_returns_everything() {
        let page = paginate(vec![1, 2, 3], 0, Some("2")).unwrap();
        assert_eq!(page.items, [1, 2, 3]);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn walks_pages() {
        let items: Vec<_> = (0..5).collect();
        let first = paginate(items.clone(), 2, None).unwrap();
        assert_eq!(first.items, [0, 1]);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        let second = paginate(items.clone(), 2, first.next_cursor.as_deref()).unwrap();
        assert_eq!(second.items, [2, 3]);
        assert_eq!(second.next_cursor.as_deref(), Some("4"));

        let last = paginate(items, 2, second.next_cursor.as_deref()).unwrap();
        assert_eq!(last.items, [4]);
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn exact_fit_has_no_cursor() {
        let page = paginate(vec!['a', 'b'], 2, Some("")).unwrap();
        assert_eq!(page.items, ['a', 'b']);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn offset_past_end_is_empty() {
        let page = paginate(vec![1, 2], 1, Some("10")).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn bad_cursors() {
        assert_eq!(paginate(vec![1], 1, Some("abc")), Err(InvalidCursor("abc".into())));
        assert!(paginate(vec![1], 1, Some("-1")).is_err());
    }
}
