use crate::error::{ServerError, ServerResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ferrite_mcp_types::Cursor;

/// Page size used by every `*/list` method unless a future capability
/// negotiation exposes a client-preferred size.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A cursor is just a base64-encoded offset into the listing it was issued
/// for. Opaque to the client per the MCP contract, but there is no need for
/// anything fancier than an offset: registries are rebuilt in full on every
/// list call, so there's no stable item identity to page by.
pub fn encode_cursor(offset: usize) -> Cursor {
    URL_SAFE_NO_PAD.encode(offset.to_string())
}

pub fn decode_cursor(cursor: &Cursor) -> ServerResult<usize> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| ServerError::InvalidInput("malformed cursor".to_string()))?;
    let text =
        String::from_utf8(bytes).map_err(|_| ServerError::InvalidInput("malformed cursor".to_string()))?;
    text.parse()
        .map_err(|_| ServerError::InvalidInput("malformed cursor".to_string()))
}

/// Slice `items` into the page starting at `cursor` (or the beginning, if
/// `None`), sized `page_size`. Returns the page plus the cursor for the
/// next one, or `None` once the end is reached.
pub fn paginate<T: Clone>(
    items: &[T],
    cursor: Option<&Cursor>,
    page_size: usize,
) -> ServerResult<(Vec<T>, Option<Cursor>)> {
    let start = match cursor {
        Some(c) => decode_cursor(c)?,
        None => 0,
    };
    if start > items.len() {
        return Err(ServerError::InvalidInput("cursor out of range".to_string()));
    }
    let end = (start + page_size).min(items.len());
    let page = items[start..end].to_vec();
    let next = if end < items.len() {
        Some(encode_cursor(end))
    } else {
        None
    };
    Ok((page, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginates_across_multiple_pages() {
        let items: Vec<i32> = (0..125).collect();
        let (page1, cursor1) = paginate(&items, None, 50).unwrap();
        assert_eq!(page1.len(), 50);
        assert_eq!(page1[0], 0);
        let cursor1 = cursor1.unwrap();

        let (page2, cursor2) = paginate(&items, Some(&cursor1), 50).unwrap();
        assert_eq!(page2[0], 50);
        let cursor2 = cursor2.unwrap();

        let (page3, cursor3) = paginate(&items, Some(&cursor2), 50).unwrap();
        assert_eq!(page3.len(), 25);
        assert!(cursor3.is_none());
    }

    #[test]
    fn rejects_malformed_cursor() {
        let items = vec![1, 2, 3];
        let bogus: Cursor = "not-base64!!".to_string();
        assert!(paginate(&items, Some(&bogus), 10).is_err());
    }
}
