use serde::Serialize;

/// Pagination over `item_count` rows.
///
/// `offset`/`limit` feed the `limit ?, ?` clause directly. An empty result set or an
/// index past the last page yields `offset = 0, limit = 0` on page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub item_count: u32,
    pub page_index: u32,
    pub page_size: u32,
    pub page_count: u32,
    pub offset: u32,
    pub limit: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Page {
    pub const DEFAULT_SIZE: u32 = 10;

    pub fn new(item_count: u32, page_index: u32, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        let page_count = item_count.div_ceil(page_size);
        let (page_index, offset, limit) = if item_count == 0 || page_index > page_count {
            (1, 0, 0)
        } else {
            (page_index, page_size * (page_index - 1), page_size)
        };
        Self {
            item_count,
            page_index,
            page_size,
            page_count,
            offset,
            limit,
            has_next: page_index < page_count,
            has_previous: page_index > 1,
        }
    }
}

/// Parses a `?page=` value; anything missing, malformed or below 1 is page 1.
pub fn page_index(raw: Option<&str>) -> u32 {
    raw.and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|&index| index >= 1)
        .map(|index| u32::try_from(index).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_page() {
        let page = Page::new(91, 3, 10);
        assert_eq!(page.page_count, 10);
        assert_eq!(page.offset, 20);
        assert_eq!(page.limit, 10);
        assert!(page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn last_partial_page() {
        let page = Page::new(91, 10, 10);
        assert_eq!(page.offset, 90);
        assert_eq!(page.limit, 10);
        assert!(!page.has_next);
    }

    #[test]
    fn empty_and_out_of_range_fall_back_to_first_page() {
        let empty = Page::new(0, 1, 10);
        assert_eq!(empty.page_count, 0);
        assert_eq!((empty.page_index, empty.offset, empty.limit), (1, 0, 0));
        assert!(!empty.has_next);
        assert!(!empty.has_previous);

        let past = Page::new(25, 4, 10);
        assert_eq!(past.page_count, 3);
        assert_eq!((past.page_index, past.offset, past.limit), (1, 0, 0));
        assert!(past.has_next);
    }

    #[test]
    fn page_index_parsing() {
        assert_eq!(page_index(None), 1);
        assert_eq!(page_index(Some("")), 1);
        assert_eq!(page_index(Some("abc")), 1);
        assert_eq!(page_index(Some("0")), 1);
        assert_eq!(page_index(Some("-3")), 1);
        assert_eq!(page_index(Some(" 4 ")), 4);
    }
}
