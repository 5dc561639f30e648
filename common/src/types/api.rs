use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Envelope wrapping every API response.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub status_code: u16,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            success: true,
            message: message.into(),
            status_code,
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            success: false,
            message: message.into(),
            status_code,
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// One page cut out of an in-memory list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// 1-based.
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

impl<T> Page<'_, T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Slices `items` into 1-based pages. Out-of-range pages clamp to the last one.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let start = ((page - 1) * page_size).min(total);
    let end = (start + page_size).min(total);

    Page {
        items: &items[start..end],
        page,
        total_pages,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginates_with_a_short_last_page() {
        let items: Vec<u32> = (1..=12).collect();
        let page = paginate(&items, 3, 5);
        assert_eq!(page.items, &[11, 12]);
        assert_eq!(page.total_pages, 3);
        assert!(!page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn out_of_range_pages_are_clamped() {
        let items: Vec<u32> = (1..=4).collect();
        assert_eq!(paginate(&items, 0, 3).page, 1);
        assert_eq!(paginate(&items, 9, 3).items, &[4]);
    }

    #[test]
    fn empty_lists_have_a_single_empty_page() {
        let items: Vec<u32> = Vec::new();
        let page = paginate(&items, 1, 5);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next());
    }

    #[test]
    fn error_envelope_omits_data() {
        let body: ApiResponse<()> = ApiResponse::error("Booking not found", 404);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
    }
}
