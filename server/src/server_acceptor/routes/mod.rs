pub mod auth;
pub mod bookings;
pub mod covid;
pub mod payments;
pub mod services;

use crate::error::AppError;
use common::constants::{MAX_PAGE_SIZE, SERVER_PAGE_SIZE};
use common::types::api::{Paginated, paginate};
use serde::Deserialize;
use uuid::Uuid;

/// Parses an id taken from the path. Malformed ids read as missing resources.
pub fn parse_id(raw: &str, resource: &'static str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound(format!("{resource} not found")))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PageQuery {
    fn number(raw: &Option<String>, name: &str) -> Result<Option<usize>, AppError> {
        match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Some)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid {name}: {value}"))),
        }
    }

    pub fn page(&self) -> Result<Option<usize>, AppError> {
        Self::number(&self.page, "page")
    }

    pub fn page_size(&self) -> Result<Option<usize>, AppError> {
        Self::number(&self.page_size, "page_size")
    }
}

/// Cuts `items` into a page in the envelope's `count/next/previous/results` shape.
pub fn paginated<T: Clone>(
    items: Vec<T>,
    page: Option<usize>,
    page_size: Option<usize>,
) -> Paginated<T> {
    let page_size = page_size.unwrap_or(SERVER_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let page = paginate(&items, page.unwrap_or(1), page_size);
    Paginated {
        count: page.total,
        next: page
            .has_next()
            .then(|| format!("?page={}&page_size={page_size}", page.page + 1)),
        previous: page
            .has_previous()
            .then(|| format!("?page={}&page_size={page_size}", page.page - 1)),
        results: page.items.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_link_to_their_neighbours() {
        let items: Vec<u32> = (0..25).collect();
        let second = paginated(items, Some(2), None);
        assert_eq!(second.count, 25);
        assert_eq!(second.results, (10..20).collect::<Vec<_>>());
        assert_eq!(second.next.as_deref(), Some("?page=3&page_size=10"));
        assert_eq!(second.previous.as_deref(), Some("?page=1&page_size=10"));
    }

    #[test]
    fn page_numbers_must_be_positive() {
        let query = PageQuery {
            page: Some("0".into()),
            page_size: Some("abc".into()),
        };
        assert!(query.page().is_err());
        assert!(query.page_size().is_err());
        assert_eq!(PageQuery::default().page().unwrap(), None);
    }

    #[test]
    fn malformed_ids_are_not_found() {
        let err = parse_id("not-a-uuid", "Booking").unwrap_err();
        assert_eq!(err.to_string(), "Booking not found");
    }
}
