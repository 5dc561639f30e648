use crate::api::base::{ApiSession, BaseApiClient};
use crate::error::ApiError;
use common::types::covid::RestrictionResponse;
use common::utils::clean_city;
use std::sync::Arc;

#[derive(Clone)]
pub struct CovidApi {
    base: BaseApiClient,
}

fn restriction_query(country: &str, state: Option<&str>, city: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![("country", country.trim().to_string())];
    if let Some(state) = state.map(str::trim).filter(|s| !s.is_empty()) {
        query.push(("state", state.to_string()));
    }
    if let Some(city) = city.map(clean_city).filter(|c| !c.is_empty()) {
        query.push(("city", city));
    }
    query
}

impl CovidApi {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self {
            base: BaseApiClient::new(session, "covid"),
        }
    }

    pub async fn restriction(
        &self,
        country: &str,
        state: Option<&str>,
        city: Option<&str>,
    ) -> Result<RestrictionResponse, ApiError> {
        let query = restriction_query(country, state, city);
        self.base
            .get_with("restriction/", &query)
            .await?
            .data
            .ok_or_else(|| ApiError::Decode("restriction missing from response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_is_cleaned_before_sending() {
        let query = restriction_query(" au ", Some("NSW"), Some("  Sydney// "));
        assert_eq!(
            query,
            vec![
                ("country", "au".to_string()),
                ("state", "NSW".to_string()),
                ("city", "Sydney".to_string())
            ]
        );
        assert_eq!(restriction_query("US", Some(" "), Some("/")).len(), 1);
    }
}
