use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl RestrictionLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RestrictionLevel::Low => "Low",
            RestrictionLevel::Medium => "Medium",
            RestrictionLevel::High => "High",
            RestrictionLevel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RestrictionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestrictionQuery {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictionResponse {
    pub restriction_level: RestrictionLevel,
    pub country: String,
    pub state: Option<String>,
    pub city: Option<String>,
}
