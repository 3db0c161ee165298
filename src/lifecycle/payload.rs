use serde::Deserialize;

use crate::error::CivicError;
use crate::priority::Priority;
use crate::types::{Category, IssueDraft};

/// Issue fields as submitted by a client. Everything is optional here so the
/// manager can report all missing fields at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssuePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub priority: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl IssuePayload {
    pub fn validate(&self) -> Result<IssueDraft, CivicError> {
        let title = present(&self.title);
        let description = present(&self.description);
        let category = present(&self.category);
        let address = present(&self.address);

        let missing: Vec<&str> = [
            ("title", title.is_none()),
            ("description", description.is_none()),
            ("category", category.is_none()),
            ("address", address.is_none()),
            ("latitude", self.latitude.is_none()),
            ("longitude", self.longitude.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();

        let (Some(title), Some(description), Some(category), Some(address), Some(latitude), Some(longitude)) =
            (title, description, category, address, self.latitude, self.longitude)
        else {
            return Err(CivicError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        };

        let category: Category = category.parse().map_err(CivicError::Validation)?;

        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CivicError::validation(format!("latitude {latitude} is out of range")));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CivicError::validation(format!("longitude {longitude} is out of range")));
        }

        let priority = match present(&self.priority) {
            Some(raw) => raw.parse::<Priority>().map_err(CivicError::Validation)?,
            None => Priority::default(),
        };

        Ok(IssueDraft {
            title: title.to_string(),
            description: description.to_string(),
            category,
            address: address.to_string(),
            latitude,
            longitude,
            priority,
        })
    }
}
