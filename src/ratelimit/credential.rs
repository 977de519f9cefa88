//! Credentials and their ceilings.

use serde::{Deserialize, Serialize};

use super::window::Dimension;

/// An API credential paired with its own consumption ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Credential identifier, also used in store keys
    pub id: String,
    /// Maximum requests inside the short request window
    pub max_requests_per_window: u64,
    /// Maximum units inside the per-minute window
    pub max_units_per_minute: u64,
    /// Maximum units inside the per-day window
    pub max_units_per_day: u64,
}

impl Credential {
    /// Create a new credential.
    pub fn new(
        id: impl Into<String>,
        max_requests_per_window: u64,
        max_units_per_minute: u64,
        max_units_per_day: u64,
    ) -> Self {
        Self {
            id: id.into(),
            max_requests_per_window,
            max_units_per_minute,
            max_units_per_day,
        }
    }

    /// The ceiling configured for a dimension.
    pub fn limit(&self, dimension: Dimension) -> u64 {
        match dimension {
            Dimension::Requests => self.max_requests_per_window,
            Dimension::UnitsPerMinute => self.max_units_per_minute,
            Dimension::UnitsPerDay => self.max_units_per_day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_per_dimension() {
        let credential = Credential::new("key-a", 2, 5000, 100000);

        assert_eq!(credential.limit(Dimension::Requests), 2);
        assert_eq!(credential.limit(Dimension::UnitsPerMinute), 5000);
        assert_eq!(credential.limit(Dimension::UnitsPerDay), 100000);
    }

    #[test]
    fn test_deserialize_credential() {
        let yaml = r#"
id: api_key_1
max_requests_per_window: 2
max_units_per_minute: 5000
max_units_per_day: 100000
"#;
        let credential: Credential = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(credential, Credential::new("api_key_1", 2, 5000, 100000));
    }
}
