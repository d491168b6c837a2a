use serde::{Deserialize, Serialize};

use crate::model::common::non_blank;

/// Optional equality filters applied inside a scope.
///
/// A blank value is treated exactly like a missing one, never as a literal
/// empty-string match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ResourceFilter {
    pub fn new(application: Option<String>, status: Option<String>) -> Self {
        Self {
            application,
            status,
        }
        .normalized()
    }

    /// Trims every value and drops the blank ones.
    pub fn normalized(self) -> Self {
        Self {
            application: non_blank(self.application.as_deref()).map(str::to_string),
            status: non_blank(self.status.as_deref()).map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.application.is_none() && self.status.is_none()
    }

    /// Present predicates as `(column, value)` pairs, in a fixed order.
    pub fn predicates(&self) -> Vec<(&'static str, &str)> {
        let mut predicates = Vec::new();
        if let Some(application) = &self.application {
            predicates.push(("application", application.as_str()));
        }
        if let Some(status) = &self.status {
            predicates.push(("status", status.as_str()));
        }
        predicates
    }

    /// In-process evaluation of the same predicates the SQL backend applies.
    pub fn matches(&self, application: Option<&str>, status: Option<&str>) -> bool {
        let application_ok = match &self.application {
            Some(expected) => application == Some(expected.as_str()),
            None => true,
        };
        let status_ok = match &self.status {
            Some(expected) => status == Some(expected.as_str()),
            None => true,
        };
        application_ok && status_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filter_is_empty() {
        let filter = ResourceFilter::new(Some("  ".to_string()), Some(String::new()));
        assert!(filter.is_empty());
        assert!(filter.predicates().is_empty());
        assert!(filter.matches(None, Some("OPEN")));
    }

    #[test]
    fn present_filters_are_anded() {
        let filter = ResourceFilter::new(Some("PAY".to_string()), Some("OPEN".to_string()));
        assert_eq!(
            filter.predicates(),
            vec![("application", "PAY"), ("status", "OPEN")]
        );
        assert!(filter.matches(Some("PAY"), Some("OPEN")));
        assert!(!filter.matches(Some("PAY"), Some("CLOSED")));
        assert!(!filter.matches(None, Some("OPEN")));
    }

    #[test]
    fn single_filter_leaves_other_field_unconstrained() {
        let filter = ResourceFilter::new(None, Some("OPEN".to_string()));
        assert!(filter.matches(Some("ANY"), Some("OPEN")));
        assert!(filter.matches(None, Some("OPEN")));
    }
}
