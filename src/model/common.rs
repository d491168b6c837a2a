use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

pub type Timestamp = DateTime<Utc>;

/// Status written to a release or release set when a deploy starts.
pub const DEPLOY_IN_PROGRESS: &str = "DEPLOY_IN_PROGRESS";

/// Status written to the deployment status of a release set when a deploy starts.
pub const IN_PROGRESS: &str = "IN_PROGRESS";

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// How a parent update treats its owned child collection.
///
/// `Replace` drops every existing child and inserts the supplied ones fresh:
/// children are never matched by natural key, so their ids and timestamps
/// are regenerated.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildrenUpdate<T> {
    Keep,
    Replace(Vec<T>),
}

#[cfg(test)]
impl<T> ChildrenUpdate<T> {
    fn is_keep(&self) -> bool {
        matches!(self, ChildrenUpdate::Keep)
    }
}

impl<T> From<Option<Vec<T>>> for ChildrenUpdate<T> {
    fn from(children: Option<Vec<T>>) -> Self {
        match children {
            Some(children) => ChildrenUpdate::Replace(children),
            None => ChildrenUpdate::Keep,
        }
    }
}

/// Body of the deploy endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployRequest {
    pub level: Option<String>,
    pub environment: Option<String>,
    pub description: Option<String>,
    pub auto_deploy: bool,
    pub runtime_configuration: Option<String>,
}

/// Trims a caller-supplied value and treats blank strings as absent.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_children_keep_existing() {
        let update: ChildrenUpdate<u8> = None.into();
        assert!(update.is_keep());

        let update: ChildrenUpdate<u8> = Some(vec![]).into();
        assert_eq!(update, ChildrenUpdate::Replace(vec![]));
    }

    #[test]
    fn blank_values_are_absent() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("")), None);
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(Some(" APP ")), Some("APP"));
    }

    #[test]
    fn deploy_request_accepts_partial_body() {
        let req: DeployRequest =
            serde_json::from_str(r#"{"environment":"prod","autoDeploy":true}"#).unwrap();
        assert_eq!(req.environment.as_deref(), Some("prod"));
        assert!(req.auto_deploy);
        assert_eq!(req.description, None);
    }
}
