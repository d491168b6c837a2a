use serde::{Deserialize, Serialize};

use crate::model::{Id, Timestamp};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseFields {
    pub application: Option<String>,
    pub stream: Option<String>,
    pub owner: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: Id,
    pub release_id: String,
    pub srid: String,
    #[serde(flatten)]
    pub fields: ReleaseFields,
    pub sets: Vec<ReleaseSet>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRelease {
    #[serde(default)]
    pub release_id: String,
    #[serde(flatten)]
    pub fields: ReleaseFields,
    #[serde(default)]
    pub sets: Vec<NewReleaseSet>,
}

/// Update payload; `sets` follows the same keep/replace rule as assignment tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseUpdate {
    #[serde(flatten)]
    pub fields: ReleaseFields,
    #[serde(default)]
    pub sets: Option<Vec<NewReleaseSet>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseSetFields {
    pub status: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub deployed_by: Option<String>,
    pub deployed_at: Option<Timestamp>,
    pub deployment_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSet {
    pub id: Id,
    pub set_id: String,
    pub release_id: String,
    #[serde(flatten)]
    pub fields: ReleaseSetFields,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReleaseSet {
    #[serde(default)]
    pub set_id: String,
    #[serde(flatten)]
    pub fields: ReleaseSetFields,
}

/// Columns a set deploy writes. The rest of the set stays as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployStamp {
    pub status: String,
    pub deployment_status: String,
    pub deployed_by: String,
    pub deployed_at: Timestamp,
}
