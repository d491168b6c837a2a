use serde::{Deserialize, Serialize};

use crate::model::{Id, Timestamp};

/// Mutable scalar fields of an assignment. Updates overwrite all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignmentFields {
    pub application: Option<String>,
    pub stream: Option<String>,
    pub owner: Option<String>,
    pub status: Option<String>,
    pub release_id: Option<String>,
    pub setid: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Id,
    pub assignment_id: String,
    pub srid: String,
    #[serde(flatten)]
    pub fields: AssignmentFields,
    pub tasks: Vec<Task>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Create payload. `srid` always comes from the path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    #[serde(default)]
    pub assignment_id: String,
    #[serde(flatten)]
    pub fields: AssignmentFields,
    #[serde(default)]
    pub tasks: Vec<NewTask>,
}

/// Update payload. Any `assignmentId` in the body is ignored; the path wins.
/// `tasks: null` or a missing `tasks` keeps the current tasks, an array
/// replaces them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentUpdate {
    #[serde(flatten)]
    pub fields: AssignmentFields,
    #[serde(default)]
    pub tasks: Option<Vec<NewTask>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskFields {
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub status: Option<String>,
    pub component_type: Option<String>,
    pub component_name: Option<String>,
    pub component_extension: Option<String>,
    pub component_version: Option<String>,
    pub component_last_action: Option<String>,
    pub component_last_action_date_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Id,
    pub task_id: String,
    pub assignment_id: String,
    #[serde(flatten)]
    pub fields: TaskFields,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub task_id: String,
    #[serde(flatten)]
    pub fields: TaskFields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_assignment_reads_camel_case_payload() {
        let payload = json!({
            "assignmentId": "A1",
            "application": "PAY",
            "releaseId": "R1",
            "tasks": [{"taskId": "T1", "type": "COB", "componentName": "PAYMAIN"}]
        });
        let new: NewAssignment = serde_json::from_value(payload).unwrap();
        assert_eq!(new.assignment_id, "A1");
        assert_eq!(new.fields.application.as_deref(), Some("PAY"));
        assert_eq!(new.fields.release_id.as_deref(), Some("R1"));
        assert_eq!(new.tasks.len(), 1);
        assert_eq!(new.tasks[0].fields.task_type.as_deref(), Some("COB"));
        assert_eq!(new.tasks[0].fields.component_name.as_deref(), Some("PAYMAIN"));
    }

    #[test]
    fn update_without_tasks_keeps_children() {
        let update: AssignmentUpdate =
            serde_json::from_value(json!({"assignmentId": "OTHER", "status": "CLOSED"})).unwrap();
        assert_eq!(update.fields.status.as_deref(), Some("CLOSED"));
        assert!(update.tasks.is_none());

        let update: AssignmentUpdate = serde_json::from_value(json!({"tasks": []})).unwrap();
        assert_eq!(update.tasks, Some(vec![]));
    }

    #[test]
    fn task_serializes_type_field() {
        let now = chrono::Utc::now();
        let task = Task {
            id: "x".to_string(),
            task_id: "T1".to_string(),
            assignment_id: "A1".to_string(),
            fields: TaskFields {
                task_type: Some("COB".to_string()),
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["taskId"], "T1");
        assert_eq!(value["type"], "COB");
        assert!(value.get("createdAt").is_some());
    }
}
