use crate::logic::assignments;
use crate::logic::error::{require_key, ServiceError, ServiceResult};
use crate::model::{NewTask, Task, TaskFields};
use crate::store::traits::Store;

/// Tasks addressed through their owning assignment. The parent is checked
/// first, so a missing assignment is reported even when the task would also
/// be missing.
pub struct TaskOperations;

impl TaskOperations {
    async fn require_assignment<S: Store>(store: &S, srid: &str, assignment_id: &str) -> ServiceResult<()> {
        if !store.assignment_exists(srid, assignment_id).await? {
            return Err(assignments::not_found(srid, assignment_id));
        }
        Ok(())
    }

    pub async fn list<S: Store>(store: &S, srid: &str, assignment_id: &str) -> ServiceResult<Vec<Task>> {
        Self::require_assignment(store, srid, assignment_id).await?;
        Ok(store.list_tasks(srid, assignment_id).await?)
    }

    pub async fn get<S: Store>(
        store: &S,
        srid: &str,
        assignment_id: &str,
        task_id: &str,
    ) -> ServiceResult<Task> {
        Self::require_assignment(store, srid, assignment_id).await?;
        store
            .get_task(srid, assignment_id, task_id)
            .await?
            .ok_or_else(|| not_found(assignment_id, task_id))
    }

    pub async fn create<S: Store>(
        store: &S,
        srid: &str,
        assignment_id: &str,
        task: NewTask,
    ) -> ServiceResult<Task> {
        Self::require_assignment(store, srid, assignment_id).await?;
        require_key(&task.task_id, "taskId")?;

        let created = store
            .insert_task(srid, assignment_id, task)
            .await?
            .ok_or_else(|| assignments::not_found(srid, assignment_id))?;
        log::info!("Created task {} under assignment {}", created.task_id, assignment_id);
        Ok(created)
    }

    pub async fn update<S: Store>(
        store: &S,
        srid: &str,
        assignment_id: &str,
        task_id: &str,
        fields: TaskFields,
    ) -> ServiceResult<Task> {
        Self::require_assignment(store, srid, assignment_id).await?;
        store
            .update_task(srid, assignment_id, task_id, fields)
            .await?
            .ok_or_else(|| not_found(assignment_id, task_id))
    }

    pub async fn delete<S: Store>(
        store: &S,
        srid: &str,
        assignment_id: &str,
        task_id: &str,
    ) -> ServiceResult<()> {
        Self::require_assignment(store, srid, assignment_id).await?;
        if !store.delete_task(srid, assignment_id, task_id).await? {
            return Err(not_found(assignment_id, task_id));
        }
        log::info!("Deleted task {} under assignment {}", task_id, assignment_id);
        Ok(())
    }
}

fn not_found(assignment_id: &str, task_id: &str) -> ServiceError {
    ServiceError::not_found(format!(
        "Task '{}' not found in assignment {}",
        task_id, assignment_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::AssignmentOperations;
    use crate::model::NewAssignment;
    use crate::store::MemoryStore;

    fn task(id: &str, status: &str) -> NewTask {
        NewTask {
            task_id: id.to_string(),
            fields: TaskFields {
                status: Some(status.to_string()),
                ..Default::default()
            },
        }
    }

    async fn store_with_assignment() -> MemoryStore {
        let store = MemoryStore::new();
        let new = NewAssignment {
            assignment_id: "A1".to_string(),
            ..Default::default()
        };
        AssignmentOperations::create(&store, "PRJ1", new).await.unwrap();
        store
    }

    #[tokio::test]
    async fn missing_parent_wins_over_missing_child() {
        let store = store_with_assignment().await;
        let err = TaskOperations::get(&store, "PRJ1", "NOPE", "T1").await.unwrap_err();
        match err {
            ServiceError::NotFound(message) => assert!(message.contains("Assignment")),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = TaskOperations::get(&store, "PRJ1", "A1", "T1").await.unwrap_err();
        match err {
            ServiceError::NotFound(message) => assert!(message.contains("Task")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn task_lifecycle() {
        let store = store_with_assignment().await;
        let created = TaskOperations::create(&store, "PRJ1", "A1", task("T1", "OPEN"))
            .await
            .unwrap();
        assert_eq!(created.assignment_id, "A1");

        let err = TaskOperations::create(&store, "PRJ1", "A1", task("T1", "OPEN"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let updated = TaskOperations::update(&store, "PRJ1", "A1", "T1", task("IGNORED", "DONE").fields)
            .await
            .unwrap();
        assert_eq!(updated.task_id, "T1");
        assert_eq!(updated.fields.status.as_deref(), Some("DONE"));

        assert_eq!(TaskOperations::list(&store, "PRJ1", "A1").await.unwrap().len(), 1);
        TaskOperations::delete(&store, "PRJ1", "A1", "T1").await.unwrap();
        assert!(TaskOperations::list(&store, "PRJ1", "A1").await.unwrap().is_empty());
    }
}
