use crate::logic::error::{require_distinct_keys, require_key, ServiceError, ServiceResult};
use crate::model::{Assignment, AssignmentUpdate, NewAssignment, ResourceFilter};
use crate::store::traits::Store;

/// Operations on the assignment aggregate of one scope (`srid`).
pub struct AssignmentOperations;

impl AssignmentOperations {
    /// Lists assignments in the scope, narrowed by whichever filters are present.
    pub async fn list<S: Store>(
        store: &S,
        srid: &str,
        filter: ResourceFilter,
    ) -> ServiceResult<Vec<Assignment>> {
        let filter = filter.normalized();
        let assignments = if filter.is_empty() {
            store.list_assignments(srid).await?
        } else {
            store.find_assignments(srid, &filter).await?
        };
        Ok(assignments)
    }

    pub async fn get<S: Store>(store: &S, srid: &str, assignment_id: &str) -> ServiceResult<Assignment> {
        store
            .get_assignment(srid, assignment_id)
            .await?
            .ok_or_else(|| not_found(srid, assignment_id))
    }

    pub async fn create<S: Store>(
        store: &S,
        srid: &str,
        new: NewAssignment,
    ) -> ServiceResult<Assignment> {
        require_key(&new.assignment_id, "assignmentId")?;
        require_distinct_keys(new.tasks.iter().map(|t| t.task_id.as_str()), "taskId")?;

        let created = store.insert_assignment(srid, new).await?;
        log::info!(
            "Created assignment {} in {} with {} task(s)",
            created.assignment_id,
            srid,
            created.tasks.len()
        );
        Ok(created)
    }

    /// Overwrites the mutable fields. The key and scope always come from the
    /// path; tasks are replaced only when the payload carries them.
    pub async fn update<S: Store>(
        store: &S,
        srid: &str,
        assignment_id: &str,
        update: AssignmentUpdate,
    ) -> ServiceResult<Assignment> {
        if let Some(tasks) = &update.tasks {
            require_distinct_keys(tasks.iter().map(|t| t.task_id.as_str()), "taskId")?;
        }

        let updated = store
            .update_assignment(srid, assignment_id, update.fields, update.tasks.into())
            .await?
            .ok_or_else(|| not_found(srid, assignment_id))?;
        log::info!("Updated assignment {} in {}", assignment_id, srid);
        Ok(updated)
    }

    pub async fn delete<S: Store>(store: &S, srid: &str, assignment_id: &str) -> ServiceResult<()> {
        if !store.delete_assignment(srid, assignment_id).await? {
            return Err(not_found(srid, assignment_id));
        }
        log::info!("Deleted assignment {} in {}", assignment_id, srid);
        Ok(())
    }
}

pub(crate) fn not_found(srid: &str, assignment_id: &str) -> ServiceError {
    ServiceError::not_found(format!(
        "Assignment '{}' not found in {}",
        assignment_id, srid
    ))
}
