use crate::model::{
    Assignment, AssignmentFields, ChildrenUpdate, DeployStamp, Id, Message, NewAssignment, NewRelease,
    NewReleaseSet, NewTask, Page, PageRequest, Release, ReleaseFields, ReleaseSet,
    ReleaseSetFields, ResourceFilter, Task, TaskFields,
};
use crate::store::error::StoreResult;

#[async_trait::async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn get_assignment(&self, srid: &str, assignment_id: &str) -> StoreResult<Option<Assignment>>;
    async fn assignment_exists(&self, srid: &str, assignment_id: &str) -> StoreResult<bool>;
    /// Every assignment in the scope, tasks included
    async fn list_assignments(&self, srid: &str) -> StoreResult<Vec<Assignment>>;
    /// Scope lookup narrowed by the present filters, ANDed in a single query
    async fn find_assignments(&self, srid: &str, filter: &ResourceFilter) -> StoreResult<Vec<Assignment>>;
    /// Persists the assignment and its tasks as one unit
    async fn insert_assignment(&self, srid: &str, assignment: NewAssignment) -> StoreResult<Assignment>;
    /// Returns `None` when the assignment does not exist in the scope
    async fn update_assignment(
        &self,
        srid: &str,
        assignment_id: &str,
        fields: AssignmentFields,
        tasks: ChildrenUpdate<NewTask>,
    ) -> StoreResult<Option<Assignment>>;
    /// Deletes the assignment and, by cascade, its tasks
    async fn delete_assignment(&self, srid: &str, assignment_id: &str) -> StoreResult<bool>;
}

/// Tasks are always addressed through their owning assignment.
#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_tasks(&self, srid: &str, assignment_id: &str) -> StoreResult<Vec<Task>>;
    async fn get_task(&self, srid: &str, assignment_id: &str, task_id: &str) -> StoreResult<Option<Task>>;
    /// Returns `None` when the owning assignment is gone
    async fn insert_task(&self, srid: &str, assignment_id: &str, task: NewTask) -> StoreResult<Option<Task>>;
    async fn update_task(
        &self,
        srid: &str,
        assignment_id: &str,
        task_id: &str,
        fields: TaskFields,
    ) -> StoreResult<Option<Task>>;
    async fn delete_task(&self, srid: &str, assignment_id: &str, task_id: &str) -> StoreResult<bool>;
}

#[async_trait::async_trait]
pub trait ReleaseStore: Send + Sync {
    async fn get_release(&self, srid: &str, release_id: &str) -> StoreResult<Option<Release>>;
    async fn release_exists(&self, srid: &str, release_id: &str) -> StoreResult<bool>;
    async fn list_releases(&self, srid: &str) -> StoreResult<Vec<Release>>;
    async fn find_releases(&self, srid: &str, filter: &ResourceFilter) -> StoreResult<Vec<Release>>;
    async fn insert_release(&self, srid: &str, release: NewRelease) -> StoreResult<Release>;
    async fn update_release(
        &self,
        srid: &str,
        release_id: &str,
        fields: ReleaseFields,
        sets: ChildrenUpdate<NewReleaseSet>,
    ) -> StoreResult<Option<Release>>;
    async fn delete_release(&self, srid: &str, release_id: &str) -> StoreResult<bool>;
    /// Writes `status` and appends `set` as one unit. No other release
    /// column is touched, so a concurrent update of those survives.
    async fn begin_release_deploy(
        &self,
        srid: &str,
        release_id: &str,
        status: &str,
        set: NewReleaseSet,
    ) -> StoreResult<Option<Release>>;
}

#[async_trait::async_trait]
pub trait ReleaseSetStore: Send + Sync {
    /// Every set of every release in the scope
    async fn list_release_sets(&self, srid: &str) -> StoreResult<Vec<ReleaseSet>>;
    async fn list_sets_for_release(&self, srid: &str, release_id: &str) -> StoreResult<Vec<ReleaseSet>>;
    /// Scope-level lookup; the earliest-created set wins if two releases share a set id
    async fn find_release_set(&self, srid: &str, set_id: &str) -> StoreResult<Option<ReleaseSet>>;
    async fn get_release_set(&self, srid: &str, release_id: &str, set_id: &str) -> StoreResult<Option<ReleaseSet>>;
    /// Returns `None` when the owning release is gone
    async fn insert_release_set(&self, srid: &str, release_id: &str, set: NewReleaseSet) -> StoreResult<Option<ReleaseSet>>;
    async fn update_release_set(
        &self,
        srid: &str,
        release_id: &str,
        set_id: &str,
        fields: ReleaseSetFields,
    ) -> StoreResult<Option<ReleaseSet>>;
    async fn delete_release_set(&self, srid: &str, release_id: &str, set_id: &str) -> StoreResult<bool>;
    /// Writes only the deploy columns of the set `find_release_set` would return
    async fn begin_set_deploy(&self, srid: &str, set_id: &str, stamp: DeployStamp) -> StoreResult<Option<ReleaseSet>>;
}

#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    async fn get_message(&self, id: &Id) -> StoreResult<Option<Message>>;
    async fn list_messages(&self, page: &PageRequest) -> StoreResult<Page<Message>>;
    /// Case-insensitive substring match on content
    async fn search_messages(&self, term: &str, page: &PageRequest) -> StoreResult<Page<Message>>;
    async fn insert_message(&self, content: &str, sender: &str) -> StoreResult<Message>;
    /// Compare-and-increment on `version`. `None` when the message is missing,
    /// `StoreError::StaleVersion` when the stored version differs.
    async fn update_message(&self, id: &Id, content: &str, expected_version: i64) -> StoreResult<Option<Message>>;
    async fn delete_message(&self, id: &Id) -> StoreResult<bool>;
}

pub trait Store:
    AssignmentStore + TaskStore + ReleaseStore + ReleaseSetStore + MessageStore + Send + Sync
{
}

impl<T> Store for T where
    T: AssignmentStore + TaskStore + ReleaseStore + ReleaseSetStore + MessageStore + Send + Sync
{
}
