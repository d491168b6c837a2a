use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::Utc;
use parking_lot::RwLock;

use crate::model::{
    generate_id, Assignment, AssignmentFields, ChildrenUpdate, DeployStamp, Id, Message, NewAssignment,
    NewRelease, NewReleaseSet, NewTask, Page, PageRequest, Release, ReleaseFields, ReleaseSet,
    ReleaseSetFields, ResourceFilter, SortDirection, SortField, SortSpec, Task, TaskFields,
    Timestamp,
};
use crate::store::error::{StoreError, StoreResult, UniqueKey};
use crate::store::traits::{AssignmentStore, MessageStore, ReleaseSetStore, ReleaseStore, TaskStore};

/// In-process store used for local development and tests.
///
/// Every mutation runs under a single write lock, so natural-key checks and
/// the insert that follows them are atomic. Children live inside their
/// parent, which gives cascade delete for free.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    assignments: Vec<Assignment>,
    releases: Vec<Release>,
    messages: Vec<Message>,
}

impl Tables {
    fn assignment(&self, srid: &str, assignment_id: &str) -> Option<&Assignment> {
        self.assignments
            .iter()
            .find(|a| a.srid == srid && a.assignment_id == assignment_id)
    }

    fn assignment_mut(&mut self, srid: &str, assignment_id: &str) -> Option<&mut Assignment> {
        self.assignments
            .iter_mut()
            .find(|a| a.srid == srid && a.assignment_id == assignment_id)
    }

    fn release(&self, srid: &str, release_id: &str) -> Option<&Release> {
        self.releases
            .iter()
            .find(|r| r.srid == srid && r.release_id == release_id)
    }

    fn release_mut(&mut self, srid: &str, release_id: &str) -> Option<&mut Release> {
        self.releases
            .iter_mut()
            .find(|r| r.srid == srid && r.release_id == release_id)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn fresh_tasks(
    assignment_id: &str,
    existing: &[Task],
    new_tasks: Vec<NewTask>,
    now: Timestamp,
) -> StoreResult<Vec<Task>> {
    let mut seen: HashSet<String> = existing.iter().map(|t| t.task_id.clone()).collect();
    let mut tasks = Vec::with_capacity(new_tasks.len());
    for new in new_tasks {
        if !seen.insert(new.task_id.clone()) {
            return Err(StoreError::Duplicate(UniqueKey::Task));
        }
        tasks.push(Task {
            id: generate_id(),
            task_id: new.task_id,
            assignment_id: assignment_id.to_string(),
            fields: new.fields,
            created_at: now,
            updated_at: now,
        });
    }
    Ok(tasks)
}

fn fresh_sets(
    release_id: &str,
    existing: &[ReleaseSet],
    new_sets: Vec<NewReleaseSet>,
    now: Timestamp,
) -> StoreResult<Vec<ReleaseSet>> {
    let mut seen: HashSet<String> = existing.iter().map(|s| s.set_id.clone()).collect();
    let mut sets = Vec::with_capacity(new_sets.len());
    for new in new_sets {
        if !seen.insert(new.set_id.clone()) {
            return Err(StoreError::Duplicate(UniqueKey::ReleaseSet));
        }
        sets.push(ReleaseSet {
            id: generate_id(),
            set_id: new.set_id,
            release_id: release_id.to_string(),
            fields: new.fields,
            created_at: now,
            updated_at: now,
        });
    }
    Ok(sets)
}

/// Builds the child collection an update leaves behind, without touching
/// the parent until every new child has passed the uniqueness check.
fn apply_children<N, C>(
    update: ChildrenUpdate<N>,
    build: impl FnOnce(Vec<N>) -> StoreResult<Vec<C>>,
) -> StoreResult<Option<Vec<C>>> {
    match update {
        ChildrenUpdate::Keep => Ok(None),
        ChildrenUpdate::Replace(new) => build(new).map(Some),
    }
}

fn compare_messages(a: &Message, b: &Message, sort: &SortSpec) -> Ordering {
    let ordering = match sort.field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Content => a.content.cmp(&b.content),
        SortField::Sender => a.sender.cmp(&b.sender),
    };
    let ordering = match sort.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    };
    ordering.then_with(|| a.id.cmp(&b.id))
}

fn paginate(mut messages: Vec<Message>, page: &PageRequest) -> Page<Message> {
    messages.sort_by(|a, b| compare_messages(a, b, &page.sort));
    let total = messages.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let content = messages
        .into_iter()
        .skip(offset)
        .take(page.size as usize)
        .collect();
    Page::new(content, page, total)
}

#[async_trait::async_trait]
impl AssignmentStore for MemoryStore {
    async fn get_assignment(&self, srid: &str, assignment_id: &str) -> StoreResult<Option<Assignment>> {
        Ok(self.tables.read().assignment(srid, assignment_id).cloned())
    }

    async fn assignment_exists(&self, srid: &str, assignment_id: &str) -> StoreResult<bool> {
        Ok(self.tables.read().assignment(srid, assignment_id).is_some())
    }

    async fn list_assignments(&self, srid: &str) -> StoreResult<Vec<Assignment>> {
        let tables = self.tables.read();
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.srid == srid)
            .cloned()
            .collect())
    }

    async fn find_assignments(&self, srid: &str, filter: &ResourceFilter) -> StoreResult<Vec<Assignment>> {
        let tables = self.tables.read();
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.srid == srid)
            .filter(|a| filter.matches(a.fields.application.as_deref(), a.fields.status.as_deref()))
            .cloned()
            .collect())
    }

    async fn insert_assignment(&self, srid: &str, assignment: NewAssignment) -> StoreResult<Assignment> {
        let mut tables = self.tables.write();
        if tables.assignment(srid, &assignment.assignment_id).is_some() {
            return Err(StoreError::Duplicate(UniqueKey::Assignment));
        }

        let now = Utc::now();
        let tasks = fresh_tasks(&assignment.assignment_id, &[], assignment.tasks, now)?;
        let created = Assignment {
            id: generate_id(),
            assignment_id: assignment.assignment_id,
            srid: srid.to_string(),
            fields: assignment.fields,
            tasks,
            created_at: now,
            updated_at: now,
        };
        tables.assignments.push(created.clone());
        Ok(created)
    }

    async fn update_assignment(
        &self,
        srid: &str,
        assignment_id: &str,
        fields: AssignmentFields,
        tasks: ChildrenUpdate<NewTask>,
    ) -> StoreResult<Option<Assignment>> {
        let mut tables = self.tables.write();
        let Some(assignment) = tables.assignment_mut(srid, assignment_id) else {
            return Ok(None);
        };

        let now = Utc::now();
        let replaced = apply_children(tasks, |new| {
            fresh_tasks(assignment_id, &[], new, now)
        })?;

        assignment.fields = fields;
        if let Some(tasks) = replaced {
            assignment.tasks = tasks;
        }
        assignment.updated_at = now;
        Ok(Some(assignment.clone()))
    }

    async fn delete_assignment(&self, srid: &str, assignment_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let before = tables.assignments.len();
        tables
            .assignments
            .retain(|a| !(a.srid == srid && a.assignment_id == assignment_id));
        Ok(tables.assignments.len() < before)
    }
}

#[async_trait::async_trait]
impl TaskStore for MemoryStore {
    async fn list_tasks(&self, srid: &str, assignment_id: &str) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read();
        Ok(tables
            .assignment(srid, assignment_id)
            .map(|a| a.tasks.clone())
            .unwrap_or_default())
    }

    async fn get_task(&self, srid: &str, assignment_id: &str, task_id: &str) -> StoreResult<Option<Task>> {
        let tables = self.tables.read();
        Ok(tables
            .assignment(srid, assignment_id)
            .and_then(|a| a.tasks.iter().find(|t| t.task_id == task_id))
            .cloned())
    }

    async fn insert_task(&self, srid: &str, assignment_id: &str, task: NewTask) -> StoreResult<Option<Task>> {
        let mut tables = self.tables.write();
        let Some(assignment) = tables.assignment_mut(srid, assignment_id) else {
            return Ok(None);
        };

        let now = Utc::now();
        let mut created = fresh_tasks(assignment_id, &assignment.tasks, vec![task], now)?;
        let Some(task) = created.pop() else {
            return Ok(None);
        };
        assignment.tasks.push(task.clone());
        Ok(Some(task))
    }

    async fn update_task(
        &self,
        srid: &str,
        assignment_id: &str,
        task_id: &str,
        fields: TaskFields,
    ) -> StoreResult<Option<Task>> {
        let mut tables = self.tables.write();
        let task = tables
            .assignment_mut(srid, assignment_id)
            .and_then(|a| a.tasks.iter_mut().find(|t| t.task_id == task_id));
        let Some(task) = task else {
            return Ok(None);
        };

        task.fields = fields;
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, srid: &str, assignment_id: &str, task_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let Some(assignment) = tables.assignment_mut(srid, assignment_id) else {
            return Ok(false);
        };
        let before = assignment.tasks.len();
        assignment.tasks.retain(|t| t.task_id != task_id);
        Ok(assignment.tasks.len() < before)
    }
}

#[async_trait::async_trait]
impl ReleaseStore for MemoryStore {
    async fn get_release(&self, srid: &str, release_id: &str) -> StoreResult<Option<Release>> {
        Ok(self.tables.read().release(srid, release_id).cloned())
    }

    async fn release_exists(&self, srid: &str, release_id: &str) -> StoreResult<bool> {
        Ok(self.tables.read().release(srid, release_id).is_some())
    }

    async fn list_releases(&self, srid: &str) -> StoreResult<Vec<Release>> {
        let tables = self.tables.read();
        Ok(tables
            .releases
            .iter()
            .filter(|r| r.srid == srid)
            .cloned()
            .collect())
    }

    async fn find_releases(&self, srid: &str, filter: &ResourceFilter) -> StoreResult<Vec<Release>> {
        let tables = self.tables.read();
        Ok(tables
            .releases
            .iter()
            .filter(|r| r.srid == srid)
            .filter(|r| filter.matches(r.fields.application.as_deref(), r.fields.status.as_deref()))
            .cloned()
            .collect())
    }

    async fn insert_release(&self, srid: &str, release: NewRelease) -> StoreResult<Release> {
        let mut tables = self.tables.write();
        if tables.release(srid, &release.release_id).is_some() {
            return Err(StoreError::Duplicate(UniqueKey::Release));
        }

        let now = Utc::now();
        let sets = fresh_sets(&release.release_id, &[], release.sets, now)?;
        let created = Release {
            id: generate_id(),
            release_id: release.release_id,
            srid: srid.to_string(),
            fields: release.fields,
            sets,
            created_at: now,
            updated_at: now,
        };
        tables.releases.push(created.clone());
        Ok(created)
    }

    async fn update_release(
        &self,
        srid: &str,
        release_id: &str,
        fields: ReleaseFields,
        sets: ChildrenUpdate<NewReleaseSet>,
    ) -> StoreResult<Option<Release>> {
        let mut tables = self.tables.write();
        let Some(release) = tables.release_mut(srid, release_id) else {
            return Ok(None);
        };

        let now = Utc::now();
        let replaced = apply_children(sets, |new| {
            fresh_sets(release_id, &[], new, now)
        })?;

        release.fields = fields;
        if let Some(sets) = replaced {
            release.sets = sets;
        }
        release.updated_at = now;
        Ok(Some(release.clone()))
    }

    async fn delete_release(&self, srid: &str, release_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let before = tables.releases.len();
        tables
            .releases
            .retain(|r| !(r.srid == srid && r.release_id == release_id));
        Ok(tables.releases.len() < before)
    }

    async fn begin_release_deploy(
        &self,
        srid: &str,
        release_id: &str,
        status: &str,
        set: NewReleaseSet,
    ) -> StoreResult<Option<Release>> {
        let mut tables = self.tables.write();
        let Some(release) = tables.release_mut(srid, release_id) else {
            return Ok(None);
        };

        let now = Utc::now();
        let mut added = fresh_sets(release_id, &release.sets, vec![set], now)?;
        release.sets.append(&mut added);
        release.fields.status = Some(status.to_string());
        release.updated_at = now;
        Ok(Some(release.clone()))
    }
}

#[async_trait::async_trait]
impl ReleaseSetStore for MemoryStore {
    async fn list_release_sets(&self, srid: &str) -> StoreResult<Vec<ReleaseSet>> {
        let tables = self.tables.read();
        let mut sets: Vec<ReleaseSet> = tables
            .releases
            .iter()
            .filter(|r| r.srid == srid)
            .flat_map(|r| r.sets.iter().cloned())
            .collect();
        sets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sets)
    }

    async fn list_sets_for_release(&self, srid: &str, release_id: &str) -> StoreResult<Vec<ReleaseSet>> {
        let tables = self.tables.read();
        Ok(tables
            .release(srid, release_id)
            .map(|r| r.sets.clone())
            .unwrap_or_default())
    }

    async fn find_release_set(&self, srid: &str, set_id: &str) -> StoreResult<Option<ReleaseSet>> {
        let tables = self.tables.read();
        Ok(tables
            .releases
            .iter()
            .filter(|r| r.srid == srid)
            .flat_map(|r| r.sets.iter())
            .filter(|s| s.set_id == set_id)
            .min_by_key(|s| s.created_at)
            .cloned())
    }

    async fn get_release_set(&self, srid: &str, release_id: &str, set_id: &str) -> StoreResult<Option<ReleaseSet>> {
        let tables = self.tables.read();
        Ok(tables
            .release(srid, release_id)
            .and_then(|r| r.sets.iter().find(|s| s.set_id == set_id))
            .cloned())
    }

    async fn insert_release_set(&self, srid: &str, release_id: &str, set: NewReleaseSet) -> StoreResult<Option<ReleaseSet>> {
        let mut tables = self.tables.write();
        let Some(release) = tables.release_mut(srid, release_id) else {
            return Ok(None);
        };

        let now = Utc::now();
        let mut created = fresh_sets(release_id, &release.sets, vec![set], now)?;
        let Some(set) = created.pop() else {
            return Ok(None);
        };
        release.sets.push(set.clone());
        Ok(Some(set))
    }

    async fn update_release_set(
        &self,
        srid: &str,
        release_id: &str,
        set_id: &str,
        fields: ReleaseSetFields,
    ) -> StoreResult<Option<ReleaseSet>> {
        let mut tables = self.tables.write();
        let set = tables
            .release_mut(srid, release_id)
            .and_then(|r| r.sets.iter_mut().find(|s| s.set_id == set_id));
        let Some(set) = set else {
            return Ok(None);
        };

        set.fields = fields;
        set.updated_at = Utc::now();
        Ok(Some(set.clone()))
    }

    async fn delete_release_set(&self, srid: &str, release_id: &str, set_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let Some(release) = tables.release_mut(srid, release_id) else {
            return Ok(false);
        };
        let before = release.sets.len();
        release.sets.retain(|s| s.set_id != set_id);
        Ok(release.sets.len() < before)
    }

    async fn begin_set_deploy(&self, srid: &str, set_id: &str, stamp: DeployStamp) -> StoreResult<Option<ReleaseSet>> {
        let mut tables = self.tables.write();
        let set = tables
            .releases
            .iter_mut()
            .filter(|r| r.srid == srid)
            .flat_map(|r| r.sets.iter_mut())
            .filter(|s| s.set_id == set_id)
            .min_by_key(|s| s.created_at);
        let Some(set) = set else {
            return Ok(None);
        };

        set.fields.status = Some(stamp.status);
        set.fields.deployment_status = Some(stamp.deployment_status);
        set.fields.deployed_by = Some(stamp.deployed_by);
        set.fields.deployed_at = Some(stamp.deployed_at);
        set.updated_at = Utc::now();
        Ok(Some(set.clone()))
    }
}

#[async_trait::async_trait]
impl MessageStore for MemoryStore {
    async fn get_message(&self, id: &Id) -> StoreResult<Option<Message>> {
        let tables = self.tables.read();
        Ok(tables.messages.iter().find(|m| &m.id == id).cloned())
    }

    async fn list_messages(&self, page: &PageRequest) -> StoreResult<Page<Message>> {
        let messages = self.tables.read().messages.clone();
        Ok(paginate(messages, page))
    }

    async fn search_messages(&self, term: &str, page: &PageRequest) -> StoreResult<Page<Message>> {
        let needle = term.to_lowercase();
        let matches = self
            .tables
            .read()
            .messages
            .iter()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(paginate(matches, page))
    }

    async fn insert_message(&self, content: &str, sender: &str) -> StoreResult<Message> {
        let now = Utc::now();
        let message = Message {
            id: generate_id(),
            content: content.to_string(),
            sender: sender.to_string(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        self.tables.write().messages.push(message.clone());
        Ok(message)
    }

    async fn update_message(&self, id: &Id, content: &str, expected_version: i64) -> StoreResult<Option<Message>> {
        let mut tables = self.tables.write();
        let Some(message) = tables.messages.iter_mut().find(|m| &m.id == id) else {
            return Ok(None);
        };
        if message.version != expected_version {
            return Err(StoreError::StaleVersion {
                id: id.clone(),
                expected: expected_version,
            });
        }

        message.content = content.to_string();
        message.version += 1;
        message.updated_at = Utc::now();
        Ok(Some(message.clone()))
    }

    async fn delete_message(&self, id: &Id) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let before = tables.messages.len();
        tables.messages.retain(|m| &m.id != id);
        Ok(tables.messages.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_assignment(id: &str, tasks: &[&str]) -> NewAssignment {
        NewAssignment {
            assignment_id: id.to_string(),
            fields: AssignmentFields::default(),
            tasks: tasks
                .iter()
                .map(|t| NewTask {
                    task_id: t.to_string(),
                    fields: TaskFields::default(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected_per_scope() {
        let store = MemoryStore::new();
        store.insert_assignment("PRJ1", new_assignment("A1", &[])).await.unwrap();

        let err = store
            .insert_assignment("PRJ1", new_assignment("A1", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueKey::Assignment)));

        store.insert_assignment("PRJ2", new_assignment("A1", &[])).await.unwrap();
        assert_eq!(store.list_assignments("PRJ1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_replace_leaves_assignment_untouched() {
        let store = MemoryStore::new();
        store
            .insert_assignment("PRJ1", new_assignment("A1", &["T1"]))
            .await
            .unwrap();

        let err = store
            .update_assignment(
                "PRJ1",
                "A1",
                AssignmentFields {
                    status: Some("CLOSED".to_string()),
                    ..Default::default()
                },
                ChildrenUpdate::Replace(new_assignment("x", &["T2", "T2"]).tasks),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueKey::Task)));

        let stored = store.get_assignment("PRJ1", "A1").await.unwrap().unwrap();
        assert_eq!(stored.fields.status, None);
        assert_eq!(stored.tasks.len(), 1);
        assert_eq!(stored.tasks[0].task_id, "T1");
    }

    #[tokio::test]
    async fn release_deploy_checks_existing_sets() {
        let store = MemoryStore::new();
        let release = NewRelease {
            release_id: "R1".to_string(),
            fields: ReleaseFields {
                application: Some("PAY".to_string()),
                ..Default::default()
            },
            sets: vec![NewReleaseSet {
                set_id: "S1".to_string(),
                ..Default::default()
            }],
        };
        store.insert_release("PRJ1", release).await.unwrap();

        let set = |id: &str| NewReleaseSet {
            set_id: id.to_string(),
            ..Default::default()
        };
        let err = store
            .begin_release_deploy("PRJ1", "R1", "DEPLOY_IN_PROGRESS", set("S1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueKey::ReleaseSet)));
        let unchanged = store.get_release("PRJ1", "R1").await.unwrap().unwrap();
        assert_eq!(unchanged.fields.status, None);

        let deployed = store
            .begin_release_deploy("PRJ1", "R1", "DEPLOY_IN_PROGRESS", set("S2"))
            .await
            .unwrap()
            .unwrap();
        let ids: Vec<_> = deployed.sets.iter().map(|s| s.set_id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2"]);
        assert_eq!(deployed.fields.status.as_deref(), Some("DEPLOY_IN_PROGRESS"));
        assert_eq!(deployed.fields.application.as_deref(), Some("PAY"));
    }

    #[tokio::test]
    async fn stale_message_version_is_rejected() {
        let store = MemoryStore::new();
        let message = store.insert_message("hi", "alice").await.unwrap();

        let updated = store
            .update_message(&message.id, "hello", 0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.version, 1);

        let err = store
            .update_message(&message.id, "again", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleVersion { expected: 0, .. }));

        let missing = store
            .update_message(&"nope".to_string(), "x", 0)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn message_pages_are_sorted_and_counted() {
        let store = MemoryStore::new();
        for content in ["charlie", "alpha", "bravo"] {
            store.insert_message(content, "alice").await.unwrap();
        }

        let request = PageRequest {
            page: 0,
            size: 2,
            sort: SortSpec {
                field: SortField::Content,
                direction: SortDirection::Asc,
            },
        };
        let page = store.list_messages(&request).await.unwrap();
        let contents: Vec<_> = page.content.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["alpha", "bravo"]);
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 2);

        let second = store
            .list_messages(&PageRequest { page: 1, ..request })
            .await
            .unwrap();
        assert_eq!(second.content.len(), 1);
        assert_eq!(second.content[0].content, "charlie");
    }
}
