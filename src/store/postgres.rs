use std::collections::HashMap;

use anyhow::Context;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};

use crate::model::{
    generate_id, Assignment, AssignmentFields, ChildrenUpdate, DeployStamp, Id, Message, NewAssignment,
    NewRelease, NewReleaseSet, NewTask, Page, PageRequest, Release, ReleaseFields, ReleaseSet,
    ReleaseSetFields, ResourceFilter, Task, TaskFields,
};
use crate::store::error::{StoreError, StoreResult, UniqueKey};
use crate::store::traits::{AssignmentStore, MessageStore, ReleaseSetStore, ReleaseStore, TaskStore};

const ASSIGNMENT_COLUMNS: &str = "id, assignment_id, srid, application, stream, owner, status, \
     release_id, setid, level, created_at, updated_at";

const TASK_COLUMNS: &str = "t.id, t.assignment_pk, t.task_id, t.type, t.status, t.component_type, \
     t.component_name, t.component_extension, t.component_version, t.component_last_action, \
     t.component_last_action_date_time, t.created_at, t.updated_at";

const RELEASE_COLUMNS: &str =
    "id, release_id, srid, application, stream, owner, status, description, created_at, updated_at";

const SET_COLUMNS: &str = "s.id, s.release_pk, s.set_id, s.status, s.owner, s.description, \
     s.deployed_by, s.deployed_at, s.deployment_status, s.created_at, s.updated_at";

const MESSAGE_COLUMNS: &str = "id, content, sender, created_at, updated_at, version";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run the embedded database migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn connection(&self) -> anyhow::Result<sqlx::pool::PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .context("Failed to acquire database connection")
    }
}

/// Turns unique-constraint violations into `StoreError::Duplicate` and wraps
/// everything else with the given context.
fn classify(err: sqlx::Error, context: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let key = match db_err.constraint() {
                Some("assignments_srid_assignment_id_key") => Some(UniqueKey::Assignment),
                Some("tasks_assignment_pk_task_id_key") => Some(UniqueKey::Task),
                Some("releases_srid_release_id_key") => Some(UniqueKey::Release),
                Some("release_sets_release_pk_set_id_key") => Some(UniqueKey::ReleaseSet),
                _ => None,
            };
            if let Some(key) = key {
                return StoreError::Duplicate(key);
            }
        }
    }
    StoreError::Other(anyhow::Error::new(err).context(context))
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn assignment_from_row(row: &PgRow) -> Assignment {
    Assignment {
        id: row.get("id"),
        assignment_id: row.get("assignment_id"),
        srid: row.get("srid"),
        fields: AssignmentFields {
            application: row.get("application"),
            stream: row.get("stream"),
            owner: row.get("owner"),
            status: row.get("status"),
            release_id: row.get("release_id"),
            setid: row.get("setid"),
            level: row.get("level"),
        },
        tasks: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn task_from_row(row: &PgRow) -> Task {
    Task {
        id: row.get("id"),
        task_id: row.get("task_id"),
        assignment_id: row.get("assignment_id"),
        fields: TaskFields {
            task_type: row.get("type"),
            status: row.get("status"),
            component_type: row.get("component_type"),
            component_name: row.get("component_name"),
            component_extension: row.get("component_extension"),
            component_version: row.get("component_version"),
            component_last_action: row.get("component_last_action"),
            component_last_action_date_time: row.get("component_last_action_date_time"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn release_from_row(row: &PgRow) -> Release {
    Release {
        id: row.get("id"),
        release_id: row.get("release_id"),
        srid: row.get("srid"),
        fields: ReleaseFields {
            application: row.get("application"),
            stream: row.get("stream"),
            owner: row.get("owner"),
            status: row.get("status"),
            description: row.get("description"),
        },
        sets: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn set_from_row(row: &PgRow) -> ReleaseSet {
    ReleaseSet {
        id: row.get("id"),
        set_id: row.get("set_id"),
        release_id: row.get("release_id"),
        fields: ReleaseSetFields {
            status: row.get("status"),
            owner: row.get("owner"),
            description: row.get("description"),
            deployed_by: row.get("deployed_by"),
            deployed_at: row.get("deployed_at"),
            deployment_status: row.get("deployment_status"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn message_from_row(row: &PgRow) -> Message {
    Message {
        id: row.get("id"),
        content: row.get("content"),
        sender: row.get("sender"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

/// Loads the tasks of every given assignment in one query.
async fn attach_tasks(conn: &mut PgConnection, assignments: &mut [Assignment]) -> anyhow::Result<()> {
    if assignments.is_empty() {
        return Ok(());
    }

    let pks: Vec<String> = assignments.iter().map(|a| a.id.clone()).collect();
    let sql = format!(
        "SELECT {TASK_COLUMNS}, a.assignment_id FROM tasks t \
         JOIN assignments a ON a.id = t.assignment_pk \
         WHERE t.assignment_pk = ANY($1) ORDER BY t.created_at, t.id"
    );
    let rows = sqlx::query(&sql)
        .bind(&pks)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to load tasks")?;

    let mut by_parent: HashMap<String, Vec<Task>> = HashMap::new();
    for row in &rows {
        let parent: String = row.get("assignment_pk");
        by_parent.entry(parent).or_default().push(task_from_row(row));
    }
    for assignment in assignments.iter_mut() {
        assignment.tasks = by_parent.remove(&assignment.id).unwrap_or_default();
    }
    Ok(())
}

/// Loads the sets of every given release in one query.
async fn attach_sets(conn: &mut PgConnection, releases: &mut [Release]) -> anyhow::Result<()> {
    if releases.is_empty() {
        return Ok(());
    }

    let pks: Vec<String> = releases.iter().map(|r| r.id.clone()).collect();
    let sql = format!(
        "SELECT {SET_COLUMNS}, r.release_id FROM release_sets s \
         JOIN releases r ON r.id = s.release_pk \
         WHERE s.release_pk = ANY($1) ORDER BY s.created_at, s.id"
    );
    let rows = sqlx::query(&sql)
        .bind(&pks)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to load release sets")?;

    let mut by_parent: HashMap<String, Vec<ReleaseSet>> = HashMap::new();
    for row in &rows {
        let parent: String = row.get("release_pk");
        by_parent.entry(parent).or_default().push(set_from_row(row));
    }
    for release in releases.iter_mut() {
        release.sets = by_parent.remove(&release.id).unwrap_or_default();
    }
    Ok(())
}

async fn insert_tasks(
    conn: &mut PgConnection,
    assignment_pk: &str,
    assignment_id: &str,
    tasks: Vec<NewTask>,
) -> StoreResult<()> {
    let sql = "INSERT INTO tasks (id, assignment_pk, task_id, type, status, component_type, \
               component_name, component_extension, component_version, component_last_action, \
               component_last_action_date_time) \
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";
    for task in tasks {
        sqlx::query(sql)
            .bind(generate_id())
            .bind(assignment_pk)
            .bind(&task.task_id)
            .bind(&task.fields.task_type)
            .bind(&task.fields.status)
            .bind(&task.fields.component_type)
            .bind(&task.fields.component_name)
            .bind(&task.fields.component_extension)
            .bind(&task.fields.component_version)
            .bind(&task.fields.component_last_action)
            .bind(&task.fields.component_last_action_date_time)
            .execute(&mut *conn)
            .await
            .map_err(|e| classify(e, "Failed to insert task"))?;
    }
    log::debug!("inserted tasks for assignment {}", assignment_id);
    Ok(())
}

async fn insert_sets(
    conn: &mut PgConnection,
    release_pk: &str,
    release_id: &str,
    sets: Vec<NewReleaseSet>,
) -> StoreResult<()> {
    let sql = "INSERT INTO release_sets (id, release_pk, set_id, status, owner, description, \
               deployed_by, deployed_at, deployment_status) \
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";
    for set in sets {
        sqlx::query(sql)
            .bind(generate_id())
            .bind(release_pk)
            .bind(&set.set_id)
            .bind(&set.fields.status)
            .bind(&set.fields.owner)
            .bind(&set.fields.description)
            .bind(&set.fields.deployed_by)
            .bind(set.fields.deployed_at)
            .bind(&set.fields.deployment_status)
            .execute(&mut *conn)
            .await
            .map_err(|e| classify(e, "Failed to insert release set"))?;
    }
    log::debug!("inserted release sets for release {}", release_id);
    Ok(())
}

async fn fetch_assignment(
    conn: &mut PgConnection,
    srid: &str,
    assignment_id: &str,
) -> anyhow::Result<Option<Assignment>> {
    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE srid = $1 AND assignment_id = $2");
    let row = sqlx::query(&sql)
        .bind(srid)
        .bind(assignment_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch assignment")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut assignments = [assignment_from_row(&row)];
    attach_tasks(conn, &mut assignments).await?;
    let [assignment] = assignments;
    Ok(Some(assignment))
}

async fn fetch_release(
    conn: &mut PgConnection,
    srid: &str,
    release_id: &str,
) -> anyhow::Result<Option<Release>> {
    let sql = format!("SELECT {RELEASE_COLUMNS} FROM releases WHERE srid = $1 AND release_id = $2");
    let row = sqlx::query(&sql)
        .bind(srid)
        .bind(release_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch release")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut releases = [release_from_row(&row)];
    attach_sets(conn, &mut releases).await?;
    let [release] = releases;
    Ok(Some(release))
}

#[async_trait::async_trait]
impl AssignmentStore for PostgresStore {
    async fn get_assignment(&self, srid: &str, assignment_id: &str) -> StoreResult<Option<Assignment>> {
        let mut conn = self.connection().await?;
        Ok(fetch_assignment(&mut conn, srid, assignment_id).await?)
    }

    async fn assignment_exists(&self, srid: &str, assignment_id: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM assignments WHERE srid = $1 AND assignment_id = $2)",
        )
        .bind(srid)
        .bind(assignment_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check assignment")?;
        Ok(exists)
    }

    async fn list_assignments(&self, srid: &str) -> StoreResult<Vec<Assignment>> {
        let mut conn = self.connection().await?;
        let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE srid = $1 ORDER BY created_at, id");
        let rows = sqlx::query(&sql)
            .bind(srid)
            .fetch_all(&mut *conn)
            .await
            .context("Failed to list assignments")?;

        let mut assignments: Vec<Assignment> = rows.iter().map(assignment_from_row).collect();
        attach_tasks(&mut conn, &mut assignments).await?;
        Ok(assignments)
    }

    async fn find_assignments(&self, srid: &str, filter: &ResourceFilter) -> StoreResult<Vec<Assignment>> {
        let mut conn = self.connection().await?;
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE srid = "));
        builder.push_bind(srid.to_string());
        for (column, value) in filter.predicates() {
            builder.push(format!(" AND {column} = "));
            builder.push_bind(value.to_string());
        }
        builder.push(" ORDER BY created_at, id");

        let rows = builder
            .build()
            .fetch_all(&mut *conn)
            .await
            .context("Failed to filter assignments")?;

        let mut assignments: Vec<Assignment> = rows.iter().map(assignment_from_row).collect();
        attach_tasks(&mut conn, &mut assignments).await?;
        Ok(assignments)
    }

    async fn insert_assignment(&self, srid: &str, assignment: NewAssignment) -> StoreResult<Assignment> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let id = generate_id();
        let fields = &assignment.fields;
        sqlx::query(
            "INSERT INTO assignments (id, assignment_id, srid, application, stream, owner, status, \
             release_id, setid, level) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&id)
        .bind(&assignment.assignment_id)
        .bind(srid)
        .bind(&fields.application)
        .bind(&fields.stream)
        .bind(&fields.owner)
        .bind(&fields.status)
        .bind(&fields.release_id)
        .bind(&fields.setid)
        .bind(&fields.level)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify(e, "Failed to insert assignment"))?;

        insert_tasks(&mut tx, &id, &assignment.assignment_id, assignment.tasks).await?;

        let created = fetch_assignment(&mut tx, srid, &assignment.assignment_id)
            .await?
            .context("Inserted assignment vanished")?;
        tx.commit().await.context("Failed to commit assignment")?;
        Ok(created)
    }

    async fn update_assignment(
        &self,
        srid: &str,
        assignment_id: &str,
        fields: AssignmentFields,
        tasks: ChildrenUpdate<NewTask>,
    ) -> StoreResult<Option<Assignment>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let pk: Option<String> = sqlx::query_scalar(
            "UPDATE assignments SET application = $3, stream = $4, owner = $5, status = $6, \
             release_id = $7, setid = $8, level = $9, updated_at = NOW() \
             WHERE srid = $1 AND assignment_id = $2 RETURNING id",
        )
        .bind(srid)
        .bind(assignment_id)
        .bind(&fields.application)
        .bind(&fields.stream)
        .bind(&fields.owner)
        .bind(&fields.status)
        .bind(&fields.release_id)
        .bind(&fields.setid)
        .bind(&fields.level)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update assignment")?;

        let Some(pk) = pk else {
            return Ok(None);
        };

        match tasks {
            ChildrenUpdate::Keep => {}
            ChildrenUpdate::Replace(new_tasks) => {
                sqlx::query("DELETE FROM tasks WHERE assignment_pk = $1")
                    .bind(&pk)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear tasks")?;
                insert_tasks(&mut tx, &pk, assignment_id, new_tasks).await?;
            }
        }

        let updated = fetch_assignment(&mut tx, srid, assignment_id).await?;
        tx.commit().await.context("Failed to commit assignment update")?;
        Ok(updated)
    }

    async fn delete_assignment(&self, srid: &str, assignment_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM assignments WHERE srid = $1 AND assignment_id = $2")
            .bind(srid)
            .bind(assignment_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete assignment")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl TaskStore for PostgresStore {
    async fn list_tasks(&self, srid: &str, assignment_id: &str) -> StoreResult<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS}, a.assignment_id FROM tasks t \
             JOIN assignments a ON a.id = t.assignment_pk \
             WHERE a.srid = $1 AND a.assignment_id = $2 ORDER BY t.created_at, t.id"
        );
        let rows = sqlx::query(&sql)
            .bind(srid)
            .bind(assignment_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list tasks")?;

        Ok(rows.iter().map(task_from_row).collect())
    }

    async fn get_task(&self, srid: &str, assignment_id: &str, task_id: &str) -> StoreResult<Option<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS}, a.assignment_id FROM tasks t \
             JOIN assignments a ON a.id = t.assignment_pk \
             WHERE a.srid = $1 AND a.assignment_id = $2 AND t.task_id = $3"
        );
        let row = sqlx::query(&sql)
            .bind(srid)
            .bind(assignment_id)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch task")?;

        Ok(row.as_ref().map(task_from_row))
    }

    async fn insert_task(&self, srid: &str, assignment_id: &str, task: NewTask) -> StoreResult<Option<Task>> {
        let sql = format!(
            "WITH inserted AS ( \
                 INSERT INTO tasks (id, assignment_pk, task_id, type, status, component_type, \
                 component_name, component_extension, component_version, component_last_action, \
                 component_last_action_date_time) \
                 SELECT $3, a.id, $4, $5, $6, $7, $8, $9, $10, $11, $12 \
                 FROM assignments a WHERE a.srid = $1 AND a.assignment_id = $2 \
                 RETURNING * \
             ) \
             SELECT {TASK_COLUMNS}, a.assignment_id FROM inserted t \
             JOIN assignments a ON a.id = t.assignment_pk"
        );
        let row = sqlx::query(&sql)
            .bind(srid)
            .bind(assignment_id)
            .bind(generate_id())
            .bind(&task.task_id)
            .bind(&task.fields.task_type)
            .bind(&task.fields.status)
            .bind(&task.fields.component_type)
            .bind(&task.fields.component_name)
            .bind(&task.fields.component_extension)
            .bind(&task.fields.component_version)
            .bind(&task.fields.component_last_action)
            .bind(&task.fields.component_last_action_date_time)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, "Failed to insert task"))?;

        Ok(row.as_ref().map(task_from_row))
    }

    async fn update_task(
        &self,
        srid: &str,
        assignment_id: &str,
        task_id: &str,
        fields: TaskFields,
    ) -> StoreResult<Option<Task>> {
        let sql = format!(
            "UPDATE tasks t SET type = $4, status = $5, component_type = $6, component_name = $7, \
             component_extension = $8, component_version = $9, component_last_action = $10, \
             component_last_action_date_time = $11, updated_at = NOW() \
             FROM assignments a \
             WHERE a.id = t.assignment_pk AND a.srid = $1 AND a.assignment_id = $2 AND t.task_id = $3 \
             RETURNING {TASK_COLUMNS}, a.assignment_id"
        );
        let row = sqlx::query(&sql)
            .bind(srid)
            .bind(assignment_id)
            .bind(task_id)
            .bind(&fields.task_type)
            .bind(&fields.status)
            .bind(&fields.component_type)
            .bind(&fields.component_name)
            .bind(&fields.component_extension)
            .bind(&fields.component_version)
            .bind(&fields.component_last_action)
            .bind(&fields.component_last_action_date_time)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update task")?;

        Ok(row.as_ref().map(task_from_row))
    }

    async fn delete_task(&self, srid: &str, assignment_id: &str, task_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM tasks t USING assignments a \
             WHERE a.id = t.assignment_pk AND a.srid = $1 AND a.assignment_id = $2 AND t.task_id = $3",
        )
        .bind(srid)
        .bind(assignment_id)
        .bind(task_id)
        .execute(&self.pool)
        .await
        .context("Failed to delete task")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl ReleaseStore for PostgresStore {
    async fn get_release(&self, srid: &str, release_id: &str) -> StoreResult<Option<Release>> {
        let mut conn = self.connection().await?;
        Ok(fetch_release(&mut conn, srid, release_id).await?)
    }

    async fn release_exists(&self, srid: &str, release_id: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM releases WHERE srid = $1 AND release_id = $2)",
        )
        .bind(srid)
        .bind(release_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check release")?;
        Ok(exists)
    }

    async fn list_releases(&self, srid: &str) -> StoreResult<Vec<Release>> {
        let mut conn = self.connection().await?;
        let sql = format!("SELECT {RELEASE_COLUMNS} FROM releases WHERE srid = $1 ORDER BY created_at, id");
        let rows = sqlx::query(&sql)
            .bind(srid)
            .fetch_all(&mut *conn)
            .await
            .context("Failed to list releases")?;

        let mut releases: Vec<Release> = rows.iter().map(release_from_row).collect();
        attach_sets(&mut conn, &mut releases).await?;
        Ok(releases)
    }

    async fn find_releases(&self, srid: &str, filter: &ResourceFilter) -> StoreResult<Vec<Release>> {
        let mut conn = self.connection().await?;
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {RELEASE_COLUMNS} FROM releases WHERE srid = "));
        builder.push_bind(srid.to_string());
        for (column, value) in filter.predicates() {
            builder.push(format!(" AND {column} = "));
            builder.push_bind(value.to_string());
        }
        builder.push(" ORDER BY created_at, id");

        let rows = builder
            .build()
            .fetch_all(&mut *conn)
            .await
            .context("Failed to filter releases")?;

        let mut releases: Vec<Release> = rows.iter().map(release_from_row).collect();
        attach_sets(&mut conn, &mut releases).await?;
        Ok(releases)
    }

    async fn insert_release(&self, srid: &str, release: NewRelease) -> StoreResult<Release> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let id = generate_id();
        let fields = &release.fields;
        sqlx::query(
            "INSERT INTO releases (id, release_id, srid, application, stream, owner, status, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&id)
        .bind(&release.release_id)
        .bind(srid)
        .bind(&fields.application)
        .bind(&fields.stream)
        .bind(&fields.owner)
        .bind(&fields.status)
        .bind(&fields.description)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify(e, "Failed to insert release"))?;

        insert_sets(&mut tx, &id, &release.release_id, release.sets).await?;

        let created = fetch_release(&mut tx, srid, &release.release_id)
            .await?
            .context("Inserted release vanished")?;
        tx.commit().await.context("Failed to commit release")?;
        Ok(created)
    }

    async fn update_release(
        &self,
        srid: &str,
        release_id: &str,
        fields: ReleaseFields,
        sets: ChildrenUpdate<NewReleaseSet>,
    ) -> StoreResult<Option<Release>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let pk: Option<String> = sqlx::query_scalar(
            "UPDATE releases SET application = $3, stream = $4, owner = $5, status = $6, \
             description = $7, updated_at = NOW() \
             WHERE srid = $1 AND release_id = $2 RETURNING id",
        )
        .bind(srid)
        .bind(release_id)
        .bind(&fields.application)
        .bind(&fields.stream)
        .bind(&fields.owner)
        .bind(&fields.status)
        .bind(&fields.description)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update release")?;

        let Some(pk) = pk else {
            return Ok(None);
        };

        match sets {
            ChildrenUpdate::Keep => {}
            ChildrenUpdate::Replace(new_sets) => {
                sqlx::query("DELETE FROM release_sets WHERE release_pk = $1")
                    .bind(&pk)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear release sets")?;
                insert_sets(&mut tx, &pk, release_id, new_sets).await?;
            }
        }

        let updated = fetch_release(&mut tx, srid, release_id).await?;
        tx.commit().await.context("Failed to commit release update")?;
        Ok(updated)
    }

    async fn delete_release(&self, srid: &str, release_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM releases WHERE srid = $1 AND release_id = $2")
            .bind(srid)
            .bind(release_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete release")?;

        Ok(result.rows_affected() > 0)
    }

    async fn begin_release_deploy(
        &self,
        srid: &str,
        release_id: &str,
        status: &str,
        set: NewReleaseSet,
    ) -> StoreResult<Option<Release>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        // The row lock taken here orders this write after any in-flight update.
        let pk: Option<String> = sqlx::query_scalar(
            "UPDATE releases SET status = $3, updated_at = NOW() \
             WHERE srid = $1 AND release_id = $2 RETURNING id",
        )
        .bind(srid)
        .bind(release_id)
        .bind(status)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to mark release as deploying")?;

        let Some(pk) = pk else {
            return Ok(None);
        };

        insert_sets(&mut tx, &pk, release_id, vec![set]).await?;

        let deployed = fetch_release(&mut tx, srid, release_id).await?;
        tx.commit().await.context("Failed to commit release deploy")?;
        Ok(deployed)
    }
}

#[async_trait::async_trait]
impl ReleaseSetStore for PostgresStore {
    async fn list_release_sets(&self, srid: &str) -> StoreResult<Vec<ReleaseSet>> {
        let sql = format!(
            "SELECT {SET_COLUMNS}, r.release_id FROM release_sets s \
             JOIN releases r ON r.id = s.release_pk \
             WHERE r.srid = $1 ORDER BY s.created_at, s.id"
        );
        let rows = sqlx::query(&sql)
            .bind(srid)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list release sets")?;

        Ok(rows.iter().map(set_from_row).collect())
    }

    async fn list_sets_for_release(&self, srid: &str, release_id: &str) -> StoreResult<Vec<ReleaseSet>> {
        let sql = format!(
            "SELECT {SET_COLUMNS}, r.release_id FROM release_sets s \
             JOIN releases r ON r.id = s.release_pk \
             WHERE r.srid = $1 AND r.release_id = $2 ORDER BY s.created_at, s.id"
        );
        let rows = sqlx::query(&sql)
            .bind(srid)
            .bind(release_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list release sets for release")?;

        Ok(rows.iter().map(set_from_row).collect())
    }

    async fn find_release_set(&self, srid: &str, set_id: &str) -> StoreResult<Option<ReleaseSet>> {
        let sql = format!(
            "SELECT {SET_COLUMNS}, r.release_id FROM release_sets s \
             JOIN releases r ON r.id = s.release_pk \
             WHERE r.srid = $1 AND s.set_id = $2 ORDER BY s.created_at, s.id LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(srid)
            .bind(set_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to find release set")?;

        Ok(row.as_ref().map(set_from_row))
    }

    async fn get_release_set(&self, srid: &str, release_id: &str, set_id: &str) -> StoreResult<Option<ReleaseSet>> {
        let sql = format!(
            "SELECT {SET_COLUMNS}, r.release_id FROM release_sets s \
             JOIN releases r ON r.id = s.release_pk \
             WHERE r.srid = $1 AND r.release_id = $2 AND s.set_id = $3"
        );
        let row = sqlx::query(&sql)
            .bind(srid)
            .bind(release_id)
            .bind(set_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch release set")?;

        Ok(row.as_ref().map(set_from_row))
    }

    async fn insert_release_set(&self, srid: &str, release_id: &str, set: NewReleaseSet) -> StoreResult<Option<ReleaseSet>> {
        let sql = format!(
            "WITH inserted AS ( \
                 INSERT INTO release_sets (id, release_pk, set_id, status, owner, description, \
                 deployed_by, deployed_at, deployment_status) \
                 SELECT $3, r.id, $4, $5, $6, $7, $8, $9, $10 \
                 FROM releases r WHERE r.srid = $1 AND r.release_id = $2 \
                 RETURNING * \
             ) \
             SELECT {SET_COLUMNS}, r.release_id FROM inserted s \
             JOIN releases r ON r.id = s.release_pk"
        );
        let row = sqlx::query(&sql)
            .bind(srid)
            .bind(release_id)
            .bind(generate_id())
            .bind(&set.set_id)
            .bind(&set.fields.status)
            .bind(&set.fields.owner)
            .bind(&set.fields.description)
            .bind(&set.fields.deployed_by)
            .bind(set.fields.deployed_at)
            .bind(&set.fields.deployment_status)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, "Failed to insert release set"))?;

        Ok(row.as_ref().map(set_from_row))
    }

    async fn update_release_set(
        &self,
        srid: &str,
        release_id: &str,
        set_id: &str,
        fields: ReleaseSetFields,
    ) -> StoreResult<Option<ReleaseSet>> {
        let sql = format!(
            "UPDATE release_sets s SET status = $4, owner = $5, description = $6, deployed_by = $7, \
             deployed_at = $8, deployment_status = $9, updated_at = NOW() \
             FROM releases r \
             WHERE r.id = s.release_pk AND r.srid = $1 AND r.release_id = $2 AND s.set_id = $3 \
             RETURNING {SET_COLUMNS}, r.release_id"
        );
        let row = sqlx::query(&sql)
            .bind(srid)
            .bind(release_id)
            .bind(set_id)
            .bind(&fields.status)
            .bind(&fields.owner)
            .bind(&fields.description)
            .bind(&fields.deployed_by)
            .bind(fields.deployed_at)
            .bind(&fields.deployment_status)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update release set")?;

        Ok(row.as_ref().map(set_from_row))
    }

    async fn delete_release_set(&self, srid: &str, release_id: &str, set_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM release_sets s USING releases r \
             WHERE r.id = s.release_pk AND r.srid = $1 AND r.release_id = $2 AND s.set_id = $3",
        )
        .bind(srid)
        .bind(release_id)
        .bind(set_id)
        .execute(&self.pool)
        .await
        .context("Failed to delete release set")?;

        Ok(result.rows_affected() > 0)
    }

    async fn begin_set_deploy(&self, srid: &str, set_id: &str, stamp: DeployStamp) -> StoreResult<Option<ReleaseSet>> {
        let sql = format!(
            "UPDATE release_sets s SET status = $3, deployment_status = $4, deployed_by = $5, \
             deployed_at = $6, updated_at = NOW() \
             FROM releases r \
             WHERE r.id = s.release_pk AND s.id = ( \
                 SELECT s2.id FROM release_sets s2 \
                 JOIN releases r2 ON r2.id = s2.release_pk \
                 WHERE r2.srid = $1 AND s2.set_id = $2 \
                 ORDER BY s2.created_at, s2.id LIMIT 1 \
             ) \
             RETURNING {SET_COLUMNS}, r.release_id"
        );
        let row = sqlx::query(&sql)
            .bind(srid)
            .bind(set_id)
            .bind(&stamp.status)
            .bind(&stamp.deployment_status)
            .bind(&stamp.deployed_by)
            .bind(stamp.deployed_at)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to mark release set as deploying")?;

        Ok(row.as_ref().map(set_from_row))
    }
}

#[async_trait::async_trait]
impl MessageStore for PostgresStore {
    async fn get_message(&self, id: &Id) -> StoreResult<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch message")?;

        Ok(row.as_ref().map(message_from_row))
    }

    async fn list_messages(&self, page: &PageRequest) -> StoreResult<Page<Message>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count messages")?;

        // Sort column and direction come from closed enums, never from raw input.
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY {} {}, id ASC LIMIT $1 OFFSET $2",
            page.sort.field.column(),
            page.sort.direction.keyword()
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(page.size))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list messages")?;

        let content = rows.iter().map(message_from_row).collect();
        Ok(Page::new(content, page, total.max(0) as u64))
    }

    async fn search_messages(&self, term: &str, page: &PageRequest) -> StoreResult<Page<Message>> {
        let pattern = like_pattern(term);
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE content ILIKE $1 ESCAPE '\\'")
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await
                .context("Failed to count matching messages")?;

        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE content ILIKE $1 ESCAPE '\\' \
             ORDER BY {} {}, id ASC LIMIT $2 OFFSET $3",
            page.sort.field.column(),
            page.sort.direction.keyword()
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(i64::from(page.size))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to search messages")?;

        let content = rows.iter().map(message_from_row).collect();
        Ok(Page::new(content, page, total.max(0) as u64))
    }

    async fn insert_message(&self, content: &str, sender: &str) -> StoreResult<Message> {
        let sql = format!(
            "INSERT INTO messages (id, content, sender) VALUES ($1, $2, $3) RETURNING {MESSAGE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(generate_id())
            .bind(content)
            .bind(sender)
            .fetch_one(&self.pool)
            .await
            .context("Failed to insert message")?;

        Ok(message_from_row(&row))
    }

    async fn update_message(&self, id: &Id, content: &str, expected_version: i64) -> StoreResult<Option<Message>> {
        let sql = format!(
            "UPDATE messages SET content = $2, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $3 RETURNING {MESSAGE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(content)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update message")?;

        if let Some(row) = row {
            return Ok(Some(message_from_row(&row)));
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM messages WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check message")?;
        if exists {
            return Err(StoreError::StaleVersion {
                id: id.clone(),
                expected: expected_version,
            });
        }
        Ok(None)
    }

    async fn delete_message(&self, id: &Id) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete message")?;

        Ok(result.rows_affected() > 0)
    }
}
