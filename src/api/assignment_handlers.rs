use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{Json, Response},
};

use crate::api::error::{ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::api::handlers::{created, AppState};
use crate::logic::{AssignmentOperations, TaskOperations};
use crate::model::{Assignment, AssignmentUpdate, NewAssignment, NewTask, ResourceFilter, Task};
use crate::store::traits::Store;

/// GET /ispw/{srid}/assignments?application&status
pub async fn list_assignments<S: Store>(
    ApiPath(srid): ApiPath<String>,
    State(state): State<AppState<S>>,
    ApiQuery(filter): ApiQuery<ResourceFilter>,
) -> ApiResult<Json<Vec<Assignment>>> {
    let assignments = AssignmentOperations::list(&*state.store, &srid, filter).await?;
    Ok(Json(assignments))
}

/// POST /ispw/{srid}/assignments
pub async fn create_assignment<S: Store>(
    ApiPath(srid): ApiPath<String>,
    State(state): State<AppState<S>>,
    uri: Uri,
    ApiJson(new): ApiJson<NewAssignment>,
) -> ApiResult<Response> {
    let assignment = AssignmentOperations::create(&*state.store, &srid, new).await?;
    Ok(created(&uri, &assignment.assignment_id.clone(), assignment))
}

/// GET /ispw/{srid}/assignments/{assignment_id}
pub async fn get_assignment<S: Store>(
    ApiPath((srid, assignment_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Assignment>> {
    let assignment = AssignmentOperations::get(&*state.store, &srid, &assignment_id).await?;
    Ok(Json(assignment))
}

/// PUT /ispw/{srid}/assignments/{assignment_id}
pub async fn update_assignment<S: Store>(
    ApiPath((srid, assignment_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
    ApiJson(update): ApiJson<AssignmentUpdate>,
) -> ApiResult<Json<Assignment>> {
    let assignment =
        AssignmentOperations::update(&*state.store, &srid, &assignment_id, update).await?;
    Ok(Json(assignment))
}

/// DELETE /ispw/{srid}/assignments/{assignment_id}
pub async fn delete_assignment<S: Store>(
    ApiPath((srid, assignment_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
) -> ApiResult<StatusCode> {
    AssignmentOperations::delete(&*state.store, &srid, &assignment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /ispw/{srid}/assignments/{assignment_id}/tasks
pub async fn list_tasks<S: Store>(
    ApiPath((srid, assignment_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Vec<Task>>> {
    let tasks = TaskOperations::list(&*state.store, &srid, &assignment_id).await?;
    Ok(Json(tasks))
}

/// POST /ispw/{srid}/assignments/{assignment_id}/tasks
pub async fn create_task<S: Store>(
    ApiPath((srid, assignment_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
    uri: Uri,
    ApiJson(new): ApiJson<NewTask>,
) -> ApiResult<Response> {
    let task = TaskOperations::create(&*state.store, &srid, &assignment_id, new).await?;
    Ok(created(&uri, &task.task_id.clone(), task))
}

/// GET /ispw/{srid}/assignments/{assignment_id}/tasks/{task_id}
pub async fn get_task<S: Store>(
    ApiPath((srid, assignment_id, task_id)): ApiPath<(String, String, String)>,
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Task>> {
    let task = TaskOperations::get(&*state.store, &srid, &assignment_id, &task_id).await?;
    Ok(Json(task))
}

/// PUT /ispw/{srid}/assignments/{assignment_id}/tasks/{task_id}
/// Any `taskId` in the body is ignored.
pub async fn update_task<S: Store>(
    ApiPath((srid, assignment_id, task_id)): ApiPath<(String, String, String)>,
    State(state): State<AppState<S>>,
    ApiJson(body): ApiJson<NewTask>,
) -> ApiResult<Json<Task>> {
    let task =
        TaskOperations::update(&*state.store, &srid, &assignment_id, &task_id, body.fields).await?;
    Ok(Json(task))
}

/// DELETE /ispw/{srid}/assignments/{assignment_id}/tasks/{task_id}
pub async fn delete_task<S: Store>(
    ApiPath((srid, assignment_id, task_id)): ApiPath<(String, String, String)>,
    State(state): State<AppState<S>>,
) -> ApiResult<StatusCode> {
    TaskOperations::delete(&*state.store, &srid, &assignment_id, &task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
