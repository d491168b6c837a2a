use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{Json, Response},
};

use crate::api::error::{ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::api::handlers::{created, AppState};
use crate::logic::{ReleaseOperations, ReleaseSetOperations};
use crate::model::{
    DeployRequest, NewRelease, NewReleaseSet, Release, ReleaseSet, ReleaseUpdate, ResourceFilter,
    UserContext,
};
use crate::store::traits::Store;

/// GET /ispw/{srid}/releases?application&status
pub async fn list_releases<S: Store>(
    ApiPath(srid): ApiPath<String>,
    State(state): State<AppState<S>>,
    ApiQuery(filter): ApiQuery<ResourceFilter>,
) -> ApiResult<Json<Vec<Release>>> {
    let releases = ReleaseOperations::list(&*state.store, &srid, filter).await?;
    Ok(Json(releases))
}

/// POST /ispw/{srid}/releases
pub async fn create_release<S: Store>(
    ApiPath(srid): ApiPath<String>,
    State(state): State<AppState<S>>,
    uri: Uri,
    ApiJson(new): ApiJson<NewRelease>,
) -> ApiResult<Response> {
    let release = ReleaseOperations::create(&*state.store, &srid, new).await?;
    Ok(created(&uri, &release.release_id.clone(), release))
}

/// GET /ispw/{srid}/releases/{release_id}
pub async fn get_release<S: Store>(
    ApiPath((srid, release_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Release>> {
    let release = ReleaseOperations::get(&*state.store, &srid, &release_id).await?;
    Ok(Json(release))
}

/// PUT /ispw/{srid}/releases/{release_id}
pub async fn update_release<S: Store>(
    ApiPath((srid, release_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
    ApiJson(update): ApiJson<ReleaseUpdate>,
) -> ApiResult<Json<Release>> {
    let release = ReleaseOperations::update(&*state.store, &srid, &release_id, update).await?;
    Ok(Json(release))
}

/// DELETE /ispw/{srid}/releases/{release_id}
pub async fn delete_release<S: Store>(
    ApiPath((srid, release_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
) -> ApiResult<StatusCode> {
    ReleaseOperations::delete(&*state.store, &srid, &release_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /ispw/{srid}/releases/{release_id}/deploy
pub async fn deploy_release<S: Store>(
    ApiPath((srid, release_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
    user: UserContext,
    ApiJson(request): ApiJson<DeployRequest>,
) -> ApiResult<Json<Release>> {
    let release =
        ReleaseOperations::deploy(&*state.store, &srid, &release_id, request, &user).await?;
    Ok(Json(release))
}

/// GET /ispw/{srid}/releases/{release_id}/sets
pub async fn list_release_sets_for_release<S: Store>(
    ApiPath((srid, release_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Vec<ReleaseSet>>> {
    let sets = ReleaseSetOperations::list_for_release(&*state.store, &srid, &release_id).await?;
    Ok(Json(sets))
}

/// GET /ispw/{srid}/sets
pub async fn list_release_sets<S: Store>(
    ApiPath(srid): ApiPath<String>,
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Vec<ReleaseSet>>> {
    let sets = ReleaseSetOperations::list(&*state.store, &srid).await?;
    Ok(Json(sets))
}

/// GET /ispw/{srid}/sets/{set_id}
pub async fn get_release_set<S: Store>(
    ApiPath((srid, set_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
) -> ApiResult<Json<ReleaseSet>> {
    let set = ReleaseSetOperations::get(&*state.store, &srid, &set_id).await?;
    Ok(Json(set))
}

/// POST /ispw/{srid}/sets/{release_id}
/// Shares its path with the set lookup above; the segment names a release here.
pub async fn create_release_set<S: Store>(
    ApiPath((srid, release_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
    uri: Uri,
    ApiJson(new): ApiJson<NewReleaseSet>,
) -> ApiResult<Response> {
    let set = ReleaseSetOperations::create(&*state.store, &srid, &release_id, new).await?;
    Ok(created(&uri, &set.set_id.clone(), set))
}

/// PUT /ispw/{srid}/sets/{release_id}/{set_id}
pub async fn update_release_set<S: Store>(
    ApiPath((srid, release_id, set_id)): ApiPath<(String, String, String)>,
    State(state): State<AppState<S>>,
    ApiJson(body): ApiJson<NewReleaseSet>,
) -> ApiResult<Json<ReleaseSet>> {
    let set =
        ReleaseSetOperations::update(&*state.store, &srid, &release_id, &set_id, body.fields).await?;
    Ok(Json(set))
}

/// DELETE /ispw/{srid}/sets/{release_id}/{set_id}
pub async fn delete_release_set<S: Store>(
    ApiPath((srid, release_id, set_id)): ApiPath<(String, String, String)>,
    State(state): State<AppState<S>>,
) -> ApiResult<StatusCode> {
    ReleaseSetOperations::delete(&*state.store, &srid, &release_id, &set_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /ispw/{srid}/sets/{set_id}/deploy
pub async fn deploy_release_set<S: Store>(
    ApiPath((srid, set_id)): ApiPath<(String, String)>,
    State(state): State<AppState<S>>,
    user: UserContext,
    ApiJson(request): ApiJson<DeployRequest>,
) -> ApiResult<Json<ReleaseSet>> {
    let set = ReleaseSetOperations::deploy(&*state.store, &srid, &set_id, request, &user).await?;
    Ok(Json(set))
}
