use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{Json, Response},
};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::api::handlers::{created, AppState};
use crate::logic::MessageOperations;
use crate::model::{Message, MessageUpdate, NewMessage, Page, PageQuery, PageRequest, UserContext};
use crate::store::traits::Store;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

fn page_request(query: PageQuery) -> ApiResult<PageRequest> {
    PageRequest::try_from(query).map_err(|e| ApiError::validation(e.to_string()))
}

/// GET /api/messages?page&size&sort
pub async fn list_messages<S: Store>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<Message>>> {
    let page = page_request(query)?;
    let messages = MessageOperations::list(&*state.store, &page).await?;
    Ok(Json(messages))
}

/// GET /api/messages/search?query&page&size&sort
pub async fn search_messages<S: Store>(
    State(state): State<AppState<S>>,
    ApiQuery(search): ApiQuery<SearchQuery>,
) -> ApiResult<Json<Page<Message>>> {
    let page = page_request(PageQuery {
        page: search.page,
        size: search.size,
        sort: search.sort,
    })?;
    let messages = MessageOperations::search(&*state.store, search.query.as_deref(), &page).await?;
    Ok(Json(messages))
}

/// GET /api/messages/{id}
pub async fn get_message<S: Store>(
    ApiPath(id): ApiPath<String>,
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Message>> {
    let message = MessageOperations::get(&*state.store, &id).await?;
    Ok(Json(message))
}

/// POST /api/messages
pub async fn create_message<S: Store>(
    State(state): State<AppState<S>>,
    user: UserContext,
    uri: Uri,
    ApiJson(new): ApiJson<NewMessage>,
) -> ApiResult<Response> {
    let message = MessageOperations::create(&*state.store, new, &user).await?;
    Ok(created(&uri, &message.id.clone(), message))
}

/// PUT /api/messages/{id}
pub async fn update_message<S: Store>(
    ApiPath(id): ApiPath<String>,
    State(state): State<AppState<S>>,
    user: UserContext,
    ApiJson(update): ApiJson<MessageUpdate>,
) -> ApiResult<Json<Message>> {
    let message = MessageOperations::update(&*state.store, &id, update, &user).await?;
    Ok(Json(message))
}

/// DELETE /api/messages/{id}
pub async fn delete_message<S: Store>(
    ApiPath(id): ApiPath<String>,
    State(state): State<AppState<S>>,
    user: UserContext,
) -> ApiResult<StatusCode> {
    MessageOperations::delete(&*state.store, &id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
