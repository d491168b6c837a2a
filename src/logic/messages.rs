use crate::logic::error::{ServiceError, ServiceResult};
use crate::model::{
    Id, Message, MessageUpdate, NewMessage, Page, PageRequest, UserContext, MAX_CONTENT_CHARS,
};
use crate::store::traits::Store;

pub struct MessageOperations;

impl MessageOperations {
    pub async fn list<S: Store>(store: &S, page: &PageRequest) -> ServiceResult<Page<Message>> {
        Ok(store.list_messages(page).await?)
    }

    /// Case-insensitive substring search on content.
    pub async fn search<S: Store>(
        store: &S,
        query: Option<&str>,
        page: &PageRequest,
    ) -> ServiceResult<Page<Message>> {
        let term = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ServiceError::validation("query parameter is required"))?;
        Ok(store.search_messages(term, page).await?)
    }

    pub async fn get<S: Store>(store: &S, id: &Id) -> ServiceResult<Message> {
        store.get_message(id).await?.ok_or_else(|| not_found(id))
    }

    /// The sender is always the caller.
    pub async fn create<S: Store>(
        store: &S,
        new: NewMessage,
        user: &UserContext,
    ) -> ServiceResult<Message> {
        validate_content(&new.content)?;
        let created = store.insert_message(&new.content, &user.username).await?;
        log::info!("Message {} created by {}", created.id, user.username);
        Ok(created)
    }

    pub async fn update<S: Store>(
        store: &S,
        id: &Id,
        update: MessageUpdate,
        user: &UserContext,
    ) -> ServiceResult<Message> {
        let current = Self::get(store, id).await?;
        require_owner(&current, user, "update")?;
        validate_content(&update.content)?;

        let expected = update.version.unwrap_or(current.version);
        let updated = store
            .update_message(id, &update.content, expected)
            .await?
            .ok_or_else(|| not_found(id))?;
        log::info!("Message {} updated by {} (version {})", id, user.username, updated.version);
        Ok(updated)
    }

    pub async fn delete<S: Store>(store: &S, id: &Id, user: &UserContext) -> ServiceResult<()> {
        let current = Self::get(store, id).await?;
        require_owner(&current, user, "delete")?;

        if !store.delete_message(id).await? {
            return Err(not_found(id));
        }
        log::info!("Message {} deleted by {}", id, user.username);
        Ok(())
    }
}

fn validate_content(content: &str) -> ServiceResult<()> {
    if content.trim().is_empty() {
        return Err(ServiceError::validation("content must not be blank"));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ServiceError::validation(format!(
            "content must be at most {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(())
}

fn require_owner(message: &Message, user: &UserContext, action: &str) -> ServiceResult<()> {
    if message.sender != user.username {
        log::warn!(
            "User {} tried to {} message {} owned by {}",
            user.username,
            action,
            message.id,
            message.sender
        );
        return Err(ServiceError::PermissionDenied(format!(
            "You can only {} your own messages",
            action
        )));
    }
    Ok(())
}

fn not_found(id: &Id) -> ServiceError {
    ServiceError::not_found(format!("Message '{}' not found", id))
}
