use chrono::Utc;

use crate::logic::error::{require_key, ServiceError, ServiceResult};
use crate::logic::releases;
use crate::model::{
    DeployRequest, DeployStamp, NewReleaseSet, ReleaseSet, ReleaseSetFields, UserContext, DEPLOY_IN_PROGRESS,
    IN_PROGRESS,
};
use crate::store::traits::Store;

/// Release sets, addressed either through their release or by set id
/// anywhere in the scope.
pub struct ReleaseSetOperations;

impl ReleaseSetOperations {
    async fn require_release<S: Store>(store: &S, srid: &str, release_id: &str) -> ServiceResult<()> {
        if !store.release_exists(srid, release_id).await? {
            return Err(releases::not_found(srid, release_id));
        }
        Ok(())
    }

    /// Every set of every release in the scope.
    pub async fn list<S: Store>(store: &S, srid: &str) -> ServiceResult<Vec<ReleaseSet>> {
        Ok(store.list_release_sets(srid).await?)
    }

    pub async fn list_for_release<S: Store>(
        store: &S,
        srid: &str,
        release_id: &str,
    ) -> ServiceResult<Vec<ReleaseSet>> {
        Self::require_release(store, srid, release_id).await?;
        Ok(store.list_sets_for_release(srid, release_id).await?)
    }

    /// Scope-level lookup. When two releases share a set id the
    /// earliest-created set is returned.
    pub async fn get<S: Store>(store: &S, srid: &str, set_id: &str) -> ServiceResult<ReleaseSet> {
        store
            .find_release_set(srid, set_id)
            .await?
            .ok_or_else(|| scope_not_found(srid, set_id))
    }

    pub async fn create<S: Store>(
        store: &S,
        srid: &str,
        release_id: &str,
        set: NewReleaseSet,
    ) -> ServiceResult<ReleaseSet> {
        Self::require_release(store, srid, release_id).await?;
        require_key(&set.set_id, "setId")?;

        let created = store
            .insert_release_set(srid, release_id, set)
            .await?
            .ok_or_else(|| releases::not_found(srid, release_id))?;
        log::info!("Created release set {} under release {}", created.set_id, release_id);
        Ok(created)
    }

    pub async fn update<S: Store>(
        store: &S,
        srid: &str,
        release_id: &str,
        set_id: &str,
        fields: ReleaseSetFields,
    ) -> ServiceResult<ReleaseSet> {
        Self::require_release(store, srid, release_id).await?;
        store
            .update_release_set(srid, release_id, set_id, fields)
            .await?
            .ok_or_else(|| not_found(release_id, set_id))
    }

    pub async fn delete<S: Store>(
        store: &S,
        srid: &str,
        release_id: &str,
        set_id: &str,
    ) -> ServiceResult<()> {
        Self::require_release(store, srid, release_id).await?;
        if !store.delete_release_set(srid, release_id, set_id).await? {
            return Err(not_found(release_id, set_id));
        }
        log::info!("Deleted release set {} under release {}", set_id, release_id);
        Ok(())
    }

    /// Marks a set as deploying. Like release deploy, no terminal state is
    /// ever written.
    pub async fn deploy<S: Store>(
        store: &S,
        srid: &str,
        set_id: &str,
        request: DeployRequest,
        user: &UserContext,
    ) -> ServiceResult<ReleaseSet> {
        let stamp = DeployStamp {
            status: DEPLOY_IN_PROGRESS.to_string(),
            deployment_status: IN_PROGRESS.to_string(),
            deployed_by: user.username.clone(),
            deployed_at: Utc::now(),
        };

        let deployed = store
            .begin_set_deploy(srid, set_id, stamp)
            .await?
            .ok_or_else(|| scope_not_found(srid, set_id))?;

        log::info!(
            "Deploy of set {} in {} requested by {} (environment={:?}, level={:?})",
            set_id,
            srid,
            user.username,
            request.environment,
            request.level
        );
        Ok(deployed)
    }
}

fn scope_not_found(srid: &str, set_id: &str) -> ServiceError {
    ServiceError::not_found(format!("Release set '{}' not found in {}", set_id, srid))
}

fn not_found(release_id: &str, set_id: &str) -> ServiceError {
    ServiceError::not_found(format!(
        "Release set '{}' not found in release {}",
        set_id, release_id
    ))
}
