use chrono::Utc;

use crate::logic::error::{require_distinct_keys, require_key, ServiceError, ServiceResult};
use crate::model::{
    generate_id, non_blank, DeployRequest, NewRelease, NewReleaseSet, Release, ReleaseSetFields,
    ReleaseUpdate, ResourceFilter, Timestamp, UserContext, DEPLOY_IN_PROGRESS, IN_PROGRESS,
};
use crate::store::traits::Store;

/// Environment name used when a deploy request does not carry one.
const UNSPECIFIED_ENVIRONMENT: &str = "unspecified";

pub struct ReleaseOperations;

impl ReleaseOperations {
    pub async fn list<S: Store>(
        store: &S,
        srid: &str,
        filter: ResourceFilter,
    ) -> ServiceResult<Vec<Release>> {
        let filter = filter.normalized();
        let releases = if filter.is_empty() {
            store.list_releases(srid).await?
        } else {
            store.find_releases(srid, &filter).await?
        };
        Ok(releases)
    }

    pub async fn get<S: Store>(store: &S, srid: &str, release_id: &str) -> ServiceResult<Release> {
        store
            .get_release(srid, release_id)
            .await?
            .ok_or_else(|| not_found(srid, release_id))
    }

    pub async fn create<S: Store>(store: &S, srid: &str, new: NewRelease) -> ServiceResult<Release> {
        require_key(&new.release_id, "releaseId")?;
        require_distinct_keys(new.sets.iter().map(|s| s.set_id.as_str()), "setId")?;

        let created = store.insert_release(srid, new).await?;
        log::info!(
            "Created release {} in {} with {} set(s)",
            created.release_id,
            srid,
            created.sets.len()
        );
        Ok(created)
    }

    pub async fn update<S: Store>(
        store: &S,
        srid: &str,
        release_id: &str,
        update: ReleaseUpdate,
    ) -> ServiceResult<Release> {
        if let Some(sets) = &update.sets {
            require_distinct_keys(sets.iter().map(|s| s.set_id.as_str()), "setId")?;
        }

        let updated = store
            .update_release(srid, release_id, update.fields, update.sets.into())
            .await?
            .ok_or_else(|| not_found(srid, release_id))?;
        log::info!("Updated release {} in {}", release_id, srid);
        Ok(updated)
    }

    pub async fn delete<S: Store>(store: &S, srid: &str, release_id: &str) -> ServiceResult<()> {
        if !store.delete_release(srid, release_id).await? {
            return Err(not_found(srid, release_id));
        }
        log::info!("Deleted release {} in {}", release_id, srid);
        Ok(())
    }

    /// Marks the release as deploying and records the attempt as a new set.
    ///
    /// The status change and the appended set are written by one store call
    /// that leaves every other release field alone. Nothing ever moves the
    /// release out of `DEPLOY_IN_PROGRESS` afterwards.
    pub async fn deploy<S: Store>(
        store: &S,
        srid: &str,
        release_id: &str,
        request: DeployRequest,
        user: &UserContext,
    ) -> ServiceResult<Release> {
        let now = Utc::now();
        let environment = non_blank(request.environment.as_deref()).unwrap_or(UNSPECIFIED_ENVIRONMENT);
        let description = match non_blank(request.description.as_deref()) {
            Some(description) => format!("Deployment to {} - {}", environment, description),
            None => format!("Deployment to {}", environment),
        };
        let deployment_set = NewReleaseSet {
            set_id: deployment_set_id(now),
            fields: ReleaseSetFields {
                status: Some(IN_PROGRESS.to_string()),
                owner: Some(format!("{}-deployer", environment)),
                description: Some(description),
                deployed_by: Some(user.username.clone()),
                deployed_at: Some(now),
                deployment_status: Some(IN_PROGRESS.to_string()),
            },
        };

        let deployed = store
            .begin_release_deploy(srid, release_id, DEPLOY_IN_PROGRESS, deployment_set)
            .await?
            .ok_or_else(|| not_found(srid, release_id))?;

        log::info!(
            "Deploy of release {} in {} to {} requested by {} (level={:?}, autoDeploy={})",
            release_id,
            srid,
            environment,
            user.username,
            request.level,
            request.auto_deploy
        );
        Ok(deployed)
    }
}

/// `SET-<millis>-<suffix>`. The random suffix keeps deploys that land in
/// the same millisecond apart.
fn deployment_set_id(now: Timestamp) -> String {
    let suffix = generate_id();
    format!("SET-{}-{}", now.timestamp_millis(), &suffix[..8])
}

pub(crate) fn not_found(srid: &str, release_id: &str) -> ServiceError {
    ServiceError::not_found(format!("Release '{}' not found in {}", release_id, srid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReleaseFields, Role};
    use crate::store::MemoryStore;

    fn release(id: &str, sets: &[&str]) -> NewRelease {
        NewRelease {
            release_id: id.to_string(),
            fields: ReleaseFields {
                application: Some("PAY".to_string()),
                status: Some("OPEN".to_string()),
                ..Default::default()
            },
            sets: sets
                .iter()
                .map(|s| NewReleaseSet {
                    set_id: s.to_string(),
                    fields: ReleaseSetFields::default(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn deploy_marks_release_and_appends_one_set() {
        let store = MemoryStore::new();
        ReleaseOperations::create(&store, "PRJ1", release("R1", &["S1"]))
            .await
            .unwrap();

        let user = UserContext::new("alice", [Role::User]);
        let request = DeployRequest {
            environment: Some("prod".to_string()),
            description: Some("hotfix".to_string()),
            ..Default::default()
        };
        let deployed = ReleaseOperations::deploy(&store, "PRJ1", "R1", request, &user)
            .await
            .unwrap();

        assert_eq!(deployed.fields.status.as_deref(), Some(DEPLOY_IN_PROGRESS));
        assert_eq!(deployed.fields.application.as_deref(), Some("PAY"));
        assert_eq!(deployed.sets.len(), 2);

        let new_set = &deployed.sets[1];
        assert!(new_set.set_id.starts_with("SET-"));
        assert_eq!(new_set.fields.status.as_deref(), Some(IN_PROGRESS));
        assert_eq!(new_set.fields.deployment_status.as_deref(), Some(IN_PROGRESS));
        assert_eq!(new_set.fields.owner.as_deref(), Some("prod-deployer"));
        assert_eq!(
            new_set.fields.description.as_deref(),
            Some("Deployment to prod - hotfix")
        );
        assert_eq!(new_set.fields.deployed_by.as_deref(), Some("alice"));
        assert!(new_set.fields.deployed_at.is_some());
    }

    #[tokio::test]
    async fn deploy_of_missing_release_is_not_found() {
        let store = MemoryStore::new();
        let user = UserContext::new("alice", [Role::User]);
        let err = ReleaseOperations::deploy(&store, "PRJ1", "R1", DeployRequest::default(), &user)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn filtered_listing_and_conflicts() {
        let store = MemoryStore::new();
        ReleaseOperations::create(&store, "PRJ1", release("R1", &[])).await.unwrap();
        let mut other = release("R2", &[]);
        other.fields.status = Some("CLOSED".to_string());
        ReleaseOperations::create(&store, "PRJ1", other).await.unwrap();

        let err = ReleaseOperations::create(&store, "PRJ1", release("R1", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let filter = ResourceFilter::new(None, Some("CLOSED".to_string()));
        let closed = ReleaseOperations::list(&store, "PRJ1", filter).await.unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].release_id, "R2");
    }

    #[tokio::test]
    async fn repeated_deploys_each_add_a_set() {
        let store = MemoryStore::new();
        ReleaseOperations::create(&store, "PRJ1", release("R1", &["S1"]))
            .await
            .unwrap();
        let user = UserContext::new("alice", [Role::User]);

        for _ in 0..50 {
            ReleaseOperations::deploy(&store, "PRJ1", "R1", DeployRequest::default(), &user)
                .await
                .unwrap();
        }

        let release = ReleaseOperations::get(&store, "PRJ1", "R1").await.unwrap();
        assert_eq!(release.sets.len(), 51);
        let ids: std::collections::HashSet<_> = release.sets.iter().map(|s| &s.set_id).collect();
        assert_eq!(ids.len(), 51);
        assert_eq!(
            release.sets[1].fields.description.as_deref(),
            Some("Deployment to unspecified")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn deploy_racing_an_update_keeps_the_update() {
        let user = UserContext::new("alice", [Role::User]);
        for round in 0..200 {
            let store = std::sync::Arc::new(MemoryStore::new());
            ReleaseOperations::create(&*store, "PRJ1", release("R1", &["S1"]))
                .await
                .unwrap();

            let application = format!("APP{}", round);
            let update = ReleaseUpdate {
                fields: ReleaseFields {
                    application: Some(application.clone()),
                    status: Some("OPEN".to_string()),
                    ..Default::default()
                },
                sets: None,
            };
            let updater = {
                let store = store.clone();
                tokio::spawn(async move { ReleaseOperations::update(&*store, "PRJ1", "R1", update).await })
            };
            let deployer = {
                let store = store.clone();
                let user = user.clone();
                tokio::spawn(async move {
                    ReleaseOperations::deploy(&*store, "PRJ1", "R1", DeployRequest::default(), &user)
                        .await
                })
            };
            updater.await.unwrap().unwrap();
            deployer.await.unwrap().unwrap();

            let stored = ReleaseOperations::get(&*store, "PRJ1", "R1").await.unwrap();
            assert_eq!(stored.fields.application.as_deref(), Some(application.as_str()));
            assert_eq!(stored.sets.len(), 2);
        }
    }
}
