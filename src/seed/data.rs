use anyhow::Result;

use crate::logic::{AssignmentOperations, MessageOperations, ReleaseOperations, ServiceError};
use crate::model::{
    AssignmentFields, NewAssignment, NewMessage, NewRelease, NewReleaseSet, NewTask, ReleaseFields,
    ReleaseSetFields, Role, TaskFields, UserContext,
};
use crate::store::traits::Store;

const DEMO_SRID: &str = "DEMO";

fn task(task_id: &str, task_type: &str, name: &str, extension: &str) -> NewTask {
    NewTask {
        task_id: task_id.to_string(),
        fields: TaskFields {
            task_type: Some(task_type.to_string()),
            status: Some("ACTIVE".to_string()),
            component_type: Some(extension.to_uppercase()),
            component_name: Some(name.to_string()),
            component_extension: Some(extension.to_string()),
            component_version: Some("1".to_string()),
            component_last_action: Some("CHECKOUT".to_string()),
            component_last_action_date_time: None,
        },
    }
}

/// Loads a small demo scope through the service layer. Records that already
/// exist are left alone, so loading twice is harmless.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    let release = NewRelease {
        release_id: "REL-2024-01".to_string(),
        fields: ReleaseFields {
            application: Some("PAY".to_string()),
            stream: Some("PROD".to_string()),
            owner: Some("release-manager".to_string()),
            status: Some("OPEN".to_string()),
            description: Some("January payment release".to_string()),
        },
        sets: vec![NewReleaseSet {
            set_id: "SET-INITIAL".to_string(),
            fields: ReleaseSetFields {
                status: Some("CLOSED".to_string()),
                owner: Some("qa-deployer".to_string()),
                description: Some("Initial QA promotion".to_string()),
                ..Default::default()
            },
        }],
    };
    skip_existing(ReleaseOperations::create(store, DEMO_SRID, release).await)?;

    let assignments = [
        ("PAY000001", "PAY", "OPEN", vec![task("T1", "COB", "PAYMAIN", "cob"), task("T2", "JCL", "PAYJOB", "jcl")]),
        ("PAY000002", "PAY", "CLOSED", vec![task("T1", "COB", "PAYCALC", "cob")]),
        ("HR0000001", "HR", "OPEN", Vec::new()),
    ];
    for (assignment_id, application, status, tasks) in assignments {
        let new = NewAssignment {
            assignment_id: assignment_id.to_string(),
            fields: AssignmentFields {
                application: Some(application.to_string()),
                stream: Some("PROD".to_string()),
                owner: Some("developer".to_string()),
                status: Some(status.to_string()),
                release_id: Some("REL-2024-01".to_string()),
                setid: None,
                level: Some("DEV1".to_string()),
            },
            tasks,
        };
        skip_existing(AssignmentOperations::create(store, DEMO_SRID, new).await)?;
    }

    let page = MessageOperations::list(store, &Default::default()).await?;
    if page.total_elements == 0 {
        let system = UserContext::new("system", [Role::User]);
        let new = NewMessage {
            content: "Welcome to the code pipeline server".to_string(),
        };
        MessageOperations::create(store, new, &system).await?;
    }

    log::info!("Seed data loaded into scope {}", DEMO_SRID);
    Ok(())
}

fn skip_existing<T>(result: Result<T, ServiceError>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(ServiceError::Conflict(message)) => {
            log::debug!("Seed record already present: {}", message);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceFilter;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn seeding_twice_is_harmless() {
        let store = MemoryStore::new();
        load_seed_data(&store).await.unwrap();
        load_seed_data(&store).await.unwrap();

        let assignments = AssignmentOperations::list(&store, DEMO_SRID, ResourceFilter::default())
            .await
            .unwrap();
        assert_eq!(assignments.len(), 3);
        let page = MessageOperations::list(&store, &Default::default()).await.unwrap();
        assert_eq!(page.total_elements, 1);
    }
}
