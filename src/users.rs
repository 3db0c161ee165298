//! Admin-side user management: role changes and ward assignment.
//!
//! Roles drive every authorization check and the official fan-out of new
//! reports, so only admins may change them.

use std::sync::Arc;
use tracing::{info, Instrument};

use crate::error::CivicError;
use crate::store::Store;
use crate::telemetry::create_lifecycle_span;
use crate::types::{Actor, Role, User, UserId};

pub struct UserDirectory {
    store: Arc<dyn Store>,
}

fn require_admin(actor: Actor, what: &str) -> Result<(), CivicError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(CivicError::unauthorized(format!("only admins can {what}")))
    }
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: UserId) -> Result<User, CivicError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| CivicError::user_not_found(user_id))
    }

    pub async fn set_role(&self, actor: Actor, user_id: UserId, role: &str) -> Result<User, CivicError> {
        let span = create_lifecycle_span("set_role", Some(actor.id), None);
        async move {
            require_admin(actor, "change user roles")?;
            let role: Role = role.parse().map_err(CivicError::Validation)?;

            let user = self
                .store
                .update_user_role(user_id, role)
                .await?
                .ok_or_else(|| CivicError::user_not_found(user_id))?;

            info!(user.id = user.id, %role, "User role changed");
            Ok(user)
        }
        .instrument(span)
        .await
    }

    /// Blank or missing ward clears it
    pub async fn set_ward(
        &self,
        actor: Actor,
        user_id: UserId,
        ward_number: Option<&str>,
    ) -> Result<User, CivicError> {
        let span = create_lifecycle_span("set_ward", Some(actor.id), None);
        async move {
            require_admin(actor, "change user wards")?;
            let ward = ward_number
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string);

            let user = self
                .store
                .update_user_ward(user_id, ward)
                .await?
                .ok_or_else(|| CivicError::user_not_found(user_id))?;

            info!(user.id = user.id, ward = ?user.ward_number, "User ward changed");
            Ok(user)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockStore;
    use chrono::Utc;

    fn user(id: UserId, role: Role, ward: Option<&str>) -> User {
        User {
            id,
            name: "Asha".to_string(),
            email: "asha@example.org".to_string(),
            role,
            ward_number: ward.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_admin_promotes_citizen() {
        let mut store = MockStore::new();
        store
            .expect_update_user_role()
            .withf(|id, role| *id == 4 && *role == Role::Official)
            .times(1)
            .returning(|id, role| Ok(Some(user(id, role, None))));

        let users = UserDirectory::new(Arc::new(store));
        let promoted = users.set_role(Actor::admin(1), 4, "official").await.unwrap();
        assert_eq!(promoted.role, Role::Official);
    }

    #[tokio::test]
    async fn test_non_admin_cannot_change_role() {
        let mut store = MockStore::new();
        store.expect_update_user_role().never();

        let users = UserDirectory::new(Arc::new(store));
        let err = users
            .set_role(Actor::official(2), 4, "admin")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_invalid_role_is_rejected_before_store() {
        let mut store = MockStore::new();
        store.expect_update_user_role().never();

        let users = UserDirectory::new(Arc::new(store));
        let err = users.set_role(Actor::admin(1), 4, "mayor").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let mut store = MockStore::new();
        store.expect_update_user_role().returning(|_, _| Ok(None));
        store.expect_update_user_ward().returning(|_, _| Ok(None));

        let users = UserDirectory::new(Arc::new(store));
        let err = users.set_role(Actor::admin(1), 99, "citizen").await.unwrap_err();
        assert_eq!(err.to_string(), "User 99 not found");
        let err = users.set_ward(Actor::admin(1), 99, Some("3")).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_blank_ward_clears_it() {
        let mut store = MockStore::new();
        store
            .expect_update_user_ward()
            .withf(|id, ward| *id == 4 && ward.is_none())
            .times(1)
            .returning(|id, ward| Ok(Some(user(id, Role::Citizen, ward.as_deref()))));
        store
            .expect_update_user_ward()
            .withf(|_, ward| ward.as_deref() == Some("12"))
            .times(1)
            .returning(|id, ward| Ok(Some(user(id, Role::Citizen, ward.as_deref()))));

        let users = UserDirectory::new(Arc::new(store));
        let cleared = users.set_ward(Actor::admin(1), 4, Some("   ")).await.unwrap();
        assert!(cleared.ward_number.is_none());
        let set = users.set_ward(Actor::admin(1), 4, Some(" 12 ")).await.unwrap();
        assert_eq!(set.ward_number.as_deref(), Some("12"));

        let err = users
            .set_ward(Actor::citizen(4), 4, Some("12"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
