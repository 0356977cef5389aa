//! User directory queries.

use serde_json::Value as JsonValue;

use storefront_auth::User;
use storefront_core::{AggregateRoot, UserId};
use storefront_events::EventEnvelope;

use super::ProjectionError;
use super::aggregate::AggregateProjection;

#[derive(Debug)]
pub struct UserDirectory {
    snapshots: AggregateProjection<User>,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            snapshots: AggregateProjection::in_memory(),
        }
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        self.snapshots.apply_envelope(envelope)
    }

    pub fn reset(&self) {
        self.snapshots.reset();
    }

    pub fn get(&self, user_id: UserId) -> Option<User> {
        self.snapshots.get(user_id.into())
    }

    /// Oldest account first.
    pub fn list(&self) -> Vec<User> {
        let mut users = self.snapshots.list();
        users.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.id().cmp(b.id())));
        users
    }

    pub fn by_email(&self, email: &str) -> Option<User> {
        self.get(User::id_for_email(email))
    }

    /// Case-insensitive substring match on email or role.
    pub fn search(&self, query: &str) -> Vec<User> {
        let needle = query.trim().to_lowercase();
        self.list()
            .into_iter()
            .filter(|u| u.email().contains(&needle) || u.role().as_str().contains(&needle))
            .collect()
    }
}
