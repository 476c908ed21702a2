/*
 * Responsibility
 * - The authenticated context handlers see
 * - Filled by the access middleware from the introspection record; handlers never see the
 *   raw token
 */
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::oauth::IntrospectionRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthCtx {
    pub subject: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthCtx {
    pub fn from_record(record: &IntrospectionRecord) -> Self {
        Self {
            subject: record.subject.clone(),
            client_id: record.client_id.clone(),
            scopes: record.scopes().map(str::to_string).collect(),
            expires_at: record.expires_at_utc().filter(|_| record.expires_at > 0),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}
