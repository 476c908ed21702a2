/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 * - Cheap to clone: the verifier sits behind an Arc
 */
use std::sync::Arc;

use crate::services::oauth::Verifier;

#[derive(Clone, Debug)]
pub struct AppState {
    pub verifier: Arc<Verifier>,
}

impl AppState {
    pub fn new(verifier: Arc<Verifier>) -> Self {
        Self { verifier }
    }
}
