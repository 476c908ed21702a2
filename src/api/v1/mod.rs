/*
 * Responsibility
 * - Public surface of v1 (routes() and the auth context extractor)
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
