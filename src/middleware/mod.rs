/*
 * Responsibility
 * - Public interface of the middleware layers
 * - auth: bearer token introspection, http: transport-level layers
 */
pub mod auth;
pub mod http;
