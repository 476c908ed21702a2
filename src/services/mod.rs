/*
 * Responsibility
 * - cache: introspection cache backends (memory / Valkey)
 * - oauth: token verification against the authorization server
 */
pub mod cache;
pub mod oauth;
