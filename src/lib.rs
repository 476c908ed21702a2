//! Relying-party token verification for an OAuth2 / OpenID Connect authorization server.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use authone_verifier::services::oauth::{Verifier, VerifierConfig};
//!
//! let config = VerifierConfig::new("https://auth.example.com", "CLIENT_ID", "CLIENT_SECRET")?;
//! let verifier = Verifier::with_memory_cache(config)?;
//! let record = verifier.introspect("access-token").await?;
//! println!("{}", record.subject);
//! # Ok(())
//! # }
//! ```
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
