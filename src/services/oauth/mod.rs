//! OAuth2 / OpenID Connect relying-party verifier.
//!
//! `Verifier` is the entry point; the other modules are its collaborators and are public so
//! they can be driven on their own (e.g. a fake cache in tests).
pub mod config;
pub mod endpoint;
pub mod factory;
pub mod jwks;
pub mod token_cache;
pub mod types;
pub mod verifier;

pub use config::{Endpoints, IntrospectionAuth, VerifierConfig};
pub use endpoint::{EndpointClient, EndpointError, MAX_RESPONSE_BYTES};
pub use factory::build_verifier;
pub use jwks::{SignatureError, SignatureValidator};
pub use token_cache::TokenCache;
pub use types::{
    CodeTokenResponse, IdentityClaims, IntrospectionRecord, Token, TokenFields, UserInfo,
};
pub use verifier::{Verifier, VerifierError};
