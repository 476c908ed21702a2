/// Factory: wire the verifier and its cache backend from the process configuration.
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::services::cache::build_cache;
use crate::services::oauth::Verifier;

pub async fn build_verifier(config: &Config) -> anyhow::Result<Arc<Verifier>> {
    let cache = build_cache(&config.cache).await?;
    let verifier = Verifier::new(config.verifier.clone(), cache)?;

    info!(
        issuer = verifier.config().issuer(),
        client_id = verifier.config().client_id(),
        cache = verifier.token_cache().backend_name(),
        "verifier ready"
    );

    Ok(Arc::new(verifier))
}
