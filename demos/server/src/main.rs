use std::sync::Arc;

use totpguard::{env, instrument, mfa::Authenticator, server, store::MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings: env::Settings = env::parse()?;

    let _inst_guard = instrument::init("totpguard", &settings.log_level)?;

    tracing::info!(
        issuer = settings.issuer_domain.as_str(),
        max_attempts = settings.max_attempts,
        "starting totp server"
    );

    let port = settings.port;
    let auth = Arc::new(Authenticator::new(settings, Arc::new(MemoryStore::new())));

    server::serve_http(server::router(auth), port).await?;

    Ok(())
}
