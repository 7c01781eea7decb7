use clap::Parser;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = settings::Cli::parse();
    let settings = settings::Settings::new(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "splitledger={level},server={level},ledger={level}",
            level = settings.app.level
        ))
        .init();

    let state = server::ServerState::new(ledger::MemoryStore::new())?;
    let addr = settings.server.address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return Err(err.into());
        }
    };

    server::run_with_listener(state, listener).await?;
    Ok(())
}
