use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use trivia_server::app::{LoginManager, RoomManager};
use trivia_server::config::Config;
use trivia_server::handlers::TriviaHandlerFactory;
use trivia_server::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        backlog = config.backlog,
        max_connections = config.max_connections,
        read_timeout = ?config.read_timeout,
        write_timeout = ?config.write_timeout,
        "Starting trivia server"
    );

    let factory = TriviaHandlerFactory::new(
        Arc::new(LoginManager::new()),
        Arc::new(RoomManager::new()),
    );
    let server = Server::bind(&config, Arc::new(factory))?;

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => {
                error!(error = %e, "Cannot listen for Ctrl-C, running until killed");
                std::future::pending::<()>().await;
            }
        }
    };

    if let Err(e) = server.run_until(shutdown).await {
        error!(error = %e, "Server stopped");
        return Err(e.into());
    }

    Ok(())
}
