use order_server::core::tasks::BackgroundTasks;
use order_server::core::{Config, Server, ServerState, logger};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::from_env();

    if let Err(err) = logger::init(&config.logger) {
        // Logger not available yet, fall back to stderr
        eprintln!("failed to initialize logger: {err}");
        std::process::exit(1);
    }

    tracing::info!(
        service = %config.logger.service_name,
        production = config.logger.is_production,
        "Order server starting..."
    );

    // Connect to Mongo, Redis and RabbitMQ; any failure here is fatal.
    let state = match ServerState::initialize(&config).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "Failed to initialize server state");
            logger::shutdown();
            std::process::exit(1);
        }
    };

    let mut tasks = BackgroundTasks::new();
    state.start_background_tasks(&mut tasks);

    let server = Server::new(config, state);
    if let Err(err) = server.run().await {
        tracing::error!(error = %err, "HTTP server error");
    }

    // HTTP has drained; stop the outbox relay and flush telemetry.
    tasks.shutdown().await;
    logger::shutdown();
}
