use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{stdin, stdout, BufReader};
use tokio::sync::watch;

use jelly_requester::config::{Config, Opt};
use jelly_requester::core::error::AppResult;
use jelly_requester::dispatch::Dispatcher;
use jelly_requester::logging::{self, Logger};
use jelly_requester::service::{InteractionService, JsonLinesResponder};
use jelly_requester::store::RequestStore;

async fn serve(config: Config) -> AppResult<()> {
    log::info!("Opening request store...");
    let store = Arc::new(RequestStore::open(
        &config.storage.path,
        config.storage.options(),
    )?);

    let dispatcher = Arc::new(Dispatcher::new(store.clone(), config.requester.clone()));
    let service = InteractionService::new(dispatcher);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Unable to listen for shutdown signal: {e}");
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    log::info!("Serving interactions...");
    let result = service
        .run(
            BufReader::new(stdin()),
            JsonLinesResponder::new(stdout()),
            shutdown_rx,
        )
        .await;
    drop(service);

    match Arc::try_unwrap(store) {
        Ok(store) => store.close(),
        Err(_) => log::warn!("Request store still referenced, leaving it to process exit"),
    }

    result.map(|_| ())
}

#[tokio::main]
async fn main() {
    // Read command-line arguments
    let opt = Opt::parse();

    // Load configuration with optional override
    let config = match Config::load_yaml_with_opt_override(&opt) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };

    // Initialize logging
    let (log_shutdown, log_rx) = watch::channel(false);
    let log_task = match config.log.clone() {
        Some(log) => {
            let logger = Logger::new(log);
            logger.init_env_logger();
            Some(tokio::spawn(logger.run(log_rx)))
        }
        None => {
            logging::init_stderr_logger();
            None
        }
    };

    let code = match serve(config).await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{e}");
            1
        }
    };

    if let Some(task) = log_task {
        let _ = log_shutdown.send(true);
        match task.await {
            Ok(Err(e)) => eprintln!("Failed to write log file: {e}"),
            Err(e) => eprintln!("Log task aborted: {e}"),
            Ok(Ok(())) => {}
        }
    }

    // stdin is read on a blocking thread that never returns on its own, so
    // exit instead of waiting for the runtime to wind down.
    process::exit(code);
}
