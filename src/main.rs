use anyhow::{Context, Result};
use dotenv::dotenv;
use log::info;
use std::sync::Arc;

use fileflow::api::{generate_processing_routes, generate_system_routes};
use fileflow::config::ProcessingConfig;
use fileflow::metrics::ProcessingMetrics;
use fileflow::workflow::{PoolConfig, WorkerPool, WorkflowExecutor};

fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Arc::new(ProcessingConfig::from_env());
    std::fs::create_dir_all(&config.storage_dir).context(format!(
        "failed to create storage directory {}",
        config.storage_dir.display()
    ))?;

    let metrics = Arc::new(ProcessingMetrics::new());
    let pool = Arc::new(WorkerPool::new(PoolConfig::from(&*config)));
    let executor = Arc::new(WorkflowExecutor::new(
        Arc::clone(&pool),
        Arc::clone(&metrics),
        Arc::clone(&config),
    ));

    info!(
        "Starting fileflow: {} core workers, {} max, queue capacity {}",
        config.core_workers, config.max_workers, config.queue_capacity
    );

    let launch = rocket::execute(async {
        rocket::build()
            .manage(executor)
            .manage(Arc::clone(&metrics))
            .mount("/", generate_processing_routes())
            .mount("/", generate_system_routes())
            .launch()
            .await
    });

    // Launch returns on Ctrl-C or ignition failure; either way stop taking
    // work and let the in-flight tasks drain before the process exits.
    pool.shutdown();

    launch.context("Rocket server failed")?;
    info!("Shutdown complete");
    Ok(())
}
