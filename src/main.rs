mod core;
mod matrix;
mod reconciler;
mod web;

use anyhow::Result;
use tracing::{info, error};

use crate::core::app::App;
use crate::core::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    info!("Starting space-kick");

    let config = Config::load().await?;

    let app = App::new(config).await?;

    if let Err(e) = app.run().await {
        error!("Application error: {}", e);
        return Err(e);
    }

    Ok(())
}
