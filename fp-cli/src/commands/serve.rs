//! `fencepost serve`: REST API plus the campaign scheduler.

use std::sync::Arc;

use console::style;
use tracing::{error, info};

use fp_core::config::ConfigHandle;
use fp_core::error::FpResult;

pub async fn run(config: ConfigHandle, no_scheduler: bool) -> FpResult<()> {
    let address = config.read().await.bind_address();
    let registry = Arc::new(super::init_registry(config).await?);

    let scheduler = if no_scheduler {
        info!("scheduler disabled on the command line");
        None
    } else {
        registry.scheduler().await.map(|s| s.spawn())
    };

    println!(
        "  {} Serving on http://{address} (Ctrl-C to stop)",
        style("OK").green().bold()
    );

    let result = fp_server::serve(registry.clone(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
        }
        info!("shutdown requested");
    })
    .await;

    if let Some(handle) = scheduler {
        handle.stop().await;
    }
    registry.shutdown_all().await?;
    result
}
