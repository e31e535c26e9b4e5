/// Microblog service entry point

use microblog::{config::ServerConfig, context::AppContext, error::AppResult, jobs, server};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration first so logging can honour it
    let config = ServerConfig::from_env()?;

    init_logging(&config.logging.level, config.logging.json);

    print_banner();

    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("microblog={},tower_http={}", level, level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn print_banner() {
    println!(
        r#"
            _               _     _
  _ __ ___ (_) ___ _ __ ___| |__ | | ___   __ _
 | '_ ` _ \| |/ __| '__/ _ \ '_ \| |/ _ \ / _` |
 | | | | | | | (__| | | (_) | |_) | | (_) | (_| |
 |_| |_| |_|_|\___|_|  \___/|_.__/|_|\___/ \__, |
                                           |___/
        Microblog post service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
