use std::sync::Arc;

use aula_core::AulaConfig;
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use aula_server::http::{start_http_server, HttpState};
use aula_server::subsystems::embedder;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "aula.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match AulaConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match aula_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match aula_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match aula_core::db::check_pgvector(&pool).await {
            Ok(v) => println!("✅ pgvector version: {}", v),
            Err(e) => {
                println!("❌ pgvector check failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Aula DB health check passed");
        return Ok(());
    }

    // Gemini backends are required: chat and search cannot run without them
    let embedder: Arc<dyn aula_core::embeddings::EmbeddingBackend> =
        match embedder::create_backend_from_config(&config) {
            Ok(b) => Arc::from(b),
            Err(e) => {
                eprintln!("Failed to create embedding backend (is GOOGLE_API_KEY set?): {}", e);
                std::process::exit(1);
            }
        };

    let completer: Arc<dyn aula_core::completions::CompletionBackend> =
        match embedder::create_completer_from_config(&config) {
            Ok(b) => Arc::from(b),
            Err(e) => {
                eprintln!("Failed to create completion backend (is GOOGLE_API_KEY set?): {}", e);
                std::process::exit(1);
            }
        };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Spawn embedding backfill worker
    let backfill_pool = pool.clone();
    let backfill_config = config.embedding.clone();
    let backfill_backend = embedder.clone();
    tokio::spawn(embedder::run_backfill_worker(
        backfill_pool,
        backfill_backend,
        backfill_config,
    ));

    // HTTP REST API server (foreground)
    let state = Arc::new(HttpState {
        pool,
        config,
        embedder,
        completer,
    });

    start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
