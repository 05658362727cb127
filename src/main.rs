mod cli;
mod config;
mod db;
mod handlers;
mod http;
mod importer;
mod models;
mod normalize;
mod source;
mod suggest;

use std::sync::Arc;

use clap::Parser;

use cli::Commands;
use handlers::Ctx;
use normalize::{DefaultNormalizer, Normalizer};
use suggest::{SuggestConfig, Suggester};

#[tokio::main]
async fn main() {
    init_logger();

    let cli = cli::Cli::parse();

    // DB path from --db flag.
    let db_path = cli.db_path.to_string_lossy().to_string();

    // Handle CLI flags.
    if let Some(cmd) = cli.command {
        match cmd {
            // Generate a new config file.
            Commands::NewConfig { path } => {
                match config::generate_sample(&path) {
                    Ok(_) => {
                        log::info!("config file generated: {}", path.display());
                    }
                    Err(e) => {
                        log::error!("error generating config: {}", e);
                        std::process::exit(1);
                    }
                }
                return;
            }

            // Create a new SQLite database with schema.
            Commands::Install { yes } => {
                if cli.db_path.exists() {
                    log::error!("database '{}' already exists", cli.db_path.display());
                    std::process::exit(1);
                }
                if let Err(e) = db::install_schema(&db_path, !yes).await {
                    log::error!("error installing schema: {}", e);
                    std::process::exit(1);
                }
                return;
            }

            // Import corpus values from a CSV file.
            Commands::Import { file } => {
                db::exists(&cli.db_path);

                if let Err(e) = importer::import_csv(&file, &db_path).await {
                    log::error!("error importing: {}", e);
                    std::process::exit(1);
                }
                return;
            }
        }
    }

    // For server mode, DB must exist.
    db::exists(&cli.db_path);

    // Load config.
    let cfg = config::load_all(&cli.config);

    // Create database pool.
    let db = match db::init(&db_path, cfg.db.max_conns, false).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("error connecting to database: {}", e);
            std::process::exit(1);
        }
    };

    // Wire up the suggester: folded matching over the SQLite corpus.
    let normalizer: Arc<dyn Normalizer> = Arc::new(DefaultNormalizer);
    let suggest_cfg = SuggestConfig::new(
        cfg.suggest.min_prefix_length,
        cfg.suggest.max_unique_candidates,
        cfg.suggest.default_suggestion_limit,
    );
    log::info!(
        "suggest limits: min_prefix_length={} max_unique_candidates={} default_suggestion_limit={}",
        suggest_cfg.min_prefix_length,
        suggest_cfg.max_unique_candidates,
        suggest_cfg.default_suggestion_limit
    );

    let suggester = Arc::new(Suggester::new(
        suggest_cfg,
        Arc::new(db::SqliteCorpus::new(db.clone())),
        Arc::clone(&normalizer),
    ));

    // Optionally warm every known field index before serving.
    if cfg.suggest.preload {
        match db::distinct_keys(&db).await {
            Ok(keys) => {
                for key in &keys {
                    suggester.ensure_loaded(key).await;
                }
                log::info!("preloaded {} field indexes", keys.len());
            }
            Err(e) => {
                log::warn!("error listing fields for preload: {}", e);
            }
        }
    }

    // Setup the global app context used in HTTP handlers.
    let ctx = Arc::new(Ctx {
        suggester,
        normalizer,
        db,
    });

    // Start the HTTP server.
    let routes = http::init_handlers(ctx);
    let addr = cfg.app.address;

    log::info!("starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("error listening on {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, routes).await {
        log::error!("server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize logger.
fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            use std::io::Write;
            let level = if record.level() != log::Level::Info {
                format!("[{}] ", record.level())
            } else {
                String::new()
            };
            writeln!(
                buf,
                "{} {}:{} {}{}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                level,
                record.args()
            )
        })
        .init();
}
