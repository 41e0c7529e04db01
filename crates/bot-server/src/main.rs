use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bot_server::access::AccessControl;
use bot_server::http::{self, AppState};
use bot_server::recognize::{OcrHttp, RecognitionDisabled, Recognizer};
use bot_server::session::SessionManager;
use shared::config::BotConfig;
use shared::ledger::LedgerService;
use shared::ledger::cache::StockCache;
use shared::sheets::{HttpSheets, LedgerTables};
use tokio::time;
use tracing::{error, info, warn};

/// How often idle sessions are swept, independent of the idle timeout.
const SESSION_SWEEP_SECONDS: u64 = 60;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "bot_server=debug,axum=info".to_string()),
        )
        .init();

    let config = match BotConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    let store: Arc<dyn LedgerTables> =
        match HttpSheets::new(&config.ledger_base_url, &config.ledger_api_token) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                error!("failed to build ledger store client: {err}");
                std::process::exit(1);
            }
        };

    if let Err(err) = store.ping().await {
        error!("ledger store unreachable: {err}");
        std::process::exit(1);
    }

    let ledger = Arc::new(LedgerService::new(
        store.clone(),
        config.archive_threshold,
        config.archive_retain,
    ));

    let cache = Arc::new(StockCache::new());
    if let Err(err) = cache.refresh(store.as_ref()).await {
        warn!("initial stock cache refresh failed: {err}");
    }

    let sessions = Arc::new(SessionManager::new(config.session_idle_seconds));
    let access = Arc::new(AccessControl::new(
        config.allowed_operator_ids.clone(),
        config.allowed_phone_numbers.clone(),
    ));

    let recognizer: Arc<dyn Recognizer> = match config.ocr_url.as_deref() {
        Some(url) => match OcrHttp::new(url) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                error!("failed to build OCR client: {err}");
                std::process::exit(1);
            }
        },
        None => {
            info!("no OCR url configured; label photos will fall back to manual entry");
            Arc::new(RecognitionDisabled)
        }
    };

    {
        let cache = cache.clone();
        let store = store.clone();
        let period = config.cache_refresh_seconds;
        tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_secs(period));
            loop {
                ticker.tick().await;
                if let Err(err) = cache.refresh(store.as_ref()).await {
                    warn!("stock cache refresh failed, keeping previous snapshot: {err}");
                }
            }
        });
    }

    {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_secs(SESSION_SWEEP_SECONDS));
            loop {
                ticker.tick().await;
                let removed = sessions.sweep_idle().await;
                if removed > 0 {
                    info!(removed, "swept idle sessions");
                }
            }
        });
    }

    let app = http::build_router(AppState {
        store,
        ledger,
        cache,
        sessions,
        access,
        recognizer,
    });

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .unwrap_or_else(|_| "127.0.0.1:8080".parse().expect("valid default bind addr"));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind should succeed");

    info!(
        "bot server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );
    axum::serve(listener, app).await.expect("server should run");
}
