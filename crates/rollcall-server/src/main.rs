use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rollcall::prelude::*;
use rollcall_http::AppState;
use tokio::net::TcpListener;
use tracing::info;

/// Settings read from the environment.
struct Config {
    bind: String,
    http_bind: String,
    jwt_secret: String,
    db_path: PathBuf,
    idle_timeout: Option<Duration>,
    token_ttl: Option<Duration>,
    /// Opens a session at startup: `(class_id, teacher_id)`.
    open_session: Option<(String, String)>,
}

impl Config {
    fn from_env() -> Result<Self> {
        let bind = std::env::var("ROLLCALL_BIND").unwrap_or_else(|_| "127.0.0.1:3003".to_string());
        let http_bind =
            std::env::var("ROLLCALL_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
        let jwt_secret = std::env::var("ROLLCALL_JWT_SECRET")
            .context("ROLLCALL_JWT_SECRET must be set")?;
        let db_path = std::env::var("ROLLCALL_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("rollcall.db"));
        let idle_timeout = std::env::var("ROLLCALL_IDLE_TIMEOUT_SECS")
            .ok()
            .map(|s| s.parse::<u64>())
            .transpose()
            .context("ROLLCALL_IDLE_TIMEOUT_SECS must be a number of seconds")?
            .map(Duration::from_secs);
        let token_ttl = std::env::var("ROLLCALL_TOKEN_TTL_SECS")
            .ok()
            .map(|s| s.parse::<u64>())
            .transpose()
            .context("ROLLCALL_TOKEN_TTL_SECS must be a number of seconds")?
            .map(Duration::from_secs);
        let open_session = match (
            std::env::var("ROLLCALL_OPEN_CLASS").ok(),
            std::env::var("ROLLCALL_OPEN_TEACHER").ok(),
        ) {
            (Some(class), Some(teacher)) => Some((class, teacher)),
            _ => None,
        };

        Ok(Self {
            bind,
            http_bind,
            jwt_secret,
            db_path,
            idle_timeout,
            token_ttl,
            open_session,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = Arc::new(
        SqliteStore::open(&config.db_path)
            .with_context(|| format!("opening database {}", config.db_path.display()))?,
    );

    let server = RollCallServerBuilder::new()
        .bind(&config.bind)
        .config(ServerConfig {
            idle_timeout: config.idle_timeout,
            ..ServerConfig::default()
        })
        .build(
            JwtAuthenticator::new(config.jwt_secret.as_bytes()),
            Arc::clone(&store),
        )
        .await
        .with_context(|| format!("binding {}", config.bind))?;

    if let Some((class_id, teacher_id)) = config.open_session {
        let started = server
            .control()
            .start_session(&Identity::teacher(teacher_id), ClassId(class_id))
            .await
            .context("opening attendance session")?;
        info!(class_id = %started.class_id, started_at = %started.started_at, "session opened at startup");
    }

    // The routes share the gateway's session store through `control`.
    let api = AppState::new(
        store,
        JwtAuthenticator::new(config.jwt_secret.as_bytes()),
        server.control(),
    )
    .with_token_ttl(config.token_ttl);
    let http = TcpListener::bind(&config.http_bind)
        .await
        .with_context(|| format!("binding {}", config.http_bind))?;

    info!(addr = %server.local_addr()?, "listening");
    tokio::try_join!(
        async { server.run().await.context("gateway stopped") },
        async {
            rollcall_http::serve(http, api)
                .await
                .context("http routes stopped")
        },
    )?;
    Ok(())
}
