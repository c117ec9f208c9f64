// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{sync::Arc, time::Duration};

use benefits_admin_auth::{
    api::router,
    auth::TokenService,
    clock::SystemClock,
    config::{ServerConfig, LOG_FORMAT_ENV},
    mail::LogMailer,
    state::AppState,
    storage::AuthDatabase,
    tls,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Grace period for in-flight requests on shutdown (HTTPS).
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    init_tracing();

    let config = ServerConfig::from_env().expect("Invalid configuration");
    info!(
        bind_addr = %config.bind_addr,
        data_dir = %config.data_dir.display(),
        tls = config.tls.is_some(),
        "starting admin auth service"
    );

    let db = Arc::new(
        AuthDatabase::open(&config.database_path()).expect("Failed to open auth database"),
    );
    if let Some(path) = &config.seed_users_file {
        let count = db.load_seed_users(path).expect("Failed to seed users");
        info!(count, path = %path.display(), "seeded users");
    }

    let tokens = Arc::new(TokenService::new(
        config.auth.clone(),
        db.clone(),
        db.clone(),
        Arc::new(SystemClock),
    ));
    let mailer = Arc::new(LogMailer::new(config.mail_from.clone()));
    let app = router(AppState::new(tokens, db, mailer));

    match &config.tls {
        Some((cert, key)) => {
            let tls_config = tls::load_rustls_config(cert, key)
                .await
                .expect("Failed to load TLS certificate");

            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            info!("listening on https://{} (docs at /docs)", config.bind_addr);
            axum_server::bind_rustls(config.bind_addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            let listener = tokio::net::TcpListener::bind(config.bind_addr)
                .await
                .expect("Failed to bind address");

            info!("listening on http://{} (docs at /docs)", config.bind_addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .expect("HTTP server failed");
        }
    }

    info!("server stopped");
}

/// `LOG_FORMAT=json` selects structured output; anything else is human-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
