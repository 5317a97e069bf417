// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use account_gateway::{api::router, config::Settings, setup_tracing, state::AppState};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    setup_tracing(settings.log_format);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<(), BoxError> {
    let addr = format!("{}:{}", settings.host, settings.port);
    info!(
        domain = %settings.auth.domain,
        audience = %settings.auth.audience,
        issuer = %settings.auth.issuer,
        "starting account gateway"
    );

    let state = AppState::new(settings)?;
    let shutdown = CancellationToken::new();

    tokio::spawn(shutdown_signal(shutdown.clone()));
    tokio::spawn(warm_up(state.clone(), shutdown.clone()));

    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %listener.local_addr()?, "listening (docs at /docs)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Fetch the key set and service token ahead of the first request. Both
/// are acquired lazily, so failures here are not fatal.
async fn warm_up(state: AppState, shutdown: CancellationToken) {
    let jwks = state.validator.jwks().clone();
    let tokens = state.tokens.clone();

    let warm = async move {
        if let Err(e) = jwks.refresh().await {
            warn!(error = %e, "signing key set warm-up failed");
        }
        if let Err(e) = tokens.service_token().await {
            warn!(error = %e, "service token warm-up failed");
        }
    };

    tokio::select! {
        () = shutdown.cancelled() => {}
        () = warm => {}
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
    shutdown.cancel();
}
