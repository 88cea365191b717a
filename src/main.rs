use axum::Router;
use call_metrics_config::{
    Args,
    Config,
    TlsConfig,
};
use call_metrics_core::FlushTrigger;
use call_metrics_http::{
    create_router,
    AppState,
};
use clap::Parser;
use color_eyre::Result;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

fn init_logging() -> Result<()> {
    color_eyre::install()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter))
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}

#[cfg(feature = "tls")]
async fn serve_tls(address: SocketAddr, tls: &TlsConfig, app: Router) -> Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    // Both ring and aws-lc-rs end up linked, rustls needs to be told which one to use.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let rustls_config = RustlsConfig::from_pem_file(&tls.certificate, &tls.private_key).await?;
    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown_signal().await;
            handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        }
    });

    axum_server::bind_rustls(address, rustls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

#[cfg(not(feature = "tls"))]
async fn serve_tls(_address: SocketAddr, _tls: &TlsConfig, _app: Router) -> Result<()> {
    Err(eyre::eyre!(
        "TLS is configured but this binary was built without the `tls` feature"
    ))
}

async fn start_server(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let app = create_router(state.clone());

    tracing::info!(log_dir = ?config.log_dir(), "listening on {}", config.listen_address);

    match &config.tls {
        Some(tls) => serve_tls(config.listen_address, tls, app).await?,
        None => {
            let listener = TcpListener::bind(config.listen_address).await?;
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    // Persist the call that was still running when the server stopped.
    let lifecycle = state.lifecycle.clone();
    tokio::task::spawn_blocking(move || lifecycle.end_session(FlushTrigger::Shutdown)).await??;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = Config::new(Args::parse())?;
    config.validate()?;
    start_server(config).await
}
