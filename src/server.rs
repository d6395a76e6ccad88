//! Web server

use crate::app::Service;
use crate::cli::CommandLineArgs;

use std::{net::SocketAddr, path::PathBuf, process::exit, str::FromStr, time::Duration};

use axum::ServiceExt;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use expanduser::expanduser;
use tokio::signal;

/// Serve the pickup explorer
///
/// # Arguments
///
/// * `args`: Command line arguments
/// * `service`: The [crate::app::Service] to serve
pub async fn serve(args: &CommandLineArgs, service: Service) {
    let addr = SocketAddr::from_str(&format!("{}:{}", args.host, args.port))
        .expect("invalid host name, IP address or port number");

    // Catch ctrl+c and try to shutdown gracefully
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(
        handle.clone(),
        args.graceful_shutdown_timeout,
    ));

    if args.https {
        let cert_file = tls_file(&args.cert_file, "certificate");
        let key_file = tls_file(&args.key_file, "key");
        let tls_config = RustlsConfig::from_pem_file(cert_file, key_file)
            .await
            .expect("Failed to load TLS certificate files");
        tracing::info!("Listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(service.into_make_service())
            .await
            .unwrap();
    } else {
        tracing::info!("Listening on http://{}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(service.into_make_service())
            .await
            .unwrap();
    }
}

/// Resolve a TLS file path, exiting if it does not exist.
fn tls_file(path: &str, kind: &str) -> PathBuf {
    let path = expanduser(path)
        .expect("Failed to expand ~ to user name. Please provide an absolute path instead.");
    match path.canonicalize() {
        Ok(path) => path,
        Err(_) => {
            tracing::error!(
                "TLS {} file expected at '{}' but not found.",
                kind,
                path.display()
            );
            exit(1)
        }
    }
}

/// Graceful shutdown handler
///
/// Installs signal handlers to catch Ctrl-C or SIGTERM and trigger a graceful shutdown.
async fn shutdown_signal(handle: Handle, timeout: u64) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
    handle.graceful_shutdown(Some(Duration::from_secs(timeout)));
}
