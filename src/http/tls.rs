//! TLS termination for the public listener.

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::TlsConfig;

/// Load the certificate chain and key named by `config`.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, std::io::Error> {
    for path in [&config.cert_path, &config.key_path] {
        if !Path::new(path).exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("TLS file not found: {}", path),
            ));
        }
    }
    RustlsConfig::from_pem_file(&config.cert_path, &config.key_path).await
}

/// Serve `app` over TLS on an already bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    rustls: RustlsConfig,
    app: IntoMakeServiceWithConnectInfo<Router, SocketAddr>,
    mut shutdown: broadcast::Receiver<()>,
    drain_timeout: Duration,
) -> Result<(), std::io::Error> {
    let handle = Handle::new();
    let signal = handle.clone();
    tokio::spawn(async move {
        let _ = shutdown.recv().await;
        tracing::info!("Gate received shutdown signal, draining TLS connections");
        signal.graceful_shutdown(Some(drain_timeout));
    });

    axum_server::from_tcp_rustls(listener.into_std()?, rustls)
        .handle(handle)
        .serve(app)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_files_are_reported() {
        let config = TlsConfig {
            cert_path: "/nonexistent/cert.pem".to_string(),
            key_path: "/nonexistent/key.pem".to_string(),
        };
        let err = load_tls_config(&config).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(err.to_string().contains("cert.pem"));
    }
}
