// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Optional HTTPS termination.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Install the ring crypto provider for rustls.
///
/// Must run before any TLS configuration is built. A second call is a no-op.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Load a PEM certificate chain and private key.
pub async fn load_rustls_config(cert: &Path, key: &Path) -> std::io::Result<RustlsConfig> {
    install_crypto_provider();
    RustlsConfig::from_pem_file(cert, key).await
}
