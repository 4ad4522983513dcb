//! TLS acceptor construction.
//!
//! The acceptor is built once at server start from the configured PEM files
//! and handed to every connection; there is no global certificate state.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use log::info;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

use crate::config::ServerConfig;
use crate::error::SecurityError;

/// Builds the acceptor when both certificate and key paths are configured.
pub fn acceptor_from_config(config: &ServerConfig) -> Result<Option<TlsAcceptor>, SecurityError> {
    match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) => {
            let acceptor = load_tls_acceptor(Path::new(cert), Path::new(key))?;
            info!("TLS enabled with certificate {}", cert);
            Ok(Some(acceptor))
        }
        (None, None) => Ok(None),
        _ => Err(SecurityError::Tls(
            "tls_cert_path and tls_key_path must be set together".into(),
        )),
    }
}

pub fn load_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, SecurityError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let server_config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| SecurityError::Tls(format!("Protocol versions: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| SecurityError::Tls(format!("Invalid certificate or key: {}", e)))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, SecurityError> {
    let file = File::open(path).map_err(|e| {
        SecurityError::Tls(format!("Failed to read certificate {}: {}", path.display(), e))
    })?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SecurityError::Tls(format!("Failed to parse certificate: {}", e)))?;

    if certs.is_empty() {
        return Err(SecurityError::Tls(format!(
            "No certificate found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, SecurityError> {
    let file = File::open(path).map_err(|e| {
        SecurityError::Tls(format!("Failed to read private key {}: {}", path.display(), e))
    })?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| SecurityError::Tls(format!("Failed to parse private key: {}", e)))?
        .ok_or_else(|| SecurityError::Tls(format!("No private key found in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_tls_when_unconfigured() {
        let config = ServerConfig::default();
        assert!(acceptor_from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_half_configured_tls_is_rejected() {
        let config = ServerConfig {
            tls_cert_path: Some("cert.pem".into()),
            ..ServerConfig::default()
        };
        assert!(acceptor_from_config(&config).is_err());
    }

    #[test]
    fn test_missing_files_are_reported() {
        let result = load_tls_acceptor(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"));
        assert!(matches!(result, Err(SecurityError::Tls(_))));
    }

    #[test]
    fn test_acceptor_from_generated_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, cert.serialize_pem().unwrap()).unwrap();
        std::fs::write(&key_path, cert.serialize_private_key_pem()).unwrap();

        let config = ServerConfig {
            tls_cert_path: Some(cert_path.display().to_string()),
            tls_key_path: Some(key_path.display().to_string()),
            ..ServerConfig::default()
        };
        assert!(acceptor_from_config(&config).unwrap().is_some());

        // Certificate and key swapped.
        let result = load_tls_acceptor(&key_path, &cert_path);
        assert!(matches!(result, Err(SecurityError::Tls(_))));
    }
}
