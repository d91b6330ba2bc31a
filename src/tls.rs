use std::fs::File;
use std::io::{self, BufReader, ErrorKind};
use std::sync::Arc;

use pgwire::tokio::tokio_rustls::rustls::ServerConfig;
use pgwire::tokio::TlsAcceptor;

use crate::config;

/// Build the TLS acceptor from the configured PEM files, if any.
pub fn load_tls_acceptor(cfg: &config::ServerConfig) -> io::Result<Option<TlsAcceptor>> {
    let (cert_path, key_path) = match (cfg.tls_cert.as_deref(), cfg.tls_key.as_deref()) {
        (None, None) => return Ok(None),
        (Some(c), Some(k)) => (c, k),
        _ => {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "ROOMLEDGER_TLS_CERT and ROOMLEDGER_TLS_KEY must be set together",
            ));
        }
    };

    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?))
        .collect::<Result<_, _>>()?;
    if certs.is_empty() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("no certificates in {cert_path}"),
        ));
    }

    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, format!("no private key in {key_path}")))?;

    let mut server = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;
    server.alpn_protocols = vec![b"postgresql".to_vec()];

    Ok(Some(TlsAcceptor::from(Arc::new(server))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_paths_means_plaintext() {
        let cfg = config::ServerConfig::default();
        assert!(load_tls_acceptor(&cfg).unwrap().is_none());
    }

    #[test]
    fn half_configured_is_rejected() {
        let cfg = config::ServerConfig {
            tls_cert: Some("/tmp/cert.pem".into()),
            ..Default::default()
        };
        let err = load_tls_acceptor(&cfg).err().expect("half-configured TLS must fail");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn missing_files_surface_io_error() {
        let cfg = config::ServerConfig {
            tls_cert: Some("/nonexistent/roomledger-cert.pem".into()),
            tls_key: Some("/nonexistent/roomledger-key.pem".into()),
            ..Default::default()
        };
        let err = load_tls_acceptor(&cfg).err().expect("missing PEM files must fail");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
