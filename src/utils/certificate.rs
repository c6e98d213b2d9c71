// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use std::path::Path;
use tracing::debug;
use x509_parser::prelude::*;

/// Check that the file at `path` holds a parseable X.509 certificate.
///
/// PEM is tried first, raw DER second.
pub fn validate_certificate_file(path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read certificate: {}", path.display()))?;

    validate_certificate_bytes(&bytes)
        .with_context(|| format!("Invalid certificate: {}", path.display()))
}

/// Whether `bytes` hold a PEM-armored certificate rather than raw DER
pub fn is_pem_certificate(bytes: &[u8]) -> bool {
    x509_parser::pem::parse_x509_pem(bytes).is_ok()
}

pub fn validate_certificate_bytes(bytes: &[u8]) -> anyhow::Result<()> {
    if let Ok((_, pem)) = x509_parser::pem::parse_x509_pem(bytes) {
        let cert = pem
            .parse_x509()
            .map_err(|e| anyhow::anyhow!("Malformed PEM certificate: {}", e))?;
        debug!(subject = %cert.subject(), "Parsed PEM certificate");
        return Ok(());
    }

    let (_, cert) = X509Certificate::from_der(bytes)
        .map_err(|e| anyhow::anyhow!("Not a PEM or DER certificate: {}", e))?;
    debug!(subject = %cert.subject(), "Parsed DER certificate");
    Ok(())
}
