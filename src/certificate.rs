// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading local signing certificates and matching them against the authority.

use {
    crate::{app_store_connect::AuthorityCertificate, error::SigningVaultError},
    log::info,
    std::path::Path,
    x509_certificate::CapturedX509Certificate,
};

/// Read a certificate file into DER.
///
/// Accepts raw DER (the usual `.cer` export format) or a PEM wrapped
/// `CERTIFICATE` block. The bytes must parse as an X.509 certificate.
pub fn read_certificate_der(path: impl AsRef<Path>) -> Result<Vec<u8>, SigningVaultError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;

    let der = if data.starts_with(b"-----BEGIN") {
        let parsed = pem::parse(&data).map_err(|e| {
            SigningVaultError::CertificateDecode(format!(
                "error parsing PEM from {}: {}",
                path.display(),
                e
            ))
        })?;

        if parsed.tag != "CERTIFICATE" {
            return Err(SigningVaultError::CertificateDecode(format!(
                "{} does not contain a CERTIFICATE block",
                path.display()
            )));
        }

        parsed.contents
    } else {
        data
    };

    let cert = CapturedX509Certificate::from_der(der.clone())?;

    if let Some(cn) = cert.subject_common_name() {
        info!("importing certificate: {}", cn);
    }

    Ok(der)
}

/// Locate the authority record matching a local certificate.
///
/// The authority listing is the source of truth for certificate identifiers;
/// a local certificate is identified by finding the record with identical
/// DER content. Errors if the certificate is not registered with the account.
pub fn find_certificate_id<'a>(
    der: &[u8],
    certificates: &'a [AuthorityCertificate],
) -> Result<&'a str, SigningVaultError> {
    certificates
        .iter()
        .find(|cert| cert.content == der)
        .map(|cert| cert.id.as_str())
        .ok_or_else(|| {
            SigningVaultError::CertificateNotFound(
                "certificate is not registered with the signing authority".to_string(),
            )
        })
}

#[cfg(test)]
mod test {
    use {super::*, x509_certificate::{KeyAlgorithm, X509CertificateBuilder}};

    fn self_signed_der(common_name: &str) -> Vec<u8> {
        let mut builder = X509CertificateBuilder::new(KeyAlgorithm::Ed25519);
        builder
            .subject()
            .append_common_name_utf8_string(common_name)
            .unwrap();
        builder.validity_duration(chrono::Duration::hours(1));

        let (cert, _, _) = builder.create_with_random_keypair().unwrap();

        cert.encode_der().unwrap()
    }

    #[test]
    fn read_der_certificate() {
        let der = self_signed_der("der test");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cer");
        std::fs::write(&path, &der).unwrap();

        assert_eq!(read_certificate_der(&path).unwrap(), der);
    }

    #[test]
    fn read_pem_certificate() {
        let der = self_signed_der("pem test");
        let pem_data = pem::encode(&pem::Pem {
            tag: "CERTIFICATE".to_string(),
            contents: der.clone(),
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.pem");
        std::fs::write(&path, pem_data).unwrap();

        assert_eq!(read_certificate_der(&path).unwrap(), der);
    }

    #[test]
    fn reject_non_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.cer");
        std::fs::write(&path, b"this is not DER").unwrap();

        assert!(read_certificate_der(&path).is_err());
    }

    #[test]
    fn match_against_authority_listing() {
        let der = self_signed_der("match test");

        let certificates = vec![
            AuthorityCertificate {
                id: "AAA".to_string(),
                content: self_signed_der("other"),
                display_name: None,
                certificate_type: None,
            },
            AuthorityCertificate {
                id: "BBB".to_string(),
                content: der.clone(),
                display_name: None,
                certificate_type: None,
            },
        ];

        assert_eq!(find_certificate_id(&der, &certificates).unwrap(), "BBB");

        let unknown = self_signed_der("unknown");
        assert!(matches!(
            find_certificate_id(&unknown, &certificates),
            Err(SigningVaultError::CertificateNotFound(_))
        ));
    }
}
