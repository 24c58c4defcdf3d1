// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {std::path::PathBuf, thiserror::Error, x509_certificate::X509CertificateError};

/// Unified error type for signing vault operations.
#[derive(Debug, Error)]
pub enum SigningVaultError {
    #[error("unknown command")]
    CliUnknownCommand,

    #[error("bad argument")]
    CliBadArgument,

    #[error("{0}")]
    CliGeneralError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported signing type: {0}")]
    UnsupportedSigningType(String),

    #[error("a provisioning profile was provided but no app identifier is configured")]
    MissingAppIdentifier,

    #[error("cannot derive a platform from profile file extension: {0}")]
    UnknownProfileExtension(PathBuf),

    #[error("X.509 certificate handler error: {0}")]
    X509(#[from] X509CertificateError),

    #[error("certificate decode error: {0}")]
    CertificateDecode(String),

    #[error("failed to find certificate satisfying requirements: {0}")]
    CertificateNotFound(String),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("JSON serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("App Store Connect API key error: {0}")]
    AppStoreConnectApiKey(String),

    #[error("App Store Connect API key not found in default search locations")]
    AppStoreConnectApiKeyNotFound,

    #[error("App Store Connect API server error: {0}")]
    AppStoreConnectServerError(String),

    #[error("git invocation failed: {0}")]
    GitCommand(String),

    #[error("storage has not been downloaded; call download() first")]
    StorageNotDownloaded,
}
