// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface with the App Store Connect API.
//!
//! The importer only needs a narrow slice of the API: listing the signing
//! certificates registered with the developer account so a local certificate
//! can be matched to its authority-assigned identifier. Authentication uses
//! the standard App Store Connect JWT scheme.

use {
    crate::error::SigningVaultError,
    jsonwebtoken::{Algorithm, EncodingKey, Header},
    log::error,
    reqwest::blocking::{Client, ClientBuilder},
    serde::{Deserialize, Serialize},
    std::{fs::Permissions, io::Write, path::Path, sync::Mutex, time::SystemTime},
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Base URL of the certificates resource.
pub const APPLE_CERTIFICATES_URL: &str = "https://api.appstoreconnect.apple.com/v1/certificates";

#[cfg(unix)]
fn set_permissions_private(p: &mut Permissions) {
    p.set_mode(0o600);
}

#[cfg(windows)]
fn set_permissions_private(_: &mut Permissions) {}

/// Represents all metadata for an App Store Connect API Key.
///
/// This is a convenience type to aid in the generic representation of all the
/// components of an App Store Connect API Key. The type supports serialization
/// so the 3 pieces of the API Key can travel as a single file or payload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UnifiedApiKey {
    /// Who issued the key.
    ///
    /// Likely a UUID.
    issuer_id: String,

    /// Key identifier.
    ///
    /// An alphanumeric string like `DEADBEEF42`.
    key_id: String,

    /// Base64 encoded DER of ECDSA private key material.
    private_key: String,
}

impl UnifiedApiKey {
    /// Construct an instance from constitute parts and a PEM encoded ECDSA private key.
    ///
    /// This is what you want to use if importing a private key from the file
    /// downloaded from the App Store Connect web interface.
    pub fn from_ecdsa_pem_path(
        issuer_id: impl ToString,
        key_id: impl ToString,
        path: impl AsRef<Path>,
    ) -> Result<Self, SigningVaultError> {
        let pem_data = std::fs::read(path.as_ref())?;

        let parsed = pem::parse(pem_data).map_err(|e| {
            SigningVaultError::AppStoreConnectApiKey(format!("error parsing PEM: {}", e))
        })?;

        if parsed.tag != "PRIVATE KEY" {
            return Err(SigningVaultError::AppStoreConnectApiKey(
                "does not look like a PRIVATE KEY".to_string(),
            ));
        }

        let private_key = base64::encode(parsed.contents);

        Ok(Self {
            issuer_id: issuer_id.to_string(),
            key_id: key_id.to_string(),
            private_key,
        })
    }

    /// Construct an instance from serialized JSON.
    pub fn from_json(data: impl AsRef<[u8]>) -> Result<Self, SigningVaultError> {
        Ok(serde_json::from_slice(data.as_ref())?)
    }

    /// Construct an instance from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, SigningVaultError> {
        let data = std::fs::read(path.as_ref())?;

        Self::from_json(data)
    }

    /// Serialize this instance to a JSON object.
    pub fn to_json_string(&self) -> Result<String, SigningVaultError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Write this instance to a JSON file.
    ///
    /// Since the file contains sensitive data, it will have limited read
    /// permissions on platforms where this is implemented. Parent directories
    /// will be created if missing using default permissions for created
    /// directories.
    ///
    /// Permissions on the resulting file may not be as restrictive as desired.
    /// It is up to callers to additionally harden as desired.
    pub fn write_json_file(&self, path: impl AsRef<Path>) -> Result<(), SigningVaultError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = self.to_json_string()?;

        let mut fh = std::fs::File::create(path)?;
        let mut permissions = fh.metadata()?.permissions();
        set_permissions_private(&mut permissions);
        fh.set_permissions(permissions)?;
        fh.write_all(data.as_bytes())?;

        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct ConnectTokenRequest {
    iss: String,
    iat: u64,
    exp: u64,
    aud: String,
}

/// A JWT Token for use with the App Store Connect API.
pub type AppStoreConnectToken = String;

/// Represents a private key used to create JWT tokens for use with App Store Connect.
///
/// See https://developer.apple.com/documentation/appstoreconnectapi/creating_api_keys_for_app_store_connect_api
/// and https://developer.apple.com/documentation/appstoreconnectapi/generating_tokens_for_api_requests
/// for more details.
///
/// This entity holds the necessary metadata to issue new JWT tokens.
///
/// App Store Connect API tokens/JWTs are derived from:
///
/// * A key identifier. This is a short alphanumeric string like `DEADBEEF42`.
/// * An issuer ID. This is likely a UUID.
/// * A private key. Likely ECDSA.
///
/// All these are issued by Apple. You can log in to App Store Connect and
/// see/manage your keys at https://appstoreconnect.apple.com/access/api.
#[derive(Clone)]
pub struct ConnectTokenEncoder {
    key_id: String,
    issuer_id: String,
    encoding_key: EncodingKey,
}

impl TryFrom<UnifiedApiKey> for ConnectTokenEncoder {
    type Error = SigningVaultError;

    fn try_from(value: UnifiedApiKey) -> Result<Self, Self::Error> {
        let der = base64::decode(value.private_key).map_err(|e| {
            SigningVaultError::AppStoreConnectApiKey(format!(
                "failed to base64 decode private key: {}",
                e
            ))
        })?;

        Self::from_ecdsa_der(value.key_id, value.issuer_id, &der)
    }
}

impl ConnectTokenEncoder {
    /// Construct an instance from an [EncodingKey] instance.
    ///
    /// This is the lowest level API and ultimately what all constructors use.
    pub fn from_jwt_encoding_key(
        key_id: String,
        issuer_id: String,
        encoding_key: EncodingKey,
    ) -> Self {
        Self {
            key_id,
            issuer_id,
            encoding_key,
        }
    }

    /// Construct an instance from a DER encoded ECDSA private key.
    pub fn from_ecdsa_der(
        key_id: String,
        issuer_id: String,
        der_data: &[u8],
    ) -> Result<Self, SigningVaultError> {
        let encoding_key = EncodingKey::from_ec_der(der_data);

        Ok(Self::from_jwt_encoding_key(key_id, issuer_id, encoding_key))
    }

    /// Create a token from a PEM encoded ECDSA private key.
    pub fn from_ecdsa_pem(
        key_id: String,
        issuer_id: String,
        pem_data: &[u8],
    ) -> Result<Self, SigningVaultError> {
        let encoding_key = EncodingKey::from_ec_pem(pem_data)?;

        Ok(Self::from_jwt_encoding_key(key_id, issuer_id, encoding_key))
    }

    /// Create a token from a PEM encoded ECDSA private key in a filesystem path.
    pub fn from_ecdsa_pem_path(
        key_id: String,
        issuer_id: String,
        path: impl AsRef<Path>,
    ) -> Result<Self, SigningVaultError> {
        let data = std::fs::read(path.as_ref())?;

        Self::from_ecdsa_pem(key_id, issuer_id, &data)
    }

    /// Attempt to construct an instance from an API Key ID.
    ///
    /// e.g. `DEADBEEF42`. This looks for an `AuthKey_<id>.p8` file in default
    /// search locations like `~/.appstoreconnect/private_keys`.
    pub fn from_api_key_id(key_id: String, issuer_id: String) -> Result<Self, SigningVaultError> {
        let mut search_paths = vec![std::env::current_dir()?.join("private_keys")];

        if let Some(home) = dirs::home_dir() {
            search_paths.extend([
                home.join("private_keys"),
                home.join(".private_keys"),
                home.join(".appstoreconnect").join("private_keys"),
            ]);
        }

        // AuthKey_<apiKey>.p8
        let filename = format!("AuthKey_{}.p8", key_id);

        for path in search_paths {
            let candidate = path.join(&filename);

            if candidate.exists() {
                return Self::from_ecdsa_pem_path(key_id, issuer_id, candidate);
            }
        }

        Err(SigningVaultError::AppStoreConnectApiKeyNotFound)
    }

    /// Mint a new JWT token.
    ///
    /// Using the private key and key metadata bound to this instance, we issue
    /// a new JWT for the requested duration.
    pub fn new_token(&self, duration: u64) -> Result<AppStoreConnectToken, SigningVaultError> {
        let header = Header {
            kid: Some(self.key_id.clone()),
            alg: Algorithm::ES256,
            ..Default::default()
        };

        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("calculating UNIX time should never fail")
            .as_secs();

        let claims = ConnectTokenRequest {
            iss: self.issuer_id.clone(),
            iat: now,
            exp: now + duration,
            aud: "appstoreconnect-v1".to_string(),
        };

        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)?;

        Ok(token)
    }
}

// The following structs model the certificates resource, as documented at
// https://developer.apple.com/documentation/appstoreconnectapi/certificates.

/// Attributes of a signing certificate record.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAttributes {
    /// Base64 encoded DER of the certificate.
    pub certificate_content: String,

    pub display_name: Option<String>,

    /// A value like `IOS_DISTRIBUTION` or `DEVELOPER_ID_APPLICATION`.
    pub certificate_type: Option<String>,

    pub serial_number: Option<String>,

    pub platform: Option<String>,
}

/// A single certificate record in a listing response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub attributes: CertificateAttributes,
    pub id: String,
    pub r#type: String,
}

/// Pagination links in a listing response.
#[derive(Clone, Debug, Deserialize)]
pub struct PagedDocumentLinks {
    pub next: Option<String>,
}

/// The API's response to a certificates listing request.
#[derive(Clone, Debug, Deserialize)]
pub struct CertificatesResponse {
    pub data: Vec<CertificateRecord>,
    pub links: Option<PagedDocumentLinks>,
}

/// A signing certificate known to the signing authority.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthorityCertificate {
    /// Authority-assigned identifier.
    pub id: String,

    /// DER encoded certificate.
    pub content: Vec<u8>,

    /// Human readable name, when the authority provides one.
    pub display_name: Option<String>,

    /// Authority's category for the certificate, when provided.
    pub certificate_type: Option<String>,
}

impl TryFrom<CertificateRecord> for AuthorityCertificate {
    type Error = SigningVaultError;

    fn try_from(record: CertificateRecord) -> Result<Self, Self::Error> {
        let content = base64::decode(&record.attributes.certificate_content).map_err(|e| {
            SigningVaultError::CertificateDecode(format!(
                "certificate {} has invalid base64 content: {}",
                record.id, e
            ))
        })?;

        Ok(Self {
            id: record.id,
            content,
            display_name: record.attributes.display_name,
            certificate_type: record.attributes.certificate_type,
        })
    }
}

/// Capability to enumerate the signing certificates of a developer account.
///
/// The import workflow consumes this narrow interface rather than a concrete
/// client so it can run against a fake authority in tests.
pub trait CertificateAuthority {
    fn list_certificates(&self) -> Result<Vec<AuthorityCertificate>, SigningVaultError>;
}

/// Obtain the default [Client] to use for HTTP requests.
pub fn default_client() -> Result<Client, SigningVaultError> {
    Ok(ClientBuilder::default()
        .user_agent("apple-signing-vault crate (https://crates.io/crates/apple-signing-vault)")
        .build()?)
}

/// A client for the App Store Connect API.
///
/// The client isn't generic. Don't get any ideas.
pub struct AppStoreConnectClient {
    client: Client,
    connect_token: ConnectTokenEncoder,
    token: Mutex<Option<AppStoreConnectToken>>,
}

impl AppStoreConnectClient {
    pub fn new(connect_token: ConnectTokenEncoder) -> Result<Self, SigningVaultError> {
        Ok(Self {
            client: default_client()?,
            connect_token,
            token: Mutex::new(None),
        })
    }

    fn get_token(&self) -> Result<String, SigningVaultError> {
        let mut token = self.token.lock().unwrap();

        // TODO need to handle token expiration.
        if token.is_none() {
            token.replace(self.connect_token.new_token(300)?);
        }

        Ok(token.as_ref().unwrap().clone())
    }

    fn get_certificates_page(&self, url: &str) -> Result<CertificatesResponse, SigningVaultError> {
        let token = self.get_token()?;

        let req = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json");

        let response = req.send()?;

        if response.status() == 200 {
            Ok(response.json::<CertificatesResponse>()?)
        } else {
            error!("non-200 from App Store Connect certificates listing");
            error!("{}", response.text()?);

            Err(SigningVaultError::AppStoreConnectServerError(
                "certificates listing failed".to_string(),
            ))
        }
    }
}

impl CertificateAuthority for AppStoreConnectClient {
    /// Fetch all signing certificates registered with the account.
    ///
    /// Follows pagination links until the listing is exhausted.
    fn list_certificates(&self) -> Result<Vec<AuthorityCertificate>, SigningVaultError> {
        let mut certificates = Vec::new();
        let mut url = format!("{}?limit=200", APPLE_CERTIFICATES_URL);

        loop {
            let page = self.get_certificates_page(&url)?;

            for record in page.data {
                certificates.push(AuthorityCertificate::try_from(record)?);
            }

            match page.links.and_then(|links| links.next) {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(certificates)
    }
}
