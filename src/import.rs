// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Importing existing signing assets into storage.

use {
    crate::{
        app_store_connect::CertificateAuthority,
        certificate::{find_certificate_id, read_certificate_der},
        error::SigningVaultError,
        placement::{resolve_placements, PlacementRequest, ProfileSource},
        profile::ProfilePlatform,
        prompt::ConfirmationPrompt,
        signing_type::SigningType,
        storage::StorageBackend,
    },
    log::warn,
    std::path::{Path, PathBuf},
};

/// Explicit parameters for an import.
#[derive(Clone, Debug)]
pub struct ImportConfig {
    /// Signing type governing storage placement.
    pub signing_type: SigningType,

    /// App identifier naming an imported provisioning profile.
    pub app_identifier: Option<String>,
}

/// Imports existing certificates, private keys, and profiles into storage.
///
/// The importer orchestrates three injected capabilities: the signing
/// authority (to derive the certificate identifier), the storage backend
/// (to persist and publish the files), and a confirmation prompt (consulted
/// when importing without a profile).
pub struct Importer<'a> {
    authority: &'a dyn CertificateAuthority,
    storage: &'a mut dyn StorageBackend,
    prompt: &'a dyn ConfirmationPrompt,
}

impl<'a> Importer<'a> {
    pub fn new(
        authority: &'a dyn CertificateAuthority,
        storage: &'a mut dyn StorageBackend,
        prompt: &'a dyn ConfirmationPrompt,
    ) -> Self {
        Self {
            authority,
            storage,
            prompt,
        }
    }

    /// Import a certificate, its private key bundle, and optionally a profile.
    ///
    /// Validates the certificate against the signing authority, computes the
    /// storage placement, copies bytes into the synced working directory, and
    /// commits exactly the placed files. Returns the committed paths.
    pub fn import_certificate(
        &mut self,
        config: &ImportConfig,
        cert_path: &Path,
        p12_path: &Path,
        profile_path: Option<&Path>,
    ) -> Result<Vec<PathBuf>, SigningVaultError> {
        let der = read_certificate_der(cert_path)?;

        let certificates = self.authority.list_certificates()?;
        let certificate_id = find_certificate_id(&der, &certificates)?.to_string();
        warn!("certificate identifier: {}", certificate_id);

        let profile = profile_path
            .map(|path| {
                Ok::<_, SigningVaultError>(ProfileSource {
                    path,
                    platform: ProfilePlatform::from_profile_path(path)?,
                })
            })
            .transpose()?;

        let request = PlacementRequest {
            signing_type: config.signing_type,
            certificate_id: &certificate_id,
            cert_path,
            p12_path,
            profile,
            app_identifier: config.app_identifier.as_deref(),
        };

        let entries = resolve_placements(&request, self.prompt)?;

        self.storage.download()?;
        let root = self.storage.working_directory()?.to_path_buf();

        let mut files_to_commit = Vec::with_capacity(entries.len());

        for entry in &entries {
            let dest = root.join(&entry.relative_path);

            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }

            std::fs::copy(&entry.source, &dest)?;
            files_to_commit.push(dest);
        }

        let message = format!(
            "Import {} certificate {}",
            config.signing_type, certificate_id
        );
        self.storage.save_changes(&message, &files_to_commit)?;

        warn!(
            "imported {} file(s) into {} storage",
            files_to_commit.len(),
            config.signing_type
        );

        Ok(files_to_commit)
    }
}
