// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolution of storage destinations for imported signing assets.
//!
//! The functions in this module are pure: they map import parameters to the
//! ordered list of destination paths inside a storage repository without
//! performing any I/O. The caller is responsible for copying bytes to the
//! resolved locations and handing exactly this path list to the storage
//! backend for committing.
//!
//! The layout produced here is a compatibility contract with existing
//! storage repositories:
//!
//! ```text
//! certs/<signing-type-folder>/<certificate-id>.cer
//! certs/<signing-type-folder>/<certificate-id>.p12
//! profiles/<profile-folder>/<Prefix>_<app-identifier>.<platform-extension>
//! ```

use {
    crate::{
        error::SigningVaultError, profile::ProfilePlatform, prompt::ConfirmationPrompt,
        signing_type::SigningType,
    },
    log::warn,
    std::path::{Path, PathBuf},
};

/// A provisioning profile offered for import.
#[derive(Clone, Copy, Debug)]
pub struct ProfileSource<'a> {
    /// Where the profile lives on local disk.
    pub path: &'a Path,

    /// Platform inferred from the profile's file extension.
    pub platform: ProfilePlatform,
}

/// Parameters the resolver maps to destination paths.
#[derive(Clone, Copy, Debug)]
pub struct PlacementRequest<'a> {
    /// Signing type governing folder and filename selection.
    pub signing_type: SigningType,

    /// Authority-assigned certificate identifier. Opaque.
    pub certificate_id: &'a str,

    /// Local path to the certificate (`.cer`) being imported.
    pub cert_path: &'a Path,

    /// Local path to the paired private key bundle (`.p12`).
    pub p12_path: &'a Path,

    /// Profile to import alongside the certificate, if any.
    pub profile: Option<ProfileSource<'a>>,

    /// App identifier used to construct the profile filename.
    pub app_identifier: Option<&'a str>,
}

/// A single file to be written into the storage repository.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlacementEntry {
    /// Destination, relative to the storage working directory.
    pub relative_path: PathBuf,

    /// Local file whose bytes belong at the destination.
    pub source: PathBuf,
}

/// Resolve the destinations for a certificate and its private key bundle.
///
/// Always yields exactly two entries: the `.cer` followed by the `.p12`,
/// both named after the certificate identifier.
pub fn certificate_placements(
    signing_type: SigningType,
    certificate_id: &str,
    cert_path: &Path,
    p12_path: &Path,
) -> Vec<PlacementEntry> {
    let folder = Path::new("certs").join(signing_type.certificate_folder());

    vec![
        PlacementEntry {
            relative_path: folder.join(format!("{}.cer", certificate_id)),
            source: cert_path.to_path_buf(),
        },
        PlacementEntry {
            relative_path: folder.join(format!("{}.p12", certificate_id)),
            source: p12_path.to_path_buf(),
        },
    ]
}

/// Resolve the destination for a provisioning profile.
///
/// The filename is `<Prefix>_<app_identifier>.<ext>` where the prefix and
/// folder derive from the signing type and the extension from the profile's
/// platform. Errors with [SigningVaultError::MissingAppIdentifier] if no app
/// identifier is available to name the file.
pub fn profile_placement(
    signing_type: SigningType,
    profile: ProfileSource<'_>,
    app_identifier: Option<&str>,
) -> Result<PlacementEntry, SigningVaultError> {
    let app_identifier = app_identifier.ok_or(SigningVaultError::MissingAppIdentifier)?;

    let filename = format!(
        "{}_{}.{}",
        signing_type.profile_prefix(),
        app_identifier,
        profile.platform.extension()
    );

    Ok(PlacementEntry {
        relative_path: Path::new("profiles")
            .join(signing_type.profile_folder())
            .join(filename),
        source: profile.path.to_path_buf(),
    })
}

/// Resolve the full, ordered placement list for an import request.
///
/// When no profile is supplied the given prompt is consulted exactly once
/// before proceeding with a certificate-only placement. Any response,
/// including an empty one, proceeds; a non-empty response is recorded as an
/// explicit acknowledgement that the profile is being skipped. This mirrors
/// the long-standing behavior of repositories populated before profiles were
/// imported alongside certificates.
pub fn resolve_placements(
    request: &PlacementRequest<'_>,
    prompt: &dyn ConfirmationPrompt,
) -> Result<Vec<PlacementEntry>, SigningVaultError> {
    let mut entries = certificate_placements(
        request.signing_type,
        request.certificate_id,
        request.cert_path,
        request.p12_path,
    );

    match request.profile {
        Some(profile) => {
            entries.push(profile_placement(
                request.signing_type,
                profile,
                request.app_identifier,
            )?);
        }
        None => {
            let response = prompt.ask(
                "No provisioning profile provided. Press Enter to store only the \
                 certificate and private key",
            )?;

            if !response.is_empty() {
                warn!("storing certificate without a provisioning profile");
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod test {
    use {
        super::*,
        std::{
            path::Path,
            sync::atomic::{AtomicUsize, Ordering},
        },
    };

    struct RecordingPrompt {
        response: &'static str,
        asked: AtomicUsize,
    }

    impl RecordingPrompt {
        fn new(response: &'static str) -> Self {
            Self {
                response,
                asked: AtomicUsize::new(0),
            }
        }

        fn ask_count(&self) -> usize {
            self.asked.load(Ordering::SeqCst)
        }
    }

    impl ConfirmationPrompt for RecordingPrompt {
        fn ask(&self, _message: &str) -> Result<String, SigningVaultError> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.to_string())
        }
    }

    fn request<'a>(
        signing_type: SigningType,
        profile: Option<ProfileSource<'a>>,
        app_identifier: Option<&'a str>,
    ) -> PlacementRequest<'a> {
        PlacementRequest {
            signing_type,
            certificate_id: "123456789",
            cert_path: Path::new("fixtures/test.cer"),
            p12_path: Path::new("fixtures/test.p12"),
            profile,
            app_identifier,
        }
    }

    #[test]
    fn certificate_paths_for_all_types() {
        for signing_type in SigningType::all() {
            let entries = certificate_placements(
                *signing_type,
                "123456789",
                Path::new("fixtures/test.cer"),
                Path::new("fixtures/test.p12"),
            );

            assert_eq!(entries.len(), 2);
            assert_eq!(
                entries[0].relative_path,
                Path::new("certs")
                    .join(signing_type.certificate_folder())
                    .join("123456789.cer")
            );
            assert_eq!(
                entries[1].relative_path,
                Path::new("certs")
                    .join(signing_type.certificate_folder())
                    .join("123456789.p12")
            );
        }
    }

    #[test]
    fn ios_profile_path() {
        let prompt = RecordingPrompt::new("");
        let profile = ProfileSource {
            path: Path::new("fixtures/test.mobileprovision"),
            platform: ProfilePlatform::Ios,
        };

        let entries = resolve_placements(
            &request(
                SigningType::AppStore,
                Some(profile),
                Some("tools.fastlane.app"),
            ),
            &prompt,
        )
        .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[2].relative_path,
            Path::new("profiles/appstore/AppStore_tools.fastlane.app.mobileprovision")
        );
        assert_eq!(prompt.ask_count(), 0);
    }

    #[test]
    fn osx_profile_path() {
        let prompt = RecordingPrompt::new("");
        let profile = ProfileSource {
            path: Path::new("fixtures/test.provisionprofile"),
            platform: ProfilePlatform::MacOs,
        };

        let entries = resolve_placements(
            &request(
                SigningType::AppStore,
                Some(profile),
                Some("tools.fastlane.app"),
            ),
            &prompt,
        )
        .unwrap();

        assert_eq!(
            entries[2].relative_path,
            Path::new("profiles/appstore/AppStore_tools.fastlane.app.provisionprofile")
        );
    }

    #[test]
    fn no_profile_prompts_once_and_omits_profile_entry() {
        let prompt = RecordingPrompt::new("");

        let entries =
            resolve_placements(&request(SigningType::AppStore, None, None), &prompt).unwrap();

        assert_eq!(prompt.ask_count(), 1);
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].relative_path,
            Path::new("certs/distribution/123456789.cer")
        );
        assert_eq!(
            entries[1].relative_path,
            Path::new("certs/distribution/123456789.p12")
        );
    }

    #[test]
    fn non_empty_prompt_response_still_places_certificate() {
        let prompt = RecordingPrompt::new("ok");

        let entries =
            resolve_placements(&request(SigningType::AppStore, None, None), &prompt).unwrap();

        assert_eq!(prompt.ask_count(), 1);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn developer_id_folder() {
        let prompt = RecordingPrompt::new("");

        let entries =
            resolve_placements(&request(SigningType::DeveloperId, None, None), &prompt).unwrap();

        assert_eq!(prompt.ask_count(), 1);
        assert_eq!(
            entries[0].relative_path,
            Path::new("certs/developer_id_application/123456789.cer")
        );
        assert_eq!(
            entries[1].relative_path,
            Path::new("certs/developer_id_application/123456789.p12")
        );
    }

    #[test]
    fn profile_without_app_identifier_is_an_error() {
        let prompt = RecordingPrompt::new("");
        let profile = ProfileSource {
            path: Path::new("fixtures/test.mobileprovision"),
            platform: ProfilePlatform::Ios,
        };

        let res = resolve_placements(&request(SigningType::AppStore, Some(profile), None), &prompt);

        assert!(matches!(res, Err(SigningVaultError::MissingAppIdentifier)));
        assert_eq!(prompt.ask_count(), 0);
    }

    #[test]
    fn resolution_is_deterministic() {
        let prompt = RecordingPrompt::new("");
        let profile = ProfileSource {
            path: Path::new("fixtures/test.mobileprovision"),
            platform: ProfilePlatform::Ios,
        };
        let req = request(SigningType::AppStore, Some(profile), Some("com.example.app"));

        let first = resolve_placements(&req, &prompt).unwrap();
        let second = resolve_placements(&req, &prompt).unwrap();

        assert_eq!(first, second);
    }
}
