// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Provisioning profile platform handling.

use {
    crate::error::SigningVaultError,
    std::{
        fmt::{Display, Formatter},
        path::Path,
    },
};

/// Target OS ecosystem of a provisioning profile.
///
/// The platform is never declared explicitly: it is inferred from the file
/// extension of the profile being imported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProfilePlatform {
    /// iOS and derived platforms. Profiles use the `.mobileprovision` extension.
    Ios,

    /// macOS. Profiles use the `.provisionprofile` extension.
    MacOs,
}

impl ProfilePlatform {
    /// Infer the platform from a profile's file extension.
    ///
    /// Errors if the extension is missing or maps to no known platform.
    pub fn from_profile_path(path: impl AsRef<Path>) -> Result<Self, SigningVaultError> {
        let path = path.as_ref();

        match path.extension().and_then(|x| x.to_str()) {
            Some("mobileprovision") => Ok(Self::Ios),
            Some("provisionprofile") => Ok(Self::MacOs),
            _ => Err(SigningVaultError::UnknownProfileExtension(
                path.to_path_buf(),
            )),
        }
    }

    /// The canonical file extension for profiles of this platform.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ios => "mobileprovision",
            Self::MacOs => "provisionprofile",
        }
    }
}

impl Display for ProfilePlatform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ios => f.write_str("ios"),
            Self::MacOs => f.write_str("osx"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn platform_from_extension() {
        assert_eq!(
            ProfilePlatform::from_profile_path("app.mobileprovision").unwrap(),
            ProfilePlatform::Ios
        );
        assert_eq!(
            ProfilePlatform::from_profile_path("some/dir/app.provisionprofile").unwrap(),
            ProfilePlatform::MacOs
        );
    }

    #[test]
    fn unknown_extension_rejected() {
        for path in ["profile.plist", "profile", "profile.mobileprovision.bak"] {
            assert!(matches!(
                ProfilePlatform::from_profile_path(path),
                Err(SigningVaultError::UnknownProfileExtension(_))
            ));
        }
    }

    #[test]
    fn extension_round_trip() {
        for platform in [ProfilePlatform::Ios, ProfilePlatform::MacOs] {
            let path = format!("test.{}", platform.extension());
            assert_eq!(ProfilePlatform::from_profile_path(path).unwrap(), platform);
        }
    }
}
