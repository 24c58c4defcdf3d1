// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Signing types and the storage naming convention derived from them.

use {
    crate::error::SigningVaultError,
    std::{
        fmt::{Display, Formatter},
        str::FromStr,
    },
};

/// Category of certificate/profile use.
///
/// The variant determines where in the storage repository imported assets
/// land. The folder and filename mappings below are a compatibility contract
/// with existing repositories and must not change.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SigningType {
    /// App Store distribution.
    AppStore,

    /// Ad-hoc distribution to registered devices.
    AdHoc,

    /// Development signing.
    Development,

    /// In-house enterprise distribution.
    Enterprise,

    /// Developer ID signing for distribution outside the App Store.
    DeveloperId,
}

impl SigningType {
    /// All signing types.
    pub fn all() -> &'static [Self] {
        &[
            Self::AppStore,
            Self::AdHoc,
            Self::Development,
            Self::Enterprise,
            Self::DeveloperId,
        ]
    }

    /// All recognized string names, suitable for CLI argument validation.
    pub fn str_names() -> &'static [&'static str] {
        &["appstore", "adhoc", "development", "enterprise", "developer_id"]
    }

    /// The canonical string name of this signing type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppStore => "appstore",
            Self::AdHoc => "adhoc",
            Self::Development => "development",
            Self::Enterprise => "enterprise",
            Self::DeveloperId => "developer_id",
        }
    }

    /// Subfolder under `certs/` receiving the certificate and private key.
    pub fn certificate_folder(&self) -> &'static str {
        match self {
            Self::AppStore | Self::AdHoc | Self::Enterprise => "distribution",
            Self::Development => "development",
            Self::DeveloperId => "developer_id_application",
        }
    }

    /// Subfolder under `profiles/` receiving a provisioning profile.
    pub fn profile_folder(&self) -> &'static str {
        match self {
            Self::AppStore => "appstore",
            Self::AdHoc => "adhoc",
            Self::Development => "development",
            Self::Enterprise => "enterprise",
            Self::DeveloperId => "developer_id",
        }
    }

    /// Filename prefix for a provisioning profile of this type.
    pub fn profile_prefix(&self) -> &'static str {
        match self {
            Self::AppStore => "AppStore",
            Self::AdHoc => "AdHoc",
            Self::Development => "Development",
            Self::Enterprise => "InHouse",
            Self::DeveloperId => "DeveloperId",
        }
    }
}

impl Display for SigningType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningType {
    type Err = SigningVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "appstore" => Ok(Self::AppStore),
            "adhoc" => Ok(Self::AdHoc),
            "development" => Ok(Self::Development),
            "enterprise" => Ok(Self::Enterprise),
            "developer_id" => Ok(Self::DeveloperId),
            _ => Err(SigningVaultError::UnsupportedSigningType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_known_names() {
        for name in SigningType::str_names() {
            let t = SigningType::from_str(name).unwrap();
            assert_eq!(&t.as_str(), name);
        }
    }

    #[test]
    fn parse_unknown_name() {
        assert!(matches!(
            SigningType::from_str("app_store"),
            Err(SigningVaultError::UnsupportedSigningType(_))
        ));
        assert!(matches!(
            SigningType::from_str(""),
            Err(SigningVaultError::UnsupportedSigningType(_))
        ));
    }

    #[test]
    fn certificate_folders() {
        assert_eq!(SigningType::AppStore.certificate_folder(), "distribution");
        assert_eq!(SigningType::AdHoc.certificate_folder(), "distribution");
        assert_eq!(SigningType::Enterprise.certificate_folder(), "distribution");
        assert_eq!(SigningType::Development.certificate_folder(), "development");
        assert_eq!(
            SigningType::DeveloperId.certificate_folder(),
            "developer_id_application"
        );
    }

    #[test]
    fn profile_naming() {
        assert_eq!(SigningType::AppStore.profile_folder(), "appstore");
        assert_eq!(SigningType::AppStore.profile_prefix(), "AppStore");
        assert_eq!(SigningType::Enterprise.profile_prefix(), "InHouse");
        assert_eq!(SigningType::DeveloperId.profile_folder(), "developer_id");
    }
}
