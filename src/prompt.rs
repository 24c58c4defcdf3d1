// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interactive confirmation capability.

use crate::error::SigningVaultError;

/// Capability to ask the operator a free-form question.
///
/// Injected into workflows that may need interactive confirmation so the
/// placement logic itself stays pure and testable without a terminal.
pub trait ConfirmationPrompt {
    /// Present `message` and return the operator's response verbatim.
    ///
    /// An empty string is a valid response.
    fn ask(&self, message: &str) -> Result<String, SigningVaultError>;
}

/// Prompt implementation reading from the controlling terminal.
#[derive(Default)]
pub struct TerminalPrompt;

impl ConfirmationPrompt for TerminalPrompt {
    fn ask(&self, message: &str) -> Result<String, SigningVaultError> {
        Ok(dialoguer::Input::<String>::new()
            .with_prompt(message)
            .allow_empty(true)
            .interact_text()?)
    }
}
