use nexum_tangem_apdu::{CommandApdu, ResponseApdu};

use super::set_pin::SetPinCommand;
use crate::command::Command;
use crate::environment::SessionEnvironment;
use crate::error::{Error, Result};

/// Result of [`CheckPinCommand`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CheckPinResponse {
    /// The access code is the well-known default
    pub is_access_code_default: bool,
    /// The passcode is the well-known default
    pub is_passcode_default: bool,
}

impl CheckPinResponse {
    /// A passcode filled in by provisioning is never reported as the default
    fn from_environment(environment: &SessionEnvironment) -> Self {
        Self {
            is_access_code_default: environment.is_access_code_default(),
            is_passcode_default: environment.is_passcode_default()
                && !environment.is_passcode_provisioned(),
        }
    }
}

/// Find out whether the card still uses the default codes
///
/// Sends a SetPin with the current codes as the new ones. A card that
/// refuses the passcode answers with invalid parameters, which is reported
/// as a non-default passcode rather than as a failure. The passcode is
/// provisioned before the check is sent, so a successful check reports it
/// as non-default too.
#[derive(Debug, Clone, Default)]
pub struct CheckPinCommand {
    probe: SetPinCommand,
}

impl CheckPinCommand {
    /// Create a new code check
    pub const fn new() -> Self {
        Self {
            probe: SetPinCommand::unchanged(),
        }
    }
}

impl Command for CheckPinCommand {
    type Response = CheckPinResponse;

    fn requires_elevated_credential(&self) -> bool {
        true
    }

    fn recover(&self, environment: &SessionEnvironment, error: &Error) -> Option<CheckPinResponse> {
        match error {
            Error::InvalidParams => Some(CheckPinResponse {
                is_access_code_default: environment.is_access_code_default(),
                is_passcode_default: false,
            }),
            _ => None,
        }
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        self.probe.serialize(environment)
    }

    fn deserialize(
        &self,
        environment: &SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<CheckPinResponse> {
        // Only the status matters; the body is still checked for well-formedness
        self.probe.deserialize(environment, response)?;
        Ok(CheckPinResponse::from_environment(environment))
    }
}
