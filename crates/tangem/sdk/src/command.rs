//! Command contract shared by every card operation

use std::fmt;

use nexum_tangem_apdu::{CommandApdu, ResponseApdu};

use crate::environment::SessionEnvironment;
use crate::error::{Error, Result};
use crate::types::{Card, WalletIndex};

/// What the session reads from the card before the first command
///
/// Cards before firmware 4.0 always report their wallet with the card, so
/// only the card is read for them regardless of the setting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreflightReadSettings {
    /// Card data only
    #[default]
    ReadCardOnly,
    /// Card data and the wallet at the given index
    ReadWallet(WalletIndex),
    /// Card data and every wallet
    FullCardRead,
}

/// A card operation the executor can run
///
/// The executor only relies on this contract. Serialization produces a plain
/// body; encryption for the negotiated tier is applied by the executor.
pub trait Command: Send + Sync + fmt::Debug {
    /// Typed result of the command
    type Response: Send;

    /// Whether the passcode must be known before sending
    fn requires_elevated_credential(&self) -> bool {
        false
    }

    /// Whether card metadata must be installed before sending
    fn needs_preflight_read(&self) -> bool {
        true
    }

    /// What the preflight read should fetch for this command
    fn preflight_read_settings(&self) -> PreflightReadSettings {
        PreflightReadSettings::ReadCardOnly
    }

    /// Reject the command up front based on known card state
    fn perform_pre_check(&self, _card: &Card) -> Option<Error> {
        None
    }

    /// Translate a card error into a command specific one
    fn map_error(&self, _card: Option<&Card>, error: Error) -> Error {
        error
    }

    /// Turn a terminal error into a successful result, if the command can
    fn recover(&self, _environment: &SessionEnvironment, _error: &Error) -> Option<Self::Response> {
        None
    }

    /// Build the plain command APDU
    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu>;

    /// Parse a successful response
    fn deserialize(
        &self,
        environment: &SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<Self::Response>;
}
