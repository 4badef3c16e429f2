//! Session scoped state shared by every command

use nexum_tangem_apdu::{EncryptionMode, ResponseApdu, SessionKey, Tag, Tlv, TlvBuilder};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::types::{Card, UserCode, UserCodeKind};

/// Timeout setting for the NFC module used by early firmware
const LEGACY_MODE_VALUE: u8 = 4;

/// Mutable state of one card session
///
/// Owned by the executor running the session. Commands only read it; every
/// mutation is made by the executor in response to the card.
#[derive(Debug, Clone)]
pub struct SessionEnvironment {
    access_code: UserCode,
    passcode: UserCode,
    passcode_provisioned: bool,
    cvc: Option<String>,
    default_access_code: UserCode,
    default_passcode: UserCode,
    encryption_mode: EncryptionMode,
    encryption_key: Option<SessionKey>,
    key_epoch: u64,
    card: Option<Card>,
    legacy_mode: bool,
    handle_errors: bool,
}

impl SessionEnvironment {
    /// Create an environment holding the well-known codes
    pub fn new(config: &SessionConfig) -> Self {
        let default_access_code = UserCode::new(config.default_access_code);
        let default_passcode = UserCode::new(config.default_passcode);
        Self {
            access_code: default_access_code.clone(),
            passcode: default_passcode.clone(),
            passcode_provisioned: false,
            cvc: None,
            default_access_code,
            default_passcode,
            encryption_mode: EncryptionMode::None,
            encryption_key: None,
            key_epoch: 0,
            card: None,
            legacy_mode: config.legacy_mode,
            handle_errors: config.handle_errors,
        }
    }

    /// Current access code
    pub const fn access_code(&self) -> &UserCode {
        &self.access_code
    }

    /// Current passcode
    pub const fn passcode(&self) -> &UserCode {
        &self.passcode
    }

    /// Current code for `kind`
    pub const fn user_code(&self, kind: UserCodeKind) -> &UserCode {
        match kind {
            UserCodeKind::AccessCode => &self.access_code,
            UserCodeKind::Passcode => &self.passcode,
        }
    }

    /// Whether the code for `kind` is the well-known default
    pub fn is_default(&self, kind: UserCodeKind) -> bool {
        match kind {
            UserCodeKind::AccessCode => self.access_code == self.default_access_code,
            UserCodeKind::Passcode => self.passcode == self.default_passcode,
        }
    }

    /// Whether the access code is the well-known default
    pub fn is_access_code_default(&self) -> bool {
        self.is_default(UserCodeKind::AccessCode)
    }

    /// Whether the passcode is the well-known default
    pub fn is_passcode_default(&self) -> bool {
        self.is_default(UserCodeKind::Passcode)
    }

    /// Whether the executor provisioned the passcode in this session
    ///
    /// Set once the card accepted the default passcode on an unchanged SetPin
    /// or the user entered one. Cleared whenever the passcode slot changes.
    pub const fn is_passcode_provisioned(&self) -> bool {
        self.passcode_provisioned
    }

    /// Record that the current passcode came out of provisioning
    pub fn mark_passcode_provisioned(&mut self) {
        self.passcode_provisioned = true;
    }

    /// Install an entered code
    pub fn set_user_code(&mut self, kind: UserCodeKind, code: &str) {
        debug!(%kind, "Installing user code");
        self.install(kind, UserCode::new(code));
    }

    /// Install the access code
    pub fn set_access_code(&mut self, code: &str) {
        self.set_user_code(UserCodeKind::AccessCode, code);
    }

    /// Install the passcode
    pub fn set_passcode(&mut self, code: &str) {
        self.set_user_code(UserCodeKind::Passcode, code);
    }

    /// Put the well-known default back into the slot for `kind`
    pub fn reset_user_code(&mut self, kind: UserCodeKind) {
        debug!(%kind, "Restoring default user code");
        let code = match kind {
            UserCodeKind::AccessCode => self.default_access_code.clone(),
            UserCodeKind::Passcode => self.default_passcode.clone(),
        };
        self.install(kind, code);
    }

    fn install(&mut self, kind: UserCodeKind, code: UserCode) {
        match kind {
            UserCodeKind::AccessCode => {
                // Session keys are derived from the access code
                if self.access_code != code {
                    self.clear_key();
                }
                self.access_code = code;
            }
            UserCodeKind::Passcode => {
                self.passcode_provisioned = false;
                self.passcode = code;
            }
        }
    }

    /// Card verification code, used instead of the passcode on some cards
    pub fn cvc(&self) -> Option<&str> {
        self.cvc.as_deref()
    }

    /// Set the card verification code
    pub fn set_cvc(&mut self, cvc: Option<String>) {
        self.cvc = cvc;
    }

    /// Current encryption tier
    pub const fn encryption_mode(&self) -> EncryptionMode {
        self.encryption_mode
    }

    /// Key for the current tier, once negotiated
    pub const fn encryption_key(&self) -> Option<&SessionKey> {
        self.encryption_key.as_ref()
    }

    /// Counter bumped every time the key is installed or cleared
    pub const fn key_epoch(&self) -> u64 {
        self.key_epoch
    }

    /// Whether the current tier still needs a key negotiated
    pub const fn needs_key(&self) -> bool {
        !matches!(self.encryption_mode, EncryptionMode::None) && self.encryption_key.is_none()
    }

    /// Move one tier up and drop the key
    ///
    /// Returns the new tier, or `None` when already at the strongest tier, in
    /// which case nothing changes.
    pub fn escalate_encryption(&mut self) -> Option<EncryptionMode> {
        let next = self.encryption_mode.escalated()?;
        debug!(from = %self.encryption_mode, to = %next, "Escalating encryption");
        self.clear_key();
        self.encryption_mode = next;
        Some(next)
    }

    /// Back to plain bodies
    pub fn reset_encryption(&mut self) {
        self.clear_key();
        self.encryption_mode = EncryptionMode::None;
    }

    /// Install a negotiated key for the current tier
    pub fn install_key(&mut self, key: SessionKey) {
        self.encryption_key = Some(key);
        self.key_epoch += 1;
    }

    fn clear_key(&mut self) {
        if self.encryption_key.take().is_some() {
            self.key_epoch += 1;
        }
    }

    /// Card metadata from the preflight read
    pub const fn card(&self) -> Option<&Card> {
        self.card.as_ref()
    }

    /// Install card metadata
    pub fn install_card(&mut self, card: Card) {
        debug!(card_id = %card.card_id, firmware = %card.firmware_version, "Installing card");
        self.card = Some(card);
    }

    /// Identifier of the installed card
    pub fn card_id(&self) -> Option<&str> {
        self.card.as_ref().map(|card| card.card_id.as_str())
    }

    /// Whether commands carry the legacy timeout setting
    pub const fn legacy_mode(&self) -> bool {
        self.legacy_mode
    }

    /// Whether prechecks and error mapping run
    pub const fn handle_errors(&self) -> bool {
        self.handle_errors
    }

    /// Start a command body, prefixed with the legacy setting when enabled
    pub fn tlv_builder(&self) -> TlvBuilder {
        let builder = TlvBuilder::new();
        if self.legacy_mode {
            builder.append(Tag::LegacyMode, &LEGACY_MODE_VALUE)
        } else {
            builder
        }
    }

    /// Decode a response body with the key installed now
    pub fn decode(&self, response: &ResponseApdu) -> Result<Vec<Tlv>> {
        Ok(response.tlv_data(self.encryption_key.as_ref(), self.key_epoch)?)
    }
}

impl Default for SessionEnvironment {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}
