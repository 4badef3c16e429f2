//! Command execution state machine
//!
//! [`SessionExecutor`] owns the transport, the prompt and the session
//! environment for the lifetime of a card session. For every command it
//! keeps sending until the card gives a terminal answer:
//!
//! - security delays resend the exact same bytes
//! - encryption requests move one tier up, renegotiate and re-serialize
//! - a refused access code or passcode goes through credential
//!   provisioning: the well-known default first, then one user prompt
//!
//! Each automatic retry path is bounded, so a command always ends.

use bytes::Bytes;
use nexum_tangem_apdu::{EncryptionMode, ResponseApdu, StatusClass, StatusWord, Tag, TlvDecoder};
use tracing::{Level, debug, info, instrument, trace, warn};

use crate::command::{Command, PreflightReadSettings};
use crate::commands::{ReadCommand, ReadWalletCommand, ReadWalletListCommand, SetPinCommand};
use crate::config::SessionConfig;
use crate::environment::SessionEnvironment;
use crate::error::{Error, ProtocolError, Result};
use crate::prompt::PromptService;
use crate::session::{KeyNegotiator, OpenSessionNegotiator};
use crate::transport::CardTransport;
use crate::types::{Card, UserCodeKind};

/// How far provisioning of one credential slot has gone during a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Attempt {
    #[default]
    Untouched,
    DefaultTried,
    Prompted,
}

#[derive(Debug, Default)]
struct Provisioning {
    primary: Attempt,
    secondary: Attempt,
}

/// Decoded NeedPause body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SecurityDelay {
    remaining_ms: u32,
    save_to_flash: bool,
}

/// Fails when the card keeps sending the exact same response
#[derive(Debug)]
struct StallGuard {
    limit: usize,
    last: Option<Bytes>,
    count: usize,
}

impl StallGuard {
    const fn new(limit: usize) -> Self {
        Self {
            limit,
            last: None,
            count: 0,
        }
    }

    fn observe(&mut self, response: &ResponseApdu) -> Result<(), ProtocolError> {
        if self.last.as_ref() == Some(response.raw()) {
            self.count += 1;
        } else {
            self.last = Some(response.raw().clone());
            self.count = 1;
        }

        if self.count > self.limit {
            return Err(ProtocolError::NoForwardProgress {
                status: response.status(),
                count: self.count,
            });
        }
        Ok(())
    }
}

const fn credential_error(kind: UserCodeKind) -> Error {
    match kind {
        UserCodeKind::AccessCode => Error::PrimaryCredentialRequired,
        UserCodeKind::Passcode => Error::SecondaryCredentialOrCvcRequired,
    }
}

fn log_status(status: StatusWord) {
    let level = status.tracing_level();
    if level == Level::WARN {
        warn!(%status, description = status.description(), "Card refused command");
    } else if level == Level::INFO {
        info!(%status, description = status.description(), "Card asked for a retry");
    } else {
        debug!(%status, "Card processed command");
    }
}

/// Runs commands against a card
#[derive(Debug)]
pub struct SessionExecutor<T: CardTransport, P: PromptService> {
    /// Link to the card
    transport: T,
    /// User interaction
    prompt: P,
    /// State of the current session
    environment: SessionEnvironment,
    /// Session settings
    config: SessionConfig,
    /// Produces session keys for the encrypted tiers
    negotiator: Box<dyn KeyNegotiator>,
}

impl<T: CardTransport, P: PromptService> SessionExecutor<T, P> {
    /// Create an executor with the default configuration
    pub fn new(transport: T, prompt: P) -> Self {
        Self::with_config(transport, prompt, SessionConfig::default())
    }

    /// Create an executor with a custom configuration
    pub fn with_config(transport: T, prompt: P, config: SessionConfig) -> Self {
        Self {
            transport,
            prompt,
            environment: SessionEnvironment::new(&config),
            config,
            negotiator: Box::new(OpenSessionNegotiator::new()),
        }
    }

    /// Replace the key negotiator
    pub fn with_negotiator(mut self, negotiator: impl KeyNegotiator + 'static) -> Self {
        self.negotiator = Box::new(negotiator);
        self
    }

    /// Get a reference to the underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take ownership of the transport and return it
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Get a reference to the prompt
    pub const fn prompt(&self) -> &P {
        &self.prompt
    }

    /// Session state
    pub const fn environment(&self) -> &SessionEnvironment {
        &self.environment
    }

    /// Mutable session state, e.g. to install codes known in advance
    pub const fn environment_mut(&mut self) -> &mut SessionEnvironment {
        &mut self.environment
    }

    /// Session settings
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Read the card first if the command needs it, then run the command
    pub async fn execute<C: Command>(&mut self, command: &C) -> Result<C::Response> {
        if command.needs_preflight_read() && self.environment.card().is_none() {
            self.preflight_read(command.preflight_read_settings()).await?;
        }
        self.run(command).await
    }

    /// Read card metadata and install it into the session
    ///
    /// Cards with separate wallet slots also get the wallets asked for by
    /// `settings` read and attached to the card.
    #[instrument(level = "debug", skip(self))]
    pub async fn preflight_read(&mut self, settings: PreflightReadSettings) -> Result<Card> {
        let mut card = self.run(&ReadCommand::new()).await?;
        self.environment.install_card(card.clone());

        if !card.firmware_version.supports_wallet_data() {
            return Ok(card);
        }

        let wallets = match settings {
            PreflightReadSettings::ReadCardOnly => return Ok(card),
            PreflightReadSettings::ReadWallet(index) => {
                vec![self.run(&ReadWalletCommand::new(index)).await?.wallet]
            }
            PreflightReadSettings::FullCardRead => {
                self.run(&ReadWalletListCommand::new()).await?.wallets
            }
        };
        debug!(count = wallets.len(), "Read wallets");
        card.set_wallets(wallets);
        self.environment.install_card(card.clone());
        Ok(card)
    }

    /// Run one command to a terminal outcome
    ///
    /// Fails with [`Error::MissingPreflightRead`] when the command needs card
    /// metadata that has not been read in this session.
    #[instrument(level = "debug", skip_all, fields(command = std::any::type_name::<C>()))]
    pub async fn run<C: Command>(&mut self, command: &C) -> Result<C::Response> {
        self.check_preconditions(command)?;

        let mut provisioning = Provisioning::default();
        if command.requires_elevated_credential() && self.environment.is_passcode_default() {
            debug!("Passcode is the default, provisioning before sending");
            self.provision_secondary(&mut provisioning).await?;
        }

        loop {
            match self.exchange(command, &mut provisioning).await {
                Err(Error::SecondaryCredentialOrCvcRequired) => {
                    self.provision_secondary(&mut provisioning).await?;
                }
                result => return result,
            }
        }
    }

    fn check_preconditions<C: Command>(&self, command: &C) -> Result<()> {
        let card = self.environment.card();
        if command.needs_preflight_read() && card.is_none() {
            return Err(Error::MissingPreflightRead);
        }

        if self.environment.handle_errors()
            && let Some(error) = card.and_then(|card| command.perform_pre_check(card))
        {
            debug!(%error, "Precheck rejected command");
            return Err(error);
        }
        Ok(())
    }

    /// Send a command until the card gives a terminal answer
    ///
    /// Provisioning of the access code happens in here. A passcode request
    /// is returned to the caller, which owns that sub-flow.
    async fn exchange<C: Command>(
        &mut self,
        command: &C,
        provisioning: &mut Provisioning,
    ) -> Result<C::Response> {
        'serialize: loop {
            if self.environment.needs_key() {
                let key = self
                    .negotiator
                    .negotiate(&mut self.transport, &self.environment)
                    .await?;
                self.environment.install_key(key);
            }

            let apdu = command.serialize(&self.environment)?.encrypted(
                self.environment.encryption_mode(),
                self.environment.encryption_key(),
            )?;
            let bytes = apdu.to_bytes()?;
            let mut guard = StallGuard::new(self.config.max_stalled_responses);
            debug!(
                instruction = %apdu.instruction(),
                mode = %apdu.encryption(),
                len = bytes.len(),
                "Sending command"
            );

            loop {
                let raw = self.transport.transmit_raw(&bytes).await?;
                let response = ResponseApdu::from_bytes(raw, self.environment.key_epoch())?;
                guard.observe(&response)?;

                let status = response.status();
                log_status(status);

                match status.class() {
                    StatusClass::Success => {
                        return command
                            .deserialize(&self.environment, &response)
                            .map_err(Error::into_deserialization_failure);
                    }
                    StatusClass::NeedsPause => {
                        let delay = self.security_delay(&response)?;
                        trace!(
                            remaining_ms = delay.remaining_ms,
                            save_to_flash = delay.save_to_flash,
                            "Security delay"
                        );
                        self.prompt.report_security_delay(delay.remaining_ms);
                        if delay.save_to_flash
                            && self.environment.encryption_mode() == EncryptionMode::None
                        {
                            self.transport.restart_polling().await;
                        }
                    }
                    StatusClass::NeedsEncryption => {
                        if self.environment.escalate_encryption().is_none() {
                            return Err(ProtocolError::EncryptionExhausted.into());
                        }
                        continue 'serialize;
                    }
                    StatusClass::Failure => {
                        let error = Error::from_status(status);
                        let error = if self.environment.handle_errors() {
                            command.map_error(self.environment.card(), error)
                        } else {
                            error
                        };

                        if error == Error::PrimaryCredentialRequired {
                            self.provision_primary(&mut provisioning.primary).await?;
                            continue 'serialize;
                        }
                        if let Some(response) = command.recover(&self.environment, &error) {
                            debug!(%error, "Command recovered from failure");
                            return Ok(response);
                        }
                        return Err(error);
                    }
                }
            }
        }
    }

    fn security_delay(&self, response: &ResponseApdu) -> Result<SecurityDelay> {
        let tlvs = self
            .environment
            .decode(response)
            .map_err(|_| ProtocolError::UndecodableSecurityDelay)?;
        let decoder = TlvDecoder::new(&tlvs);
        let remaining_ms = decoder
            .decode(Tag::Pause)
            .map_err(|_| ProtocolError::UndecodableSecurityDelay)?;
        Ok(SecurityDelay {
            remaining_ms,
            save_to_flash: decoder.contains(Tag::Flash),
        })
    }

    /// Get a working access code into the session
    async fn provision_primary(&mut self, attempt: &mut Attempt) -> Result<()> {
        let kind = UserCodeKind::AccessCode;
        match *attempt {
            Attempt::Prompted => {
                info!("Entered access code was refused");
                self.environment.reset_user_code(kind);
                Err(credential_error(kind))
            }
            Attempt::Untouched if !self.environment.is_access_code_default() => {
                debug!("Retrying with the default access code");
                self.environment.reset_user_code(kind);
                *attempt = Attempt::DefaultTried;
                Ok(())
            }
            Attempt::Untouched | Attempt::DefaultTried => self.ask_user(kind, attempt).await,
        }
    }

    /// Get a working passcode into the session
    ///
    /// With the default passcode in place, an unchanged SetPin is sent first
    /// and the user is only asked when the card answers invalid parameters.
    async fn provision_secondary(&mut self, provisioning: &mut Provisioning) -> Result<()> {
        let kind = UserCodeKind::Passcode;
        match provisioning.secondary {
            Attempt::Prompted => {
                info!("Entered passcode was refused");
                self.environment.reset_user_code(kind);
                Err(credential_error(kind))
            }
            Attempt::Untouched if !self.environment.is_passcode_default() => {
                debug!("Retrying with the default passcode");
                self.environment.reset_user_code(kind);
                provisioning.secondary = Attempt::DefaultTried;
                Ok(())
            }
            Attempt::Untouched => {
                provisioning.secondary = Attempt::DefaultTried;
                let probe = SetPinCommand::unchanged();
                self.check_preconditions(&probe)?;
                match self.exchange(&probe, provisioning).await {
                    Ok(_) => {
                        debug!("Card accepted the default passcode");
                        self.environment.mark_passcode_provisioned();
                        Ok(())
                    }
                    Err(Error::InvalidParams) => {
                        self.ask_user(kind, &mut provisioning.secondary).await?;
                        self.environment.mark_passcode_provisioned();
                        Ok(())
                    }
                    Err(error) => Err(error),
                }
            }
            Attempt::DefaultTried => {
                self.ask_user(kind, &mut provisioning.secondary).await?;
                self.environment.mark_passcode_provisioned();
                Ok(())
            }
        }
    }

    async fn ask_user(&mut self, kind: UserCodeKind, attempt: &mut Attempt) -> Result<()> {
        self.transport.pause().await;
        match self.prompt.request_credential(kind).await {
            Some(code) => {
                self.environment.set_user_code(kind, &code);
                self.transport.resume().await;
                *attempt = Attempt::Prompted;
                Ok(())
            }
            None => {
                info!(%kind, "User declined to enter the code");
                self.environment.reset_user_code(kind);
                Err(credential_error(kind))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(raw: &'static [u8]) -> ResponseApdu {
        ResponseApdu::from_bytes(Bytes::from_static(raw), 0).unwrap()
    }

    #[test]
    fn test_stall_guard_counts_identical_responses() {
        let mut guard = StallGuard::new(2);
        let pause = response(&[0x1C, 0x02, 0x01, 0x00, 0x97, 0x89]);
        assert!(guard.observe(&pause).is_ok());
        assert!(guard.observe(&pause).is_ok());
        assert_eq!(
            guard.observe(&pause),
            Err(ProtocolError::NoForwardProgress {
                status: StatusWord::NeedPause,
                count: 3,
            })
        );
    }

    #[test]
    fn test_stall_guard_resets_on_change() {
        let mut guard = StallGuard::new(1);
        assert!(guard.observe(&response(&[0x1C, 0x01, 0x02, 0x97, 0x89])).is_ok());
        assert!(guard.observe(&response(&[0x1C, 0x01, 0x01, 0x97, 0x89])).is_ok());
        assert!(guard.observe(&response(&[0x1C, 0x01, 0x01, 0x97, 0x89])).is_err());
    }

    #[test]
    fn test_credential_errors_are_distinct() {
        assert_eq!(
            credential_error(UserCodeKind::AccessCode),
            Error::PrimaryCredentialRequired
        );
        assert_eq!(
            credential_error(UserCodeKind::Passcode),
            Error::SecondaryCredentialOrCvcRequired
        );
    }
}
