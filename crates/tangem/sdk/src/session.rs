//! Session key negotiation
//!
//! When the card asks for an encryption tier the session has no key for, the
//! executor hands the link to a [`KeyNegotiator`] before serializing the next
//! command. The default [`OpenSessionNegotiator`] runs the OpenSession
//! exchange of the card protocol.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use nexum_tangem_apdu::{EncryptionMode, ResponseApdu, SessionKey};
use tracing::{debug, instrument};

use crate::commands::{OpenSessionCommand, OpenSessionResponse};
use crate::crypto::{EphemeralKey, NONCE_SIZE, derive_fast_key, random_bytes};
use crate::environment::SessionEnvironment;
use crate::error::{ProtocolError, Result};
use crate::transport::CardTransport;

/// Produces the key for the tier currently selected in the environment
#[async_trait]
pub trait KeyNegotiator: Send + Sync + fmt::Debug {
    /// Agree on a key with the card for `environment.encryption_mode()`
    async fn negotiate(
        &self,
        transport: &mut dyn CardTransport,
        environment: &SessionEnvironment,
    ) -> Result<SessionKey>;
}

/// Negotiates keys with the OpenSession instruction
///
/// Fast tier: both sides contribute a nonce and the key is stretched from
/// the access code and the card UID. Strong tier: ephemeral secp256k1 ECDH
/// mixed with the access code.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSessionNegotiator;

impl OpenSessionNegotiator {
    /// Create a new negotiator
    pub const fn new() -> Self {
        Self
    }

    async fn exchange(
        transport: &mut dyn CardTransport,
        environment: &SessionEnvironment,
        command: &OpenSessionCommand,
    ) -> Result<OpenSessionResponse> {
        let bytes = command.serialize(environment)?.to_bytes()?;
        let raw = transport.transmit_raw(&bytes).await?;
        let response = ResponseApdu::from_bytes(raw, environment.key_epoch())?;
        command.deserialize(&response)
    }
}

#[async_trait]
impl KeyNegotiator for OpenSessionNegotiator {
    #[instrument(level = "debug", skip_all, fields(mode = %environment.encryption_mode()))]
    async fn negotiate(
        &self,
        transport: &mut dyn CardTransport,
        environment: &SessionEnvironment,
    ) -> Result<SessionKey> {
        let mode = environment.encryption_mode();
        let key = match mode {
            EncryptionMode::None => {
                return Err(ProtocolError::KeyNegotiation("no key for the plain tier").into());
            }
            EncryptionMode::Fast => {
                let nonce: [u8; NONCE_SIZE] = random_bytes();
                let command = OpenSessionCommand::new(mode, Bytes::copy_from_slice(&nonce));
                let response = Self::exchange(transport, environment, &command).await?;
                derive_fast_key(
                    environment.access_code(),
                    &response.uid,
                    &nonce,
                    &response.session_key_b,
                )
            }
            EncryptionMode::Strong => {
                let ephemeral = EphemeralKey::generate();
                let command = OpenSessionCommand::new(mode, ephemeral.public_key());
                let response = Self::exchange(transport, environment, &command).await?;
                ephemeral.derive_key(&response.session_key_b, environment.access_code())?
            }
        };
        debug!("Session key negotiated");
        Ok(key)
    }
}
