//! Transport layer for card communication
//!
//! The transport moves raw APDU bytes over NFC and owns the reader session.
//! It has no knowledge of command structure, encryption or retries.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::TransportError;

/// Trait for card transports
#[async_trait]
pub trait CardTransport: Send + Sync + fmt::Debug {
    /// Send raw APDU bytes to the card and return the response bytes
    async fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = ?hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command).await;
        match &result {
            Ok(response) => {
                trace!(response = ?hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    async fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Suspend the reader session while the user is being asked for input
    async fn pause(&mut self);

    /// Resume the reader session after [`CardTransport::pause`]
    async fn resume(&mut self);

    /// Re-establish the low level link, e.g. while the card writes to flash
    async fn restart_polling(&mut self);
}
