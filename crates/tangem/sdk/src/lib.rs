//! Command execution engine for Tangem cards
//!
//! A [`SessionExecutor`] drives card commands over any [`CardTransport`]:
//! it negotiates body encryption when the card asks for it, waits out
//! security delays, and provisions the access code and passcode through a
//! [`PromptService`] when the card refuses them.
//!
//! ```no_run
//! # async fn example<T: nexum_tangem::CardTransport>(transport: T) -> nexum_tangem::Result<()> {
//! use nexum_tangem::{ChannelPrompt, CheckPinCommand, SessionExecutor};
//!
//! let (prompt, _receivers) = ChannelPrompt::new(4);
//! let mut executor = SessionExecutor::new(transport, prompt);
//! let codes = executor.execute(&CheckPinCommand::new()).await?;
//! println!("default access code: {}", codes.is_access_code_default);
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod command;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod environment;
pub mod error;
pub mod executor;
pub mod prompt;
pub mod session;
pub mod transport;
pub mod types;

pub use command::{Command, PreflightReadSettings};
pub use commands::*;
pub use config::{DEFAULT_ACCESS_CODE, DEFAULT_PASSCODE, SessionConfig};
pub use crypto::{Secp256k1Verifier, SignatureVerifier};
pub use environment::SessionEnvironment;
pub use error::{Error, ProtocolError, Result, TransportError};
pub use executor::SessionExecutor;
pub use prompt::{ChannelPrompt, PromptEvent, PromptReceivers, PromptRequest, PromptService};
pub use session::{KeyNegotiator, OpenSessionNegotiator};
pub use transport::CardTransport;
pub use types::{
    Card, CardStatus, EllipticCurve, FirmwareVersion, NamedFile, UserCode, UserCodeKind, Wallet,
    WalletIndex, WalletStatus,
};

pub use nexum_tangem_apdu::{EncryptionMode, SessionKey, StatusWord};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        CardTransport, Command, EncryptionMode, Error, PromptService, Result, SessionConfig,
        SessionEnvironment, SessionExecutor,
    };
}
