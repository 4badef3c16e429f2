//! Card commands
//!
//! Every command implements [`Command`](crate::command::Command) and is run
//! through a [`SessionExecutor`](crate::executor::SessionExecutor), except
//! [`OpenSessionCommand`], which the key negotiator sends on its own.

mod check_pin;
mod check_wallet;
mod open_session;
mod read;
mod read_wallet;
mod set_pin;

pub use check_pin::{CheckPinCommand, CheckPinResponse};
pub use check_wallet::{CheckWalletCommand, CheckWalletResponse};
pub use open_session::{OpenSessionCommand, OpenSessionResponse};
pub use read::{InteractionMode, ReadCommand};
pub use read_wallet::{
    ReadWalletCommand, ReadWalletListCommand, ReadWalletListResponse, ReadWalletResponse,
};
pub use set_pin::{SetPinCommand, SetPinResponse, SetPinStatus};
