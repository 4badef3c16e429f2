//! Domain types shared by the commands

mod card;
mod file;
mod user_code;

pub use card::{
    Card, CardStatus, EllipticCurve, FirmwareVersion, Wallet, WalletIndex, WalletStatus,
};
pub use file::NamedFile;
pub use user_code::{UserCode, UserCodeKind};
