use std::fmt;

use bytes::Bytes;
use derive_more::Display;
use nexum_tangem_apdu::{Tag, TlvError, ToTlvValue};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Which user code slot a value belongs to
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserCodeKind {
    /// Access code (PIN1), guards every command
    #[display("access code")]
    AccessCode,
    /// Passcode (PIN2), guards sensitive commands
    #[display("passcode")]
    Passcode,
}

/// A user code as the card sees it: the SHA-256 hash of the entered text
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct UserCode([u8; 32]);

impl UserCode {
    /// Hash an entered code
    pub fn new(code: &str) -> Self {
        Self(Sha256::digest(code.as_bytes()).into())
    }

    /// Hashed value sent to the card
    pub const fn value(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for UserCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UserCode(..)")
    }
}

impl ToTlvValue for UserCode {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        self.0.as_slice().to_tlv_value(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_hashed() {
        let code = UserCode::new("000000");
        assert_eq!(
            hex::encode(code.value()),
            "91b4d142823f7d20c5f08df69122de43f35f057a988d9619f6d3138485c9a203"
        );
        assert_eq!(code, UserCode::new("000000"));
        assert_ne!(code, UserCode::new("000"));
    }
}
