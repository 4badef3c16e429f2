use nexum_tangem_apdu::{CommandApdu, Instruction, ResponseApdu, StatusWord, Tag, TlvDecoder};

use crate::command::Command;
use crate::environment::SessionEnvironment;
use crate::error::{Error, Result};
use crate::types::UserCode;

/// Which codes a SetPin changed, as reported by the status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SetPinStatus {
    /// Nothing changed
    PinsNotChanged,
    /// Access code changed
    Pin1Changed,
    /// Passcode changed
    Pin2Changed,
    /// Third code changed
    Pin3Changed,
    /// Access code and passcode changed
    Pins12Changed,
    /// Access code and third code changed
    Pins13Changed,
    /// Passcode and third code changed
    Pins23Changed,
    /// Every code changed
    Pins123Changed,
}

impl SetPinStatus {
    /// Resolve from a success status word
    pub const fn from_status(status: StatusWord) -> Option<Self> {
        match status {
            StatusWord::ProcessCompleted => Some(Self::PinsNotChanged),
            StatusWord::Pin1Changed => Some(Self::Pin1Changed),
            StatusWord::Pin2Changed => Some(Self::Pin2Changed),
            StatusWord::Pin3Changed => Some(Self::Pin3Changed),
            StatusWord::Pins12Changed => Some(Self::Pins12Changed),
            StatusWord::Pins13Changed => Some(Self::Pins13Changed),
            StatusWord::Pins23Changed => Some(Self::Pins23Changed),
            StatusWord::Pins123Changed => Some(Self::Pins123Changed),
            _ => None,
        }
    }
}

/// Result of [`SetPinCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetPinResponse {
    /// Card identifier
    pub card_id: String,
    /// Codes changed by the command
    pub status: SetPinStatus,
}

/// Change the access code and/or the passcode
///
/// Codes left unset are sent unchanged, taken from the session at the time
/// the command is serialized. Sending both unchanged is how the executor
/// probes whether the current passcode is accepted.
#[derive(Debug, Clone, Default)]
pub struct SetPinCommand {
    new_access_code: Option<UserCode>,
    new_passcode: Option<UserCode>,
}

impl SetPinCommand {
    /// Change both codes
    pub fn new(access_code: &str, passcode: &str) -> Self {
        Self {
            new_access_code: Some(UserCode::new(access_code)),
            new_passcode: Some(UserCode::new(passcode)),
        }
    }

    /// Change only the access code
    pub fn access_code(code: &str) -> Self {
        Self {
            new_access_code: Some(UserCode::new(code)),
            new_passcode: None,
        }
    }

    /// Change only the passcode
    pub fn passcode(code: &str) -> Self {
        Self {
            new_access_code: None,
            new_passcode: Some(UserCode::new(code)),
        }
    }

    /// Send the current codes as the new ones
    pub const fn unchanged() -> Self {
        Self {
            new_access_code: None,
            new_passcode: None,
        }
    }
}

impl Command for SetPinCommand {
    type Response = SetPinResponse;

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let new_access_code = self
            .new_access_code
            .as_ref()
            .unwrap_or_else(|| environment.access_code());
        let new_passcode = self
            .new_passcode
            .as_ref()
            .unwrap_or_else(|| environment.passcode());

        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.access_code())
            .append(Tag::Pin2, environment.passcode())
            .append(Tag::CardId, &environment.card_id())
            .append(Tag::NewPin, new_access_code)
            .append(Tag::NewPin2, new_passcode)
            .append(Tag::Cvc, &environment.cvc());
        Ok(CommandApdu::from_builder(Instruction::SetPin, &builder)?)
    }

    fn deserialize(
        &self,
        environment: &SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<SetPinResponse> {
        let tlvs = environment.decode(response)?;
        let status = SetPinStatus::from_status(response.status()).ok_or_else(|| {
            Error::DeserializationFailed(format!("unexpected status {}", response.status()))
        })?;
        Ok(SetPinResponse {
            card_id: TlvDecoder::new(&tlvs).decode(Tag::CardId)?,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use nexum_tangem_apdu::{Tlv, TlvBuilder};

    fn body(command: &SetPinCommand, env: &SessionEnvironment) -> Vec<Tlv> {
        let apdu = command.serialize(env).unwrap();
        assert_eq!(apdu.instruction(), Instruction::SetPin);
        Tlv::deserialize(apdu.payload()).unwrap()
    }

    #[test]
    fn test_unchanged_sends_current_codes() {
        let mut env = SessionEnvironment::default();
        env.set_passcode("1234");
        let tlvs = body(&SetPinCommand::unchanged(), &env);
        let decoder = TlvDecoder::new(&tlvs);

        let pin2: Bytes = decoder.decode(Tag::Pin2).unwrap();
        let new_pin2: Bytes = decoder.decode(Tag::NewPin2).unwrap();
        assert_eq!(pin2, new_pin2);
        assert_eq!(pin2.as_ref(), UserCode::new("1234").value());
        assert!(!decoder.contains(Tag::Cvc));
    }

    #[test]
    fn test_new_passcode_and_cvc() {
        let mut env = SessionEnvironment::default();
        env.set_cvc(Some("123".to_string()));
        let tlvs = body(&SetPinCommand::passcode("5555"), &env);
        let decoder = TlvDecoder::new(&tlvs);

        let new_pin: Bytes = decoder.decode(Tag::NewPin).unwrap();
        let new_pin2: Bytes = decoder.decode(Tag::NewPin2).unwrap();
        assert_eq!(new_pin.as_ref(), env.access_code().value());
        assert_eq!(new_pin2.as_ref(), UserCode::new("5555").value());
        assert_eq!(decoder.decode::<String>(Tag::Cvc).unwrap(), "123");
    }

    #[test]
    fn test_status_from_status_word() {
        let env = SessionEnvironment::default();
        let mut raw = TlvBuilder::new()
            .append(Tag::CardId, "CB79000000018201")
            .serialize()
            .unwrap()
            .to_vec();
        raw.extend_from_slice(&[0x90, 0x03]);
        let response = ResponseApdu::from_bytes(Bytes::from(raw), 0).unwrap();

        let result = SetPinCommand::unchanged().deserialize(&env, &response).unwrap();
        assert_eq!(result.status, SetPinStatus::Pins12Changed);
        assert_eq!(result.card_id, "CB79000000018201");
    }
}
