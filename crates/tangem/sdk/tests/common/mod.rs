//! Scripted card and prompt for executor tests
#![allow(dead_code, unreachable_pub)]

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use nexum_tangem::{
    CardStatus, CardTransport, PromptService, SessionKey, TransportError, UserCodeKind,
};
use nexum_tangem_apdu::{Tag, TlvBuilder};

/// Card id used by every fixture
pub const CARD_ID: &str = "CB79000000018201";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

type Responder = Box<dyn FnMut(&[u8]) -> Bytes + Send + Sync>;

enum Step {
    Reply(Bytes),
    Fail(TransportError),
    Respond(Responder),
}

/// Card answering from a fixed script and recording what it was sent
#[derive(Default)]
pub struct MockCard {
    script: VecDeque<Step>,
    pub sent: Vec<Bytes>,
    pub pauses: usize,
    pub resumes: usize,
    pub restarts: usize,
}

impl fmt::Debug for MockCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockCard")
            .field("remaining", &self.script.len())
            .field("sent", &self.sent.len())
            .finish()
    }
}

impl MockCard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next command with `raw`
    pub fn reply(mut self, raw: impl Into<Bytes>) -> Self {
        self.script.push_back(Step::Reply(raw.into()));
        self
    }

    /// Fail the next exchange
    pub fn fail(mut self, error: TransportError) -> Self {
        self.script.push_back(Step::Fail(error));
        self
    }

    /// Compute the answer to the next command from its bytes
    pub fn respond(mut self, responder: impl FnMut(&[u8]) -> Bytes + Send + Sync + 'static) -> Self {
        self.script.push_back(Step::Respond(Box::new(responder)));
        self
    }

    /// Script entries not consumed yet
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl CardTransport for MockCard {
    async fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.sent.push(Bytes::copy_from_slice(command));
        match self.script.pop_front() {
            Some(Step::Reply(raw)) => Ok(raw),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Respond(mut responder)) => Ok(responder(command)),
            None => Err(TransportError::Transmission("script exhausted".to_string())),
        }
    }

    async fn pause(&mut self) {
        self.pauses += 1;
    }

    async fn resume(&mut self) {
        self.resumes += 1;
    }

    async fn restart_polling(&mut self) {
        self.restarts += 1;
    }
}

/// Prompt answering from a fixed list and recording what it was asked
#[derive(Debug, Default)]
pub struct MockPrompt {
    answers: Mutex<VecDeque<Option<String>>>,
    asked: Mutex<Vec<UserCodeKind>>,
    delays: Mutex<Vec<u32>>,
}

impl MockPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next request with `answer`, `None` cancels
    pub fn answer(self, answer: Option<&str>) -> Self {
        self.answers
            .lock()
            .unwrap()
            .push_back(answer.map(str::to_string));
        self
    }

    pub fn asked(&self) -> Vec<UserCodeKind> {
        self.asked.lock().unwrap().clone()
    }

    pub fn delays(&self) -> Vec<u32> {
        self.delays.lock().unwrap().clone()
    }

    fn next(&self, kind: UserCodeKind) -> Option<String> {
        self.asked.lock().unwrap().push(kind);
        self.answers.lock().unwrap().pop_front().flatten()
    }
}

#[async_trait]
impl PromptService for MockPrompt {
    fn report_security_delay(&self, remaining_ms: u32) {
        self.delays.lock().unwrap().push(remaining_ms);
    }

    async fn request_primary_credential(&self) -> Option<String> {
        self.next(UserCodeKind::AccessCode)
    }

    async fn request_secondary_credential(&self) -> Option<String> {
        self.next(UserCodeKind::Passcode)
    }
}

/// Status-only response
pub fn status(sw: u16) -> Bytes {
    Bytes::copy_from_slice(&sw.to_be_bytes())
}

/// Plain body followed by `sw`
pub fn reply(builder: TlvBuilder, sw: u16) -> Bytes {
    let mut raw = builder.serialize().unwrap().to_vec();
    raw.extend_from_slice(&sw.to_be_bytes());
    Bytes::from(raw)
}

/// Plain body followed by 90 00
pub fn success(builder: TlvBuilder) -> Bytes {
    reply(builder, 0x9000)
}

/// Body encrypted under `key` followed by 90 00
pub fn encrypted_success(key: &SessionKey, builder: TlvBuilder) -> Bytes {
    let mut raw = key
        .encrypt(&builder.serialize().unwrap())
        .unwrap()
        .to_vec();
    raw.extend_from_slice(&[0x90, 0x00]);
    Bytes::from(raw)
}

/// Security delay response
pub fn pause(remaining_ms: u32, save_to_flash: bool) -> Bytes {
    let builder = TlvBuilder::new().append(Tag::Pause, &remaining_ms);
    let builder = if save_to_flash {
        builder.append(Tag::Flash, &true)
    } else {
        builder
    };
    reply(builder, 0x9789)
}

/// Read response for a loaded card
pub fn card(firmware: &str) -> TlvBuilder {
    TlvBuilder::new()
        .append(Tag::CardId, CARD_ID)
        .append(Tag::ManufacturerName, "TANGEM")
        .append(Tag::Status, &CardStatus::Loaded)
        .append(Tag::FirmwareVersion, firmware)
}

/// Response carrying only the card id
pub fn card_id() -> TlvBuilder {
    TlvBuilder::new().append(Tag::CardId, CARD_ID)
}

/// Body of a command APDU, past the header and extended Lc
pub fn body(apdu: &[u8]) -> &[u8] {
    if apdu.len() > 9 {
        &apdu[7..apdu.len() - 2]
    } else {
        &[]
    }
}
