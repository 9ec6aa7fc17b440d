//! # Command dispatcher
//!
//! Single in-flight command slot with timeout supervision. The slot state
//! machine is driven by [Driver](crate::driver::Driver), which feeds it every
//! tokenized line and checks the deadline on each poll.
use crate::commands::Verb;
use heapless::String;

/// Accumulated response text capacity per command
pub(crate) const RESPONSE_CAPACITY: usize = 256;

/// Result code of a command-issuing operation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Command resolved with a failure terminator (`ERROR`, `FAIL`, `SEND FAIL` or a busy reject)
    Failed,

    /// The co-processor did not respond to the reset/probe sequence
    DeviceNotConnected,

    /// No matching terminator arrived within the timeout threshold
    Timeout,

    /// The referenced link id is out of range, inactive or already taken
    LinkNotValid,

    /// A value did not fit its fixed capacity
    OutOfMemory,

    /// The operation requires a joined access point
    WifiNotConnected,

    /// Another command is still unresolved
    Busy,
}

/// Externally visible state of the command slot
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandStatus {
    /// No command in flight
    Idle,

    /// Waiting for the active command's terminator
    Pending,

    /// Readiness prompt received, the engine expects the raw payload next
    PromptReady,

    /// Resolution happened but has not been picked up by `poll()` yet
    Resolved,
}

/// Internal slot state. `Resolved` holds the result until the caller polls.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    Idle,
    Sent,
    WaitingPrompt,
    Resolved(Result<(), CommandError>),
}

/// Terminator classification of one textual line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Reply {
    Ok,
    Error,
    /// `busy p...`, the firmware rejected the input while processing
    Busy,
    /// `FAIL`, terminates a failed join
    Fail,
    SendOk,
    SendFail,
    /// Not a terminator
    Text,
}

/// The boot banner `ready` also terminates reset style commands, but it is
/// classified on the URC path instead.
pub(crate) fn classify(line: &[u8]) -> Reply {
    match line {
        b"OK" => Reply::Ok,
        b"ERROR" => Reply::Error,
        b"busy p..." => Reply::Busy,
        b"FAIL" => Reply::Fail,
        b"SEND OK" => Reply::SendOk,
        b"SEND FAIL" => Reply::SendFail,
        _ => Reply::Text,
    }
}

/// The single command slot
pub(crate) struct Slot {
    state: SlotState,
    verb: Option<Verb>,
    response: String<RESPONSE_CAPACITY>,
}

impl Slot {
    pub(crate) const fn new() -> Self {
        Self {
            state: SlotState::Idle,
            verb: None,
            response: String::new(),
        }
    }

    pub(crate) fn issue(&mut self, verb: Verb) {
        self.state = SlotState::Sent;
        self.verb = Some(verb);
        self.response.clear();
    }

    pub(crate) fn verb(&self) -> Option<Verb> {
        self.verb
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.state == SlotState::Idle
    }

    /// True while a resolution is still outstanding
    pub(crate) fn is_active(&self) -> bool {
        matches!(self.state, SlotState::Sent | SlotState::WaitingPrompt)
    }

    pub(crate) fn is_waiting_prompt(&self) -> bool {
        self.state == SlotState::WaitingPrompt
    }

    pub(crate) fn status(&self) -> CommandStatus {
        match self.state {
            SlotState::Idle => CommandStatus::Idle,
            SlotState::Sent => CommandStatus::Pending,
            SlotState::WaitingPrompt => CommandStatus::PromptReady,
            SlotState::Resolved(_) => CommandStatus::Resolved,
        }
    }

    /// Enters the prompt-wait phase of the raw-payload handshake
    pub(crate) fn wait_prompt(&mut self) {
        if self.state == SlotState::Sent {
            self.state = SlotState::WaitingPrompt;
        }
    }

    /// Leaves the prompt-wait phase once the payload went out
    pub(crate) fn payload_sent(&mut self, verb: Verb) {
        if self.state == SlotState::WaitingPrompt {
            self.state = SlotState::Sent;
            self.verb = Some(verb);
        }
    }

    /// Resolves the active command exactly once. Calls while idle or already
    /// resolved are ignored, so a late terminator cannot double-resolve.
    pub(crate) fn resolve(&mut self, result: Result<(), CommandError>) {
        if self.is_active() {
            self.state = SlotState::Resolved(result);
        }
    }

    /// Hands out the resolution and returns the slot to idle
    pub(crate) fn take_result(&mut self) -> Option<Result<(), CommandError>> {
        if let SlotState::Resolved(result) = self.state {
            self.state = SlotState::Idle;
            self.verb = None;
            Some(result)
        } else {
            None
        }
    }

    /// Appends one payload line to the accumulated response text. Lines
    /// beyond the capacity are dropped silently.
    pub(crate) fn append_response(&mut self, line: &[u8]) {
        if let Ok(text) = core::str::from_utf8(line) {
            if !self.response.is_empty() {
                let _ = self.response.push('\n');
            }
            let _ = self.response.push_str(text);
        }
    }

    pub(crate) fn response(&self) -> &str {
        &self.response
    }

    /// Drops all slot state without resolving. Escape hatch for abandoned
    /// commands, see `Driver::abort`.
    pub(crate) fn reset(&mut self) {
        self.state = SlotState::Idle;
        self.verb = None;
        self.response.clear();
    }
}
