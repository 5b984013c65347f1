// File: src/sip/call_tracker.rs
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// INVITE seen, no final answer yet.
    Inviting,
    /// Callee answered with 200.
    Established,
}

/// Outcome of a tracker transition, turned into a call-log line by the
/// router. Routing decisions never consult the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    Accepted,
    Declined,
    Busy,
    Terminated,
    Bye,
    BadRequest,
    TemporarilyUnavailable,
    InternalError,
}

/// Best-effort call-id to status map feeding the audit log.
#[derive(Debug, Default)]
pub struct CallTracker {
    calls: HashMap<String, CallStatus>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this INVITE is the first for its call id and a
    /// new record was created. Repeats for a call already Inviting or
    /// Established are not re-logged.
    pub fn on_invite(&mut self, call_id: &str) -> bool {
        if self.calls.contains_key(call_id) {
            return false;
        }
        self.calls.insert(call_id.to_string(), CallStatus::Inviting);
        true
    }

    /// Final answer to a tracked INVITE. 200 moves the call to
    /// Established and keeps the record; 603/486/487 emit their event and
    /// drop it. No-op unless the call is still Inviting.
    pub fn on_final_response(&mut self, call_id: &str, code: u16) -> Option<CallEvent> {
        if self.calls.get(call_id).copied() != Some(CallStatus::Inviting) {
            return None;
        }
        match code {
            200 => {
                self.calls.insert(call_id.to_string(), CallStatus::Established);
                Some(CallEvent::Accepted)
            }
            603 => {
                self.calls.remove(call_id);
                Some(CallEvent::Declined)
            }
            486 => {
                self.calls.remove(call_id);
                Some(CallEvent::Busy)
            }
            487 => {
                self.calls.remove(call_id);
                Some(CallEvent::Terminated)
            }
            _ => {
                self.calls.remove(call_id);
                None
            }
        }
    }

    /// No-op unless the call is Established; emits the bye event and
    /// drops the record.
    pub fn on_bye(&mut self, call_id: &str) -> Option<CallEvent> {
        if self.calls.get(call_id).copied() != Some(CallStatus::Established) {
            return None;
        }
        self.calls.remove(call_id);
        Some(CallEvent::Bye)
    }

    /// A local error reply (400/480/500) ended the attempt. No-op unless
    /// the call is still Inviting.
    pub fn on_local_error(&mut self, call_id: &str, code: u16) -> Option<CallEvent> {
        if self.calls.get(call_id).copied() != Some(CallStatus::Inviting) {
            return None;
        }
        self.calls.remove(call_id);
        match code {
            400 => Some(CallEvent::BadRequest),
            480 => Some(CallEvent::TemporarilyUnavailable),
            500 => Some(CallEvent::InternalError),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn status(&self, call_id: &str) -> Option<CallStatus> {
        self.calls.get(call_id).copied()
    }
}
