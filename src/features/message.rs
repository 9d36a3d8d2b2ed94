use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Success,
    Warning,
    Error,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Success => "success",
            MessageKind::Warning => "warning",
            MessageKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub text: String,
    pub kind: MessageKind,
    pub expires_at_ms: u64,
}

/// Single-slot feedback banner. A new notification always replaces the
/// current one, together with its expiry deadline.
#[derive(Debug, Clone)]
pub struct MessageChannel {
    slot: Option<StatusMessage>,
    timeout_ms: u64,
}

impl MessageChannel {
    pub const fn new(timeout_ms: u64) -> Self {
        Self {
            slot: None,
            timeout_ms,
        }
    }

    pub fn set_timeout(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    /// Shows `text` until `now_ms + timeout`. Returns the deadline so the
    /// caller can ask the host for a tick.
    pub fn notify(&mut self, text: impl Into<String>, kind: MessageKind, now_ms: u64) -> u64 {
        let expires_at_ms = now_ms.saturating_add(self.timeout_ms);
        let text = text.into();
        log::debug!("message[{}]: {}", kind.as_str(), text);
        self.slot = Some(StatusMessage {
            text,
            kind,
            expires_at_ms,
        });
        expires_at_ms
    }

    pub fn success(&mut self, text: impl Into<String>, now_ms: u64) -> u64 {
        self.notify(text, MessageKind::Success, now_ms)
    }

    pub fn warning(&mut self, text: impl Into<String>, now_ms: u64) -> u64 {
        self.notify(text, MessageKind::Warning, now_ms)
    }

    pub fn error(&mut self, text: impl Into<String>, now_ms: u64) -> u64 {
        self.notify(text, MessageKind::Error, now_ms)
    }

    /// Drops the message once its deadline has passed.
    pub fn expire(&mut self, now_ms: u64) -> bool {
        match &self.slot {
            Some(msg) if now_ms >= msg.expires_at_ms => {
                self.slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.slot.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_notification_replaces_first() {
        let mut channel = MessageChannel::new(3000);
        channel.success("first", 10);
        channel.error("second", 20);
        let msg = channel.current().expect("message visible");
        assert_eq!(msg.text, "second");
        assert_eq!(msg.kind, MessageKind::Error);
        assert_eq!(msg.expires_at_ms, 3020);
    }

    #[test]
    fn message_expires_after_timeout() {
        let mut channel = MessageChannel::new(3000);
        let deadline = channel.warning("careful", 1_000);
        assert!(!channel.expire(deadline - 1));
        assert!(channel.current().is_some());
        assert!(channel.expire(deadline));
        assert!(channel.current().is_none());
    }

    #[test]
    fn replaced_message_keeps_new_deadline() {
        let mut channel = MessageChannel::new(3000);
        channel.success("old", 0);
        channel.success("new", 2_500);
        // The first deadline has passed, the second has not.
        assert!(!channel.expire(3_000));
        assert_eq!(channel.current().map(|m| m.text.as_str()), Some("new"));
    }
}
