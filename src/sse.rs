// Copyright (c) 2025 - Cowboy AI, LLC.

//! Server-sent event framing
//!
//! Bus subscriptions are exposed as `text/event-stream` bodies. Each frame
//! carries the per-subscription sequence number as a hex `id:` line and the
//! message payload as `data:` lines; handler-side decode failures surface as
//! in-band frames with `event: error` rather than terminating the stream.

/// One server-sent event frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Event id line, typically a hex sequence number
    pub id: Option<String>,
    /// Event type line; absent for plain data events
    pub event: Option<String>,
    /// Event payload; newlines become continuation `data:` lines
    pub data: String,
}

impl SseEvent {
    /// Data event with a hex sequence id
    pub fn message(sequence: u64, data: impl Into<String>) -> Self {
        Self {
            id: Some(format!("{sequence:x}")),
            event: None,
            data: data.into(),
        }
    }

    /// In-band error event carrying a diagnostic
    pub fn error(diagnostic: impl Into<String>) -> Self {
        Self {
            id: None,
            event: Some("error".to_string()),
            data: diagnostic.into(),
        }
    }

    /// Encode the frame in wire form, terminated by a blank line
    pub fn encode(&self) -> String {
        let mut frame = String::new();
        if let Some(event) = &self.event {
            frame.push_str("event: ");
            frame.push_str(event);
            frame.push('\n');
        }
        if let Some(id) = &self.id {
            frame.push_str("id: ");
            frame.push_str(id);
            frame.push('\n');
        }
        for line in self.data.split('\n') {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn message_frames_use_hex_ids() {
        let frame = SseEvent::message(30, r#"{"from":"peer","data":"aGk="}"#).encode();
        assert_eq!(frame, "id: 1e\ndata: {\"from\":\"peer\",\"data\":\"aGk=\"}\n\n");
    }

    #[test]
    fn multiline_data_becomes_continuation_lines() {
        let frame = SseEvent::message(1, "a\nb").encode();
        assert_eq!(frame, "id: 1\ndata: a\ndata: b\n\n");
    }

    #[test]
    fn error_frames_carry_the_event_type() {
        let frame = SseEvent::error("bad payload").encode();
        assert_eq!(frame, "event: error\ndata: bad payload\n\n");
    }
}
