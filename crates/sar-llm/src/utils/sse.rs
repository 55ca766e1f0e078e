//! Incremental Server-Sent Events (SSE) parser.

/// A parsed SSE event.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

impl SseEvent {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty() && self.id.is_none() && self.retry.is_none()
    }
}

/// Accepts arbitrary byte-stream chunks and yields completed events.
///
/// Lines may be split across chunks; an event is complete at the first blank
/// line after at least one field.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    current: SseEvent,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a text chunk and return any completed events.
    pub fn push(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush any remaining buffered event when the stream ends.
    pub fn finish(mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches(['\r', '\n']);
        if !rest.is_empty() {
            if let Some(event) = self.process_line(rest) {
                return Some(event);
            }
        }
        (!self.current.is_empty()).then_some(self.current)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if self.current.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.current));
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field {
            "event" => self.current.event = Some(value.to_string()),
            "data" => {
                if !self.current.data.is_empty() {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
            }
            "id" => self.current.id = Some(value.to_string()),
            "retry" => self.current.retry = value.parse().ok(),
            _ => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiline_data() {
        let mut parser = SseParser::new();
        let events = parser.push("data: hello\ndata: world\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello\nworld");
    }

    #[test]
    fn joins_lines_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push("data: {\"choi").is_empty());
        let events = parser.push("ces\":[]}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"choices\":[]}");
    }

    #[test]
    fn ignores_comments_and_handles_event_id_retry() {
        let mut parser = SseParser::new();
        let events = parser.push(": ping\nevent: message\nid: 42\nretry: 1500\ndata: hi\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].id.as_deref(), Some("42"));
        assert_eq!(events[0].retry, Some(1500));
        assert_eq!(events[0].data, "hi");
    }

    #[test]
    fn finish_flushes_trailing_event_without_terminal_newline() {
        let mut parser = SseParser::new();
        assert!(parser.push("data: [DONE]").is_empty());
        let trailing = parser.finish().expect("expected trailing event");
        assert_eq!(trailing.data, "[DONE]");
    }

    #[test]
    fn finish_on_clean_boundary_yields_nothing() {
        let mut parser = SseParser::new();
        let events = parser.push("data: a\n\n");
        assert_eq!(events.len(), 1);
        assert!(parser.finish().is_none());
    }
}
