//! Server-Sent Events wire format
//!
//! Line-oriented SSE decoding. The engine feeds raw chunks from a push
//! connection through a decoder and routes the resulting events.

/// SSE message event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event_type: String,
    pub data: String,
    pub last_event_id: String,
}

impl Default for SseEvent {
    fn default() -> Self {
        Self {
            event_type: "message".to_string(),
            data: String::new(),
            last_event_id: String::new(),
        }
    }
}

/// Incremental SSE decoder
///
/// Feed raw wire data in any chunking; completed events come out.
#[derive(Debug, Default)]
pub struct SseDecoder {
    current: SseEvent,
    pending_line: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of wire data, returning every event it completed
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for ch in chunk.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.pending_line);
                if let Some(event) = parse_sse_line(&line, &mut self.current) {
                    events.push(event);
                }
            } else {
                self.pending_line.push(ch);
            }
        }
        events
    }

    /// Flush a trailing unterminated line (connection closed mid-stream)
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.pending_line.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending_line);
        parse_sse_line(&line, &mut self.current);
        parse_sse_line("", &mut self.current)
    }
}

/// Process one SSE line; a blank line dispatches the accumulated event
pub fn parse_sse_line(line: &str, current_event: &mut SseEvent) -> Option<SseEvent> {
    let line = line.trim_end_matches('\r');

    if line.is_empty() {
        if !current_event.data.is_empty() {
            let event = std::mem::take(current_event);
            return Some(event);
        }
        return None;
    }

    if line.starts_with(':') {
        // Comment, ignore
        return None;
    }

    let (field, value) = if let Some(colon) = line.find(':') {
        let value = line[colon + 1..].trim_start_matches(' ');
        (&line[..colon], value)
    } else {
        (line, "")
    };

    match field {
        "event" => current_event.event_type = value.to_string(),
        "data" => {
            if !current_event.data.is_empty() {
                current_event.data.push('\n');
            }
            current_event.data.push_str(value);
        }
        "id" => current_event.last_event_id = value.to_string(),
        "retry" => { /* reconnection policy is the transport's business */ }
        _ => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse() {
        let mut event = SseEvent::default();

        parse_sse_line("event: update", &mut event);
        assert_eq!(event.event_type, "update");

        parse_sse_line("data: hello", &mut event);
        assert_eq!(event.data, "hello");

        let result = parse_sse_line("", &mut event);
        assert!(result.is_some());
        assert_eq!(event.data, "", "dispatch resets the accumulator");
    }

    #[test]
    fn test_decoder_chunking() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed("data: par").is_empty());
        let events = dec.feed("tial\n\ndata: second\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "partial");
        assert_eq!(events[1].data, "second");
    }

    #[test]
    fn test_multiline_data() {
        let mut dec = SseDecoder::new();
        let events = dec.feed("data: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_comments_ignored() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(": keepalive\n\n").is_empty());
    }

    #[test]
    fn test_named_event() {
        let mut dec = SseDecoder::new();
        let events = dec.feed("event: row-added\ndata: <li>x</li>\n\n");
        assert_eq!(events[0].event_type, "row-added");
    }
}
