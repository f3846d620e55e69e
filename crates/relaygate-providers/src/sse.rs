//! Minimal server-sent-events scanner used by the Codex adapter to pull the
//! `response.completed` frame out of a fully-buffered SSE body.
//!
//! This is not a general streaming SSE client: the dispatch engine treats
//! provider streaming output as already-wire-formatted frames it forwards
//! verbatim, so only the non-streaming `complete()` path (which consumes
//! Codex's `responses` SSE endpoint to synthesize a single result) needs to
//! parse events at all.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Splits an SSE body into events separated by blank lines, joining
/// multiple `data:` lines within one event with `\n` per the SSE spec.
pub fn parse_events(body: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut event_name: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    let flush = |event_name: &mut Option<String>, data_lines: &mut Vec<&str>, out: &mut Vec<SseEvent>| {
        if !data_lines.is_empty() {
            out.push(SseEvent {
                event: event_name.take(),
                data: data_lines.join("\n"),
            });
        }
        data_lines.clear();
    };

    for line in body.lines() {
        if line.is_empty() {
            flush(&mut event_name, &mut data_lines, &mut events);
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event_name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }
    flush(&mut event_name, &mut data_lines, &mut events);
    events
}

/// Finds the first event named `response.completed` and returns its JSON
/// payload.
pub fn find_event<'a>(events: &'a [SseEvent], name: &str) -> Option<&'a SseEvent> {
    events.iter().find(|e| e.event.as_deref() == Some(name))
}
