//! Coalesces adjacent `TEXT_MESSAGE_CONTENT` deltas for the same message
//! into fewer, larger SSE frames.
//!
//! Sits downstream of [`crate::translator::EventTranslator`] in the pump
//! loop. Every other event type passes straight through; only contiguous
//! content deltas for one message id are buffered and merged. The buffer
//! is flushed (as a single `TEXT_MESSAGE_CONTENT`) the moment a
//! non-matching event arrives or the run controller ticks its periodic
//! flush timer.

use ag_domain::event::AgUiEvent;

/// Per-run aggregation state. One instance lives alongside the
/// `EventTranslator` for the duration of a run.
pub struct Aggregator {
    enabled: bool,
    buffered: Option<(String, String)>,
}

impl Aggregator {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            buffered: None,
        }
    }

    /// Feed one translated event through the aggregator. Returns zero or
    /// more events ready to be written to the SSE stream — usually zero
    /// (the delta was absorbed into the buffer) or one (a flush, or a
    /// pass-through event).
    pub fn append(&mut self, event: AgUiEvent) -> Vec<AgUiEvent> {
        if !self.enabled {
            return vec![event];
        }

        match event {
            AgUiEvent::TextMessageContent { message_id, delta } => {
                match &mut self.buffered {
                    Some((buffered_id, buffer)) if *buffered_id == message_id => {
                        buffer.push_str(&delta);
                        Vec::new()
                    }
                    _ => {
                        let out = self.flush();
                        self.buffered = Some((message_id, delta));
                        out
                    }
                }
            }
            other => {
                let mut out = self.flush();
                out.push(other);
                out
            }
        }
    }

    /// Emit the buffered content delta (if any) as a single event. Called
    /// by the run controller on its periodic flush tick and unconditionally
    /// before the terminal event is written.
    pub fn flush(&mut self) -> Vec<AgUiEvent> {
        match self.buffered.take() {
            Some((message_id, delta)) if !delta.is_empty() => {
                vec![AgUiEvent::TextMessageContent { message_id, delta }]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(id: &str, delta: &str) -> AgUiEvent {
        AgUiEvent::TextMessageContent {
            message_id: id.to_string(),
            delta: delta.to_string(),
        }
    }

    fn deltas_of(events: &[AgUiEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                AgUiEvent::TextMessageContent { delta, .. } => Some(delta.clone()),
                _ => None,
            })
            .collect()
    }

    /// S2 — three partial deltas for one message coalesce into one frame.
    #[test]
    fn coalesces_adjacent_deltas_for_same_message() {
        let mut agg = Aggregator::new(true);
        assert!(agg.append(content("m1", "foo")).is_empty());
        assert!(agg.append(content("m1", "bar")).is_empty());
        assert!(agg.append(content("m1", "baz")).is_empty());

        let flushed = agg.flush();
        assert_eq!(deltas_of(&flushed), vec!["foobarbaz"]);
    }

    #[test]
    fn disabled_aggregation_passes_every_delta_through() {
        let mut agg = Aggregator::new(false);
        let out1 = agg.append(content("m1", "foo"));
        let out2 = agg.append(content("m1", "bar"));
        let out3 = agg.append(content("m1", "baz"));

        assert_eq!(deltas_of(&out1), vec!["foo"]);
        assert_eq!(deltas_of(&out2), vec!["bar"]);
        assert_eq!(deltas_of(&out3), vec!["baz"]);
    }

    #[test]
    fn switching_message_id_flushes_previous_buffer() {
        let mut agg = Aggregator::new(true);
        assert!(agg.append(content("m1", "foo")).is_empty());
        let out = agg.append(content("m2", "bar"));
        assert_eq!(deltas_of(&out), vec!["foo"]);

        let flushed = agg.flush();
        assert_eq!(deltas_of(&flushed), vec!["bar"]);
    }

    #[test]
    fn non_content_event_flushes_buffer_and_passes_through() {
        let mut agg = Aggregator::new(true);
        assert!(agg.append(content("m1", "foo")).is_empty());

        let end = AgUiEvent::TextMessageEnd {
            message_id: "m1".to_string(),
        };
        let out = agg.append(end);
        assert_eq!(out.len(), 2);
        assert_eq!(deltas_of(&out), vec!["foo"]);
        assert!(matches!(out[1], AgUiEvent::TextMessageEnd { .. }));
    }

    #[test]
    fn empty_buffer_flush_is_a_no_op() {
        let mut agg = Aggregator::new(true);
        assert!(agg.flush().is_empty());
    }
}
