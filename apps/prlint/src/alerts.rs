//! Outbound notices, collapsed so a repeated message is sent once with a count.

use std::collections::HashMap;

/// Collapse repeated messages, keeping first-seen order.
///
/// A message seen N > 1 times becomes `"(Nx) message"`.
pub fn flush<S: AsRef<str>>(messages: &[S]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for m in messages {
        let m = m.as_ref();
        let n = counts.entry(m).or_insert(0);
        if *n == 0 {
            order.push(m);
        }
        *n += 1;
    }
    order
        .into_iter()
        .map(|m| match counts[m] {
            1 => m.to_string(),
            n => format!("({}x) {}", n, m),
        })
        .collect()
}

#[derive(Debug, Default)]
/// Messages queued during a run, drained once at the end.
pub struct AlertQueue {
    messages: Vec<String>,
}

impl AlertQueue {
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Collapse and clear.
    pub fn drain(&mut self) -> Vec<String> {
        let taken = std::mem::take(&mut self.messages);
        flush(&taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_without_duplicates() {
        let out = flush(&["Msg 1", "Msg 2", "Msg 3"]);
        assert_eq!(out, vec!["Msg 1", "Msg 2", "Msg 3"]);
    }

    #[test]
    fn test_flush_trailing_run() {
        let out = flush(&["Msg 1", "Msg 2", "Msg 3", "Msg 3", "Msg 3", "Msg 3"]);
        assert_eq!(out, vec!["Msg 1", "Msg 2", "(4x) Msg 3"]);
    }

    #[test]
    fn test_flush_two_runs() {
        let out = flush(&["Msg 1", "Msg 2", "Msg 2", "Msg 2", "Msg 2", "Msg 3", "Msg 3"]);
        assert_eq!(out, vec!["Msg 1", "(4x) Msg 2", "(2x) Msg 3"]);
    }

    #[test]
    fn test_flush_interleaved_keeps_first_seen_order() {
        let out = flush(&["b", "a", "b"]);
        assert_eq!(out, vec!["(2x) b", "a"]);
        assert!(flush::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_queue_drain_clears() {
        let mut q = AlertQueue::default();
        q.push("skipped");
        q.push("skipped");
        assert_eq!(q.len(), 2);
        assert_eq!(q.drain(), vec!["(2x) skipped"]);
        assert!(q.is_empty());
        assert!(q.drain().is_empty());
    }
}
