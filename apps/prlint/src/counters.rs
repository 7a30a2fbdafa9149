//! Named monotonic counters accumulated over a run.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOp {
    Increment,
    Dump,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    #[error("unknown counter operation: {0}")]
    UnknownOperation(String),
}

impl FromStr for CounterOp {
    type Err = CounterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "increment" => Ok(CounterOp::Increment),
            "dump" => Ok(CounterOp::Dump),
            other => Err(CounterError::UnknownOperation(other.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct RunCounters {
    values: BTreeMap<String, u64>,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to `name`, creating it at zero first.
    pub fn increment(&mut self, name: &str, amount: u64) {
        *self.values.entry(name.to_string()).or_insert(0) += amount;
    }

    pub fn bump(&mut self, name: &str) {
        self.increment(name, 1);
    }

    /// Accumulate elapsed milliseconds into `time.<bucket>_ms`.
    pub fn record_duration(&mut self, bucket: &str, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.increment(&format!("time.{}_ms", bucket), ms);
    }

    pub fn get(&self, name: &str) -> u64 {
        self.values.get(name).copied().unwrap_or(0)
    }

    pub fn dump(&self) -> BTreeMap<String, u64> {
        self.values.clone()
    }

    /// Dispatch a textual operation tag. Unknown tags fail without touching state.
    pub fn apply(
        &mut self,
        tag: &str,
        name: &str,
        amount: u64,
    ) -> Result<Option<BTreeMap<String, u64>>, CounterError> {
        match tag.parse::<CounterOp>()? {
            CounterOp::Increment => {
                self.increment(name, amount);
                Ok(None)
            }
            CounterOp::Dump => Ok(Some(self.dump())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_accumulates() {
        let mut c = RunCounters::new();
        c.increment("mycounter2", 100);
        c.increment("mycounter2", 1);
        c.bump("mycounter1");
        let dump = c.dump();
        assert_eq!(dump.get("mycounter2"), Some(&101));
        assert_eq!(dump.get("mycounter1"), Some(&1));
    }

    #[test]
    fn test_unknown_operation_leaves_state() {
        let mut c = RunCounters::new();
        c.apply("increment", "mycounter2", 100).unwrap();
        c.apply("increment", "mycounter2", 1).unwrap();
        let before = c.dump();
        let err = c.apply("reset", "mycounter2", 5).unwrap_err();
        assert_eq!(err, CounterError::UnknownOperation("reset".into()));
        assert_eq!(c.dump(), before);
        let dumped = c.apply("dump", "", 0).unwrap().unwrap();
        assert_eq!(dumped.get("mycounter2"), Some(&101));
    }

    #[test]
    fn test_record_duration_bucket() {
        let mut c = RunCounters::new();
        c.record_duration("git", Duration::from_millis(12));
        c.record_duration("git", Duration::from_millis(3));
        assert_eq!(c.get("time.git_ms"), 15);
        assert_eq!(c.get("missing"), 0);
    }
}
