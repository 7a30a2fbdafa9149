//! Run-scoped state handed to every component: cache, counters, alerts,
//! and the process runner. Created at start, dropped at the end of the run.

use crate::alerts::AlertQueue;
use crate::cache::{CacheKey, CacheValue, MemoCache};
use crate::counters::RunCounters;
use crate::process::{CommandOutput, CommandSpec, ProcessFailure, ProcessRunner};

#[derive(Debug, Default)]
pub struct RunContext {
    pub cache: MemoCache,
    pub counters: RunCounters,
    pub alerts: AlertQueue,
    pub runner: ProcessRunner,
}

impl RunContext {
    pub fn new(runner: ProcessRunner) -> Self {
        Self {
            runner,
            ..Default::default()
        }
    }

    pub fn run(&mut self, spec: &CommandSpec) -> Result<CommandOutput, ProcessFailure> {
        self.runner.run(&mut self.counters, spec)
    }

    /// Cached value for `key`, counting the hit or miss.
    pub fn cached(&mut self, key: &CacheKey) -> Option<CacheValue> {
        match self.cache.get(key) {
            Some(v) => {
                let v = v.clone();
                self.counters.bump("cache.hit");
                Some(v)
            }
            None => {
                self.counters.bump("cache.miss");
                None
            }
        }
    }

    pub fn remember(&mut self, key: CacheKey, value: CacheValue) {
        self.cache.put(key, value);
    }
}
