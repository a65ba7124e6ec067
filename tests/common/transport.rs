//! Scripted transport for orchestrator and batch tests.

use mteval_upload::{Outcome, Run, UploadTransport};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Returns outcomes from a script instead of talking to a server.
///
/// Resolution order per attempt: a fixed outcome for the run's dataset, then
/// the next queued outcome, then the default.
pub struct ScriptedTransport {
    by_dataset: HashMap<String, Outcome>,
    queue: Mutex<VecDeque<Outcome>>,
    default: Outcome,
    calls: Mutex<Vec<Run>>,
    on_attempt: Option<Box<dyn Fn(usize) + Send + Sync>>,
}

impl ScriptedTransport {
    pub fn new(default: Outcome) -> Self {
        Self {
            by_dataset: HashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            default,
            calls: Mutex::new(Vec::new()),
            on_attempt: None,
        }
    }

    /// Outcomes for the first attempts, in order.
    pub fn with_sequence(self, outcomes: Vec<Outcome>) -> Self {
        *self.queue.lock() = outcomes.into();
        self
    }

    /// Every attempt for `dataset_name` returns `outcome`.
    pub fn with_dataset(mut self, dataset_name: &str, outcome: Outcome) -> Self {
        self.by_dataset.insert(dataset_name.to_string(), outcome);
        self
    }

    /// Called with the 1-based attempt count after each attempt.
    pub fn on_attempt(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_attempt = Some(Box::new(hook));
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Run> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, dataset_name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|run| run.dataset_name == dataset_name)
            .count()
    }
}

impl UploadTransport for ScriptedTransport {
    fn attempt(&self, _host: &str, run: &Run, _api_key: &str) -> Outcome {
        let count = {
            let mut calls = self.calls.lock();
            calls.push(run.clone());
            calls.len()
        };
        let outcome = match self.by_dataset.get(&run.dataset_name) {
            Some(fixed) => fixed.clone(),
            None => self
                .queue
                .lock()
                .pop_front()
                .unwrap_or_else(|| self.default.clone()),
        };
        if let Some(hook) = &self.on_attempt {
            hook(count);
        }
        outcome
    }
}
