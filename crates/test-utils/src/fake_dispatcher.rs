use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use datacarrier::errors::{CarrierError, Result};
use datacarrier::exec::{Dispatcher, Validator};
use datacarrier::plan::{Action, Task, UnitHandle, UnitOutcome};

/// What the fake does with a unit once it is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Finish as succeeded inside `submit`.
    Succeed,
    /// Finish as failed inside `submit`.
    Fail,
    /// Keep the unit running until released through the probe.
    Hold,
    /// Succeed from a tokio task after the delay.
    SucceedAfter(Duration),
}

/// One recorded `submit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub task: String,
    pub action: Action,
    pub unit: String,
}

#[derive(Debug, Default)]
struct Shared {
    submitted: Mutex<Vec<Submission>>,
    held: Mutex<Vec<UnitHandle>>,
    shutdowns: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// A fake dispatcher that:
/// - records every submitted unit
/// - completes units according to a per-action [`Completion`] policy
/// - can be told to fail `submit` for an action, to exercise loop faults.
#[derive(Debug)]
pub struct FakeDispatcher {
    shared: Arc<Shared>,
    default: Completion,
    per_action: HashMap<Action, Completion>,
    per_task: HashMap<(String, Action), Completion>,
    error_on: HashSet<Action>,
}

impl FakeDispatcher {
    pub fn new(default: Completion) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            default,
            per_action: HashMap::new(),
            per_task: HashMap::new(),
            error_on: HashSet::new(),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Completion::Succeed)
    }

    pub fn holding() -> Self {
        Self::new(Completion::Hold)
    }

    pub fn on(mut self, action: Action, completion: Completion) -> Self {
        self.per_action.insert(action, completion);
        self
    }

    pub fn on_task(mut self, task: &str, action: Action, completion: Completion) -> Self {
        self.per_task.insert((task.to_string(), action), completion);
        self
    }

    /// Make `submit` return an error for units of `action`.
    pub fn error_on(mut self, action: Action) -> Self {
        self.error_on.insert(action);
        self
    }

    /// Handle that stays usable after the dispatcher moves into a core.
    pub fn probe(&self) -> DispatchProbe {
        DispatchProbe {
            shared: Arc::clone(&self.shared),
        }
    }

    fn completion_for(&self, unit: &UnitHandle) -> Completion {
        self.per_task
            .get(&(unit.task().to_string(), unit.action()))
            .or_else(|| self.per_action.get(&unit.action()))
            .copied()
            .unwrap_or(self.default)
    }
}

impl Dispatcher for FakeDispatcher {
    fn submit(&mut self, unit: UnitHandle) -> Result<()> {
        if self.error_on.contains(&unit.action()) {
            return Err(CarrierError::Dispatch(format!(
                "refusing {} for {}",
                unit.action(),
                unit.task()
            )));
        }

        lock(&self.shared.submitted).push(Submission {
            task: unit.task().to_string(),
            action: unit.action(),
            unit: unit.unit().to_string(),
        });

        match self.completion_for(&unit) {
            Completion::Succeed => {
                unit.succeed();
            }
            Completion::Fail => {
                unit.fail();
            }
            Completion::Hold => lock(&self.shared.held).push(unit),
            Completion::SucceedAfter(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    unit.succeed();
                });
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.shared.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Read and release side of a [`FakeDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchProbe {
    shared: Arc<Shared>,
}

impl DispatchProbe {
    pub fn submitted(&self) -> Vec<Submission> {
        lock(&self.shared.submitted).clone()
    }

    pub fn submitted_for(&self, action: Action) -> Vec<Submission> {
        self.submitted()
            .into_iter()
            .filter(|s| s.action == action)
            .collect()
    }

    pub fn held(&self) -> usize {
        lock(&self.shared.held).len()
    }

    /// Finish every held unit of `task` with `outcome`. Returns how many
    /// were released.
    pub fn release_task(&self, task: &str, outcome: UnitOutcome) -> usize {
        self.release_where(|u| u.task() == task, outcome)
    }

    pub fn release_action(&self, action: Action, outcome: UnitOutcome) -> usize {
        self.release_where(|u| u.action() == action, outcome)
    }

    pub fn release_all(&self, outcome: UnitOutcome) -> usize {
        self.release_where(|_| true, outcome)
    }

    fn release_where<F>(&self, pred: F, outcome: UnitOutcome) -> usize
    where
        F: Fn(&UnitHandle) -> bool,
    {
        let mut held = lock(&self.shared.held);
        let (release, keep): (Vec<_>, Vec<_>) = held.drain(..).partition(|u| pred(u));
        *held = keep;
        drop(held);

        for unit in &release {
            unit.finish(outcome);
        }
        release.len()
    }

    pub fn shutdowns(&self) -> usize {
        self.shared.shutdowns.load(Ordering::SeqCst)
    }
}

/// A fake validator with a fixed verdict per task.
#[derive(Debug, Clone, Default)]
pub struct FakeValidator {
    failing: HashSet<String>,
    panic_on: HashSet<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeValidator {
    /// Passes every task.
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    pub fn panicking_for(mut self, task: &str) -> Self {
        self.panic_on.insert(task.to_string());
        self
    }

    /// Task names validated so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl Validator for FakeValidator {
    fn validate(&self, task: &Task) -> bool {
        lock(&self.calls).push(task.name().to_string());
        if self.panic_on.contains(task.name()) {
            panic!("validator exploded on {}", task.name());
        }
        !self.failing.contains(task.name())
    }
}
