//! Outward-facing rig callbacks.
//!
//! Callbacks run synchronously on the evaluating thread, in subscription
//! order. Subscribing returns a [`DelegateId`]; nothing is dropped
//! automatically, owners unsubscribe explicitly. A callback must not call
//! back into the rig that fired it: some fire while the hierarchy is locked.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use armature_api_core::{ControlValue, ElementKey};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DelegateId(pub u64);

/// Lifecycle points announced with the name of the event being run.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RigPhase {
    Initialized,
    PreConstruction,
    PostConstruction,
    PreForwardsSolve,
    PostForwardsSolve,
    PreAdditiveValuesApplication,
    Executed,
}

/// Where a control change came from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlModifiedContext {
    /// Event that was running when the value changed, if any.
    pub event: Option<String>,
    /// The change is part of an ongoing user interaction.
    pub interactive: bool,
}

type PhaseCallback = Arc<dyn Fn(RigPhase, &str) + Send + Sync>;
type ControlModifiedCallback = Arc<dyn Fn(&ElementKey, &ControlValue, &ControlModifiedContext) + Send + Sync>;
type ControlSelectedCallback = Arc<dyn Fn(&ElementKey, bool) + Send + Sync>;

#[derive(Default)]
struct DelegateTable {
    next_id: u64,
    phases: Vec<(DelegateId, RigPhase, PhaseCallback)>,
    control_modified: Vec<(DelegateId, ControlModifiedCallback)>,
    control_selected: Vec<(DelegateId, ControlSelectedCallback)>,
}

impl DelegateTable {
    fn allocate(&mut self) -> DelegateId {
        let id = DelegateId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Cloning shares the same subscriber lists.
#[derive(Clone, Default)]
pub struct RigDelegates {
    table: Arc<Mutex<DelegateTable>>,
}

impl std::fmt::Debug for RigDelegates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.lock();
        f.debug_struct("RigDelegates")
            .field("phases", &table.phases.len())
            .field("control_modified", &table.control_modified.len())
            .field("control_selected", &table.control_selected.len())
            .finish()
    }
}

impl RigDelegates {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DelegateTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on_phase(&self, phase: RigPhase, f: impl Fn(RigPhase, &str) + Send + Sync + 'static) -> DelegateId {
        let mut table = self.lock();
        let id = table.allocate();
        table.phases.push((id, phase, Arc::new(f)));
        id
    }

    pub fn on_initialized(&self, f: impl Fn(RigPhase, &str) + Send + Sync + 'static) -> DelegateId {
        self.on_phase(RigPhase::Initialized, f)
    }

    pub fn on_pre_construction(&self, f: impl Fn(RigPhase, &str) + Send + Sync + 'static) -> DelegateId {
        self.on_phase(RigPhase::PreConstruction, f)
    }

    pub fn on_post_construction(&self, f: impl Fn(RigPhase, &str) + Send + Sync + 'static) -> DelegateId {
        self.on_phase(RigPhase::PostConstruction, f)
    }

    pub fn on_pre_forwards_solve(&self, f: impl Fn(RigPhase, &str) + Send + Sync + 'static) -> DelegateId {
        self.on_phase(RigPhase::PreForwardsSolve, f)
    }

    pub fn on_post_forwards_solve(&self, f: impl Fn(RigPhase, &str) + Send + Sync + 'static) -> DelegateId {
        self.on_phase(RigPhase::PostForwardsSolve, f)
    }

    pub fn on_pre_additive_values_application(
        &self,
        f: impl Fn(RigPhase, &str) + Send + Sync + 'static,
    ) -> DelegateId {
        self.on_phase(RigPhase::PreAdditiveValuesApplication, f)
    }

    pub fn on_executed(&self, f: impl Fn(RigPhase, &str) + Send + Sync + 'static) -> DelegateId {
        self.on_phase(RigPhase::Executed, f)
    }

    pub fn on_control_modified(
        &self,
        f: impl Fn(&ElementKey, &ControlValue, &ControlModifiedContext) + Send + Sync + 'static,
    ) -> DelegateId {
        let mut table = self.lock();
        let id = table.allocate();
        table.control_modified.push((id, Arc::new(f)));
        id
    }

    pub fn on_control_selected(&self, f: impl Fn(&ElementKey, bool) + Send + Sync + 'static) -> DelegateId {
        let mut table = self.lock();
        let id = table.allocate();
        table.control_selected.push((id, Arc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: DelegateId) -> bool {
        let mut table = self.lock();
        let before = table.phases.len() + table.control_modified.len() + table.control_selected.len();
        table.phases.retain(|(existing, _, _)| *existing != id);
        table.control_modified.retain(|(existing, _)| *existing != id);
        table.control_selected.retain(|(existing, _)| *existing != id);
        before != table.phases.len() + table.control_modified.len() + table.control_selected.len()
    }

    pub fn len(&self) -> usize {
        let table = self.lock();
        table.phases.len() + table.control_modified.len() + table.control_selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Callbacks are cloned out so a callback may subscribe or unsubscribe
    // without deadlocking on the table.

    pub(crate) fn broadcast(&self, phase: RigPhase, event: &str) {
        let callbacks: Vec<PhaseCallback> = self
            .lock()
            .phases
            .iter()
            .filter(|(_, p, _)| *p == phase)
            .map(|(_, _, f)| Arc::clone(f))
            .collect();
        for callback in callbacks {
            callback(phase, event);
        }
    }

    pub(crate) fn control_modified(&self, key: &ElementKey, value: &ControlValue, context: &ControlModifiedContext) {
        let callbacks: Vec<ControlModifiedCallback> =
            self.lock().control_modified.iter().map(|(_, f)| Arc::clone(f)).collect();
        for callback in callbacks {
            callback(key, value, context);
        }
    }

    pub(crate) fn control_selected(&self, key: &ElementKey, selected: bool) {
        let callbacks: Vec<ControlSelectedCallback> =
            self.lock().control_selected.iter().map(|(_, f)| Arc::clone(f)).collect();
        for callback in callbacks {
            callback(key, selected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn phases_reach_only_their_subscribers() {
        let delegates = RigDelegates::new();
        let constructed = Arc::new(AtomicUsize::new(0));
        let seen = constructed.clone();
        let id = delegates.on_post_construction(move |phase, event| {
            assert_eq!(phase, RigPhase::PostConstruction);
            assert_eq!(event, "Construction");
            seen.fetch_add(1, Ordering::SeqCst);
        });
        delegates.broadcast(RigPhase::PreConstruction, "Construction");
        delegates.broadcast(RigPhase::PostConstruction, "Construction");
        assert_eq!(constructed.load(Ordering::SeqCst), 1);

        assert!(delegates.unsubscribe(id));
        assert!(!delegates.unsubscribe(id));
        delegates.broadcast(RigPhase::PostConstruction, "Construction");
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert!(delegates.is_empty());
    }

    #[test]
    fn callbacks_may_unsubscribe_themselves() {
        let delegates = RigDelegates::new();
        let inner = delegates.clone();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        delegates.on_control_selected(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            inner.unsubscribe(DelegateId(0));
        });
        delegates.control_selected(&ElementKey::control("Ctrl"), true);
        delegates.control_selected(&ElementKey::control("Ctrl"), false);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
