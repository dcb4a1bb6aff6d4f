//! BudgetState - the front-end's in-memory budget list
//!
//! Every published outcome is folded into the list and then broadcast to
//! subscribers. Readers take snapshots; no lock is ever held across an await.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::{Budget, BudgetId, BudgetStatus};
use crate::view::BudgetView;

use super::outcome::BudgetOutcome;

/// Default broadcast capacity for outcome subscribers
pub const DEFAULT_OUTCOME_CAPACITY: usize = 64;

/// Shared application state for budgets
#[derive(Clone)]
pub struct BudgetState {
    views: Arc<RwLock<Vec<BudgetView>>>,
    outcome_tx: broadcast::Sender<BudgetOutcome>,
}

impl Default for BudgetState {
    fn default() -> Self {
        Self::new(DEFAULT_OUTCOME_CAPACITY)
    }
}

impl BudgetState {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "BudgetState::new: called");
        let (outcome_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            views: Arc::new(RwLock::new(Vec::new())),
            outcome_tx,
        }
    }

    /// Subscribe to published outcomes
    ///
    /// Outcomes published before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<BudgetOutcome> {
        self.outcome_tx.subscribe()
    }

    /// Snapshot of the current budgets
    pub fn snapshot(&self) -> Vec<Budget> {
        self.read().iter().map(|view| view.budget.clone()).collect()
    }

    /// Snapshot of the current views
    pub fn views(&self) -> Vec<BudgetView> {
        self.read().clone()
    }

    /// Fold an outcome into the list, then broadcast it
    pub fn publish(&self, outcome: BudgetOutcome) {
        debug!(operation = %outcome.operation(), failure = outcome.is_failure(), "BudgetState::publish: called");
        self.reduce(&outcome);
        // No subscribers is fine
        let _ = self.outcome_tx.send(outcome);
    }

    fn reduce(&self, outcome: &BudgetOutcome) {
        let mut views = self.write();
        match outcome {
            BudgetOutcome::Created(view) => views.push(view.clone()),
            BudgetOutcome::Loaded(loaded) => *views = loaded.clone(),
            BudgetOutcome::Updated(updated) => {
                if let Some(slot) = views
                    .iter_mut()
                    .find(|view| view.budget.id.is_some() && view.budget.id == updated.budget.id)
                {
                    *slot = updated.clone();
                }
            }
            BudgetOutcome::Deleted(id) => views.retain(|view| view.budget.id.as_ref() != Some(id)),
            BudgetOutcome::PaymentConfirmed(id) => set_status(&mut views, std::slice::from_ref(id), BudgetStatus::Paid),
            BudgetOutcome::OutdatedMarked(ids) => set_status(&mut views, ids, BudgetStatus::OutOfTime),
            _ => {}
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<BudgetView>> {
        self.views.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<BudgetView>> {
        self.views.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn set_status(views: &mut [BudgetView], ids: &[BudgetId], status: BudgetStatus) {
    for view in views.iter_mut() {
        if view.budget.id.as_ref().is_some_and(|id| ids.contains(id)) {
            view.budget.status = status;
        }
    }
}
