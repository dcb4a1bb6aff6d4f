//! In-process backend
//!
//! Serves the backend end of an IPC channel pair from in-memory tables:
//! budget records, stock levels and sales. Used by the demo command and the
//! integration tests. Any operation can be switched to fail.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collab::StockAdjustment;
use crate::domain::{BudgetId, BudgetRecord};
use crate::ipc::{BackEndPort, CommandEnvelope, CompletionEvent, EntityKind, Operation};

#[derive(Default)]
struct Store {
    budgets: Vec<BudgetRecord>,
    stock: BTreeMap<String, i64>,
    sales: Vec<Value>,
    next_id: u64,
    failing: HashSet<Operation>,
    served: usize,
}

#[derive(Deserialize)]
struct StockPayload {
    adjustments: Vec<StockAdjustment>,
}

/// Budget, stock and sale service held in memory
///
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    store: Arc<Mutex<Store>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given budget records
    pub fn with_budgets(self, budgets: Vec<BudgetRecord>) -> Self {
        {
            let mut store = self.lock();
            store.next_id = budgets.len() as u64;
            store.budgets = budgets;
        }
        self
    }

    /// Set the stock level of a product
    pub fn set_stock(&self, product_id: impl Into<String>, quantity: i64) {
        self.lock().stock.insert(product_id.into(), quantity);
    }

    /// Make every later command with this operation fail
    pub fn fail_on(&self, operation: Operation) {
        debug!(?operation, "MemoryBackend::fail_on: called");
        self.lock().failing.insert(operation);
    }

    /// Undo [`fail_on`](Self::fail_on)
    pub fn recover(&self, operation: Operation) {
        self.lock().failing.remove(&operation);
    }

    pub fn budgets(&self) -> Vec<BudgetRecord> {
        self.lock().budgets.clone()
    }

    pub fn stock_level(&self, product_id: &str) -> i64 {
        self.lock().stock.get(product_id).copied().unwrap_or(0)
    }

    pub fn sales(&self) -> Vec<Value> {
        self.lock().sales.clone()
    }

    /// Number of commands answered so far
    pub fn served(&self) -> usize {
        self.lock().served
    }

    /// Serve commands from `port` until the front-end goes away
    pub fn spawn(&self, mut port: BackEndPort) -> JoinHandle<()> {
        let backend = self.clone();
        tokio::spawn(async move {
            info!("MemoryBackend started");
            while let Some(envelope) = port.recv_command().await {
                let event = backend.handle(envelope);
                if !port.send_event(&event) {
                    warn!("MemoryBackend: front-end gone, stopping");
                    break;
                }
            }
            info!("MemoryBackend stopped");
        })
    }

    /// Answer a single command
    pub fn handle(&self, envelope: CommandEnvelope) -> CompletionEvent {
        debug!(entity = ?envelope.entity, operation = ?envelope.operation, tag = %envelope.tag, "MemoryBackend::handle: called");
        let CommandEnvelope {
            entity,
            operation,
            tag,
            request_id,
            payload,
        } = envelope;

        let mut store = self.lock();
        store.served += 1;
        let result = if store.failing.contains(&operation) {
            Err(format!("{:?} unavailable", operation))
        } else {
            store.apply(entity, operation, payload)
        };

        match result {
            Ok(value) => CompletionEvent::success(tag, Some(request_id), value),
            Err(message) => {
                warn!(?operation, %message, "MemoryBackend: command failed");
                CompletionEvent::failure(tag, Some(request_id), message)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store {
    fn apply(&mut self, entity: EntityKind, operation: Operation, payload: Option<Value>) -> Result<Value, String> {
        match (entity, operation) {
            (EntityKind::Budget, Operation::CreateBudget) => {
                let mut record: BudgetRecord = parse(payload)?;
                let id = self.allocate_id();
                record.id = Some(BudgetId::new(id.to_string()));
                self.budgets.push(record);
                Ok(json!(id))
            }
            (EntityKind::Budget, Operation::ReadBudgets) => serde_json::to_value(&self.budgets).map_err(|e| e.to_string()),
            (EntityKind::Budget, Operation::UpdateBudget) => {
                let record: BudgetRecord = parse(payload)?;
                let slot = self
                    .budgets
                    .iter_mut()
                    .find(|existing| existing.id.is_some() && existing.id == record.id)
                    .ok_or_else(|| format!("budget {:?} not found", record.id))?;
                *slot = record;
                Ok(Value::Null)
            }
            (EntityKind::Budget, Operation::DeleteBudget) => {
                let id = payload
                    .as_ref()
                    .and_then(BudgetId::from_value)
                    .ok_or_else(|| "missing budget id".to_string())?;
                let before = self.budgets.len();
                self.budgets.retain(|budget| budget.id.as_ref() != Some(&id));
                if self.budgets.len() == before {
                    return Err(format!("budget {} not found", id));
                }
                Ok(Value::Null)
            }
            (EntityKind::Stock, Operation::StockTakeAway | Operation::StockUpdate | Operation::StockReturn) => {
                let stock: StockPayload = parse(payload)?;
                for adjustment in stock.adjustments {
                    *self.stock.entry(adjustment.product_id).or_insert(0) += adjustment.delta;
                }
                Ok(Value::Null)
            }
            (EntityKind::Sale, Operation::CreateSale) => {
                let sale = payload.ok_or_else(|| "missing sale".to_string())?;
                self.sales.push(sale);
                Ok(json!(self.sales.len()))
            }
            (entity, operation) => Err(format!("{:?} does not support {:?}", entity, operation)),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        loop {
            self.next_id += 1;
            let candidate = BudgetId::new(self.next_id.to_string());
            if !self.budgets.iter().any(|budget| budget.id.as_ref() == Some(&candidate)) {
                return self.next_id;
            }
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(payload: Option<Value>) -> Result<T, String> {
    let payload = payload.ok_or_else(|| "missing payload".to_string())?;
    serde_json::from_value(payload).map_err(|e| e.to_string())
}
