//! Stock collaborator
//!
//! Turns a budget's product lines into per-product quantity deltas and ships
//! them to the backend's stock service.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::domain::{Budget, BudgetId, BudgetInput, ProductLine};
use crate::ipc::{CorrelationTag, EntityKind, IpcClient, Operation};

use super::CollabError;

/// How a budget's products affect stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockIntent {
    /// Reserve the products of a new budget
    TakeAway,
    /// Move from the previous quantities to the new ones
    SetTo,
    /// Give back the products of a removed budget
    Return,
}

impl StockIntent {
    fn operation(&self) -> Operation {
        match self {
            Self::TakeAway => Operation::StockTakeAway,
            Self::SetTo => Operation::StockUpdate,
            Self::Return => Operation::StockReturn,
        }
    }
}

/// Budget whose products are being adjusted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockTarget {
    pub budget_id: Option<BudgetId>,
    pub products: Vec<ProductLine>,
}

impl From<&BudgetInput> for StockTarget {
    fn from(input: &BudgetInput) -> Self {
        Self {
            budget_id: input.id.clone(),
            products: input.products.clone(),
        }
    }
}

impl From<&Budget> for StockTarget {
    fn from(budget: &Budget) -> Self {
        Self {
            budget_id: budget.id.clone(),
            products: budget.products.clone(),
        }
    }
}

/// Quantity change for one product; negative takes from stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub product_id: String,
    pub delta: i64,
}

/// Applies stock effects of budget changes
#[async_trait]
pub trait StockAdjuster: Send + Sync {
    /// Adjust stock for `target`
    ///
    /// `previous` is the budget list as it was before the change; `SetTo`
    /// looks up the old version of the target there.
    async fn apply(&self, target: &StockTarget, previous: &[Budget], intent: StockIntent) -> Result<(), CollabError>;
}

/// Compute the per-product deltas an adjustment implies
///
/// Products keep the order they first appear in; zero deltas are dropped.
pub fn stock_adjustments(target: &StockTarget, previous: &[Budget], intent: StockIntent) -> Vec<StockAdjustment> {
    let mut order: Vec<String> = Vec::new();
    let mut deltas: HashMap<String, i64> = HashMap::new();
    let mut add = |product_id: &str, delta: i64| {
        if !deltas.contains_key(product_id) {
            order.push(product_id.to_string());
        }
        *deltas.entry(product_id.to_string()).or_insert(0) += delta;
    };

    match intent {
        StockIntent::TakeAway => {
            for line in &target.products {
                add(&line.id, -i64::from(line.quantity));
            }
        }
        StockIntent::Return => {
            for line in &target.products {
                add(&line.id, i64::from(line.quantity));
            }
        }
        StockIntent::SetTo => {
            let old = target
                .budget_id
                .as_ref()
                .and_then(|id| previous.iter().find(|budget| budget.id.as_ref() == Some(id)));
            for line in &target.products {
                add(&line.id, -i64::from(line.quantity));
            }
            if let Some(old) = old {
                for line in &old.products {
                    add(&line.id, i64::from(line.quantity));
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|product_id| {
            let delta = deltas.get(&product_id).copied().unwrap_or(0);
            (delta != 0).then_some(StockAdjustment { product_id, delta })
        })
        .collect()
}

/// Stock adjuster backed by the IPC channel
#[derive(Clone)]
pub struct IpcStockAdjuster {
    client: IpcClient,
}

impl IpcStockAdjuster {
    pub fn new(client: IpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StockAdjuster for IpcStockAdjuster {
    async fn apply(&self, target: &StockTarget, previous: &[Budget], intent: StockIntent) -> Result<(), CollabError> {
        debug!(budget_id = ?target.budget_id, ?intent, "IpcStockAdjuster::apply: called");
        let adjustments = stock_adjustments(target, previous, intent);
        if adjustments.is_empty() {
            debug!(?intent, "IpcStockAdjuster::apply: no quantity change, skipping");
            return Ok(());
        }

        let payload = json!({
            "budgetId": target.budget_id,
            "adjustments": adjustments,
        });
        self.client
            .request(EntityKind::Stock, intent.operation(), CorrelationTag::StockAdjust, Some(payload))
            .await?;
        Ok(())
    }
}
