//! BudgetOrchestrator - the six budget sagas

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::collab::{IpcSaleCreator, IpcStockAdjuster, SaleCreator, SaleDraft, StockAdjuster, StockIntent, StockTarget};
use crate::config::Config;
use crate::domain::{Budget, BudgetId, BudgetInput, BudgetRecord, BudgetStatus, find_outdated};
use crate::ipc::{ChannelWaiter, CommandDispatcher, CorrelationTag, EntityKind, FrontEndPort, IpcClient, Operation, WaitError};
use crate::state::{BudgetOperation, BudgetOutcome, BudgetState};
use crate::view::{Locale, ViewProjector};

use super::BudgetError;

/// Workflows the orchestrator delegates to
#[derive(Clone)]
pub struct Collaborators {
    pub stock: Arc<dyn StockAdjuster>,
    pub sales: Arc<dyn SaleCreator>,
}

impl Collaborators {
    /// Collaborators that talk to the backend over the same IPC client
    pub fn ipc(client: &IpcClient) -> Self {
        Self {
            stock: Arc::new(IpcStockAdjuster::new(client.clone())),
            sales: Arc::new(IpcSaleCreator::new(client.clone())),
        }
    }
}

struct Inner {
    ipc: IpcClient,
    stock: Arc<dyn StockAdjuster>,
    sales: Arc<dyn SaleCreator>,
    state: BudgetState,
    projector: ViewProjector,
    clock: Arc<dyn Clock>,
    creator: String,
    compensate_stock: bool,
    locale: Locale,
}

/// Runs budget operations against the backend and publishes their outcomes
///
/// Cheap to clone; operations on clones may run concurrently.
#[derive(Clone)]
pub struct BudgetOrchestrator {
    inner: Arc<Inner>,
}

impl BudgetOrchestrator {
    pub fn new(
        ipc: IpcClient,
        collaborators: Collaborators,
        state: BudgetState,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        debug!(creator = %config.orchestrator.creator, "BudgetOrchestrator::new: called");
        let projector = ViewProjector::new(Locale::default(), config.view.currency_symbol.clone(), clock.clone());
        Self {
            inner: Arc::new(Inner {
                ipc,
                stock: collaborators.stock,
                sales: collaborators.sales,
                state,
                projector,
                clock,
                creator: config.orchestrator.creator.clone(),
                compensate_stock: config.orchestrator.compensate_stock,
                locale: config.view.locale,
            }),
        }
    }

    /// Wire an orchestrator to the front-end end of an IPC channel pair
    ///
    /// Spawns the event waiter actor, so it must run inside a tokio runtime.
    pub fn connect(port: FrontEndPort, state: BudgetState, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let waiter = ChannelWaiter::spawn(port.events, config.ipc.channel_buffer, config.orchestrator.wait_timeout());
        let ipc = IpcClient::new(CommandDispatcher::new(port.commands), Arc::new(waiter));
        let collaborators = Collaborators::ipc(&ipc);
        Self::new(ipc, collaborators, state, clock, config)
    }

    pub fn state(&self) -> &BudgetState {
        &self.inner.state
    }

    pub fn projector(&self) -> &ViewProjector {
        &self.inner.projector
    }

    /// Create a budget, then take its products out of stock
    pub async fn create(&self, input: BudgetInput) -> BudgetOutcome {
        debug!(products = input.products.len(), "BudgetOrchestrator::create: called");
        let result = self.try_create(&input).await;
        self.settle(BudgetOperation::Create, result)
    }

    /// Load every budget from the backend
    pub async fn read_all(&self) -> BudgetOutcome {
        debug!("BudgetOrchestrator::read_all: called");
        let result = self.try_read_all().await;
        self.settle(BudgetOperation::ReadAll, result)
    }

    /// Update a budget, moving stock from its old quantities to the new ones
    pub async fn update(&self, input: BudgetInput) -> BudgetOutcome {
        debug!(id = ?input.id, "BudgetOrchestrator::update: called");
        let result = self.try_update(&input).await;
        self.settle(BudgetOperation::Update, result)
    }

    /// Delete a budget and return its products to stock
    pub async fn delete(&self, id: BudgetId) -> BudgetOutcome {
        debug!(%id, "BudgetOrchestrator::delete: called");
        let result = self.try_delete(id).await;
        self.settle(BudgetOperation::Delete, result)
    }

    /// Convert a budget into a sale and mark it paid
    pub async fn confirm_payment(&self, budget: Budget) -> BudgetOutcome {
        debug!(id = ?budget.id, "BudgetOrchestrator::confirm_payment: called");
        let result = self.try_confirm_payment(&budget).await;
        self.settle(BudgetOperation::ConfirmPayment, result)
    }

    /// Mark every pending budget past its validity date as out of time
    pub async fn mark_outdated(&self) -> BudgetOutcome {
        debug!("BudgetOrchestrator::mark_outdated: called");
        let result = self.try_mark_outdated().await;
        self.settle(BudgetOperation::MarkOutdated, result)
    }

    /// Release every wait still registered on a budget tag
    pub async fn unsubscribe_events(&self) -> Result<(), WaitError> {
        debug!("BudgetOrchestrator::unsubscribe_events: called");
        self.inner.ipc.release(CorrelationTag::budget_tags()).await?;
        info!("Released budget event subscriptions");
        Ok(())
    }

    fn settle(&self, operation: BudgetOperation, result: Result<BudgetOutcome, BudgetError>) -> BudgetOutcome {
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%operation, error = %e, "Budget operation failed");
                let outcome = BudgetOutcome::failure(operation);
                self.inner.state.publish(outcome.clone());
                outcome
            }
        }
    }

    fn publish(&self, outcome: BudgetOutcome) -> BudgetOutcome {
        self.inner.state.publish(outcome.clone());
        outcome
    }

    async fn try_create(&self, input: &BudgetInput) -> Result<BudgetOutcome, BudgetError> {
        let inner = &self.inner;
        let mut budget = input.normalize()?;
        budget.date_to_show = Some(inner.projector.today_text());
        budget.salesman = inner.creator.clone();

        let payload = record_payload(&budget)?;
        let result = inner
            .ipc
            .request(EntityKind::Budget, Operation::CreateBudget, CorrelationTag::CreateBudget, Some(payload))
            .await?;
        let id = BudgetId::from_value(&result)
            .ok_or_else(|| BudgetError::Codec(format!("unexpected create result: {}", result)))?;
        info!(%id, "Budget created");
        budget.id = Some(id);

        let outcome = self.publish(BudgetOutcome::Created(inner.projector.project(&budget)));

        inner
            .stock
            .apply(&StockTarget::from(input), &[], StockIntent::TakeAway)
            .await
            .map_err(BudgetError::Stock)?;
        Ok(outcome)
    }

    async fn try_read_all(&self) -> Result<BudgetOutcome, BudgetError> {
        let inner = &self.inner;
        inner.projector.set_locale(inner.locale);

        let result = inner
            .ipc
            .request(EntityKind::Budget, Operation::ReadBudgets, CorrelationTag::ReadAll, None)
            .await?;
        let records: Vec<BudgetRecord> = serde_json::from_value(result)?;
        let views = records
            .into_iter()
            .map(|record| {
                record
                    .into_budget()
                    .map(|budget| inner.projector.project(&budget))
                    .map_err(|e| BudgetError::Codec(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!(count = views.len(), "Budgets loaded");

        Ok(self.publish(BudgetOutcome::Loaded(views)))
    }

    async fn try_update(&self, input: &BudgetInput) -> Result<BudgetOutcome, BudgetError> {
        let inner = &self.inner;
        if input.id.is_none() {
            return Err(BudgetError::MissingId);
        }
        let existing = inner.state.snapshot();
        let target = StockTarget::from(input);

        inner
            .stock
            .apply(&target, &existing, StockIntent::SetTo)
            .await
            .map_err(BudgetError::Stock)?;

        let exchange = async {
            let budget = input.normalize()?;
            let payload = record_payload(&budget)?;
            inner
                .ipc
                .request(EntityKind::Budget, Operation::UpdateBudget, CorrelationTag::UpdateBudget, Some(payload))
                .await?;
            Ok::<_, BudgetError>(budget)
        };
        let budget = match exchange.await {
            Ok(budget) => budget,
            Err(e) => {
                self.compensate_update(&target, &existing).await;
                return Err(e);
            }
        };

        Ok(self.publish(BudgetOutcome::Updated(inner.projector.project(&budget))))
    }

    async fn try_delete(&self, id: BudgetId) -> Result<BudgetOutcome, BudgetError> {
        let inner = &self.inner;
        let existing = inner.state.snapshot();
        let record = existing
            .into_iter()
            .find(|budget| budget.id.as_ref() == Some(&id))
            .ok_or_else(|| BudgetError::NotFound(id.clone()))?;

        inner
            .stock
            .apply(&StockTarget::from(&record), &[], StockIntent::Return)
            .await
            .map_err(BudgetError::Stock)?;

        let payload = Value::String(id.as_str().to_string());
        if let Err(e) = inner
            .ipc
            .request(EntityKind::Budget, Operation::DeleteBudget, CorrelationTag::RemoveBudget, Some(payload))
            .await
        {
            self.compensate(StockTarget::from(&record), Vec::new(), StockIntent::TakeAway)
                .await;
            return Err(e.into());
        }
        info!(%id, "Budget deleted");

        Ok(self.publish(BudgetOutcome::Deleted(id)))
    }

    async fn try_confirm_payment(&self, budget: &Budget) -> Result<BudgetOutcome, BudgetError> {
        let inner = &self.inner;
        let id = budget.id.clone().ok_or(BudgetError::MissingId)?;

        inner
            .sales
            .create(SaleDraft::from_budget(budget))
            .await
            .map_err(BudgetError::Sale)?;

        let mut paid = budget.clone();
        paid.status = BudgetStatus::Paid;
        let exchange = async {
            let payload = record_payload(&paid)?;
            inner
                .ipc
                .request(
                    EntityKind::Budget,
                    Operation::UpdateBudget,
                    CorrelationTag::ConfirmPaymentBudget,
                    Some(payload),
                )
                .await?;
            Ok::<_, BudgetError>(())
        };
        if let Err(e) = exchange.await {
            warn!(%id, "Sale was created but the budget was not marked paid");
            return Err(e);
        }
        info!(%id, "Budget payment confirmed");

        Ok(self.publish(BudgetOutcome::PaymentConfirmed(id)))
    }

    async fn try_mark_outdated(&self) -> Result<BudgetOutcome, BudgetError> {
        let inner = &self.inner;
        let result = inner
            .ipc
            .request(EntityKind::Budget, Operation::ReadBudgets, CorrelationTag::SetOutdatedBudget, None)
            .await?;
        let records: Vec<BudgetRecord> = serde_json::from_value(result)?;
        let today = inner.clock.today();

        let mut marked = Vec::new();
        for record in find_outdated(today, &records) {
            let mut outdated = record.clone();
            outdated.status = BudgetStatus::OutOfTime;
            match serde_json::to_value(&outdated) {
                Ok(payload) => {
                    inner.ipc.notify(
                        EntityKind::Budget,
                        Operation::UpdateBudget,
                        CorrelationTag::UpdateBudget,
                        Some(payload),
                    );
                    if let Some(id) = outdated.id {
                        marked.push(id);
                    }
                }
                Err(e) => warn!(id = ?outdated.id, error = %e, "Skipping outdated budget"),
            }
        }
        info!(count = marked.len(), %today, "Outdated budgets marked");

        Ok(self.publish(BudgetOutcome::OutdatedMarked(marked)))
    }

    /// Reverse an update's stock adjustment
    async fn compensate_update(&self, target: &StockTarget, existing: &[Budget]) {
        let old = target
            .budget_id
            .as_ref()
            .and_then(|id| existing.iter().find(|budget| budget.id.as_ref() == Some(id)));
        match old {
            Some(old) => {
                let mut applied = old.clone();
                applied.products = target.products.clone();
                self.compensate(StockTarget::from(old), vec![applied], StockIntent::SetTo)
                    .await;
            }
            None => self.compensate(target.clone(), Vec::new(), StockIntent::Return).await,
        }
    }

    async fn compensate(&self, target: StockTarget, previous: Vec<Budget>, intent: StockIntent) {
        if !self.inner.compensate_stock {
            debug!(?intent, "BudgetOrchestrator::compensate: disabled");
            return;
        }
        info!(budget_id = ?target.budget_id, ?intent, "Compensating stock adjustment");
        if let Err(e) = self.inner.stock.apply(&target, &previous, intent).await {
            error!(budget_id = ?target.budget_id, ?intent, error = %e, "Stock compensation failed");
        }
    }
}

fn record_payload(budget: &Budget) -> Result<Value, BudgetError> {
    let record = budget.to_record()?;
    Ok(serde_json::to_value(&record)?)
}
