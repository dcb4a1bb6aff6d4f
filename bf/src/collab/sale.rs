//! Sale collaborator
//!
//! Converts a paid budget into a sale record on the backend.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::{Budget, BudgetStatus, Customer, ProductLine, encode_products};
use crate::ipc::{CorrelationTag, EntityKind, IpcClient, Operation};

use super::CollabError;

/// Sale built from a budget
///
/// Carries every budget field except the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDraft {
    pub customer: Customer,
    pub products: Vec<ProductLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub validity: NaiveDate,
    pub status: BudgetStatus,
    pub salesman: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to_show: Option<String>,
    pub created_from_budget: bool,
}

impl SaleDraft {
    pub fn from_budget(budget: &Budget) -> Self {
        Self {
            customer: budget.customer.clone(),
            products: budget.products.clone(),
            subtotal: budget.subtotal,
            total: budget.total,
            validity: budget.validity,
            status: budget.status,
            salesman: budget.salesman.clone(),
            date_to_show: budget.date_to_show.clone(),
            created_from_budget: true,
        }
    }
}

/// Creates sales
#[async_trait]
pub trait SaleCreator: Send + Sync {
    async fn create(&self, draft: SaleDraft) -> Result<(), CollabError>;
}

/// Sale creator backed by the IPC channel
#[derive(Clone)]
pub struct IpcSaleCreator {
    client: IpcClient,
}

impl IpcSaleCreator {
    pub fn new(client: IpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SaleCreator for IpcSaleCreator {
    async fn create(&self, draft: SaleDraft) -> Result<(), CollabError> {
        debug!(total = %draft.total, "IpcSaleCreator::create: called");
        let mut payload = serde_json::to_value(&draft).map_err(|e| CollabError::Payload(e.to_string()))?;
        let products = encode_products(&draft.products).map_err(|e| CollabError::Payload(e.to_string()))?;
        payload["products"] = Value::String(products);

        self.client
            .request(EntityKind::Sale, Operation::CreateSale, CorrelationTag::SaleCreate, Some(payload))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BudgetId;
    use crate::ipc::waiter::mock::ScriptedWaiter;
    use crate::ipc::{CommandDispatcher, CommandEnvelope};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn budget() -> Budget {
        Budget {
            id: Some(BudgetId::new("b2")),
            customer: Customer {
                id: Some("c1".to_string()),
                name: Some("Ana".to_string()),
            },
            products: vec![ProductLine {
                id: "p1".to_string(),
                name: "Bolt".to_string(),
                quantity: 3,
                price: Decimal::new(250, 2),
            }],
            subtotal: Decimal::new(750, 2),
            total: Decimal::new(750, 2),
            validity: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            status: BudgetStatus::Pending,
            salesman: "admin".to_string(),
            date_to_show: Some("Oct 19, 2026".to_string()),
        }
    }

    #[test]
    fn test_draft_drops_id_and_marks_origin() {
        let value = serde_json::to_value(SaleDraft::from_budget(&budget())).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["createdFromBudget"], true);
        assert_eq!(value["total"], 7.5);
        assert_eq!(value["customer"]["name"], "Ana");
    }

    #[tokio::test]
    async fn test_ipc_sale_creator_sends_encoded_products() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let waiter = Arc::new(ScriptedWaiter::new());
        waiter.push(CorrelationTag::SaleCreate, Ok(json!("s1")));
        let creator = IpcSaleCreator::new(IpcClient::new(CommandDispatcher::new(tx), waiter.clone()));

        creator.create(SaleDraft::from_budget(&budget())).await.unwrap();

        let envelope: CommandEnvelope = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(envelope.entity, EntityKind::Sale);
        assert_eq!(envelope.operation, Operation::CreateSale);
        let payload = envelope.payload.unwrap();
        assert!(payload["products"].is_string());
        assert_eq!(waiter.subscriptions()[0].0, CorrelationTag::SaleCreate);
    }

    #[tokio::test]
    async fn test_ipc_sale_creator_failure() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let waiter = Arc::new(ScriptedWaiter::new());
        let creator = IpcSaleCreator::new(IpcClient::new(CommandDispatcher::new(tx), waiter));
        // Empty script resolves as a closed channel
        assert!(creator.create(SaleDraft::from_budget(&budget())).await.is_err());
    }
}
