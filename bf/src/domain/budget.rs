//! Budget domain types
//!
//! A budget is a price quotation that may later be converted into a sale.
//! Three shapes exist:
//! - [`BudgetInput`]: arguments as the caller hands them over (amounts may be text)
//! - [`Budget`]: the normalized front-end record with structured product lines
//! - [`BudgetRecord`]: the wire form, with products serialized to a JSON string

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::DomainError;
use super::amount::AmountInput;
use super::id::BudgetId;

/// Budget lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    /// Awaiting payment, still inside its validity window
    #[default]
    Pending,
    /// Validity date passed while still pending
    OutOfTime,
    /// Converted into a sale
    Paid,
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::OutOfTime => write!(f, "OUT_OF_TIME"),
            Self::Paid => write!(f, "PAID"),
        }
    }
}

/// Customer reference carried by a budget
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One product line of a budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

/// Serialize product lines to their transport-safe string form
pub fn encode_products(products: &[ProductLine]) -> Result<String, DomainError> {
    serde_json::to_string(products).map_err(|e| DomainError::ProductCodec(e.to_string()))
}

/// Parse product lines back from their transport string form
pub fn decode_products(encoded: &str) -> Result<Vec<ProductLine>, DomainError> {
    serde_json::from_str(encoded).map_err(|e| DomainError::ProductCodec(e.to_string()))
}

/// Normalized front-end budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Absent until the backend assigns one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BudgetId>,
    pub customer: Customer,
    pub products: Vec<ProductLine>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub validity: NaiveDate,
    #[serde(default)]
    pub status: BudgetStatus,
    /// Creator identity
    #[serde(default)]
    pub salesman: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to_show: Option<String>,
}

impl Budget {
    /// Convert to the wire form
    pub fn to_record(&self) -> Result<BudgetRecord, DomainError> {
        debug!(id = ?self.id, products = self.products.len(), "Budget::to_record: called");
        Ok(BudgetRecord {
            id: self.id.clone(),
            customer: self.customer.clone(),
            products: encode_products(&self.products)?,
            subtotal: self.subtotal,
            total: self.total,
            validity: self.validity,
            status: self.status,
            salesman: self.salesman.clone(),
            date_to_show: self.date_to_show.clone(),
        })
    }
}

/// Wire form of a budget as exchanged with the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BudgetId>,
    #[serde(default)]
    pub customer: Customer,
    /// JSON-encoded `Vec<ProductLine>`
    pub products: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub validity: NaiveDate,
    #[serde(default)]
    pub status: BudgetStatus,
    #[serde(default)]
    pub salesman: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to_show: Option<String>,
}

impl BudgetRecord {
    /// Convert back to the front-end form, decoding the product lines
    pub fn into_budget(self) -> Result<Budget, DomainError> {
        debug!(id = ?self.id, "BudgetRecord::into_budget: called");
        let products = decode_products(&self.products)?;
        Ok(Budget {
            id: self.id,
            customer: self.customer,
            products,
            subtotal: self.subtotal,
            total: self.total,
            validity: self.validity,
            status: self.status,
            salesman: self.salesman,
            date_to_show: self.date_to_show,
        })
    }
}

/// Budget arguments as supplied by the caller of create/update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BudgetId>,
    #[serde(default)]
    pub customer: Customer,
    pub products: Vec<ProductLine>,
    pub subtotal: AmountInput,
    pub total: AmountInput,
    pub validity: NaiveDate,
    #[serde(default)]
    pub status: BudgetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salesman: Option<String>,
}

impl BudgetInput {
    /// Coerce amounts to decimal and produce a normalized budget
    pub fn normalize(&self) -> Result<Budget, DomainError> {
        debug!(id = ?self.id, "BudgetInput::normalize: called");
        Ok(Budget {
            id: self.id.clone(),
            customer: self.customer.clone(),
            products: self.products.clone(),
            subtotal: self.subtotal.to_decimal()?,
            total: self.total.to_decimal()?,
            validity: self.validity,
            status: self.status,
            salesman: self.salesman.clone().unwrap_or_default(),
            date_to_show: None,
        })
    }
}

impl From<&Budget> for BudgetInput {
    fn from(budget: &Budget) -> Self {
        Self {
            id: budget.id.clone(),
            customer: budget.customer.clone(),
            products: budget.products.clone(),
            subtotal: AmountInput::Value(budget.subtotal),
            total: AmountInput::Value(budget.total),
            validity: budget.validity,
            status: budget.status,
            salesman: Some(budget.salesman.clone()),
        }
    }
}
