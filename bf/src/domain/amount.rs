//! Caller-supplied currency amounts
//!
//! Form input hands amounts over either as text or as numbers. They are
//! normalized to `Decimal` before anything is dispatched.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DomainError;

/// An amount as entered by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Value(Decimal),
    Text(String),
}

impl AmountInput {
    /// Coerce to a decimal amount
    pub fn to_decimal(&self) -> Result<Decimal, DomainError> {
        match self {
            Self::Value(value) => Ok(*value),
            Self::Text(text) => {
                Decimal::from_str(text.trim()).map_err(|_| DomainError::InvalidAmount(text.clone()))
            }
        }
    }
}

impl From<Decimal> for AmountInput {
    fn from(value: Decimal) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for AmountInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}
