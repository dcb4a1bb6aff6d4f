//! View model projection
//!
//! Derives display fields from a budget: long-form validity date, currency
//! texts with two fractional digits, a fallback customer name and the date
//! the view was built. Views are never persisted.

use std::sync::{Arc, RwLock};

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::domain::Budget;

/// Placeholder shown when a budget has no customer name
pub const MISSING_CUSTOMER: &str = "-";

/// Formatting locale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "pt-BR")]
    PtBr,
}

impl Locale {
    /// Long date with abbreviated month, e.g. `Oct 19, 2026` or `19 de out de 2026`
    pub fn long_date(&self, date: NaiveDate) -> String {
        let (pattern, locale) = match self {
            Self::EnUs => ("%b %-d, %Y", chrono::Locale::en_US),
            Self::PtBr => ("%-d de %b de %Y", chrono::Locale::pt_BR),
        };
        date.and_time(NaiveTime::MIN)
            .and_utc()
            .format_localized(pattern, locale)
            .to_string()
    }
}

/// Format an amount as `{symbol} {value}` with two fractional digits
///
/// Halves round away from zero.
pub fn format_currency(symbol: &str, amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{} {:.2}", symbol, rounded)
}

/// A budget plus its presentation fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetView {
    pub budget: Budget,
    pub validity_date: String,
    pub subtotal_text: String,
    pub total_text: String,
    pub customer_name: String,
    pub date_to_show: String,
}

/// Builds [`BudgetView`]s
///
/// Clones share the locale, so a locale switch is seen by every holder.
#[derive(Clone)]
pub struct ViewProjector {
    locale: Arc<RwLock<Locale>>,
    currency_symbol: String,
    clock: Arc<dyn Clock>,
}

impl ViewProjector {
    pub fn new(locale: Locale, currency_symbol: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            locale: Arc::new(RwLock::new(locale)),
            currency_symbol: currency_symbol.into(),
            clock,
        }
    }

    /// Locale used by subsequent projections
    pub fn set_locale(&self, locale: Locale) {
        debug!(?locale, "ViewProjector::set_locale: called");
        let mut guard = self.locale.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = locale;
    }

    pub fn locale(&self) -> Locale {
        *self.locale.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Today's date in the current locale's long form
    pub fn today_text(&self) -> String {
        self.locale().long_date(self.clock.today())
    }

    /// Project a budget into its view model
    pub fn project(&self, budget: &Budget) -> BudgetView {
        debug!(id = ?budget.id, "ViewProjector::project: called");
        let locale = self.locale();
        BudgetView {
            budget: budget.clone(),
            validity_date: locale.long_date(budget.validity),
            subtotal_text: format_currency(&self.currency_symbol, budget.subtotal),
            total_text: format_currency(&self.currency_symbol, budget.total),
            customer_name: budget
                .customer
                .name
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or(MISSING_CUSTOMER)
                .to_string(),
            date_to_show: locale.long_date(self.clock.today()),
        }
    }
}
