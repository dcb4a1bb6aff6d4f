//! Outdated-budget scanner
//!
//! A budget is outdated when it is still pending and its validity date lies
//! strictly before today. A budget valid through today is not outdated.

use chrono::NaiveDate;

use super::budget::{Budget, BudgetRecord, BudgetStatus};

/// Anything carrying the two fields the scanner looks at
pub trait Outdatable {
    fn status(&self) -> BudgetStatus;
    fn validity(&self) -> NaiveDate;
}

impl Outdatable for Budget {
    fn status(&self) -> BudgetStatus {
        self.status
    }

    fn validity(&self) -> NaiveDate {
        self.validity
    }
}

impl Outdatable for BudgetRecord {
    fn status(&self) -> BudgetStatus {
        self.status
    }

    fn validity(&self) -> NaiveDate {
        self.validity
    }
}

/// Check a single budget against `today`
pub fn is_outdated<T: Outdatable>(today: NaiveDate, budget: &T) -> bool {
    budget.status() == BudgetStatus::Pending && budget.validity() < today
}

/// Select the pending budgets whose validity date has passed, preserving order
pub fn find_outdated<T: Outdatable>(today: NaiveDate, budgets: &[T]) -> Vec<&T> {
    budgets.iter().filter(|budget| is_outdated(today, *budget)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Probe {
        status: BudgetStatus,
        validity: NaiveDate,
    }

    impl Outdatable for Probe {
        fn status(&self) -> BudgetStatus {
            self.status
        }

        fn validity(&self) -> NaiveDate {
            self.validity
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn probe(status: BudgetStatus, validity: NaiveDate) -> Probe {
        Probe { status, validity }
    }

    #[test]
    fn test_pending_past_validity_is_outdated() {
        let today = date(2026, 10, 19);
        assert!(is_outdated(today, &probe(BudgetStatus::Pending, date(2026, 10, 18))));
    }

    #[test]
    fn test_valid_through_today_is_not_outdated() {
        let today = date(2026, 10, 19);
        assert!(!is_outdated(today, &probe(BudgetStatus::Pending, today)));
    }

    #[test]
    fn test_future_validity_is_not_outdated() {
        let today = date(2026, 10, 19);
        assert!(!is_outdated(today, &probe(BudgetStatus::Pending, date(2027, 1, 1))));
    }

    #[test]
    fn test_non_pending_is_never_outdated() {
        let today = date(2026, 10, 19);
        let old = date(2020, 1, 1);
        assert!(!is_outdated(today, &probe(BudgetStatus::Paid, old)));
        assert!(!is_outdated(today, &probe(BudgetStatus::OutOfTime, old)));
    }

    #[test]
    fn test_find_outdated_keeps_order() {
        let today = date(2026, 10, 19);
        let budgets = vec![
            probe(BudgetStatus::Pending, date(2026, 10, 1)),
            probe(BudgetStatus::Paid, date(2026, 10, 2)),
            probe(BudgetStatus::Pending, today),
            probe(BudgetStatus::Pending, date(2026, 9, 3)),
        ];

        let outdated = find_outdated(today, &budgets);
        assert_eq!(outdated.len(), 2);
        assert_eq!(outdated[0].validity, date(2026, 10, 1));
        assert_eq!(outdated[1].validity, date(2026, 9, 3));
    }

    #[test]
    fn test_find_outdated_empty() {
        let budgets: Vec<Probe> = vec![];
        assert!(find_outdated(date(2026, 10, 19), &budgets).is_empty());
    }

    fn arb_status() -> impl Strategy<Value = BudgetStatus> {
        prop_oneof![
            Just(BudgetStatus::Pending),
            Just(BudgetStatus::OutOfTime),
            Just(BudgetStatus::Paid),
        ]
    }

    proptest! {
        #[test]
        fn prop_scanner_matches_definition(
            status in arb_status(),
            offset in -400i64..400,
        ) {
            let today = date(2026, 10, 19);
            let validity = today + chrono::Duration::days(offset);
            let budgets = vec![probe(status, validity)];
            let selected = !find_outdated(today, &budgets).is_empty();
            prop_assert_eq!(selected, status == BudgetStatus::Pending && offset < 0);
        }
    }
}
