use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category_id: String,
    pub category_name: String,
    #[serde(default)]
    pub category_color: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub percentage: Option<f64>,
}

/// Month totals as computed by the backend. `balance` is displayed as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_incomes: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_expenses: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(default)]
    pub expense_category: Vec<CategorySummary>,
}

impl Default for TransactionSummary {
    fn default() -> Self {
        Self {
            total_incomes: Decimal::ZERO,
            total_expenses: Decimal::ZERO,
            balance: Decimal::ZERO,
            expense_category: Vec::new(),
        }
    }
}

impl TransactionSummary {
    /// Share of each category in percent, in list order. Uses the server's
    /// percentage when every entry carries one.
    pub fn category_shares(&self) -> Vec<f64> {
        if self.expense_category.iter().all(|c| c.percentage.is_some()) {
            return self
                .expense_category
                .iter()
                .map(|c| c.percentage.unwrap_or_default())
                .collect();
        }
        let total: Decimal = self.expense_category.iter().map(|c| c.amount).sum();
        self.expense_category
            .iter()
            .map(|c| {
                if total.is_zero() {
                    0.0
                } else {
                    (c.amount / total * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0)
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyItem {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub income: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub expenses: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyHistory {
    #[serde(default)]
    pub history: Vec<MonthlyItem>,
}
