// Movement - the one entity the ledger records
// A movement is an income or an expense; the store assigns id and timestamp

use crate::schema::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp layout persisted in the `timestamp` column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Income,
    Expense,
}

impl Kind {
    /// Canonical label, as stored in the `kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Income => "Income",
            Kind::Expense => "Expense",
        }
    }

    /// The other kind (used by the form's kind selector)
    pub fn toggle(&self) -> Self {
        match self {
            Kind::Income => Kind::Expense,
            Kind::Expense => Kind::Income,
        }
    }

    /// Parse a kind label.
    ///
    /// Accepts the canonical labels in any case, plus `Ingreso` / `Gasto`
    /// as written by older `finanzas.db` files.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "income" | "ingreso" => Some(Kind::Income),
            "expense" | "gasto" => Some(Kind::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::parse(s).ok_or_else(|| {
            ValidationError::new("kind", format!("Unrecognized kind '{}' (expected Income or Expense)", s))
        })
    }
}

// ============================================================================
// MOVEMENT
// ============================================================================

/// One persisted ledger row. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub kind: Kind,
    pub description: String,
    pub amount: f64,
    pub timestamp: String,
}

impl Movement {
    /// Amount with the sign its kind contributes to the balance
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            Kind::Income => self.amount,
            Kind::Expense => -self.amount,
        }
    }
}

// ============================================================================
// TOTALS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

impl Totals {
    pub fn new(income: f64, expense: f64) -> Self {
        Self {
            income,
            expense,
            balance: income - expense,
        }
    }

    /// Fold totals from already-loaded movements
    pub fn from_movements<'a, I>(movements: I) -> Self
    where
        I: IntoIterator<Item = &'a Movement>,
    {
        let (income, expense) = movements
            .into_iter()
            .fold((0.0, 0.0), |(inc, exp), m| match m.kind {
                Kind::Income => (inc + m.amount, exp),
                Kind::Expense => (inc, exp + m.amount),
            });
        Self::new(income, expense)
    }
}

impl From<Totals> for (f64, f64, f64) {
    fn from(t: Totals) -> Self {
        (t.income, t.expense, t.balance)
    }
}

/// Render an amount as `$1,234.56` (negative values as `-$1,234.56`)
pub fn format_money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(id: i64, kind: Kind, amount: f64) -> Movement {
        Movement {
            id,
            kind,
            description: format!("movement {}", id),
            amount,
            timestamp: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_kind_parse_accepts_canonical_and_legacy_labels() {
        assert_eq!(Kind::parse("Income"), Some(Kind::Income));
        assert_eq!(Kind::parse("expense"), Some(Kind::Expense));
        assert_eq!(Kind::parse("  EXPENSE "), Some(Kind::Expense));
        assert_eq!(Kind::parse("Ingreso"), Some(Kind::Income));
        assert_eq!(Kind::parse("Gasto"), Some(Kind::Expense));
        assert_eq!(Kind::parse("Transfer"), None);
        assert_eq!(Kind::parse(""), None);
    }

    #[test]
    fn test_kind_from_str_reports_field() {
        let err = "Refund".parse::<Kind>().unwrap_err();
        assert_eq!(err.field, "kind");
        assert!(err.message.contains("Refund"));
    }

    #[test]
    fn test_kind_display_round_trips_through_parse() {
        for kind in [Kind::Income, Kind::Expense] {
            assert_eq!(Kind::parse(&kind.to_string()), Some(kind));
        }
        assert_eq!(Kind::Income.toggle(), Kind::Expense);
        assert_eq!(Kind::Expense.toggle(), Kind::Income);
    }

    #[test]
    fn test_totals_from_movements() {
        let movements = vec![
            movement(1, Kind::Income, 1000.0),
            movement(2, Kind::Expense, 400.0),
            movement(3, Kind::Expense, 50.5),
        ];

        let totals = Totals::from_movements(&movements);

        assert_eq!(totals.income, 1000.0);
        assert_eq!(totals.expense, 450.5);
        assert_eq!(totals.balance, 549.5);
        assert_eq!(<(f64, f64, f64)>::from(totals), (1000.0, 450.5, 549.5));
    }

    #[test]
    fn test_totals_empty_is_zero() {
        let totals = Totals::from_movements(&Vec::<Movement>::new());
        assert_eq!(totals, Totals::default());
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "$0.00");
        assert_eq!(format_money(1000.0), "$1,000.00");
        assert_eq!(format_money(600.0), "$600.00");
        assert_eq!(format_money(-400.0), "-$400.00");
        assert_eq!(format_money(1234567.891), "$1,234,567.89");
        assert_eq!(format_money(-0.001), "$0.00");
    }

    #[test]
    fn test_signed_amount() {
        assert_eq!(movement(1, Kind::Income, 10.0).signed_amount(), 10.0);
        assert_eq!(movement(2, Kind::Expense, 10.0).signed_amount(), -10.0);
    }
}
