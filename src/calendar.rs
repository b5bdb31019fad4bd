use crate::aggregation::AggregateTable;
use crate::error::{PurchaseReportError, Result};
use crate::pivot::PivotTable;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const MONTHS_PER_YEAR: usize = 12;

pub const PORTUGUESE_MONTHS: [&str; MONTHS_PER_YEAR] = [
    "JANEIRO",
    "FEVEREIRO",
    "MARÇO",
    "ABRIL",
    "MAIO",
    "JUNHO",
    "JULHO",
    "AGOSTO",
    "SETEMBRO",
    "OUTUBRO",
    "NOVEMBRO",
    "DEZEMBRO",
];

/// The canonical calendar order of month names used by the source data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MonthOrder {
    names: Vec<String>,
}

impl Default for MonthOrder {
    fn default() -> Self {
        Self {
            names: PORTUGUESE_MONTHS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl MonthOrder {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order = Self {
            names: names.into_iter().map(Into::into).collect(),
        };
        order.validate()?;
        Ok(order)
    }

    pub fn validate(&self) -> Result<()> {
        if self.names.len() != MONTHS_PER_YEAR {
            return Err(PurchaseReportError::InvalidConfig(format!(
                "Month order must list exactly 12 names (got {})",
                self.names.len()
            )));
        }

        let mut seen = HashSet::new();
        for name in &self.names {
            if name.trim().is_empty() {
                return Err(PurchaseReportError::InvalidConfig(
                    "Month names must not be blank".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(PurchaseReportError::InvalidConfig(format!(
                    "Month name '{}' appears more than once",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 0-based calendar position of `month`, if it is a canonical name.
    pub fn position(&self, month: &str) -> Option<usize> {
        self.names.iter().position(|m| m == month)
    }

    pub fn contains(&self, month: &str) -> bool {
        self.position(month).is_some()
    }

    fn check(&self, month: &str) -> Result<()> {
        if self.contains(month) {
            Ok(())
        } else {
            Err(PurchaseReportError::InvalidMonth(month.to_string()))
        }
    }

    /// Lays a month-keyed series out over the full calendar.
    ///
    /// The result always has 12 entries in calendar order; months missing from
    /// `table` get `fill`. A key outside the calendar is an error, never dropped.
    pub fn reindex_series(
        &self,
        table: &AggregateTable<String>,
        fill: Decimal,
    ) -> Result<Vec<(String, Decimal)>> {
        for (month, _) in table.iter() {
            self.check(month)?;
        }

        Ok(self
            .names
            .iter()
            .map(|month| (month.clone(), table.get(month).unwrap_or(fill)))
            .collect())
    }

    /// Reorders the month rows of a pivot into calendar order, inserting
    /// `fill`-valued rows for months with no data.
    pub fn reindex_pivot<C>(
        &self,
        pivot: PivotTable<String, C>,
        fill: Decimal,
    ) -> Result<PivotTable<String, C>> {
        for month in pivot.row_keys() {
            self.check(month)?;
        }

        let width = pivot.column_keys().len();
        let (months, columns, cells) = pivot.into_parts();
        let mut by_month: HashMap<String, Vec<Decimal>> = months.into_iter().zip(cells).collect();

        let mut rows = Vec::with_capacity(MONTHS_PER_YEAR);
        for month in &self.names {
            let values = by_month
                .remove(month)
                .unwrap_or_else(|| vec![fill; width]);
            rows.push((month.clone(), values));
        }

        Ok(PivotTable::from_rows(columns, rows))
    }
}

/// Free-function form of [`MonthOrder::reindex_series`].
pub fn reindex_months(
    table: &AggregateTable<String>,
    canonical_order: &MonthOrder,
    fill: Decimal,
) -> Result<Vec<(String, Decimal)>> {
    canonical_order.reindex_series(table, fill)
}
