use crate::aggregation::{aggregate, AggregateTable};
use crate::error::Result;
use crate::filter::{filter, FilteredSet, Selection, SelectionOptions, SelectionOutcome};
use crate::ingestion::Dataset;
use crate::pivot::{pivot, PivotTable, TotaledPivot};
use crate::ranking::{rank, RankingTable};
use crate::schema::{PurchaseRecord, ReportConfig, SupplierKey};
use log::{debug, info};
use rust_decimal::Decimal;
use serde::Serialize;

/// Month × year amounts; rows follow the configured calendar order, columns ascend.
pub type MonthYearPivot = PivotTable<String, i32>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierTotal {
    pub supplier: SupplierKey,
    pub amount: Decimal,
}

/// Builds every report from one immutable dataset.
///
/// The engine holds the status/year-filtered view for the lifetime of the
/// borrow; each report call derives fresh tables from it.
pub struct ReportEngine<'a> {
    config: &'a ReportConfig,
    filtered: FilteredSet<'a>,
}

impl<'a> ReportEngine<'a> {
    pub fn new(dataset: &'a Dataset, config: &'a ReportConfig) -> Result<Self> {
        config.validate()?;

        let filtered = filter(dataset.records(), &config.target_status, config.year);
        info!(
            "{} of {} records have status '{}'{}",
            filtered.len(),
            dataset.len(),
            config.target_status,
            config
                .year
                .map(|y| format!(" in {}", y))
                .unwrap_or_default()
        );

        Ok(Self { config, filtered })
    }

    pub fn filtered(&self) -> &FilteredSet<'a> {
        &self.filtered
    }

    pub fn selection_options(&self) -> SelectionOptions {
        self.filtered.selection_options()
    }

    /// Total purchased per supplier, largest first. Truncating to a top-N is
    /// left to the caller.
    pub fn supplier_totals(&self) -> Result<Vec<SupplierTotal>> {
        Ok(by_supplier(&self.filtered)?
            .sorted_by_amount()
            .into_iter()
            .map(|(supplier, amount)| SupplierTotal { supplier, amount })
            .collect())
    }

    /// Month × year comparison over every filtered record, without totals.
    pub fn monthly_comparison(&self) -> Result<MonthYearPivot> {
        self.month_year_pivot(&self.filtered)
    }

    /// Month × year detail for one supplier across the selected stores, with
    /// TOTAL row and column.
    pub fn supplier_store_summary(
        &self,
        selection: &Selection,
    ) -> Result<SelectionOutcome<TotaledPivot<String, i32>>> {
        let subset = selection.apply(&self.filtered);
        debug!(
            "Selection '{}' over {} stores matched {} records",
            selection.legal_name,
            selection.stores.len(),
            subset.len()
        );

        if subset.is_empty() {
            return Ok(SelectionOutcome::NoData);
        }

        let summary = self.month_year_pivot(&subset)?.add_totals();
        Ok(SelectionOutcome::Data(summary))
    }

    /// Suppliers ranked by share of the `year` total, using the configured
    /// threshold. Fails with `DivisionUndefined` when the year has no amount.
    pub fn supplier_ranking(&self, year: i32) -> Result<RankingTable> {
        let subset = self.filtered.for_year(year);
        let totals = by_supplier(&subset)?;
        rank(&totals, self.config.ranking_threshold_pct)
    }

    fn month_year_pivot(&self, records: &FilteredSet<'_>) -> Result<MonthYearPivot> {
        let table = aggregate(records, month_year_key, amount)?;
        self.config
            .month_order
            .reindex_pivot(pivot(&table), Decimal::ZERO)
    }
}

fn by_supplier(records: &FilteredSet<'_>) -> Result<AggregateTable<SupplierKey>> {
    aggregate(records, SupplierKey::of, amount)
}

fn month_year_key(record: &PurchaseRecord) -> (String, i32) {
    (record.month.clone(), record.year)
}

fn amount(record: &PurchaseRecord) -> Decimal {
    record.amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PurchaseReportError;

    fn record(id: &str, month: &str, year: i32, amount: i64, status: &str) -> PurchaseRecord {
        PurchaseRecord {
            supplier_id: Some(id.to_string()),
            legal_name: Some(format!("Supplier {id}")),
            store: Some("LOJA 1".to_string()),
            year,
            month: month.to_string(),
            status: status.to_string(),
            amount: Decimal::from(amount),
            entry_date: None,
        }
    }

    fn two_finalized_one_cancelled() -> Dataset {
        Dataset::new(vec![
            record("A", "JANEIRO", 2023, 100, "FINALIZED"),
            record("A", "FEVEREIRO", 2023, 50, "FINALIZED"),
            record("B", "JANEIRO", 2023, 850, "CANCELLED"),
        ])
    }

    #[test]
    fn test_supplier_totals_skip_cancelled_rows() {
        let dataset = two_finalized_one_cancelled();
        let config = ReportConfig::default();
        let engine = ReportEngine::new(&dataset, &config).unwrap();

        assert_eq!(engine.filtered().len(), 2);
        let totals = engine.supplier_totals().unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].supplier.supplier_id.as_deref(), Some("A"));
        assert_eq!(totals[0].amount, Decimal::from(150));
    }

    #[test]
    fn test_supplier_store_summary_pivots_months_by_year() {
        let dataset = two_finalized_one_cancelled();
        let config = ReportConfig::default();
        let engine = ReportEngine::new(&dataset, &config).unwrap();

        let selection = Selection::new("Supplier A", ["LOJA 1"]);
        let summary = engine
            .supplier_store_summary(&selection)
            .unwrap()
            .into_data()
            .unwrap();

        let data = summary.data();
        assert_eq!(data.row_keys().len(), 12);
        assert_eq!(data.column_keys(), &[2023]);
        assert_eq!(data.get(&"JANEIRO".to_string(), &2023), Some(Decimal::from(100)));
        assert_eq!(data.get(&"FEVEREIRO".to_string(), &2023), Some(Decimal::from(50)));
        assert_eq!(summary.column_totals(), &[Decimal::from(150)]);
        assert_eq!(summary.grand_total(), Decimal::from(150));
        assert_eq!(summary.row_totals()[0], Decimal::from(100));
    }

    #[test]
    fn test_unknown_supplier_is_no_data() {
        let dataset = two_finalized_one_cancelled();
        let config = ReportConfig::default();
        let engine = ReportEngine::new(&dataset, &config).unwrap();

        let outcome = engine
            .supplier_store_summary(&Selection::new("Supplier B", ["LOJA 1"]))
            .unwrap();
        assert!(outcome.is_no_data());
    }

    #[test]
    fn test_ranking_all_cancelled_is_division_undefined() {
        let dataset = Dataset::new(vec![
            record("A", "JANEIRO", 2023, 100, "CANCELLED"),
            record("B", "JANEIRO", 2023, 850, "CANCELLED"),
        ]);
        let config = ReportConfig::default();
        let engine = ReportEngine::new(&dataset, &config).unwrap();

        let err = engine.supplier_ranking(2023).unwrap_err();
        assert!(matches!(err, PurchaseReportError::DivisionUndefined));
        assert!(err.is_no_data());
    }

    #[test]
    fn test_monthly_comparison_rejects_unknown_month() {
        let dataset = Dataset::new(vec![record("A", "JANUARY", 2023, 10, "FINALIZED")]);
        let config = ReportConfig::default();
        let engine = ReportEngine::new(&dataset, &config).unwrap();

        assert!(matches!(
            engine.monthly_comparison(),
            Err(PurchaseReportError::InvalidMonth(_))
        ));
    }

    #[test]
    fn test_oversized_amounts_are_overflow_not_panic() {
        let dataset = Dataset::new(vec![
            PurchaseRecord {
                amount: Decimal::MAX,
                ..record("A", "JANEIRO", 2023, 0, "FINALIZED")
            },
            PurchaseRecord {
                amount: Decimal::MAX,
                ..record("B", "FEVEREIRO", 2023, 0, "FINALIZED")
            },
        ]);
        let config = ReportConfig::default();
        let engine = ReportEngine::new(&dataset, &config).unwrap();

        assert!(matches!(
            engine.supplier_totals(),
            Err(PurchaseReportError::Overflow)
        ));
        assert!(matches!(
            engine.monthly_comparison(),
            Err(PurchaseReportError::Overflow)
        ));
        assert!(matches!(
            engine.supplier_ranking(2023),
            Err(PurchaseReportError::Overflow)
        ));
    }

    #[test]
    fn test_config_year_restricts_every_report() {
        let dataset = Dataset::new(vec![
            record("A", "JANEIRO", 2023, 10, "FINALIZED"),
            record("A", "JANEIRO", 2024, 30, "FINALIZED"),
        ]);
        let config = ReportConfig {
            year: Some(2024),
            ..ReportConfig::default()
        };
        let engine = ReportEngine::new(&dataset, &config).unwrap();

        assert_eq!(engine.supplier_totals().unwrap()[0].amount, Decimal::from(30));
        assert_eq!(engine.monthly_comparison().unwrap().column_keys(), &[2024]);
        assert_eq!(engine.selection_options().years, vec![2024]);
    }
}
