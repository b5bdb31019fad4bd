//! # Purchase Report Builder
//!
//! A library for turning a table of purchase transactions into the reports a
//! purchasing dashboard shows: totals per supplier, a month-by-year
//! comparison, a supplier/store detail with totals, and a supplier ranking
//! by share of the yearly spend.
//!
//! ## Core Concepts
//!
//! - **Dataset**: records loaded once from CSV or a workbook sheet, shared read-only
//! - **Filter**: the status (and optional year) view every report derives from
//! - **Aggregate**: exact decimal sums per group key
//! - **Calendar**: month rows always laid out over the 12 canonical months
//! - **Pivot**: month × year matrices, with totals kept beside the data
//! - **Ranking**: percentage share, threshold, stable rank
//!
//! ## Example
//!
//! ```rust,ignore
//! use purchase_report_builder::*;
//!
//! let config = ReportConfig {
//!     target_status: "FINALIZADO".to_string(),
//!     columns: ColumnMapping::portuguese(),
//!     ..ReportConfig::default()
//! };
//! let dataset = Dataset::from_xlsx_path("compras.xlsx", DEFAULT_SHEET, &config.columns)?;
//!
//! let selection = Selection::new("FORNECEDOR X", ["LOJA 1", "LOJA 2"]);
//! let dashboard = build_dashboard(&dataset, &config, &selection, 2024)?;
//!
//! for row in dashboard.supplier_totals.iter().take(10) {
//!     println!("{}: {}", row.supplier.display_name(), row.amount);
//! }
//! ```

pub mod aggregation;
pub mod calendar;
pub mod engine;
pub mod error;
pub mod filter;
pub mod ingestion;
pub mod pivot;
pub mod ranking;
pub mod render;
pub mod schema;

pub use aggregation::{aggregate, AggregateTable};
pub use calendar::{reindex_months, MonthOrder, MONTHS_PER_YEAR, PORTUGUESE_MONTHS};
pub use engine::{MonthYearPivot, ReportEngine, SupplierTotal};
pub use error::{PurchaseReportError, Result};
pub use filter::{filter, FilteredSet, Selection, SelectionOptions, SelectionOutcome};
pub use ingestion::{Dataset, LoadReport, DEFAULT_SHEET};
pub use pivot::{add_totals, pivot, LongRow, PivotTable, TotaledPivot};
pub use ranking::{rank, RankedEntity, RankingTable};
pub use render::*;
pub use schema::*;

use log::{debug, info};
use serde::Serialize;

/// Every dashboard section for one set of user selections.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseDashboard {
    pub options: SelectionOptions,
    /// All suppliers, largest total first.
    pub supplier_totals: Vec<SupplierTotal>,
    pub monthly_comparison: MonthYearPivot,
    pub supplier_store_summary: SelectionOutcome<TotaledPivot<String, i32>>,
    pub ranking_year: i32,
    pub ranking: SelectionOutcome<RankingTable>,
}

impl PurchaseDashboard {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub struct PurchaseDashboardBuilder;

impl PurchaseDashboardBuilder {
    pub fn build(
        dataset: &Dataset,
        config: &ReportConfig,
        selection: &Selection,
        ranking_year: i32,
    ) -> Result<PurchaseDashboard> {
        let engine = ReportEngine::new(dataset, config)?;

        info!(
            "Building purchase dashboard over {} records",
            engine.filtered().len()
        );

        let supplier_totals = engine.supplier_totals()?;
        let monthly_comparison = engine.monthly_comparison()?;
        let supplier_store_summary = engine.supplier_store_summary(selection)?;

        let ranking = match engine.supplier_ranking(ranking_year) {
            Ok(table) => SelectionOutcome::Data(table),
            Err(e) if e.is_no_data() => {
                debug!("No purchases to rank in {}", ranking_year);
                SelectionOutcome::NoData
            }
            Err(e) => return Err(e),
        };

        Ok(PurchaseDashboard {
            options: engine.selection_options(),
            supplier_totals,
            monthly_comparison,
            supplier_store_summary,
            ranking_year,
            ranking,
        })
    }
}

pub fn build_dashboard(
    dataset: &Dataset,
    config: &ReportConfig,
    selection: &Selection,
    ranking_year: i32,
) -> Result<PurchaseDashboard> {
    PurchaseDashboardBuilder::build(dataset, config, selection, ranking_year)
}
