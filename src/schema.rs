use crate::calendar::MonthOrder;
use crate::error::{PurchaseReportError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One purchase line as read from the source spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub supplier_id: Option<String>,
    pub legal_name: Option<String>,
    pub store: Option<String>,
    pub year: i32,
    /// Calendar month name, expected to be one of the configured [`MonthOrder`] names.
    pub month: String,
    pub status: String,
    pub amount: Decimal,
    /// `None` when the source cell was blank or not a recognizable date.
    pub entry_date: Option<NaiveDate>,
}

/// Identity of a supplier as it appears in reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupplierKey {
    pub supplier_id: Option<String>,
    pub legal_name: Option<String>,
}

impl SupplierKey {
    pub fn of(record: &PurchaseRecord) -> Self {
        Self {
            supplier_id: record.supplier_id.clone(),
            legal_name: record.legal_name.clone(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.legal_name
            .as_deref()
            .or(self.supplier_id.as_deref())
            .unwrap_or("(unknown)")
    }
}

/// Header names used to locate each field in the input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMapping {
    #[schemars(description = "Header of the supplier identifier column")]
    pub supplier_id: String,

    #[schemars(description = "Header of the supplier legal (company) name column")]
    pub legal_name: String,

    #[schemars(description = "Header of the store column")]
    pub store: String,

    #[schemars(description = "Header of the purchase year column (integer)")]
    pub year: String,

    #[schemars(description = "Header of the month name column")]
    pub month: String,

    #[schemars(description = "Header of the invoice status column")]
    pub status: String,

    #[schemars(description = "Header of the invoice amount column")]
    pub amount: String,

    #[schemars(
        description = "Header of the entry date column; unparseable dates are loaded as missing"
    )]
    pub entry_date: String,

    #[serde(default = "default_decimal_separator")]
    #[schemars(
        description = "Decimal separator of text amounts ('.' or ','); the other groups thousands"
    )]
    pub decimal_separator: char,
}

fn default_decimal_separator() -> char {
    '.'
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            supplier_id: "Supplier-Id".to_string(),
            legal_name: "Legal-Name".to_string(),
            store: "Store".to_string(),
            year: "Year".to_string(),
            month: "Month".to_string(),
            status: "Status".to_string(),
            amount: "Amount".to_string(),
            entry_date: "Entry-Date".to_string(),
            decimal_separator: default_decimal_separator(),
        }
    }
}

impl ColumnMapping {
    /// Headers of the Portuguese purchase export ("compras" sheet).
    pub fn portuguese() -> Self {
        Self {
            supplier_id: "Fornecedor".to_string(),
            legal_name: "Razão Social".to_string(),
            store: "Loja".to_string(),
            year: "ANO".to_string(),
            month: "MÊS".to_string(),
            status: "Situação".to_string(),
            amount: "Valor Nota".to_string(),
            entry_date: "Data Entra".to_string(),
            decimal_separator: ',',
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.decimal_separator {
            '.' | ',' => Ok(()),
            other => Err(PurchaseReportError::InvalidConfig(format!(
                "decimal_separator must be '.' or ',' (got '{}')",
                other
            ))),
        }
    }

    /// The thousands separator paired with the configured decimal separator.
    pub fn grouping_separator(&self) -> char {
        if self.decimal_separator == ',' {
            '.'
        } else {
            ','
        }
    }
}

pub const DEFAULT_TARGET_STATUS: &str = "FINALIZED";

/// 0.3%
pub fn default_ranking_threshold() -> Decimal {
    Decimal::new(3, 1)
}

fn default_target_status() -> String {
    DEFAULT_TARGET_STATUS.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportConfig {
    #[serde(default = "default_target_status")]
    #[schemars(
        description = "Only records whose status equals this value (case-sensitive) are reported on"
    )]
    pub target_status: String,

    #[serde(default)]
    #[schemars(description = "The 12 month names in calendar order, as they appear in the data")]
    pub month_order: MonthOrder,

    #[serde(default = "default_ranking_threshold")]
    #[schemars(with = "f64")]
    #[schemars(
        description = "Minimum share of the yearly total, in percent, \
                       for a supplier to appear in the ranking"
    )]
    pub ranking_threshold_pct: Decimal,

    #[serde(default)]
    #[schemars(description = "Restrict every report to a single purchase year")]
    pub year: Option<i32>,

    #[serde(default)]
    #[schemars(description = "Input column headers")]
    pub columns: ColumnMapping,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            target_status: default_target_status(),
            month_order: MonthOrder::default(),
            ranking_threshold_pct: default_ranking_threshold(),
            year: None,
            columns: ColumnMapping::default(),
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_status.trim().is_empty() {
            return Err(PurchaseReportError::InvalidConfig(
                "target_status must not be empty".to_string(),
            ));
        }

        if self.ranking_threshold_pct < Decimal::ZERO
            || self.ranking_threshold_pct > Decimal::ONE_HUNDRED
        {
            return Err(PurchaseReportError::InvalidConfig(format!(
                "ranking_threshold_pct must be between 0 and 100 (got {})",
                self.ranking_threshold_pct
            )));
        }

        self.columns.validate()?;
        self.month_order.validate()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReportConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
