//! Plain-text renderings of report tables for terminals and file export.

use crate::engine::SupplierTotal;
use crate::error::Result;
use crate::pivot::{PivotTable, TotaledPivot};
use crate::ranking::RankingTable;
use csv::{Terminator, Writer, WriterBuilder};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::io;

pub const TOTAL_LABEL: &str = "TOTAL";

fn two_places(value: Decimal) -> String {
    format!("{:.2}", value)
}

/// Runs `write` against an in-memory CSV writer and returns the text.
fn csv_text<F>(delimiter: u8, write: F) -> Result<String>
where
    F: FnOnce(&mut Writer<Vec<u8>>) -> csv::Result<()>,
{
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    write(&mut writer)?;

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    let text =
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(text)
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

pub fn supplier_totals_to_markdown(totals: &[SupplierTotal]) -> String {
    let mut output = String::new();
    output.push_str("| Supplier | Legal Name | Total |\n");
    output.push_str("|---|---|---:|\n");
    for row in totals {
        output.push_str(&format!(
            "| {} | {} | {} |\n",
            opt(&row.supplier.supplier_id),
            opt(&row.supplier.legal_name),
            two_places(row.amount)
        ));
    }
    output
}

pub fn ranking_to_markdown(ranking: &RankingTable) -> String {
    let mut output = String::new();
    output.push_str("| Rank | Supplier | Legal Name | Total | % |\n");
    output.push_str("|---:|---|---|---:|---:|\n");
    for row in ranking {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            row.rank,
            opt(&row.entity.supplier_id),
            opt(&row.entity.legal_name),
            two_places(row.amount),
            two_places(row.percentage)
        ));
    }
    output
}

pub fn ranking_to_csv(ranking: &RankingTable) -> Result<String> {
    csv_text(b',', |writer| {
        writer.write_record(["Rank", "Supplier", "Legal Name", "Total", "Percentage"])?;
        for row in ranking {
            writer.write_record([
                row.rank.to_string(),
                opt(&row.entity.supplier_id).to_string(),
                opt(&row.entity.legal_name).to_string(),
                two_places(row.amount),
                two_places(row.percentage),
            ])?;
        }
        Ok(())
    })
}

impl<R: Display, C: Display> PivotTable<R, C> {
    pub fn to_markdown(&self, corner: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!("| {} |", corner));
        for column in self.column_keys() {
            output.push_str(&format!(" {} |", column));
        }
        output.push('\n');
        output.push_str(&format!("|---|{}\n", "---:|".repeat(self.column_keys().len())));

        for (row, values) in self.rows() {
            output.push_str(&format!("| {} |", row));
            for value in values {
                output.push_str(&format!(" {} |", two_places(*value)));
            }
            output.push('\n');
        }

        output
    }
}

impl<R: Display, C: Display> TotaledPivot<R, C> {
    pub fn to_markdown(&self, corner: &str) -> String {
        let data = self.data();
        let mut output = String::new();

        output.push_str(&format!("| {} |", corner));
        for column in data.column_keys() {
            output.push_str(&format!(" {} |", column));
        }
        output.push_str(&format!(" {} |\n", TOTAL_LABEL));
        output.push_str(&format!(
            "|---|{}\n",
            "---:|".repeat(data.column_keys().len() + 1)
        ));

        for ((row, values), row_total) in data.rows().zip(self.row_totals()) {
            output.push_str(&format!("| {} |", row));
            for value in values {
                output.push_str(&format!(" {} |", two_places(*value)));
            }
            output.push_str(&format!(" {} |\n", two_places(*row_total)));
        }

        output.push_str(&format!("| {} |", TOTAL_LABEL));
        for total in self.column_totals() {
            output.push_str(&format!(" {} |", two_places(*total)));
        }
        output.push_str(&format!(" {} |\n", two_places(self.grand_total())));

        output
    }

    pub fn to_csv(&self, corner: &str) -> Result<String> {
        self.to_csv_with_delimiter(corner, b',')
    }

    /// CSV with a TOTAL column and a closing TOTAL row. Fields containing the
    /// delimiter, quotes or line breaks are quoted.
    pub fn to_csv_with_delimiter(&self, corner: &str, delimiter: u8) -> Result<String> {
        let data = self.data();

        csv_text(delimiter, |writer| {
            let mut header = vec![corner.to_string()];
            header.extend(data.column_keys().iter().map(|c| c.to_string()));
            header.push(TOTAL_LABEL.to_string());
            writer.write_record(&header)?;

            for ((row, values), row_total) in data.rows().zip(self.row_totals()) {
                let mut record = vec![row.to_string()];
                record.extend(values.iter().map(|v| two_places(*v)));
                record.push(two_places(*row_total));
                writer.write_record(&record)?;
            }

            let mut footer = vec![TOTAL_LABEL.to_string()];
            footer.extend(self.column_totals().iter().map(|v| two_places(*v)));
            footer.push(two_places(self.grand_total()));
            writer.write_record(&footer)
        })
    }
}
