use crate::aggregation::AggregateTable;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::hash::Hash;

/// A rows × columns matrix of summed amounts. Every cell is present; cells
/// with no contributing records hold zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable<R, C> {
    rows: Vec<R>,
    columns: Vec<C>,
    cells: Vec<Vec<Decimal>>,
}

/// One cell of a pivot in long ("melted") form, ready for charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongRow<R, C> {
    pub row: R,
    pub column: C,
    pub value: Decimal,
}

impl<R, C> PivotTable<R, C> {
    /// Builds a pivot from explicit rows. Each row must hold one value per column.
    pub(crate) fn from_rows(columns: Vec<C>, rows: Vec<(R, Vec<Decimal>)>) -> Self {
        let (rows, cells): (Vec<R>, Vec<Vec<Decimal>>) = rows.into_iter().unzip();
        debug_assert!(cells.iter().all(|row| row.len() == columns.len()));
        Self {
            rows,
            columns,
            cells,
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<R>, Vec<C>, Vec<Vec<Decimal>>) {
        (self.rows, self.columns, self.cells)
    }

    pub fn row_keys(&self) -> &[R] {
        &self.rows
    }

    pub fn column_keys(&self) -> &[C] {
        &self.columns
    }

    /// Values of the row at `index`, one per column.
    pub fn row_values(&self, index: usize) -> &[Decimal] {
        &self.cells[index]
    }

    pub fn rows(&self) -> impl Iterator<Item = (&R, &[Decimal])> + '_ {
        self.rows
            .iter()
            .zip(self.cells.iter().map(|row| row.as_slice()))
    }

    /// True when the pivot has no columns, i.e. nothing was aggregated into it.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    pub fn grand_total(&self) -> Decimal {
        self.cells.iter().flatten().copied().sum()
    }

    /// Appends a TOTAL column (row sums) and a TOTAL row (column sums).
    ///
    /// Both are computed from the original cells only.
    pub fn add_totals(self) -> TotaledPivot<R, C> {
        let row_totals: Vec<Decimal> = self
            .cells
            .iter()
            .map(|row| row.iter().copied().sum())
            .collect();

        let column_totals: Vec<Decimal> = (0..self.columns.len())
            .map(|col| self.cells.iter().map(|row| row[col]).sum())
            .collect();

        let grand_total = self.grand_total();

        TotaledPivot {
            data: self,
            row_totals,
            column_totals,
            grand_total,
        }
    }
}

impl<R: Clone, C: Clone> PivotTable<R, C> {
    /// Flattens the matrix into one row per (row key, column key) pair, row-major.
    pub fn melt(&self) -> Vec<LongRow<R, C>> {
        let mut long = Vec::with_capacity(self.rows.len() * self.columns.len());
        for (row_key, values) in self.rows() {
            for (column, value) in self.columns.iter().zip(values) {
                long.push(LongRow {
                    row: row_key.clone(),
                    column: column.clone(),
                    value: *value,
                });
            }
        }
        long
    }
}

impl<R: PartialEq, C: PartialEq> PivotTable<R, C> {
    pub fn get(&self, row: &R, column: &C) -> Option<Decimal> {
        let r = self.rows.iter().position(|k| k == row)?;
        let c = self.columns.iter().position(|k| k == column)?;
        Some(self.cells[r][c])
    }
}

/// A pivot with its TOTAL column and TOTAL row.
///
/// The totals live beside the data instead of inside it, so the data pivot
/// handed to [`PivotTable::melt`] never carries a total series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotaledPivot<R, C> {
    data: PivotTable<R, C>,
    row_totals: Vec<Decimal>,
    column_totals: Vec<Decimal>,
    grand_total: Decimal,
}

impl<R, C> TotaledPivot<R, C> {
    /// The original cells, without totals.
    pub fn data(&self) -> &PivotTable<R, C> {
        &self.data
    }

    pub fn into_data(self) -> PivotTable<R, C> {
        self.data
    }

    /// TOTAL column: one sum per row.
    pub fn row_totals(&self) -> &[Decimal] {
        &self.row_totals
    }

    /// TOTAL row: one sum per column.
    pub fn column_totals(&self) -> &[Decimal] {
        &self.column_totals
    }

    /// The TOTAL/TOTAL corner cell.
    pub fn grand_total(&self) -> Decimal {
        self.grand_total
    }
}

/// Reshapes a two-key aggregate into a matrix: first key → rows, second → columns.
///
/// Row and column keys come out in ascending order; absent combinations are zero.
pub fn pivot<R, C>(aggregate: &AggregateTable<(R, C)>) -> PivotTable<R, C>
where
    R: Ord + Clone + Hash,
    C: Ord + Clone + Hash,
{
    let rows: Vec<R> = aggregate
        .keys()
        .map(|(r, _)| r.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let columns: Vec<C> = aggregate
        .keys()
        .map(|(_, c)| c.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut cells = vec![vec![Decimal::ZERO; columns.len()]; rows.len()];
    for ((r, c), amount) in aggregate.iter() {
        if let (Ok(ri), Ok(ci)) = (rows.binary_search(r), columns.binary_search(c)) {
            cells[ri][ci] += amount;
        }
    }

    PivotTable {
        rows,
        columns,
        cells,
    }
}

/// Free-function form of [`PivotTable::add_totals`].
pub fn add_totals<R, C>(pivot: PivotTable<R, C>) -> TotaledPivot<R, C> {
    pivot.add_totals()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn sample_pivot() -> PivotTable<String, i32> {
        let rows = vec![
            ("FEVEREIRO", 2023, 50),
            ("JANEIRO", 2023, 100),
            ("JANEIRO", 2024, 20),
            ("MARÇO", 2022, 7),
        ];
        let table = aggregate(&rows, |r| (r.0.to_string(), r.1), |r| dec(r.2)).unwrap();
        pivot(&table)
    }

    #[test]
    fn test_pivot_fills_missing_cells_with_zero() {
        let p = sample_pivot();
        assert_eq!(p.column_keys(), &[2022, 2023, 2024]);
        assert_eq!(p.row_keys().len(), 3);
        assert_eq!(p.get(&"JANEIRO".to_string(), &2023), Some(dec(100)));
        assert_eq!(p.get(&"JANEIRO".to_string(), &2022), Some(Decimal::ZERO));
        assert_eq!(p.get(&"MARÇO".to_string(), &2024), Some(Decimal::ZERO));
        assert_eq!(p.get(&"ABRIL".to_string(), &2024), None);
    }

    #[test]
    fn test_empty_aggregate_gives_empty_pivot() {
        let table: AggregateTable<(String, i32)> = AggregateTable::new();
        let p = pivot(&table);
        assert!(p.is_empty());
        let totals = p.add_totals();
        assert_eq!(totals.grand_total(), Decimal::ZERO);
        assert!(totals.column_totals().is_empty());
    }

    #[test]
    fn test_totals_are_consistent() {
        let totals = sample_pivot().add_totals();

        let total_column: Decimal = totals.row_totals().iter().copied().sum();
        let total_row: Decimal = totals.column_totals().iter().copied().sum();
        let cells = totals.data().grand_total();

        assert_eq!(total_column, dec(177));
        assert_eq!(total_row, dec(177));
        assert_eq!(cells, dec(177));
        assert_eq!(totals.grand_total(), dec(177));
    }

    #[test]
    fn test_totals_per_row_and_column() {
        let totals = sample_pivot().add_totals();
        // rows: FEVEREIRO, JANEIRO, MARÇO; columns: 2022, 2023, 2024
        assert_eq!(totals.row_totals(), &[dec(50), dec(120), dec(7)]);
        assert_eq!(totals.column_totals(), &[dec(7), dec(150), dec(20)]);
    }

    #[test]
    fn test_melt_excludes_totals() {
        let totals = sample_pivot().add_totals();
        let long = totals.data().melt();

        assert_eq!(long.len(), 9);
        let sum: Decimal = long.iter().map(|r| r.value).sum();
        assert_eq!(sum, dec(177));
        assert_eq!(
            long[0],
            LongRow {
                row: "FEVEREIRO".to_string(),
                column: 2022,
                value: Decimal::ZERO,
            }
        );
        assert!(long.iter().all(|r| r.row != "TOTAL"));
    }
}
