use crate::error::{PurchaseReportError, Result};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::hash::Hash;

/// Summed amounts per group key.
///
/// Keys are unique and kept in the order they were first encountered. Any
/// other ordering (by amount, by calendar) is applied by the consumer.
///
/// The sum of absolute amounts ever added is kept within the decimal range,
/// which bounds every total later derived from the table (grand total, pivot
/// row and column totals).
#[derive(Debug, Clone)]
pub struct AggregateTable<K> {
    entries: Vec<(K, Decimal)>,
    index: HashMap<K, usize>,
    magnitude: Decimal,
}

impl<K> Default for AggregateTable<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            magnitude: Decimal::ZERO,
        }
    }
}

impl<K> AggregateTable<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the running sum for `key`, creating the group if needed.
    ///
    /// Fails with `Overflow` when the amounts added so far no longer fit the
    /// decimal range; the table is left unchanged in that case.
    pub fn add(&mut self, key: K, amount: Decimal) -> Result<()> {
        let magnitude = self
            .magnitude
            .checked_add(amount.abs())
            .ok_or(PurchaseReportError::Overflow)?;

        match self.index.get(&key) {
            Some(&slot) => {
                let sum = &mut self.entries[slot].1;
                *sum = sum
                    .checked_add(amount)
                    .ok_or(PurchaseReportError::Overflow)?;
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, amount));
            }
        }

        self.magnitude = magnitude;
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<Decimal> {
        self.index.get(key).map(|&slot| self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, Decimal)> + '_ {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn total(&self) -> Decimal {
        self.entries.iter().map(|(_, v)| *v).sum()
    }

    /// Ungroups the table back into one `(key, amount)` row per group.
    pub fn expand(&self) -> Vec<(K, Decimal)> {
        self.entries.clone()
    }

    /// Rows ordered by amount, largest first. Equal amounts keep their
    /// first-encountered order.
    pub fn sorted_by_amount(&self) -> Vec<(K, Decimal)> {
        let mut rows = self.entries.clone();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }
}

impl<K> PartialEq for AggregateTable<K>
where
    K: Eq + Hash,
{
    /// Two tables are equal when they hold the same groups with the same sums,
    /// regardless of key order.
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(k, v)| {
                other
                    .index
                    .get(k)
                    .is_some_and(|&slot| other.entries[slot].1 == *v)
            })
    }
}

impl<K: Eq + Hash> Eq for AggregateTable<K> {}

impl<K: Serialize> Serialize for AggregateTable<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

/// Grouped sum of `value` over `records`, keyed by `key`.
///
/// A key that carries missing parts (e.g. `None` fields) forms its own group;
/// no record is ever skipped. Amounts too large to sum give `Overflow`.
pub fn aggregate<'a, R, K, F, V>(
    records: impl IntoIterator<Item = &'a R>,
    key: F,
    value: V,
) -> Result<AggregateTable<K>>
where
    R: 'a,
    K: Eq + Hash + Clone,
    F: Fn(&R) -> K,
    V: Fn(&R) -> Decimal,
{
    let mut table = AggregateTable::new();
    for record in records {
        table.add(key(record), value(record))?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Line {
        supplier: Option<&'static str>,
        month: &'static str,
        year: i32,
        amount: Decimal,
    }

    fn line(supplier: Option<&'static str>, month: &'static str, year: i32, cents: i64) -> Line {
        Line {
            supplier,
            month,
            year,
            amount: Decimal::new(cents, 2),
        }
    }

    fn sample() -> Vec<Line> {
        vec![
            line(Some("B"), "JANEIRO", 2023, 10_00),
            line(Some("A"), "JANEIRO", 2023, 25_50),
            line(None, "FEVEREIRO", 2023, 3_25),
            line(Some("B"), "FEVEREIRO", 2024, 4_00),
            line(None, "JANEIRO", 2024, 1_75),
        ]
    }

    #[test]
    fn test_empty_input_gives_empty_table() {
        let lines: Vec<Line> = Vec::new();
        let table = aggregate(&lines, |l| l.supplier, |l| l.amount).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.total(), Decimal::ZERO);
    }

    #[test]
    fn test_single_key_sum_keeps_first_seen_order() {
        let lines = sample();
        let table = aggregate(&lines, |l| l.supplier, |l| l.amount).unwrap();

        let keys: Vec<Option<&str>> = table.keys().copied().collect();
        assert_eq!(keys, vec![Some("B"), Some("A"), None]);
        assert_eq!(table.get(&Some("B")), Some(Decimal::new(14_00, 2)));
        assert_eq!(table.get(&Some("A")), Some(Decimal::new(25_50, 2)));
    }

    #[test]
    fn test_missing_key_is_its_own_group() {
        let lines = sample();
        let table = aggregate(&lines, |l| l.supplier, |l| l.amount).unwrap();

        assert_eq!(table.get(&None), Some(Decimal::new(5_00, 2)));
        let input_total: Decimal = lines.iter().map(|l| l.amount).sum();
        assert_eq!(table.total(), input_total);
    }

    #[test]
    fn test_multi_key_grouping() {
        let lines = sample();
        let table = aggregate(&lines, |l| (l.month, l.year), |l| l.amount).unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(table.get(&("JANEIRO", 2023)), Some(Decimal::new(35_50, 2)));
        assert_eq!(table.get(&("JANEIRO", 2024)), Some(Decimal::new(1_75, 2)));
        assert_eq!(table.get(&("MARÇO", 2024)), None);
    }

    #[test]
    fn test_decimal_sum_has_no_drift() {
        let lines: Vec<Line> = (0..10_000).map(|_| line(Some("A"), "JANEIRO", 2023, 1)).collect();
        let table = aggregate(&lines, |l| l.supplier, |l| l.amount).unwrap();
        assert_eq!(table.get(&Some("A")), Some(Decimal::new(100, 0)));
    }

    #[test]
    fn test_sorted_by_amount_is_stable() {
        let rows = vec![("X", 500), ("Z", 100), ("Y", 500), ("W", 900)];
        let table = aggregate(&rows, |r| r.0, |r| Decimal::from(r.1)).unwrap();

        let keys: Vec<&str> = table.sorted_by_amount().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["W", "X", "Y", "Z"]);
    }

    #[test]
    fn test_group_expand_regroup_round_trip() {
        let lines = sample();
        let table = aggregate(&lines, |l| (l.supplier, l.year), |l| l.amount).unwrap();

        let expanded = table.expand();
        let regrouped = aggregate(&expanded, |row| row.0, |row| row.1).unwrap();

        assert_eq!(regrouped, table);
        let keys: Vec<_> = regrouped.keys().copied().collect();
        let original_keys: Vec<_> = table.keys().copied().collect();
        assert_eq!(keys, original_keys);
    }

    #[test]
    fn test_equality_ignores_key_order() {
        let a = vec![("A", Decimal::ONE), ("B", Decimal::from(2))];
        let b = vec![("B", Decimal::from(2)), ("A", Decimal::ONE)];
        let a = aggregate(&a, |r| r.0, |r| r.1).unwrap();
        let b = aggregate(&b, |r| r.0, |r| r.1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sum_past_decimal_range_is_overflow() {
        let rows = vec![("A", Decimal::MAX), ("A", Decimal::MAX)];
        assert!(matches!(
            aggregate(&rows, |r| r.0, |r| r.1),
            Err(PurchaseReportError::Overflow)
        ));

        // separate groups would still overflow the grand total
        let rows = vec![("A", Decimal::MAX), ("B", Decimal::MAX)];
        assert!(matches!(
            aggregate(&rows, |r| r.0, |r| r.1),
            Err(PurchaseReportError::Overflow)
        ));
    }

    #[test]
    fn test_failed_add_leaves_table_unchanged() {
        let mut table = AggregateTable::new();
        table.add("A", Decimal::MAX).unwrap();
        assert!(table.add("A", Decimal::ONE).is_err());
        assert_eq!(table.get(&"A"), Some(Decimal::MAX));
        assert_eq!(table.total(), Decimal::MAX);
    }
}
