use crate::aggregation::AggregateTable;
use crate::error::{PurchaseReportError, Result};
use crate::schema::SupplierKey;
use log::debug;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::hash::Hash;

pub const PERCENTAGE_DECIMALS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntity<K> {
    /// 1-based position by descending amount.
    pub rank: usize,
    pub entity: K,
    pub amount: Decimal,
    /// Share of the grand total in percent, rounded for display.
    pub percentage: Decimal,
}

pub type RankingTable<K = SupplierKey> = Vec<RankedEntity<K>>;

/// Ranks entities by their share of the grand total.
///
/// Entities whose unrounded share is below `threshold_pct` are dropped. The
/// rest are ordered by amount, largest first, and numbered 1..N; equal amounts
/// keep their order in `table` and still get distinct ranks.
pub fn rank<K>(table: &AggregateTable<K>, threshold_pct: Decimal) -> Result<RankingTable<K>>
where
    K: Eq + Hash + Clone,
{
    let grand_total = table.total();
    if grand_total.is_zero() {
        return Err(PurchaseReportError::DivisionUndefined);
    }

    let mut kept = Vec::new();
    for (entity, amount) in table.iter() {
        let pct = share_pct(amount, grand_total)?;
        if pct >= threshold_pct {
            kept.push((entity.clone(), amount, pct));
        }
    }

    debug!(
        "Ranking keeps {} of {} entities at threshold {}%",
        kept.len(),
        table.len(),
        threshold_pct
    );

    // stable: ties stay in table order
    kept.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(kept
        .into_iter()
        .enumerate()
        .map(|(i, (entity, amount, pct))| RankedEntity {
            rank: i + 1,
            entity,
            amount,
            percentage: pct.round_dp_with_strategy(
                PERCENTAGE_DECIMALS,
                RoundingStrategy::MidpointNearestEven,
            ),
        })
        .collect())
}

/// `amount` as a percentage of `total`, unrounded.
///
/// With mixed-sign amounts a share can exceed the decimal range; that is an
/// `Overflow`, never a panic.
fn share_pct(amount: Decimal, total: Decimal) -> Result<Decimal> {
    amount
        .checked_div(total)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or(PurchaseReportError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate;

    fn table(rows: &[(&'static str, i64)]) -> AggregateTable<&'static str> {
        aggregate(rows, |r| r.0, |r| Decimal::from(r.1)).unwrap()
    }

    fn threshold() -> Decimal {
        Decimal::new(3, 1)
    }

    #[test]
    fn test_zero_total_is_division_undefined() {
        let empty: AggregateTable<&str> = AggregateTable::new();
        assert!(matches!(
            rank(&empty, threshold()),
            Err(PurchaseReportError::DivisionUndefined)
        ));

        let zeros = table(&[("A", 0), ("B", 0)]);
        assert!(matches!(
            rank(&zeros, threshold()),
            Err(PurchaseReportError::DivisionUndefined)
        ));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let ranked = rank(&table(&[("X", 500), ("Y", 500)]), threshold()).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!((ranked[0].rank, ranked[0].entity), (1, "X"));
        assert_eq!((ranked[1].rank, ranked[1].entity), (2, "Y"));
        assert_eq!(ranked[0].percentage, Decimal::from(50));
    }

    #[test]
    fn test_sorted_descending_with_contiguous_ranks() {
        let ranked = rank(
            &table(&[("C", 100), ("A", 600), ("D", 100), ("B", 200)]),
            threshold(),
        )
        .unwrap();

        let order: Vec<&str> = ranked.iter().map(|r| r.entity).collect();
        assert_eq!(order, vec!["A", "B", "C", "D"]);
        let ranks: Vec<usize> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_threshold_uses_unrounded_share() {
        // B: 298 / 100000 = 0.298% rounds to 0.30 but must still be dropped.
        // C: 300 / 100000 = 0.3% is kept.
        let ranked = rank(
            &table(&[("A", 99_402), ("B", 298), ("C", 300)]),
            threshold(),
        )
        .unwrap();

        let kept: Vec<&str> = ranked.iter().map(|r| r.entity).collect();
        assert_eq!(kept, vec!["A", "C"]);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[1].percentage, Decimal::new(30, 2));
    }

    #[test]
    fn test_percentages_rounded_to_two_places() {
        let ranked = rank(&table(&[("A", 1), ("B", 2)]), Decimal::ZERO).unwrap();
        assert_eq!(ranked[0].entity, "B");
        assert_eq!(ranked[0].percentage, Decimal::new(6667, 2));
        assert_eq!(ranked[1].percentage, Decimal::new(3333, 2));
    }

    #[test]
    fn test_custom_threshold_filters_more() {
        let ranked = rank(
            &table(&[("A", 980), ("B", 15), ("C", 5)]),
            Decimal::ONE,
        )
        .unwrap();
        let kept: Vec<&str> = ranked.iter().map(|r| r.entity).collect();
        assert_eq!(kept, vec!["A", "B"]);
    }

    #[test]
    fn test_share_beyond_decimal_range_is_overflow() {
        // a credit note almost cancels a huge purchase: the share of the
        // purchase in a total of 1 is 1e29 percent
        let huge = Decimal::from_i128_with_scale(10_i128.pow(27), 0);
        let mut table = AggregateTable::new();
        table.add("A", huge).unwrap();
        table.add("B", -(huge - Decimal::ONE)).unwrap();

        assert!(matches!(
            rank(&table, threshold()),
            Err(PurchaseReportError::Overflow)
        ));
    }
}
