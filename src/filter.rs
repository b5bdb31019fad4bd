use crate::schema::PurchaseRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// A read-only view over the records that passed a filter.
///
/// Narrowing a view always produces a new one; the underlying records are
/// never touched.
#[derive(Debug, Clone, Default)]
pub struct FilteredSet<'a> {
    records: Vec<&'a PurchaseRecord>,
}

impl<'a> FilteredSet<'a> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a PurchaseRecord> + '_ {
        self.records.iter().copied()
    }

    pub fn records(&self) -> &[&'a PurchaseRecord] {
        &self.records
    }

    /// A further-restricted view keeping records that satisfy `predicate`.
    pub fn narrow<P>(&self, predicate: P) -> FilteredSet<'a>
    where
        P: Fn(&PurchaseRecord) -> bool,
    {
        FilteredSet {
            records: self.iter().filter(|r| predicate(r)).collect(),
        }
    }

    pub fn for_year(&self, year: i32) -> FilteredSet<'a> {
        self.narrow(|r| r.year == year)
    }

    /// Records of one supplier (by legal name) restricted to `stores`.
    ///
    /// An empty store set selects nothing.
    pub fn for_supplier_stores(
        &self,
        legal_name: &str,
        stores: &BTreeSet<String>,
    ) -> FilteredSet<'a> {
        if stores.is_empty() {
            return FilteredSet::default();
        }
        self.narrow(|r| {
            r.legal_name.as_deref() == Some(legal_name)
                && r.store.as_ref().is_some_and(|s| stores.contains(s))
        })
    }

    /// The values a user can pick from when narrowing this view.
    pub fn selection_options(&self) -> SelectionOptions {
        let mut legal_names = Vec::new();
        let mut seen_names = HashSet::new();
        let mut stores = Vec::new();
        let mut seen_stores = HashSet::new();
        let mut years = BTreeSet::new();

        for record in self.iter() {
            if let Some(name) = record.legal_name.as_deref() {
                if seen_names.insert(name) {
                    legal_names.push(name.to_string());
                }
            }
            if let Some(store) = record.store.as_deref() {
                if seen_stores.insert(store) {
                    stores.push(store.to_string());
                }
            }
            years.insert(record.year);
        }

        SelectionOptions {
            legal_names,
            stores,
            years: years.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a PurchaseRecord> for FilteredSet<'a> {
    fn from_iter<I: IntoIterator<Item = &'a PurchaseRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'s, 'a> IntoIterator for &'s FilteredSet<'a> {
    type Item = &'a PurchaseRecord;
    type IntoIter = std::iter::Copied<std::slice::Iter<'s, &'a PurchaseRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter().copied()
    }
}

/// Keeps records whose status equals `status` exactly and, when given, whose
/// year equals `year`. Returns an empty set when nothing matches.
pub fn filter<'a>(
    records: &'a [PurchaseRecord],
    status: &str,
    year: Option<i32>,
) -> FilteredSet<'a> {
    records
        .iter()
        .filter(|r| r.status == status && year.map_or(true, |y| r.year == y))
        .collect()
}

/// Distinct values present in a [`FilteredSet`]: names and stores in the
/// order first seen, years ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOptions {
    pub legal_names: Vec<String>,
    pub stores: Vec<String>,
    pub years: Vec<i32>,
}

/// The user's picks for the supplier/store detail report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub legal_name: String,
    pub stores: BTreeSet<String>,
}

impl Selection {
    pub fn new<I, S>(legal_name: impl Into<String>, stores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            legal_name: legal_name.into(),
            stores: stores.into_iter().map(Into::into).collect(),
        }
    }

    pub fn apply<'a>(&self, set: &FilteredSet<'a>) -> FilteredSet<'a> {
        set.for_supplier_stores(&self.legal_name, &self.stores)
    }
}

/// Result of a report driven by user selection.
///
/// `NoData` is a valid outcome, not a failure: the selection matched no rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum SelectionOutcome<T> {
    Data(T),
    NoData,
}

impl<T> SelectionOutcome<T> {
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Data(value) => Some(value),
            Self::NoData => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Data(value) => Some(value),
            Self::NoData => None,
        }
    }
}
