// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::ids::{RecordId, RowKey};
use crate::model::{Column, Record, find_column};
use crate::rank::{ItemRank, Ranker};
use crate::table::{SortEntry, TableInteractionState};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow<'a, R> {
    pub key: RowKey,
    pub record: &'a R,
    /// Present while the all-columns filter is active.
    pub rank: Option<ItemRank>,
}

/// Rows a table shows for one committed state: pinned rows first, then one
/// page of the remainder.
#[derive(Debug, Clone, PartialEq)]
pub struct RowModel<'a, R> {
    pub top: Vec<ViewRow<'a, R>>,
    pub page: Vec<ViewRow<'a, R>>,
    /// Keys passing every filter, pinned rows included, in sorted order.
    pub filtered: Vec<RowKey>,
    pub total: usize,
    pub page_count: usize,
}

impl<R> RowModel<'_, R> {
    pub fn filtered_count(&self) -> usize {
        self.filtered.len()
    }

    pub fn page_keys(&self) -> Vec<RowKey> {
        self.page.iter().map(|row| row.key).collect()
    }

    /// Selected keys that survive the current filters.
    pub fn selected_count(&self, selection: &BTreeSet<RowKey>) -> usize {
        self.filtered
            .iter()
            .filter(|key| selection.contains(key))
            .count()
    }

    pub fn selection_summary(&self, selection: &BTreeSet<RowKey>) -> String {
        format!(
            "{} of {} row(s) selected",
            self.selected_count(selection),
            self.filtered_count()
        )
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.page.is_empty()
    }
}

/// Records in sort order. A record's position here is its [`RowKey`]. Ties
/// keep fetch order and missing values sort last in either direction.
pub fn sorted_records<'a, R: Record>(records: &'a [R], sorting: &[SortEntry]) -> Vec<&'a R> {
    let columns = sorting
        .iter()
        .filter(|entry| find_column(R::columns(), &entry.column).is_some_and(|c| c.sortable))
        .collect::<Vec<_>>();

    let mut sorted = records.iter().collect::<Vec<_>>();
    if columns.is_empty() {
        return sorted;
    }

    sorted.sort_by(|left, right| {
        for entry in &columns {
            let left_value = left.value(&entry.column);
            let right_value = right.value(&entry.column);
            let order = match (&left_value, &right_value) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => return Ordering::Greater,
                (Some(_), None) => return Ordering::Less,
                (Some(left), Some(right)) if entry.descending => left.cmp_value(right).reverse(),
                (Some(left), Some(right)) => left.cmp_value(right),
            };
            if order != Ordering::Equal {
                return order;
            }
        }
        Ordering::Equal
    });
    sorted
}

pub fn sorted_ids<R: Record>(records: &[R], sorting: &[SortEntry]) -> Vec<RecordId> {
    sorted_records(records, sorting)
        .into_iter()
        .map(|record| record.id())
        .collect()
}

/// Record behind `key` in the sorted, unfiltered row model.
pub fn record_at<'a, R: Record>(
    records: &'a [R],
    sorting: &[SortEntry],
    key: RowKey,
) -> Option<&'a R> {
    sorted_records(records, sorting).get(key.get()).copied()
}

pub fn visible_columns<R: Record>(state: &TableInteractionState) -> Vec<&'static Column> {
    R::columns()
        .iter()
        .filter(|column| !column.hideable || state.is_column_visible(column.id))
        .collect()
}

fn matches_column_filters<R: Record>(record: &R, state: &TableInteractionState) -> bool {
    state.column_filters.iter().all(|filter| {
        let Some(column) = find_column(R::columns(), &filter.column) else {
            return true;
        };
        if !column.filterable {
            return true;
        }
        let needle = filter.value.to_lowercase();
        record
            .value(column.id)
            .is_some_and(|value| value.display().to_lowercase().contains(&needle))
    })
}

fn global_rank<R: Record>(record: &R, ranker: &mut Ranker) -> ItemRank {
    let values = R::columns()
        .iter()
        .filter(|column| column.filterable)
        .filter_map(|column| record.value(column.id))
        .map(|value| value.display());
    ranker.rank_row(values)
}

pub fn build_row_model<'a, R: Record>(
    records: &'a [R],
    state: &TableInteractionState,
) -> RowModel<'a, R> {
    let sorted = sorted_records(records, &state.sorting);
    let total = sorted.len();
    let global = state.global_filter.as_str();
    let mut ranker = (!global.is_empty()).then(|| Ranker::new(global));

    let filtered_rows = sorted
        .into_iter()
        .enumerate()
        .filter(|(_, record)| matches_column_filters(*record, state))
        .filter_map(|(index, record)| {
            let rank = ranker.as_mut().map(|ranker| global_rank(record, ranker));
            if rank.is_some_and(|rank| !rank.passed) {
                return None;
            }
            Some(ViewRow {
                key: RowKey::new(index),
                record,
                rank,
            })
        })
        .collect::<Vec<_>>();

    let filtered = filtered_rows.iter().map(|row| row.key).collect::<Vec<_>>();

    let top = state
        .row_pinning
        .top
        .iter()
        .filter_map(|key| filtered_rows.iter().find(|row| row.key == *key).cloned())
        .collect::<Vec<_>>();

    let remainder = filtered_rows
        .into_iter()
        .filter(|row| !state.row_pinning.contains(row.key))
        .collect::<Vec<_>>();

    let page_size = state.pagination.page_size.max(1);
    let page_count = remainder.len().div_ceil(page_size).max(1);
    let page = remainder
        .into_iter()
        .skip(state.pagination.page_index.saturating_mul(page_size))
        .take(page_size)
        .collect();

    RowModel {
        top,
        page,
        filtered,
        total,
        page_count,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_row_model, sorted_ids, visible_columns};
    use crate::{
        ColumnFilter, Pagination, PeriodicElement, RecordId, RowKey, RowPinning, SortEntry,
        TableInteractionState,
    };
    use std::collections::BTreeSet;

    fn element(id: i64, name: &str, weight: f64, symbol: &str) -> PeriodicElement {
        PeriodicElement {
            id,
            name: name.to_owned(),
            weight,
            symbol: symbol.to_owned(),
        }
    }

    fn elements() -> Vec<PeriodicElement> {
        vec![
            element(1, "Hydrogen", 1.0079, "H"),
            element(2, "Helium", 4.0026, "He"),
            element(3, "Lithium", 6.941, "Li"),
            element(4, "Beryllium", 9.0122, "Be"),
            element(5, "Boron", 10.811, "B"),
            element(6, "Carbon", 12.0107, "C"),
            element(7, "Nitrogen", 14.0067, "N"),
        ]
    }

    fn ids(rows: &[super::ViewRow<'_, PeriodicElement>]) -> Vec<i64> {
        rows.iter().map(|row| row.record.id).collect()
    }

    #[test]
    fn unsorted_rows_keep_fetch_order_and_paginate() {
        let records = elements();
        let state = TableInteractionState::default();
        let model = build_row_model(&records, &state);
        assert_eq!(ids(&model.page), vec![1, 2, 3, 4, 5]);
        assert_eq!(model.page_count, 2);
        assert_eq!(model.total, 7);

        let second = TableInteractionState {
            pagination: Pagination::default().with_page_index(1),
            ..TableInteractionState::default()
        };
        assert_eq!(ids(&build_row_model(&records, &second).page), vec![6, 7]);
    }

    #[test]
    fn multi_sort_applies_in_order() {
        let mut records = elements();
        records.push(element(8, "Boron", 1.0, "X"));
        let sorting = vec![SortEntry::new("name", false), SortEntry::new("weight", true)];
        let sorted = sorted_ids(&records, &sorting);
        let boron = sorted
            .iter()
            .skip_while(|id| **id != RecordId::from(5))
            .take(2)
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(boron, vec![RecordId::from(5), RecordId::from(8)]);
        assert_eq!(sorted.first(), Some(&RecordId::from(4)));
    }

    #[test]
    fn row_keys_are_sorted_positions() {
        let records = elements();
        let state = TableInteractionState {
            sorting: vec![SortEntry::new("weight", true)],
            ..TableInteractionState::default()
        };
        let model = build_row_model(&records, &state);
        assert_eq!(model.page[0].record.name, "Nitrogen");
        assert_eq!(model.page[0].key, RowKey::new(0));
    }

    #[test]
    fn pinned_rows_skip_pagination() {
        let records = elements();
        let state = TableInteractionState {
            row_pinning: RowPinning::top([RowKey::new(6), RowKey::new(0)]),
            ..TableInteractionState::default()
        };
        let model = build_row_model(&records, &state);
        assert_eq!(ids(&model.top), vec![7, 1]);
        assert_eq!(ids(&model.page), vec![2, 3, 4, 5, 6]);
        assert_eq!(model.page_count, 1);
    }

    #[test]
    fn column_filter_is_case_insensitive_substring() {
        let records = elements();
        let state = TableInteractionState {
            column_filters: vec![ColumnFilter::new("name", "ON")],
            ..TableInteractionState::default()
        };
        let model = build_row_model(&records, &state);
        assert_eq!(ids(&model.page), vec![5, 6]);
        assert_eq!(model.filtered_count(), 2);
    }

    #[test]
    fn global_filter_ranks_every_row() {
        let records = elements();
        let state = TableInteractionState {
            global_filter: "he".to_owned(),
            ..TableInteractionState::default()
        };
        let model = build_row_model(&records, &state);
        assert_eq!(ids(&model.page), vec![1, 2]);
        assert!(model.page.iter().all(|row| row.rank.is_some_and(|r| r.passed)));
    }

    #[test]
    fn filtered_out_pins_are_hidden() {
        let records = elements();
        let state = TableInteractionState {
            global_filter: "lithium".to_owned(),
            row_pinning: RowPinning::top([RowKey::new(0)]),
            ..TableInteractionState::default()
        };
        let model = build_row_model(&records, &state);
        assert!(model.top.is_empty());
        assert_eq!(ids(&model.page), vec![3]);
    }

    #[test]
    fn selection_summary_counts_filtered_rows() {
        let records = elements();
        let state = TableInteractionState {
            column_filters: vec![ColumnFilter::new("symbol", "b")],
            ..TableInteractionState::default()
        };
        let model = build_row_model(&records, &state);
        let selection = BTreeSet::from([RowKey::new(0), RowKey::new(3)]);
        assert_eq!(model.selection_summary(&selection), "1 of 2 row(s) selected");
    }

    #[test]
    fn id_column_cannot_be_hidden() {
        let mut state = TableInteractionState::default();
        state.column_visibility = state.visibility_with("id", false);
        state.column_visibility.insert("weight".to_owned(), false);
        let columns = visible_columns::<PeriodicElement>(&state)
            .into_iter()
            .map(|column| column.id)
            .collect::<Vec<_>>();
        assert_eq!(columns, vec!["id", "name", "symbol"]);
    }
}
