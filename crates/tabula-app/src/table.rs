// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::ids::{RowKey, TableId};
use crate::scope::ColumnScope;
use crate::settings::{DEFAULT_PAGE_SIZE, EngineSettings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub column: String,
    pub descending: bool,
}

impl SortEntry {
    pub fn new(column: impl Into<String>, descending: bool) -> Self {
        Self {
            column: column.into(),
            descending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    pub value: String,
}

impl ColumnFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Pinned rows, rendered above the paginated body in list order. Only the
/// top group exists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RowPinning {
    pub top: Vec<RowKey>,
}

impl RowPinning {
    pub fn top(keys: impl IntoIterator<Item = RowKey>) -> Self {
        Self {
            top: keys.into_iter().collect(),
        }
    }

    pub fn contains(&self, key: RowKey) -> bool {
        self.top.contains(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn with_page_index(self, page_index: usize) -> Self {
        Self { page_index, ..self }
    }

    /// Changing the page size always returns to the first page.
    pub fn with_page_size(self, page_size: usize) -> Self {
        Self {
            page_index: 0,
            page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableInteractionState {
    pub sorting: Vec<SortEntry>,
    pub column_filters: Vec<ColumnFilter>,
    pub global_filter: String,
    pub column_visibility: BTreeMap<String, bool>,
    pub row_selection: BTreeSet<RowKey>,
    pub row_pinning: RowPinning,
    pub pagination: Pagination,
    pub selected_column: ColumnScope,
}

impl TableInteractionState {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            pagination: Pagination::default().with_page_size(page_size),
            ..Self::default()
        }
    }

    pub fn sort_for(&self, column: &str) -> Option<&SortEntry> {
        self.sorting.iter().find(|entry| entry.column == column)
    }

    /// Next sorting after a header request. A single sort replaces the whole
    /// sequence; a multi sort updates the column in place or appends it.
    pub fn sorting_with(&self, column: &str, descending: bool, multi: bool) -> Vec<SortEntry> {
        if !multi {
            return vec![SortEntry::new(column, descending)];
        }

        let mut next = self.sorting.clone();
        match next.iter_mut().find(|entry| entry.column == column) {
            Some(entry) => entry.descending = descending,
            None => next.push(SortEntry::new(column, descending)),
        }
        next
    }

    pub fn column_filter(&self, column: &str) -> Option<&str> {
        self.column_filters
            .iter()
            .find(|filter| filter.column == column)
            .map(|filter| filter.value.as_str())
    }

    /// Next filters after typing `value` into the input for `column`. An
    /// empty value drops the entry.
    pub fn column_filters_with(&self, column: &str, value: &str) -> Vec<ColumnFilter> {
        let mut next = self.column_filters.clone();
        match next.iter().position(|filter| filter.column == column) {
            Some(index) if value.is_empty() => {
                next.remove(index);
            }
            Some(index) => next[index].value = value.to_owned(),
            None if value.is_empty() => {}
            None => next.push(ColumnFilter::new(column, value)),
        }
        next
    }

    pub fn is_column_visible(&self, column: &str) -> bool {
        self.column_visibility.get(column).copied().unwrap_or(true)
    }

    pub fn visibility_with(&self, column: &str, visible: bool) -> BTreeMap<String, bool> {
        let mut next = self.column_visibility.clone();
        next.insert(column.to_owned(), visible);
        next
    }

    pub fn is_selected(&self, key: RowKey) -> bool {
        self.row_selection.contains(&key)
    }

    pub fn selection_toggled(&self, key: RowKey) -> BTreeSet<RowKey> {
        let mut next = self.row_selection.clone();
        if !next.remove(&key) {
            next.insert(key);
        }
        next
    }

    pub fn is_pinned(&self, key: RowKey) -> bool {
        self.row_pinning.contains(key)
    }

    pub fn pinning_toggled(&self, key: RowKey) -> RowPinning {
        let mut next = self.row_pinning.clone();
        match next.top.iter().position(|pinned| *pinned == key) {
            Some(index) => {
                next.top.remove(index);
            }
            None => next.top.push(key),
        }
        next
    }
}

/// Interaction state for every table on screen, keyed by table id. Each
/// setter replaces one field wholesale; callers merge partial updates
/// themselves before dispatching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStore {
    defaults: TableInteractionState,
    tables: BTreeMap<TableId, TableInteractionState>,
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new(&EngineSettings::default())
    }
}

impl TableStore {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            defaults: TableInteractionState::with_page_size(settings.page_size),
            tables: BTreeMap::new(),
        }
    }

    pub fn defaults(&self) -> &TableInteractionState {
        &self.defaults
    }

    pub fn contains(&self, table: &TableId) -> bool {
        self.tables.contains_key(table)
    }

    pub fn table_ids(&self) -> impl Iterator<Item = &TableId> {
        self.tables.keys()
    }

    /// Current state of `table`, creating the default entry on first use.
    pub fn entry(&mut self, table: &TableId) -> &TableInteractionState {
        self.slot(table)
    }

    /// Read-only view that never creates an entry.
    pub fn get(&self, table: &TableId) -> &TableInteractionState {
        self.tables.get(table).unwrap_or(&self.defaults)
    }

    pub fn remove(&mut self, table: &TableId) -> Option<TableInteractionState> {
        self.tables.remove(table)
    }

    pub fn set_sorting(&mut self, table: &TableId, sorting: Vec<SortEntry>) {
        let mut seen = BTreeSet::new();
        let mut unique = sorting
            .into_iter()
            .rev()
            .filter(|entry| seen.insert(entry.column.clone()))
            .collect::<Vec<_>>();
        unique.reverse();
        debug!(%table, sorting = ?unique, "set sorting");
        self.slot(table).sorting = unique;
    }

    pub fn set_column_filters(&mut self, table: &TableId, filters: Vec<ColumnFilter>) {
        let mut seen = BTreeSet::new();
        let mut unique = filters
            .into_iter()
            .rev()
            .filter(|filter| seen.insert(filter.column.clone()))
            .collect::<Vec<_>>();
        unique.reverse();
        debug!(%table, filters = ?unique, "set column filters");
        self.slot(table).column_filters = unique;
    }

    pub fn set_global_filter(&mut self, table: &TableId, filter: impl Into<String>) {
        let filter = filter.into();
        debug!(%table, filter = %filter, "set global filter");
        self.slot(table).global_filter = filter;
    }

    pub fn set_column_visibility(&mut self, table: &TableId, visibility: BTreeMap<String, bool>) {
        self.slot(table).column_visibility = visibility;
    }

    pub fn set_row_selection(&mut self, table: &TableId, selection: BTreeSet<RowKey>) {
        debug!(%table, selected = selection.len(), "set row selection");
        self.slot(table).row_selection = selection;
    }

    pub fn set_row_pinning(&mut self, table: &TableId, pinning: RowPinning) {
        let mut seen = BTreeSet::new();
        let top = pinning
            .top
            .into_iter()
            .filter(|key| seen.insert(*key))
            .collect::<Vec<_>>();
        debug!(%table, pinned = ?top, "set row pinning");
        self.slot(table).row_pinning = RowPinning { top };
    }

    pub fn set_pagination(&mut self, table: &TableId, pagination: Pagination) {
        let page_size = if pagination.page_size == 0 {
            self.defaults.pagination.page_size
        } else {
            pagination.page_size
        };
        self.slot(table).pagination = Pagination {
            page_index: pagination.page_index,
            page_size,
        };
    }

    pub fn set_selected_column(&mut self, table: &TableId, scope: ColumnScope) {
        debug!(%table, scope = scope.as_str(), "set selected column");
        self.slot(table).selected_column = scope;
    }

    pub fn set_table_state(&mut self, table: &TableId, state: TableInteractionState) {
        let TableInteractionState {
            sorting,
            column_filters,
            global_filter,
            column_visibility,
            row_selection,
            row_pinning,
            pagination,
            selected_column,
        } = state;
        self.set_sorting(table, sorting);
        self.set_column_filters(table, column_filters);
        self.set_global_filter(table, global_filter);
        self.set_column_visibility(table, column_visibility);
        self.set_row_selection(table, row_selection);
        self.set_row_pinning(table, row_pinning);
        self.set_pagination(table, pagination);
        self.set_selected_column(table, selected_column);
    }

    pub fn reset(&mut self, table: &TableId) {
        debug!(%table, "table state reset");
        let defaults = self.defaults.clone();
        *self.slot(table) = defaults;
    }

    fn slot(&mut self, table: &TableId) -> &mut TableInteractionState {
        let defaults = &self.defaults;
        self.tables
            .entry(table.clone())
            .or_insert_with(|| defaults.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnFilter, Pagination, RowPinning, SortEntry, TableStore};
    use crate::{ColumnScope, EngineSettings, RowKey, TableId};
    use std::collections::BTreeSet;

    #[test]
    fn first_reference_creates_the_default_entry() {
        let mut store = TableStore::default();
        let table = TableId::users();
        let defaults = store.defaults().clone();
        assert!(!store.contains(&table));
        assert_eq!(store.entry(&table), &defaults);
        assert!(store.contains(&table));
        assert_eq!(store.get(&table).pagination, Pagination::default());
    }

    #[test]
    fn tables_are_independent() {
        let mut store = TableStore::default();
        let users = TableId::users();
        let elements = TableId::elements();
        store.set_global_filter(&users, "leanne");
        store.set_pagination(&elements, Pagination::default().with_page_index(2));

        assert_eq!(store.get(&users).global_filter, "leanne");
        assert_eq!(store.get(&users).pagination.page_index, 0);
        assert_eq!(store.get(&elements).global_filter, "");
        assert_eq!(store.get(&elements).pagination.page_index, 2);
    }

    #[test]
    fn setters_replace_instead_of_merging() {
        let mut store = TableStore::default();
        let table = TableId::users();
        store.set_sorting(&table, vec![SortEntry::new("name", false)]);
        store.set_sorting(&table, vec![SortEntry::new("email", true)]);
        assert_eq!(store.get(&table).sorting, vec![SortEntry::new("email", true)]);
    }

    #[test]
    fn duplicate_columns_collapse_to_the_last_entry() {
        let mut store = TableStore::default();
        let table = TableId::users();
        store.set_sorting(
            &table,
            vec![
                SortEntry::new("name", false),
                SortEntry::new("email", false),
                SortEntry::new("name", true),
            ],
        );
        assert_eq!(
            store.get(&table).sorting,
            vec![SortEntry::new("email", false), SortEntry::new("name", true)]
        );

        store.set_column_filters(
            &table,
            vec![ColumnFilter::new("name", "a"), ColumnFilter::new("name", "b")],
        );
        assert_eq!(
            store.get(&table).column_filters,
            vec![ColumnFilter::new("name", "b")]
        );
    }

    #[test]
    fn zero_page_size_falls_back_to_default() {
        let mut store = TableStore::default();
        let table = TableId::users();
        store.set_pagination(
            &table,
            Pagination {
                page_index: 1,
                page_size: 0,
            },
        );
        assert_eq!(store.get(&table).pagination.page_size, 5);
        assert_eq!(store.get(&table).pagination.page_index, 1);
    }

    #[test]
    fn reset_restores_configured_defaults() {
        let settings = EngineSettings {
            page_size: 10,
            ..EngineSettings::default()
        };
        let mut store = TableStore::new(&settings);
        let table = TableId::users();
        store.set_sorting(&table, vec![SortEntry::new("name", true)]);
        store.set_selected_column(&table, ColumnScope::Each);
        store.set_row_selection(&table, BTreeSet::from([RowKey::new(1)]));
        store.set_row_pinning(&table, RowPinning::top([RowKey::new(0)]));

        store.reset(&table);
        assert_eq!(store.get(&table), store.defaults());
        assert_eq!(store.get(&table).pagination.page_size, 10);
    }

    #[test]
    fn sorting_with_replaces_or_appends() {
        let mut store = TableStore::default();
        let table = TableId::users();
        store.set_sorting(&table, vec![SortEntry::new("name", false)]);
        let state = store.get(&table);

        assert_eq!(
            state.sorting_with("email", true, false),
            vec![SortEntry::new("email", true)]
        );
        assert_eq!(
            state.sorting_with("email", true, true),
            vec![SortEntry::new("name", false), SortEntry::new("email", true)]
        );
        assert_eq!(
            state.sorting_with("name", true, true),
            vec![SortEntry::new("name", true)]
        );
    }

    #[test]
    fn column_filters_with_drops_empty_values() {
        let mut store = TableStore::default();
        let table = TableId::users();
        store.set_column_filters(&table, vec![ColumnFilter::new("name", "le")]);
        let state = store.get(&table);

        assert_eq!(
            state.column_filters_with("name", "lea"),
            vec![ColumnFilter::new("name", "lea")]
        );
        assert!(state.column_filters_with("name", "").is_empty());
        assert_eq!(state.column_filters_with("email", "").len(), 1);
    }

    #[test]
    fn pin_toggle_appends_then_removes() {
        let store = TableStore::default();
        let state = store.get(&TableId::users());
        let pinned = state.pinning_toggled(RowKey::new(3));
        assert_eq!(pinned.top, vec![RowKey::new(3)]);

        let mut with_pin = state.clone();
        with_pin.row_pinning = pinned;
        assert!(with_pin.pinning_toggled(RowKey::new(3)).is_empty());
    }
}
