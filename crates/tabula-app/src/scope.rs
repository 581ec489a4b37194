// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::ids::TableId;
use crate::model::Column;
use crate::table::{TableInteractionState, TableStore};

const EACH: &str = "each";

/// Which filter mechanism is authoritative for a table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnScope {
    /// Fuzzy match across every filterable column through the global filter.
    #[default]
    All,
    /// One input per filterable column, all active at once.
    Each,
    /// A single column filter; no other filter may exist.
    Single(String),
}

impl ColumnScope {
    pub fn parse(value: &str) -> Self {
        match value {
            "" => Self::All,
            EACH => Self::Each,
            column => Self::Single(column.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "",
            Self::Each => EACH,
            Self::Single(column) => column,
        }
    }

    pub fn label(&self, columns: &[Column]) -> String {
        match self {
            Self::All => "all columns".to_owned(),
            Self::Each => "each column".to_owned(),
            Self::Single(column) => columns
                .iter()
                .find(|spec| spec.id == column)
                .map_or_else(|| column.clone(), |spec| spec.label.to_owned()),
        }
    }

    /// Scopes offered by the column picker, in display order.
    pub fn options(columns: &[Column]) -> Vec<Self> {
        let mut options = vec![Self::All, Self::Each];
        options.extend(
            columns
                .iter()
                .filter(|column| column.filterable)
                .map(|column| Self::Single(column.id.to_owned())),
        );
        options
    }

    /// Which filter a keystroke lands in. `column` names the input the user
    /// typed into; `None` is the shared input used by `All` and `Single`.
    /// Input that does not belong to the active scope resolves to `None`.
    pub fn target_for(&self, column: Option<&str>) -> Option<FilterTarget> {
        match (self, column) {
            (Self::All, None) => Some(FilterTarget::Global),
            (Self::Each, Some(column)) => Some(FilterTarget::Column(column.to_owned())),
            (Self::Single(active), None) => Some(FilterTarget::Column(active.clone())),
            (Self::Single(active), Some(column)) if active == column => {
                Some(FilterTarget::Column(active.clone()))
            }
            _ => None,
        }
    }

    /// Inputs rendered for this scope. `None` is the shared input.
    pub fn inputs<'a>(&'a self, columns: &'a [Column]) -> Vec<Option<&'a str>> {
        match self {
            Self::All => vec![None],
            Self::Single(_) => vec![None],
            Self::Each => columns
                .iter()
                .filter(|column| column.filterable)
                .map(|column| Some(column.id))
                .collect(),
        }
    }
}

impl From<String> for ColumnScope {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ColumnScope> for String {
    fn from(value: ColumnScope) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for ColumnScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTarget {
    Global,
    Column(String),
}

/// Committed text of a filter input under the table's current scope.
pub fn input_text(state: &TableInteractionState, column: Option<&str>) -> String {
    match state.selected_column.target_for(column) {
        Some(FilterTarget::Global) => state.global_filter.clone(),
        Some(FilterTarget::Column(column)) => state
            .column_filter(&column)
            .map(str::to_owned)
            .unwrap_or_default(),
        None => String::new(),
    }
}

/// Switches the table to `next`, clearing every filter that belonged to the
/// previous scope. Returns false when the scope is unchanged, in which case
/// nothing is touched.
pub fn switch_scope(store: &mut TableStore, table: &TableId, next: ColumnScope) -> bool {
    if store.entry(table).selected_column == next {
        return false;
    }
    debug!(%table, scope = next.as_str(), "filter scope switched");
    store.set_column_filters(table, Vec::new());
    store.set_global_filter(table, String::new());
    store.set_selected_column(table, next);
    true
}

/// Whether the committed filters agree with the table's scope.
pub fn is_scope_exclusive(state: &TableInteractionState) -> bool {
    match &state.selected_column {
        ColumnScope::All => state.column_filters.is_empty(),
        ColumnScope::Each => state.global_filter.is_empty(),
        ColumnScope::Single(active) => {
            state.global_filter.is_empty()
                && state
                    .column_filters
                    .iter()
                    .all(|filter| &filter.column == active)
        }
    }
}
