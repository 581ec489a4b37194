// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::ids::{RecordId, RowKey};
use crate::model::{Column, DatasetKind, Record};
use crate::table::{SortEntry, TableInteractionState};
use crate::view::{build_row_model, sorted_ids};

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetState<R> {
    pub records: Vec<R>,
    pub is_loaded: bool,
    pub is_busy: bool,
}

impl<R> Default for DatasetState<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            is_loaded: false,
            is_busy: false,
        }
    }
}

/// CRUD container for one dataset. Every operation is total: ids that do
/// not exist turn deletes and edits into no-ops.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordStore<R: Record> {
    state: DatasetState<R>,
}

impl<R: Record> Default for RecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> RecordStore<R> {
    pub fn new() -> Self {
        Self {
            state: DatasetState::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        R::DATASET.as_str()
    }

    pub fn state(&self) -> &DatasetState<R> {
        &self.state
    }

    pub fn records(&self) -> &[R] {
        &self.state.records
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy
    }

    pub fn get(&self, id: &RecordId) -> Option<&R> {
        self.state.records.iter().find(|record| &record.id() == id)
    }

    pub fn replace_all(&mut self, records: Vec<R>) {
        let mut seen = BTreeSet::new();
        let supplied = records.len();
        let unique = records
            .into_iter()
            .filter(|record| seen.insert(record.id()))
            .collect::<Vec<_>>();
        if unique.len() != supplied {
            warn!(
                dataset = self.name(),
                dropped = supplied - unique.len(),
                "duplicate record ids collapsed on replace"
            );
        }
        debug!(dataset = self.name(), count = unique.len(), "records replaced");
        self.state.records = unique;
        self.state.is_loaded = true;
    }

    pub fn remove(&mut self, id: &RecordId) -> bool {
        let before = self.state.records.len();
        self.state.records.retain(|record| &record.id() != id);
        let removed = self.state.records.len() != before;
        debug!(dataset = self.name(), %id, removed, "record remove");
        removed
    }

    /// Returns whether the record changed. Unknown ids and values the field
    /// cannot hold leave the dataset untouched.
    pub fn edit_field(&mut self, id: &RecordId, field: &str, value: &str) -> bool {
        let Some(record) = self
            .state
            .records
            .iter_mut()
            .find(|record| &record.id() == id)
        else {
            debug!(dataset = R::DATASET.as_str(), %id, field, "edit skipped: no such record");
            return false;
        };

        match record.set_value(field, value) {
            Ok(()) => {
                debug!(dataset = R::DATASET.as_str(), %id, field, "field edited");
                true
            }
            Err(error) => {
                warn!(dataset = R::DATASET.as_str(), %id, field, %error, "edit refused");
                false
            }
        }
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.state.is_busy = busy;
    }
}

/// Row counts for one table over one dataset, without borrowing records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowSummary {
    pub total: usize,
    pub filtered: Vec<RowKey>,
    pub page_keys: Vec<RowKey>,
    pub page_count: usize,
}

/// The record-type-independent face of a [`RecordStore`], so the
/// application can drive any bound dataset through one code path.
pub trait DatasetOps {
    fn kind(&self) -> DatasetKind;
    fn columns(&self) -> &'static [Column];
    fn is_loaded(&self) -> bool;
    fn is_busy(&self) -> bool;
    fn set_busy(&mut self, busy: bool);
    fn record_count(&self) -> usize;
    fn sorted_ids(&self, sorting: &[SortEntry]) -> Vec<RecordId>;
    fn summarize(&self, state: &TableInteractionState) -> RowSummary;
    fn remove(&mut self, id: &RecordId) -> bool;
    fn validate_field(&self, field: &str, value: &str) -> Result<()>;
    fn edit_field(&mut self, id: &RecordId, field: &str, value: &str) -> bool;
}

impl<R: Record> DatasetOps for RecordStore<R> {
    fn kind(&self) -> DatasetKind {
        R::DATASET
    }

    fn columns(&self) -> &'static [Column] {
        R::columns()
    }

    fn is_loaded(&self) -> bool {
        self.state.is_loaded
    }

    fn is_busy(&self) -> bool {
        self.state.is_busy
    }

    fn set_busy(&mut self, busy: bool) {
        self.state.is_busy = busy;
    }

    fn record_count(&self) -> usize {
        self.state.records.len()
    }

    fn sorted_ids(&self, sorting: &[SortEntry]) -> Vec<RecordId> {
        sorted_ids(&self.state.records, sorting)
    }

    fn summarize(&self, state: &TableInteractionState) -> RowSummary {
        let model = build_row_model(&self.state.records, state);
        RowSummary {
            total: model.total,
            page_keys: model.page_keys(),
            page_count: model.page_count,
            filtered: model.filtered,
        }
    }

    fn remove(&mut self, id: &RecordId) -> bool {
        RecordStore::remove(self, id)
    }

    fn validate_field(&self, field: &str, value: &str) -> Result<()> {
        R::validate_field(field, value)
    }

    fn edit_field(&mut self, id: &RecordId, field: &str, value: &str) -> bool {
        RecordStore::edit_field(self, id, field, value)
    }
}
