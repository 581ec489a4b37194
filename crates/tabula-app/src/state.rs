// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::debounce::{Control, DebounceCoordinator, PendingCommit};
use crate::ids::{RecordId, RowKey, TableId};
use crate::model::{DatasetKind, PeriodicElement, User, find_column};
use crate::reconcile::{pins_after_delete, retarget_keys, selection_after_delete, toggle_pins};
use crate::records::{DatasetOps, RecordStore, RowSummary};
use crate::scope::{ColumnScope, FilterTarget, input_text, switch_scope};
use crate::settings::EngineSettings;
use crate::table::{RowPinning, SortEntry, TableInteractionState, TableStore};

/// A complete dataset handed back by a fetch collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Users(Vec<User>),
    PeriodicElements(Vec<PeriodicElement>),
}

impl Fetched {
    pub fn dataset(&self) -> DatasetKind {
        match self {
            Self::Users(_) => DatasetKind::Users,
            Self::PeriodicElements(_) => DatasetKind::PeriodicElements,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Users(records) => records.len(),
            Self::PeriodicElements(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    NextTable,
    PrevTable,
    ClearStatus,
    DismissToast,
    Table(TableId, TableCommand),
    FetchSucceeded(Fetched),
    FetchFailed { dataset: DatasetKind, error: String },
}

/// Operations a table view can request. Sort requests, filter keystrokes
/// and scope changes are debounced; everything else commits immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCommand {
    Load,
    RequestSort {
        column: String,
        descending: bool,
        multi: bool,
    },
    ClearSort,
    FilterInput {
        column: Option<String>,
        value: String,
    },
    SelectScope(ColumnScope),
    FirstPage,
    PreviousPage,
    NextPage,
    LastPage,
    SetPageSize(usize),
    ToggleRowSelected(RowKey),
    ToggleAllPageRowsSelected,
    ClearSelection,
    ToggleRowPin(RowKey),
    PinSelected,
    DeleteRow(RowKey),
    DeleteSelected,
    EditField {
        key: RowKey,
        field: String,
        value: String,
    },
    ToggleColumnVisibility(String),
    SetAllColumnsVisible(bool),
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ActiveTableChanged(TableId),
    Scheduled { table: TableId, control: Control },
    Committed { table: TableId, control: Control },
    StateChanged(TableId),
    RecordsChanged(DatasetKind),
    BusyChanged { dataset: DatasetKind, busy: bool },
    FetchRequested(DatasetKind),
    ToastRaised(String),
    StatusUpdated(String),
    StatusCleared,
}

/// Owns every store. All mutation goes through [`AppState::dispatch_at`]
/// and [`AppState::tick`]; readers only ever see committed state.
#[derive(Debug, Clone)]
pub struct AppState {
    settings: EngineSettings,
    users: RecordStore<User>,
    elements: RecordStore<PeriodicElement>,
    tables: TableStore,
    debounce: DebounceCoordinator,
    bindings: BTreeMap<TableId, DatasetKind>,
    active_table: TableId,
    drafts: BTreeMap<(TableId, Option<String>), String>,
    in_flight: BTreeSet<DatasetKind>,
    toasts: Vec<String>,
    status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl AppState {
    pub fn new(settings: EngineSettings) -> Self {
        let mut state = Self {
            tables: TableStore::new(&settings),
            debounce: DebounceCoordinator::new(settings.debounce_delay),
            settings,
            users: RecordStore::new(),
            elements: RecordStore::new(),
            bindings: BTreeMap::new(),
            active_table: TableId::users(),
            drafts: BTreeMap::new(),
            in_flight: BTreeSet::new(),
            toasts: Vec::new(),
            status_line: None,
        };
        state.bind_table(TableId::users(), DatasetKind::Users);
        state.bind_table(TableId::elements(), DatasetKind::PeriodicElements);
        state
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn users(&self) -> &RecordStore<User> {
        &self.users
    }

    pub fn elements(&self) -> &RecordStore<PeriodicElement> {
        &self.elements
    }

    pub fn tables(&self) -> &TableStore {
        &self.tables
    }

    pub fn table_state(&self, table: &TableId) -> &TableInteractionState {
        self.tables.get(table)
    }

    pub fn debounce(&self) -> &DebounceCoordinator {
        &self.debounce
    }

    pub fn active_table(&self) -> &TableId {
        &self.active_table
    }

    pub fn binding(&self, table: &TableId) -> Option<DatasetKind> {
        self.bindings.get(table).copied()
    }

    pub fn bound_tables(&self) -> impl Iterator<Item = (&TableId, DatasetKind)> {
        self.bindings.iter().map(|(table, kind)| (table, *kind))
    }

    pub fn dataset(&self, kind: DatasetKind) -> &dyn DatasetOps {
        match kind {
            DatasetKind::Users => &self.users,
            DatasetKind::PeriodicElements => &self.elements,
        }
    }

    fn dataset_mut(&mut self, kind: DatasetKind) -> &mut dyn DatasetOps {
        match kind {
            DatasetKind::Users => &mut self.users,
            DatasetKind::PeriodicElements => &mut self.elements,
        }
    }

    pub fn toasts(&self) -> &[String] {
        &self.toasts
    }

    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.next_deadline()
    }

    /// Text shown in a filter input: the uncommitted draft while a keystroke
    /// is pending, otherwise the committed filter.
    pub fn filter_text(&self, table: &TableId, column: Option<&str>) -> String {
        let key = (table.clone(), column.map(str::to_owned));
        match self.drafts.get(&key) {
            Some(draft) => draft.clone(),
            None => input_text(self.tables.get(table), column),
        }
    }

    pub fn row_summary(&self, table: &TableId) -> Option<RowSummary> {
        let kind = self.binding(table)?;
        Some(self.dataset(kind).summarize(self.tables.get(table)))
    }

    pub fn can_previous_page(&self, table: &TableId) -> bool {
        self.tables.get(table).pagination.page_index > 0
    }

    pub fn can_next_page(&self, table: &TableId) -> bool {
        self.row_summary(table).is_some_and(|summary| {
            self.tables.get(table).pagination.page_index + 1 < summary.page_count
        })
    }

    /// Attaches a table to a dataset, creating its interaction state.
    pub fn bind_table(&mut self, table: TableId, kind: DatasetKind) {
        debug!(%table, dataset = kind.as_str(), "table bound");
        self.tables.entry(&table);
        self.bindings.insert(table, kind);
    }

    /// Tears a table down: its timers are cancelled and later commands for
    /// it are ignored. The interaction state is kept for a later rebind.
    pub fn close_table(&mut self, table: &TableId) -> Vec<AppEvent> {
        let Some(kind) = self.bindings.remove(table) else {
            return Vec::new();
        };
        self.debounce.teardown(table);
        self.drafts.retain(|(owner, _), _| owner != table);
        if &self.active_table == table
            && let Some(first) = self.bindings.keys().next()
        {
            self.active_table = first.clone();
        }
        self.settle_busy(kind).into_iter().collect()
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        self.dispatch_at(command, Instant::now())
    }

    pub fn dispatch_at(&mut self, command: AppCommand, now: Instant) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTable => self.rotate_table(1),
            AppCommand::PrevTable => self.rotate_table(-1),
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
            AppCommand::DismissToast => {
                if !self.toasts.is_empty() {
                    self.toasts.remove(0);
                }
                Vec::new()
            }
            AppCommand::Table(table, command) => self.dispatch_table(&table, command, now),
            AppCommand::FetchSucceeded(fetched) => self.apply_fetch(fetched),
            AppCommand::FetchFailed { dataset, error } => self.fetch_failed(dataset, &error),
        }
    }

    /// Commits every debounced value whose quiet period has elapsed.
    pub fn tick(&mut self, now: Instant) -> Vec<AppEvent> {
        let mut events = Vec::new();
        // Tables whose scope changed in this batch; later filter input is stale.
        let mut rescoped = BTreeSet::new();
        for due in self.debounce.due(now) {
            let Some(kind) = self.binding(&due.table) else {
                warn!(table = %due.table, control = ?due.control, "timer fired for a closed table");
                continue;
            };
            match &due.commit {
                PendingCommit::Filter { column, .. } if rescoped.contains(&due.table) => {
                    debug!(
                        table = %due.table,
                        ?column,
                        "filter input from the previous scope dropped"
                    );
                    self.drafts.remove(&(due.table.clone(), column.clone()));
                    events.extend(self.settle_busy(kind));
                    continue;
                }
                PendingCommit::Scope(_) => {
                    rescoped.insert(due.table.clone());
                }
                _ => {}
            }
            events.extend(self.commit(&due.table, kind, due.commit));
            events.push(AppEvent::Committed {
                table: due.table.clone(),
                control: due.control,
            });
            events.extend(self.settle_busy(kind));
        }
        events
    }

    pub fn set_status(&mut self, message: impl Into<String>) -> AppEvent {
        let message = message.into();
        self.status_line = Some(message.clone());
        AppEvent::StatusUpdated(message)
    }

    fn raise_toast(&mut self, message: String) -> AppEvent {
        self.toasts.push(message.clone());
        AppEvent::ToastRaised(message)
    }

    fn rotate_table(&mut self, delta: isize) -> Vec<AppEvent> {
        let tables = self.bindings.keys().cloned().collect::<Vec<_>>();
        if tables.is_empty() {
            return Vec::new();
        }
        let current = tables
            .iter()
            .position(|table| *table == self.active_table)
            .unwrap_or(0) as isize;
        let len = tables.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_table = tables[next].clone();
        vec![AppEvent::ActiveTableChanged(self.active_table.clone())]
    }

    fn dispatch_table(
        &mut self,
        table: &TableId,
        command: TableCommand,
        now: Instant,
    ) -> Vec<AppEvent> {
        let Some(kind) = self.binding(table) else {
            warn!(%table, ?command, "command for an unbound table ignored");
            return Vec::new();
        };

        match command {
            TableCommand::Load => self.load(kind),
            TableCommand::RequestSort {
                column,
                descending,
                multi,
            } => {
                let sortable = find_column(self.dataset(kind).columns(), &column)
                    .is_some_and(|spec| spec.sortable);
                if !sortable {
                    debug!(%table, column = %column, "sort request for unsortable column ignored");
                    return Vec::new();
                }
                self.schedule(
                    table,
                    kind,
                    Control::Sort(column.clone()),
                    PendingCommit::Sort {
                        column,
                        descending,
                        multi,
                    },
                    now,
                )
            }
            TableCommand::ClearSort => {
                self.commit_sorting(table, kind, Vec::new());
                vec![AppEvent::StateChanged(table.clone())]
            }
            TableCommand::FilterInput { column, value } => {
                let scope = &self.tables.get(table).selected_column;
                if scope.target_for(column.as_deref()).is_none() {
                    debug!(%table, ?column, scope = scope.as_str(), "filter input outside active scope");
                    return Vec::new();
                }
                self.drafts
                    .insert((table.clone(), column.clone()), value.clone());
                self.schedule(
                    table,
                    kind,
                    Control::Filter(column.clone()),
                    PendingCommit::Filter { column, value },
                    now,
                )
            }
            TableCommand::SelectScope(scope) => {
                self.schedule(table, kind, Control::Scope, PendingCommit::Scope(scope), now)
            }
            TableCommand::FirstPage => self.set_page_index(table, 0),
            TableCommand::PreviousPage => {
                let index = self.tables.get(table).pagination.page_index;
                self.set_page_index(table, index.saturating_sub(1))
            }
            TableCommand::NextPage => {
                let index = self.tables.get(table).pagination.page_index;
                let last = self.last_page_index(table, kind);
                self.set_page_index(table, (index + 1).min(last))
            }
            TableCommand::LastPage => {
                let last = self.last_page_index(table, kind);
                self.set_page_index(table, last)
            }
            TableCommand::SetPageSize(size) => {
                let pagination = self.tables.get(table).pagination.with_page_size(size);
                self.tables.set_pagination(table, pagination);
                vec![AppEvent::StateChanged(table.clone())]
            }
            TableCommand::ToggleRowSelected(key) => {
                if !self.key_exists(kind, key) {
                    return Vec::new();
                }
                let selection = self.tables.get(table).selection_toggled(key);
                self.tables.set_row_selection(table, selection);
                vec![AppEvent::StateChanged(table.clone())]
            }
            TableCommand::ToggleAllPageRowsSelected => self.toggle_page_selection(table, kind),
            TableCommand::ClearSelection => {
                self.tables.set_row_selection(table, BTreeSet::new());
                vec![AppEvent::StateChanged(table.clone())]
            }
            TableCommand::ToggleRowPin(key) => {
                if !self.key_exists(kind, key) {
                    return Vec::new();
                }
                let pinning = self.tables.get(table).pinning_toggled(key);
                self.tables.set_row_pinning(table, pinning);
                vec![AppEvent::StateChanged(table.clone())]
            }
            TableCommand::PinSelected => {
                let state = self.tables.get(table);
                let top = toggle_pins(&state.row_pinning.top, &state.row_selection);
                debug!(%table, pinned = ?top, "selected rows pin-toggled");
                self.tables.set_row_pinning(table, RowPinning { top });
                self.tables.set_row_selection(table, BTreeSet::new());
                vec![AppEvent::StateChanged(table.clone())]
            }
            TableCommand::DeleteRow(key) => {
                self.delete_rows(table, kind, BTreeSet::from([key]), false)
            }
            TableCommand::DeleteSelected => {
                let selection = self.tables.get(table).row_selection.clone();
                self.delete_rows(table, kind, selection, true)
            }
            TableCommand::EditField { key, field, value } => {
                self.edit_field(table, kind, key, &field, &value)
            }
            TableCommand::ToggleColumnVisibility(column) => {
                let hideable = find_column(self.dataset(kind).columns(), &column)
                    .is_some_and(|spec| spec.hideable);
                if !hideable {
                    debug!(%table, column = %column, "column cannot be hidden");
                    return Vec::new();
                }
                let state = self.tables.get(table);
                let visibility = state.visibility_with(&column, !state.is_column_visible(&column));
                self.tables.set_column_visibility(table, visibility);
                vec![AppEvent::StateChanged(table.clone())]
            }
            TableCommand::SetAllColumnsVisible(visible) => {
                let visibility = self
                    .dataset(kind)
                    .columns()
                    .iter()
                    .filter(|column| column.hideable)
                    .map(|column| (column.id.to_owned(), visible))
                    .collect();
                self.tables.set_column_visibility(table, visibility);
                vec![AppEvent::StateChanged(table.clone())]
            }
            TableCommand::Reset => self.reset_table(table, kind, now),
        }
    }

    fn schedule(
        &mut self,
        table: &TableId,
        kind: DatasetKind,
        control: Control,
        commit: PendingCommit,
        now: Instant,
    ) -> Vec<AppEvent> {
        self.debounce.schedule(table, control.clone(), commit, now);
        let mut events = vec![AppEvent::Scheduled {
            table: table.clone(),
            control,
        }];
        events.extend(self.set_busy(kind, true));
        events
    }

    fn commit(&mut self, table: &TableId, kind: DatasetKind, commit: PendingCommit) -> Vec<AppEvent> {
        match commit {
            PendingCommit::Sort {
                column,
                descending,
                multi,
            } => {
                let sorting = self
                    .tables
                    .get(table)
                    .sorting_with(&column, descending, multi);
                self.commit_sorting(table, kind, sorting);
                vec![AppEvent::StateChanged(table.clone())]
            }
            PendingCommit::Filter { column, value } => {
                self.drafts.remove(&(table.clone(), column.clone()));
                let state = self.tables.get(table);
                match state.selected_column.target_for(column.as_deref()) {
                    Some(FilterTarget::Global) => self.tables.set_global_filter(table, value),
                    Some(FilterTarget::Column(column)) => {
                        let filters = state.column_filters_with(&column, &value);
                        self.tables.set_column_filters(table, filters);
                    }
                    None => {
                        debug!(%table, ?column, "filter commit outside active scope dropped");
                        return Vec::new();
                    }
                }
                self.set_page_index(table, 0);
                vec![AppEvent::StateChanged(table.clone())]
            }
            PendingCommit::Scope(scope) => {
                if !switch_scope(&mut self.tables, table, scope) {
                    return Vec::new();
                }
                let dropped = self.debounce.cancel_filters(table);
                if dropped > 0 {
                    debug!(%table, dropped, "pending filter input dropped on scope change");
                }
                self.drafts.retain(|(owner, _), _| owner != table);
                self.set_page_index(table, 0);
                vec![AppEvent::StateChanged(table.clone())]
            }
            PendingCommit::Refresh => self.begin_fetch(kind),
        }
    }

    fn commit_sorting(&mut self, table: &TableId, kind: DatasetKind, sorting: Vec<SortEntry>) {
        let before = self
            .dataset(kind)
            .sorted_ids(&self.tables.get(table).sorting);
        self.tables.set_sorting(table, sorting);
        self.retarget_table(table, kind, &before);
        self.set_page_index(table, 0);
    }

    /// Points pinned and selected keys back at their records after the
    /// table's sorted order changed.
    fn retarget_table(&mut self, table: &TableId, kind: DatasetKind, before: &[RecordId]) {
        let state = self.tables.get(table);
        let after = self.dataset(kind).sorted_ids(&state.sorting);
        if after == before {
            return;
        }
        let top = retarget_keys(state.row_pinning.top.iter().copied(), before, &after);
        let selection = retarget_keys(state.row_selection.iter().copied(), before, &after)
            .into_iter()
            .collect::<BTreeSet<_>>();
        debug!(%table, pinned = ?top, selected = selection.len(), "row keys retargeted");
        self.tables.set_row_pinning(table, RowPinning { top });
        self.tables.set_row_selection(table, selection);
    }

    /// Sorted record order of every table bound to `kind`.
    fn bound_orders(&self, kind: DatasetKind) -> Vec<(TableId, Vec<RecordId>)> {
        self.bindings
            .iter()
            .filter(|(_, bound)| **bound == kind)
            .map(|(table, _)| {
                let order = self
                    .dataset(kind)
                    .sorted_ids(&self.tables.get(table).sorting);
                (table.clone(), order)
            })
            .collect()
    }

    fn retarget_bound(&mut self, kind: DatasetKind, orders: Vec<(TableId, Vec<RecordId>)>) {
        for (table, before) in orders {
            self.retarget_table(&table, kind, &before);
        }
    }

    fn key_exists(&self, kind: DatasetKind, key: RowKey) -> bool {
        key.get() < self.dataset(kind).record_count()
    }

    fn set_page_index(&mut self, table: &TableId, page_index: usize) -> Vec<AppEvent> {
        let pagination = self.tables.get(table).pagination;
        if pagination.page_index == page_index {
            return Vec::new();
        }
        self.tables
            .set_pagination(table, pagination.with_page_index(page_index));
        vec![AppEvent::StateChanged(table.clone())]
    }

    fn last_page_index(&self, table: &TableId, kind: DatasetKind) -> usize {
        self.dataset(kind)
            .summarize(self.tables.get(table))
            .page_count
            .saturating_sub(1)
    }

    fn toggle_page_selection(&mut self, table: &TableId, kind: DatasetKind) -> Vec<AppEvent> {
        let state = self.tables.get(table);
        let page_keys = self.dataset(kind).summarize(state).page_keys;
        if page_keys.is_empty() {
            return Vec::new();
        }
        let mut selection = state.row_selection.clone();
        if page_keys.iter().all(|key| selection.contains(key)) {
            for key in &page_keys {
                selection.remove(key);
            }
        } else {
            selection.extend(page_keys);
        }
        self.tables.set_row_selection(table, selection);
        vec![AppEvent::StateChanged(table.clone())]
    }

    /// Deletes the records behind `keys` and reconciles every table bound to
    /// the same dataset. A bulk delete also clears the originating table's
    /// selection and returns it to the first page.
    fn delete_rows(
        &mut self,
        table: &TableId,
        kind: DatasetKind,
        keys: BTreeSet<RowKey>,
        bulk: bool,
    ) -> Vec<AppEvent> {
        let orders = self.bound_orders(kind);
        let Some(order) = orders
            .iter()
            .find(|(owner, _)| owner == table)
            .map(|(_, order)| order)
        else {
            return Vec::new();
        };
        let removed = keys
            .iter()
            .filter_map(|key| order.get(key.get()).cloned())
            .collect::<BTreeSet<_>>();
        if removed.is_empty() {
            return Vec::new();
        }

        for id in &removed {
            self.dataset_mut(kind).remove(id);
        }

        for (bound, order) in &orders {
            let deleted = order
                .iter()
                .enumerate()
                .filter(|(_, id)| removed.contains(*id))
                .map(|(index, _)| RowKey::new(index))
                .collect::<BTreeSet<_>>();
            let state = self.tables.get(bound);
            let top = pins_after_delete(&state.row_pinning.top, &deleted);
            let selection = selection_after_delete(&state.row_selection, &deleted);
            self.tables.set_row_pinning(bound, RowPinning { top });
            self.tables.set_row_selection(bound, selection);
        }

        if bulk {
            let pagination = self.tables.get(table).pagination.with_page_index(0);
            self.tables.set_row_selection(table, BTreeSet::new());
            self.tables.set_pagination(table, pagination);
        } else {
            let last = self.last_page_index(table, kind);
            if self.tables.get(table).pagination.page_index > last {
                self.set_page_index(table, last);
            }
        }

        info!(%table, dataset = kind.as_str(), removed = removed.len(), "rows deleted");
        vec![
            AppEvent::RecordsChanged(kind),
            AppEvent::StateChanged(table.clone()),
        ]
    }

    fn edit_field(
        &mut self,
        table: &TableId,
        kind: DatasetKind,
        key: RowKey,
        field: &str,
        value: &str,
    ) -> Vec<AppEvent> {
        let order = self
            .dataset(kind)
            .sorted_ids(&self.tables.get(table).sorting);
        let Some(id) = order.get(key.get()).cloned() else {
            debug!(%table, %key, "edit for a row that no longer exists");
            return Vec::new();
        };
        if let Err(error) = self.dataset(kind).validate_field(field, value) {
            return vec![self.raise_toast(format!(
                "Error while editing field {field:?} of record {id}: {error:#}"
            ))];
        }

        let orders = self.bound_orders(kind);
        if !self.dataset_mut(kind).edit_field(&id, field, value) {
            return Vec::new();
        }
        self.retarget_bound(kind, orders);
        vec![AppEvent::RecordsChanged(kind)]
    }

    fn reset_table(&mut self, table: &TableId, kind: DatasetKind, now: Instant) -> Vec<AppEvent> {
        self.debounce.teardown(table);
        self.drafts.retain(|(owner, _), _| owner != table);
        self.tables.reset(table);
        info!(%table, dataset = kind.as_str(), "table reset, refetch scheduled");
        let mut events = vec![AppEvent::StateChanged(table.clone())];
        events.extend(self.schedule(table, kind, Control::Refresh, PendingCommit::Refresh, now));
        events
    }

    fn load(&mut self, kind: DatasetKind) -> Vec<AppEvent> {
        if self.dataset(kind).is_loaded() || self.in_flight.contains(&kind) {
            return Vec::new();
        }
        self.in_flight.insert(kind);
        vec![AppEvent::FetchRequested(kind)]
    }

    fn begin_fetch(&mut self, kind: DatasetKind) -> Vec<AppEvent> {
        if !self.in_flight.insert(kind) {
            return Vec::new();
        }
        debug!(dataset = kind.as_str(), "refetch requested");
        vec![AppEvent::FetchRequested(kind)]
    }

    fn apply_fetch(&mut self, fetched: Fetched) -> Vec<AppEvent> {
        let kind = fetched.dataset();
        self.in_flight.remove(&kind);
        info!(dataset = kind.as_str(), count = fetched.len(), "records fetched");

        let orders = self.bound_orders(kind);
        match fetched {
            Fetched::Users(records) => self.users.replace_all(records),
            Fetched::PeriodicElements(records) => self.elements.replace_all(records),
        }
        self.retarget_bound(kind, orders);

        let mut events = vec![AppEvent::RecordsChanged(kind)];
        events.extend(self.settle_busy(kind));
        events
    }

    fn fetch_failed(&mut self, kind: DatasetKind, error: &str) -> Vec<AppEvent> {
        self.in_flight.remove(&kind);
        warn!(dataset = kind.as_str(), error, "fetch failed");
        let mut events = vec![self.raise_toast(format!(
            "Error while fetching {}: {error}",
            kind.label()
        ))];
        events.extend(self.settle_busy(kind));
        events
    }

    fn set_busy(&mut self, kind: DatasetKind, busy: bool) -> Option<AppEvent> {
        let dataset = self.dataset_mut(kind);
        if dataset.is_busy() == busy {
            return None;
        }
        dataset.set_busy(busy);
        Some(AppEvent::BusyChanged {
            dataset: kind,
            busy,
        })
    }

    /// Clears the busy flag once no table bound to `kind` has a pending
    /// timer and no fetch for it is in flight.
    fn settle_busy(&mut self, kind: DatasetKind) -> Option<AppEvent> {
        let pending = self
            .bindings
            .iter()
            .filter(|(_, bound)| **bound == kind)
            .any(|(table, _)| self.debounce.has_pending(table));
        if pending || self.in_flight.contains(&kind) {
            return None;
        }
        self.set_busy(kind, false)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState, Fetched, TableCommand};
    use crate::{Control, DatasetKind, PeriodicElement, RowKey, TableId};
    use std::time::{Duration, Instant};

    fn element(id: i64, name: &str) -> PeriodicElement {
        PeriodicElement {
            id,
            name: name.to_owned(),
            weight: id as f64,
            symbol: name[..2].to_owned(),
        }
    }

    fn loaded() -> AppState {
        let mut state = AppState::default();
        state.dispatch(AppCommand::FetchSucceeded(Fetched::PeriodicElements(vec![
            element(1, "Hydrogen"),
            element(2, "Helium"),
            element(3, "Lithium"),
        ])));
        state
    }

    fn table(command: TableCommand) -> AppCommand {
        AppCommand::Table(TableId::elements(), command)
    }

    #[test]
    fn table_rotation_wraps() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::PrevTable);
        assert_eq!(state.active_table(), &TableId::elements());
        assert_eq!(events, vec![AppEvent::ActiveTableChanged(TableId::elements())]);
        state.dispatch(AppCommand::NextTable);
        assert_eq!(state.active_table(), &TableId::users());
    }

    #[test]
    fn load_requests_a_fetch_once() {
        let mut state = AppState::default();
        let first = state.dispatch(table(TableCommand::Load));
        assert_eq!(
            first,
            vec![AppEvent::FetchRequested(DatasetKind::PeriodicElements)]
        );
        assert!(state.dispatch(table(TableCommand::Load)).is_empty());
    }

    #[test]
    fn failed_fetch_leaves_dataset_unloaded() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::Table(TableId::users(), TableCommand::Load));
        let events = state.dispatch(AppCommand::FetchFailed {
            dataset: DatasetKind::Users,
            error: "connection refused".to_owned(),
        });
        assert!(!state.users().is_loaded());
        assert_eq!(
            events,
            vec![AppEvent::ToastRaised(
                "Error while fetching users: connection refused".to_owned()
            )]
        );
        assert_eq!(state.toasts().len(), 1);
        state.dispatch(AppCommand::DismissToast);
        assert!(state.toasts().is_empty());
    }

    #[test]
    fn debounced_sort_sets_busy_until_commit() {
        let start = Instant::now();
        let mut state = loaded();
        let events = state.dispatch_at(
            table(TableCommand::RequestSort {
                column: "name".to_owned(),
                descending: true,
                multi: false,
            }),
            start,
        );
        assert!(events.contains(&AppEvent::BusyChanged {
            dataset: DatasetKind::PeriodicElements,
            busy: true,
        }));
        assert!(state.elements().is_busy());
        assert!(state.table_state(&TableId::elements()).sorting.is_empty());

        let events = state.tick(start + Duration::from_millis(1500));
        assert!(events.contains(&AppEvent::Committed {
            table: TableId::elements(),
            control: Control::Sort("name".to_owned()),
        }));
        assert!(!state.elements().is_busy());
        let sorting = &state.table_state(&TableId::elements()).sorting;
        assert_eq!(sorting.len(), 1);
        assert!(sorting[0].descending);
    }

    #[test]
    fn busy_waits_for_every_control_of_the_table() {
        let start = Instant::now();
        let mut state = loaded();
        state.dispatch_at(
            table(TableCommand::FilterInput {
                column: None,
                value: "he".to_owned(),
            }),
            start,
        );
        state.dispatch_at(
            table(TableCommand::RequestSort {
                column: "weight".to_owned(),
                descending: false,
                multi: false,
            }),
            start + Duration::from_millis(1000),
        );

        state.tick(start + Duration::from_millis(1500));
        assert_eq!(state.table_state(&TableId::elements()).global_filter, "he");
        assert!(state.elements().is_busy());

        state.tick(start + Duration::from_millis(2500));
        assert!(!state.elements().is_busy());
    }

    #[test]
    fn filter_draft_shows_until_commit() {
        let start = Instant::now();
        let mut state = loaded();
        state.dispatch_at(
            table(TableCommand::FilterInput {
                column: None,
                value: "li".to_owned(),
            }),
            start,
        );
        assert_eq!(state.filter_text(&TableId::elements(), None), "li");
        assert_eq!(state.table_state(&TableId::elements()).global_filter, "");

        state.tick(start + Duration::from_secs(2));
        assert_eq!(state.table_state(&TableId::elements()).global_filter, "li");
        assert_eq!(state.filter_text(&TableId::elements(), None), "li");
    }

    #[test]
    fn sort_commit_keeps_pins_on_their_records() {
        let start = Instant::now();
        let mut state = loaded();
        state.dispatch(table(TableCommand::ToggleRowPin(RowKey::new(0))));
        state.dispatch_at(
            table(TableCommand::RequestSort {
                column: "id".to_owned(),
                descending: true,
                multi: false,
            }),
            start,
        );
        state.tick(start + Duration::from_secs(2));

        let pinned = &state.table_state(&TableId::elements()).row_pinning.top;
        assert_eq!(pinned, &vec![RowKey::new(2)]);
    }

    #[test]
    fn invalid_edit_raises_a_toast_and_changes_nothing() {
        let mut state = loaded();
        let before = state.elements().records().to_vec();
        let events = state.dispatch(table(TableCommand::EditField {
            key: RowKey::new(2),
            field: "weight".to_owned(),
            value: "heavy".to_owned(),
        }));
        assert_eq!(state.elements().records(), before.as_slice());
        let [AppEvent::ToastRaised(message)] = events.as_slice() else {
            panic!("expected a single toast, got {events:?}");
        };
        assert!(message.starts_with("Error while editing field \"weight\" of record 3:"));
    }

    #[test]
    fn id_column_stays_visible() {
        let mut state = loaded();
        assert!(
            state
                .dispatch(table(TableCommand::ToggleColumnVisibility("id".to_owned())))
                .is_empty()
        );
        state.dispatch(table(TableCommand::SetAllColumnsVisible(false)));
        let visibility = &state.table_state(&TableId::elements()).column_visibility;
        assert!(!visibility.contains_key("id"));
        assert_eq!(visibility.get("name"), Some(&false));
    }

    #[test]
    fn closed_table_drops_its_timers() {
        let start = Instant::now();
        let mut state = loaded();
        state.dispatch_at(
            table(TableCommand::FilterInput {
                column: None,
                value: "he".to_owned(),
            }),
            start,
        );
        let events = state.close_table(&TableId::elements());
        assert_eq!(
            events,
            vec![AppEvent::BusyChanged {
                dataset: DatasetKind::PeriodicElements,
                busy: false,
            }]
        );
        assert!(state.tick(start + Duration::from_secs(2)).is_empty());
        assert!(
            state
                .dispatch(table(TableCommand::ClearSelection))
                .is_empty()
        );
        assert_eq!(state.active_table(), &TableId::users());
    }
}
