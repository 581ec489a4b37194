// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tabula_app::{
    AppCommand, AppEvent, AppState, Column, ColumnScope, DatasetKind, Fetched, Record, RowKey,
    SortEntry, TableCommand, TableId, TableInteractionState, build_row_model, visible_columns,
};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(120);
const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);

/// Side effects the event loop cannot perform on its own.
pub trait AppRuntime {
    fn fetch(&mut self, dataset: DatasetKind) -> Result<Fetched>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum InputMode {
    #[default]
    Nav,
    /// Typing into a filter input. `column` is `None` for the shared input.
    Filter { column: Option<String> },
    ScopePicker { cursor: usize },
    Edit {
        key: RowKey,
        field: String,
        buffer: String,
    },
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Cursor {
    row: usize,
    col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    mode: InputMode,
    cursors: BTreeMap<TableId, Cursor>,
    displayed: BTreeSet<TableId>,
    pending_fetches: VecDeque<DatasetKind>,
    status_token: u64,
}

impl ViewData {
    fn cursor(&self, table: &TableId) -> Cursor {
        self.cursors.get(table).copied().unwrap_or_default()
    }

    fn cursor_mut(&mut self, table: &TableId) -> &mut Cursor {
        self.cursors.entry(table.clone()).or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    NextTable,
    PrevTable,
    MoveRow(isize),
    MoveColumn(isize),
    Sort { descending: bool, multi: bool },
    ClearSort,
    OpenFilter,
    OpenScopePicker,
    ToggleSelected,
    TogglePageSelected,
    ClearSelection,
    TogglePin,
    PinSelected,
    DeleteRow,
    DeleteSelected,
    Edit,
    HideColumn,
    ShowAllColumns,
    FirstPage,
    PreviousPage,
    NextPage,
    LastPage,
    SmallerPages,
    LargerPages,
    Reset,
    DismissToast,
    ToggleHelp,
}

/// One table as the terminal shows it: pinned rows first, then the page.
#[derive(Debug, Clone, PartialEq, Default)]
struct TableProjection {
    columns: Vec<&'static Column>,
    rows: Vec<ProjectedRow>,
    filtered: usize,
    total: usize,
    selected: usize,
    page_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProjectedRow {
    key: RowKey,
    pinned: bool,
    selected: bool,
    cells: Vec<String>,
}

impl TableProjection {
    fn row(&self, index: usize) -> Option<&ProjectedRow> {
        self.rows.get(index)
    }

    fn column(&self, index: usize) -> Option<&'static Column> {
        self.columns.get(index).copied()
    }
}

fn project_records<R: Record>(records: &[R], table_state: &TableInteractionState) -> TableProjection {
    let columns = visible_columns::<R>(table_state);
    let model = build_row_model(records, table_state);
    let rows = model
        .top
        .iter()
        .map(|row| (row, true))
        .chain(model.page.iter().map(|row| (row, false)))
        .map(|(row, pinned)| ProjectedRow {
            key: row.key,
            pinned,
            selected: table_state.is_selected(row.key),
            cells: columns
                .iter()
                .map(|column| {
                    row.record
                        .value(column.id)
                        .map(|value| value.display())
                        .unwrap_or_default()
                })
                .collect(),
        })
        .collect();

    TableProjection {
        columns,
        rows,
        filtered: model.filtered_count(),
        total: model.total,
        selected: model.selected_count(&table_state.row_selection),
        page_count: model.page_count,
    }
}

fn project(state: &AppState, table: &TableId) -> Option<TableProjection> {
    let table_state = state.table_state(table);
    let projection = match state.binding(table)? {
        DatasetKind::Users => project_records(state.users().records(), table_state),
        DatasetKind::PeriodicElements => project_records(state.elements().records(), table_state),
    };
    Some(projection)
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    let result = event_loop(
        &mut terminal,
        state,
        runtime,
        &mut view_data,
        &internal_tx,
        &internal_rx,
    );

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn event_loop<R: AppRuntime>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    internal_rx: &Receiver<InternalEvent>,
) -> Result<()> {
    loop {
        process_internal_events(state, view_data, internal_rx);

        let events = state.tick(Instant::now());
        apply_events(view_data, events);
        request_initial_load(state, view_data);
        clamp_cursor(state, view_data);

        terminal
            .draw(|frame| render(frame, state, view_data))
            .context("draw frame")?;

        // Fetches block, so they run after the busy indicator is on screen.
        if !view_data.pending_fetches.is_empty() {
            run_pending_fetches(state, runtime, view_data);
            continue;
        }

        let timeout = poll_timeout(state.next_deadline(), Instant::now());
        if !event::poll(timeout).context("poll event")? {
            continue;
        }
        match event::read().context("read event")? {
            Event::Key(key) => {
                if handle_key_event(state, view_data, internal_tx, key) {
                    info!("quit requested");
                    return Ok(());
                }
            }
            Event::Resize(_, _) => {}
            _ => {}
        }
    }
}

/// How long to wait for input: never past the next debounce deadline.
fn poll_timeout(deadline: Option<Instant>, now: Instant) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(now).min(POLL_INTERVAL),
        None => POLL_INTERVAL,
    }
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.set_status(message);
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn dispatch(state: &mut AppState, view_data: &mut ViewData, command: AppCommand) {
    let events = state.dispatch(command);
    apply_events(view_data, events);
}

fn dispatch_table(state: &mut AppState, view_data: &mut ViewData, command: TableCommand) {
    let table = state.active_table().clone();
    dispatch(state, view_data, AppCommand::Table(table, command));
}

fn apply_events(view_data: &mut ViewData, events: Vec<AppEvent>) {
    for event in events {
        match event {
            AppEvent::FetchRequested(kind) => {
                if !view_data.pending_fetches.contains(&kind) {
                    view_data.pending_fetches.push_back(kind);
                }
            }
            AppEvent::ActiveTableChanged(_) => view_data.mode = InputMode::Nav,
            AppEvent::Committed { table, control } => {
                debug!(%table, ?control, "debounced value committed");
            }
            _ => {}
        }
    }
}

/// Requests the active table's dataset the first time the table is shown.
fn request_initial_load(state: &mut AppState, view_data: &mut ViewData) {
    let table = state.active_table().clone();
    if view_data.displayed.insert(table.clone()) {
        dispatch(state, view_data, AppCommand::Table(table, TableCommand::Load));
    }
}

fn run_pending_fetches<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) {
    while let Some(kind) = view_data.pending_fetches.pop_front() {
        let command = match runtime.fetch(kind) {
            Ok(fetched) => AppCommand::FetchSucceeded(fetched),
            Err(error) => AppCommand::FetchFailed {
                dataset: kind,
                error: format!("{error:#}"),
            },
        };
        dispatch(state, view_data, command);
    }
}

fn clamp_cursor(state: &AppState, view_data: &mut ViewData) {
    let table = state.active_table().clone();
    let Some(projection) = project(state, &table) else {
        return;
    };
    let cursor = view_data.cursor_mut(&table);
    cursor.row = cursor.row.min(projection.rows.len().saturating_sub(1));
    cursor.col = cursor.col.min(projection.columns.len().saturating_sub(1));
}

fn handle_key_event(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
    {
        return true;
    }

    match view_data.mode.clone() {
        InputMode::Help => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
                view_data.mode = InputMode::Nav;
            }
            false
        }
        InputMode::Filter { column } => {
            handle_filter_key(state, view_data, column, key);
            false
        }
        InputMode::ScopePicker { cursor } => {
            handle_scope_picker_key(state, view_data, internal_tx, cursor, key);
            false
        }
        InputMode::Edit { key: row, field, buffer } => {
            handle_edit_key(state, view_data, internal_tx, row, field, buffer, key);
            false
        }
        InputMode::Nav => {
            if key.code == KeyCode::Char('q') {
                return true;
            }
            let Some(action) = key_action_for(key) else {
                return false;
            };
            apply_key_action(state, view_data, internal_tx, action);
            false
        }
    }
}

fn key_action_for(key: KeyEvent) -> Option<KeyAction> {
    match (key.code, key.modifiers) {
        (KeyCode::Tab, _) | (KeyCode::Char('f'), KeyModifiers::NONE) => Some(KeyAction::NextTable),
        (KeyCode::BackTab, _) | (KeyCode::Char('b'), KeyModifiers::NONE) => {
            Some(KeyAction::PrevTable)
        }
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(KeyAction::MoveRow(1)),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(KeyAction::MoveRow(-1)),
        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => Some(KeyAction::MoveColumn(-1)),
        (KeyCode::Char('l'), _) | (KeyCode::Right, _) => Some(KeyAction::MoveColumn(1)),
        (KeyCode::Char('s'), KeyModifiers::NONE) => Some(KeyAction::Sort {
            descending: false,
            multi: false,
        }),
        (KeyCode::Char('S'), _) => Some(KeyAction::Sort {
            descending: true,
            multi: false,
        }),
        (KeyCode::Char('a'), KeyModifiers::NONE) => Some(KeyAction::Sort {
            descending: false,
            multi: true,
        }),
        (KeyCode::Char('A'), _) => Some(KeyAction::Sort {
            descending: true,
            multi: true,
        }),
        (KeyCode::Char('x'), KeyModifiers::NONE) => Some(KeyAction::ClearSort),
        (KeyCode::Char('/'), _) => Some(KeyAction::OpenFilter),
        (KeyCode::Char('o'), KeyModifiers::NONE) => Some(KeyAction::OpenScopePicker),
        (KeyCode::Char(' '), _) => Some(KeyAction::ToggleSelected),
        (KeyCode::Char('v'), KeyModifiers::NONE) => Some(KeyAction::TogglePageSelected),
        (KeyCode::Char('V'), _) => Some(KeyAction::ClearSelection),
        (KeyCode::Char('p'), KeyModifiers::NONE) => Some(KeyAction::TogglePin),
        (KeyCode::Char('P'), _) => Some(KeyAction::PinSelected),
        (KeyCode::Char('d'), KeyModifiers::NONE) => Some(KeyAction::DeleteRow),
        (KeyCode::Char('D'), _) => Some(KeyAction::DeleteSelected),
        (KeyCode::Char('e'), KeyModifiers::NONE) | (KeyCode::Enter, _) => Some(KeyAction::Edit),
        (KeyCode::Char('c'), KeyModifiers::NONE) => Some(KeyAction::HideColumn),
        (KeyCode::Char('C'), _) => Some(KeyAction::ShowAllColumns),
        (KeyCode::Char('{'), _) | (KeyCode::Home, _) => Some(KeyAction::FirstPage),
        (KeyCode::Char('['), _) | (KeyCode::PageUp, _) => Some(KeyAction::PreviousPage),
        (KeyCode::Char(']'), _) | (KeyCode::PageDown, _) => Some(KeyAction::NextPage),
        (KeyCode::Char('}'), _) | (KeyCode::End, _) => Some(KeyAction::LastPage),
        (KeyCode::Char('<'), _) => Some(KeyAction::SmallerPages),
        (KeyCode::Char('>'), _) => Some(KeyAction::LargerPages),
        (KeyCode::Char('r'), KeyModifiers::NONE) => Some(KeyAction::Reset),
        (KeyCode::Esc, _) => Some(KeyAction::DismissToast),
        (KeyCode::Char('?'), _) => Some(KeyAction::ToggleHelp),
        _ => None,
    }
}

fn apply_key_action(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    action: KeyAction,
) {
    let table = state.active_table().clone();
    let projection = project(state, &table).unwrap_or_default();
    let cursor = view_data.cursor(&table);
    let row_key = projection.row(cursor.row).map(|row| row.key);
    let column = projection.column(cursor.col);

    match action {
        KeyAction::NextTable => dispatch(state, view_data, AppCommand::NextTable),
        KeyAction::PrevTable => dispatch(state, view_data, AppCommand::PrevTable),
        KeyAction::MoveRow(delta) => {
            let last = projection.rows.len().saturating_sub(1);
            let cursor = view_data.cursor_mut(&table);
            cursor.row = cursor.row.saturating_add_signed(delta).min(last);
        }
        KeyAction::MoveColumn(delta) => {
            let last = projection.columns.len().saturating_sub(1);
            let cursor = view_data.cursor_mut(&table);
            cursor.col = cursor.col.saturating_add_signed(delta).min(last);
        }
        KeyAction::Sort { descending, multi } => {
            let Some(column) = column else {
                return;
            };
            if !column.sortable {
                emit_status(state, view_data, internal_tx, format!("{} is not sortable", column.label));
                return;
            }
            dispatch_table(
                state,
                view_data,
                TableCommand::RequestSort {
                    column: column.id.to_owned(),
                    descending,
                    multi,
                },
            );
            let direction = if descending { "desc" } else { "asc" };
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("sort {} {direction}", column.label),
            );
        }
        KeyAction::ClearSort => {
            dispatch_table(state, view_data, TableCommand::ClearSort);
            emit_status(state, view_data, internal_tx, "sort cleared");
        }
        KeyAction::OpenFilter => {
            let scope = state.table_state(&table).selected_column.clone();
            let columns = dataset_columns(state, &table);
            let column = scope
                .inputs(columns)
                .first()
                .copied()
                .flatten()
                .map(str::to_owned);
            view_data.mode = InputMode::Filter { column };
        }
        KeyAction::OpenScopePicker => {
            let columns = dataset_columns(state, &table);
            let current = &state.table_state(&table).selected_column;
            let cursor = ColumnScope::options(columns)
                .iter()
                .position(|scope| scope == current)
                .unwrap_or(0);
            view_data.mode = InputMode::ScopePicker { cursor };
        }
        KeyAction::ToggleSelected => {
            if let Some(key) = row_key {
                dispatch_table(state, view_data, TableCommand::ToggleRowSelected(key));
            }
        }
        KeyAction::TogglePageSelected => {
            dispatch_table(state, view_data, TableCommand::ToggleAllPageRowsSelected);
        }
        KeyAction::ClearSelection => {
            dispatch_table(state, view_data, TableCommand::ClearSelection);
        }
        KeyAction::TogglePin => {
            if let Some(key) = row_key {
                dispatch_table(state, view_data, TableCommand::ToggleRowPin(key));
            }
        }
        KeyAction::PinSelected => {
            if state.table_state(&table).row_selection.is_empty() {
                emit_status(state, view_data, internal_tx, "no rows selected");
                return;
            }
            dispatch_table(state, view_data, TableCommand::PinSelected);
        }
        KeyAction::DeleteRow => {
            if let Some(key) = row_key {
                dispatch_table(state, view_data, TableCommand::DeleteRow(key));
                emit_status(state, view_data, internal_tx, "row deleted");
            }
        }
        KeyAction::DeleteSelected => {
            let count = state.table_state(&table).row_selection.len();
            if count == 0 {
                emit_status(state, view_data, internal_tx, "no rows selected");
                return;
            }
            dispatch_table(state, view_data, TableCommand::DeleteSelected);
            emit_status(state, view_data, internal_tx, format!("{count} row(s) deleted"));
        }
        KeyAction::Edit => {
            let (Some(key), Some(column)) = (row_key, column) else {
                return;
            };
            if !column.editable {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("{} is not editable", column.label),
                );
                return;
            }
            let buffer = projection
                .row(cursor.row)
                .and_then(|row| row.cells.get(cursor.col))
                .cloned()
                .unwrap_or_default();
            view_data.mode = InputMode::Edit {
                key,
                field: column.id.to_owned(),
                buffer,
            };
        }
        KeyAction::HideColumn => {
            let Some(column) = column else {
                return;
            };
            if !column.hideable {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("{} cannot be hidden", column.label),
                );
                return;
            }
            dispatch_table(
                state,
                view_data,
                TableCommand::ToggleColumnVisibility(column.id.to_owned()),
            );
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("column hidden: {}", column.label),
            );
        }
        KeyAction::ShowAllColumns => {
            dispatch_table(state, view_data, TableCommand::SetAllColumnsVisible(true));
            emit_status(state, view_data, internal_tx, "all columns shown");
        }
        KeyAction::FirstPage => dispatch_table(state, view_data, TableCommand::FirstPage),
        KeyAction::PreviousPage => dispatch_table(state, view_data, TableCommand::PreviousPage),
        KeyAction::NextPage => dispatch_table(state, view_data, TableCommand::NextPage),
        KeyAction::LastPage => dispatch_table(state, view_data, TableCommand::LastPage),
        KeyAction::SmallerPages | KeyAction::LargerPages => {
            let current = state.table_state(&table).pagination.page_size;
            let next = if action == KeyAction::SmallerPages {
                state.settings().previous_page_size(current)
            } else {
                state.settings().next_page_size(current)
            };
            if let Some(size) = next {
                dispatch_table(state, view_data, TableCommand::SetPageSize(size));
                emit_status(state, view_data, internal_tx, format!("show {size} rows"));
            }
        }
        KeyAction::Reset => {
            dispatch_table(state, view_data, TableCommand::Reset);
            *view_data.cursor_mut(&table) = Cursor::default();
            emit_status(state, view_data, internal_tx, "table reset, refetching");
        }
        KeyAction::DismissToast => dispatch(state, view_data, AppCommand::DismissToast),
        KeyAction::ToggleHelp => view_data.mode = InputMode::Help,
    }
}

fn dataset_columns(state: &AppState, table: &TableId) -> &'static [Column] {
    match state.binding(table) {
        Some(kind) => state.dataset(kind).columns(),
        None => &[],
    }
}

fn handle_filter_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    column: Option<String>,
    key: KeyEvent,
) {
    let table = state.active_table().clone();
    let mut text = state.filter_text(&table, column.as_deref());
    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            view_data.mode = InputMode::Nav;
            return;
        }
        KeyCode::Tab => {
            let scope = state.table_state(&table).selected_column.clone();
            let inputs = scope.inputs(dataset_columns(state, &table));
            let position = inputs
                .iter()
                .position(|input| *input == column.as_deref())
                .unwrap_or(0);
            let next = inputs
                .get((position + 1) % inputs.len().max(1))
                .copied()
                .flatten()
                .map(str::to_owned);
            view_data.mode = InputMode::Filter { column: next };
            return;
        }
        KeyCode::Backspace => {
            if text.pop().is_none() {
                return;
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => text.push(ch),
        _ => return,
    }
    dispatch_table(
        state,
        view_data,
        TableCommand::FilterInput {
            column,
            value: text,
        },
    );
}

fn handle_scope_picker_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    cursor: usize,
    key: KeyEvent,
) {
    let table = state.active_table().clone();
    let columns = dataset_columns(state, &table);
    let options = ColumnScope::options(columns);
    let last = options.len().saturating_sub(1);
    match key.code {
        KeyCode::Esc => view_data.mode = InputMode::Nav,
        KeyCode::Char('j') | KeyCode::Down => {
            view_data.mode = InputMode::ScopePicker {
                cursor: (cursor + 1).min(last),
            };
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.mode = InputMode::ScopePicker {
                cursor: cursor.saturating_sub(1),
            };
        }
        KeyCode::Enter => {
            view_data.mode = InputMode::Nav;
            let Some(scope) = options.get(cursor).cloned() else {
                return;
            };
            let label = scope.label(columns);
            dispatch_table(state, view_data, TableCommand::SelectScope(scope));
            emit_status(state, view_data, internal_tx, format!("filter by {label}"));
        }
        _ => {}
    }
}

fn handle_edit_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    row: RowKey,
    field: String,
    mut buffer: String,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.mode = InputMode::Nav;
            emit_status(state, view_data, internal_tx, "edit cancelled");
            return;
        }
        KeyCode::Enter => {
            view_data.mode = InputMode::Nav;
            dispatch_table(
                state,
                view_data,
                TableCommand::EditField {
                    key: row,
                    field,
                    value: buffer,
                },
            );
            return;
        }
        KeyCode::Backspace => {
            buffer.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => buffer.push(ch),
        _ => return,
    }
    view_data.mode = InputMode::Edit {
        key: row,
        field,
        buffer,
    };
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let tables = state.bound_tables().collect::<Vec<_>>();
    let selected = tables
        .iter()
        .position(|(table, _)| *table == state.active_table())
        .unwrap_or(0);
    let titles = tables
        .iter()
        .map(|(table, kind)| tab_title(state, table, *kind))
        .collect::<Vec<_>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title("tabula").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    let filter_style = if matches!(view_data.mode, InputMode::Filter { .. }) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let filter = Paragraph::new(filter_bar_text(state, view_data))
        .style(filter_style)
        .block(Block::default().borders(Borders::ALL).title("filter"));
    frame.render_widget(filter, layout[1]);

    let table = state.active_table();
    let projection = project(state, table).unwrap_or_default();
    render_table(frame, layout[2], state, view_data, &projection);

    let mut footer = vec![Line::from(footer_text(state, &projection))];
    if let Some(toast) = state.toasts().first() {
        footer.push(Line::styled(
            toast_text(toast, state.toasts().len()),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    let footer = Paragraph::new(footer)
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, layout[3]);

    match &view_data.mode {
        InputMode::Help => {
            let area = centered_rect(70, 60, frame.area());
            frame.render_widget(Clear, area);
            let help = Paragraph::new(help_overlay_text())
                .block(Block::default().title("help").borders(Borders::ALL));
            frame.render_widget(help, area);
        }
        InputMode::ScopePicker { cursor } => {
            let area = centered_rect(40, 50, frame.area());
            frame.render_widget(Clear, area);
            let picker = Paragraph::new(scope_picker_text(state, *cursor))
                .block(Block::default().title("filter by").borders(Borders::ALL));
            frame.render_widget(picker, area);
        }
        InputMode::Edit { field, buffer, .. } => {
            let area = centered_rect(50, 20, frame.area());
            frame.render_widget(Clear, area);
            let prompt = Paragraph::new(format!("{buffer}_"))
                .block(Block::default().title(format!("edit {field}")).borders(Borders::ALL));
            frame.render_widget(prompt, area);
        }
        InputMode::Nav | InputMode::Filter { .. } => {}
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
    projection: &TableProjection,
) {
    let table = state.active_table();
    let table_state = state.table_state(table);
    let cursor = view_data.cursor(table);

    let mut widths = vec![Constraint::Length(2)];
    widths.extend(projection.columns.iter().map(|_| Constraint::Min(6)));

    let mut header_cells = vec![Cell::from(String::new())];
    header_cells.extend(projection.columns.iter().map(|column| {
        Cell::from(header_label(column, &table_state.sorting)).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let header = Row::new(header_cells);

    let rows = projection.rows.iter().enumerate().map(|(index, row)| {
        let on_cursor = index == cursor.row;
        let mut cells = vec![Cell::from(row_marker(row))];
        cells.extend(row.cells.iter().enumerate().map(|(col, text)| {
            let mut style = Style::default();
            if row.pinned {
                style = style.fg(Color::Yellow);
            }
            if row.selected {
                style = style.add_modifier(Modifier::BOLD);
            }
            if on_cursor {
                style = style.bg(Color::DarkGray);
            }
            if on_cursor && col == cursor.col {
                style = Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD);
            }
            Cell::from(text.clone()).style(style)
        }));
        Row::new(cells)
    });

    let widget = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(state, table, projection))
                .borders(Borders::ALL),
        );
    frame.render_widget(widget, area);
}

fn tab_title(state: &AppState, table: &TableId, kind: DatasetKind) -> String {
    if state.dataset(kind).is_busy() {
        format!(" {table} {} ... ", kind.label())
    } else {
        format!(" {table} {} ", kind.label())
    }
}

fn table_title(state: &AppState, table: &TableId, projection: &TableProjection) -> String {
    let Some(kind) = state.binding(table) else {
        return String::new();
    };
    let dataset = state.dataset(kind);
    if !dataset.is_loaded() {
        return format!("{} (not loaded, r to retry)", kind.label());
    }
    let mut title = format!(
        "{} | rows {}/{}",
        kind.label(),
        projection.filtered,
        projection.total
    );
    if dataset.is_busy() {
        title.push_str(" | busy");
    }
    title
}

fn header_label(column: &Column, sorting: &[SortEntry]) -> String {
    let mut label = column.label.to_owned();
    if let Some((position, entry)) = sorting
        .iter()
        .enumerate()
        .find(|(_, entry)| entry.column == column.id)
    {
        if sorting.len() == 1 {
            label.push_str(if entry.descending { " ↓" } else { " ↑" });
        } else {
            label.push_str(if entry.descending { " ▼" } else { " ▲" });
            label.push_str(&(position + 1).to_string());
        }
    }
    label
}

fn row_marker(row: &ProjectedRow) -> &'static str {
    match (row.pinned, row.selected) {
        (true, true) => "^*",
        (true, false) => "^ ",
        (false, true) => " *",
        (false, false) => "  ",
    }
}

fn filter_bar_text(state: &AppState, view_data: &ViewData) -> String {
    let table = state.active_table();
    let columns = dataset_columns(state, table);
    let scope = &state.table_state(table).selected_column;
    let focused = match &view_data.mode {
        InputMode::Filter { column } => Some(column.as_deref()),
        _ => None,
    };
    let parts = scope
        .inputs(columns)
        .into_iter()
        .map(|input| {
            let label = match input {
                Some(column) => ColumnScope::Single(column.to_owned()).label(columns),
                None => scope.label(columns),
            };
            let caret = if focused == Some(input) { "_" } else { "" };
            format!("{label}: {}{caret}", state.filter_text(table, input))
        })
        .collect::<Vec<_>>();
    parts.join(" | ")
}

fn footer_text(state: &AppState, projection: &TableProjection) -> String {
    let table = state.active_table();
    let pagination = state.table_state(table).pagination;
    let mut text = format!(
        "page {} of {} ({} per page) | {} of {} row(s) selected",
        pagination.page_index + 1,
        projection.page_count,
        pagination.page_size,
        projection.selected,
        projection.filtered
    );
    match state.status_line() {
        Some(status) => {
            text.push_str(" | ");
            text.push_str(status);
        }
        None => text.push_str(" | ? help | q quit"),
    }
    text
}

fn toast_text(toast: &str, queued: usize) -> String {
    if queued > 1 {
        format!("{toast} (+{} more, esc dismiss)", queued - 1)
    } else {
        format!("{toast} (esc dismiss)")
    }
}

fn scope_picker_text(state: &AppState, cursor: usize) -> String {
    let table = state.active_table();
    let columns = dataset_columns(state, table);
    let current = &state.table_state(table).selected_column;
    ColumnScope::options(columns)
        .iter()
        .enumerate()
        .map(|(index, scope)| {
            let pointer = if index == cursor { ">" } else { " " };
            let active = if scope == current { " (active)" } else { "" };
            format!("{pointer} {}{active}", scope.label(columns))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q/ctrl+c/q quit | tab/f next table | shift+tab/b previous table | ? help\n\
rows: j/k move | h/l column | space select | v select page | V clear selection\n\
pins: p pin row | P pin selected\n\
sort: s/S asc/desc | a/A add asc/desc | x clear\n\
filter: / type (tab next input, esc done) | o choose columns\n\
edit: e/enter edit cell | d delete row | D delete selected\n\
columns: c hide | C show all\n\
pages: { [ ] } first/prev/next/last | < > page size\n\
table: r reset and refetch | esc dismiss error"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
