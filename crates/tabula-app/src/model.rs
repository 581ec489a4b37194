// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::ids::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    Users,
    PeriodicElements,
}

impl DatasetKind {
    pub const ALL: [Self; 2] = [Self::Users, Self::PeriodicElements];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::PeriodicElements => "periodicElements",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::PeriodicElements => "periodic elements",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Integer,
    Decimal,
    Text,
}

/// A scalar cell value as seen by sorting, filtering and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl Value {
    pub fn parse(kind: ValueKind, raw: &str) -> Result<Self> {
        match kind {
            ValueKind::Integer => {
                let parsed = raw
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("{raw:?} is not a whole number"))?;
                Ok(Self::Integer(parsed))
            }
            ValueKind::Decimal => {
                let parsed = raw
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("{raw:?} is not a number"))?;
                if !parsed.is_finite() {
                    bail!("{raw:?} is not a finite number");
                }
                Ok(Self::Decimal(parsed))
            }
            ValueKind::Text => Ok(Self::Text(raw.to_owned())),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Integer(value) => value.to_string(),
            Self::Decimal(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }

    pub fn cmp_value(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(left), Self::Integer(right)) => left.cmp(right),
            (Self::Decimal(left), Self::Decimal(right)) => left.total_cmp(right),
            (Self::Integer(left), Self::Decimal(right)) => (*left as f64).total_cmp(right),
            (Self::Decimal(left), Self::Integer(right)) => left.total_cmp(&(*right as f64)),
            (Self::Text(left), Self::Text(right)) => left
                .to_ascii_lowercase()
                .cmp(&right.to_ascii_lowercase())
                .then_with(|| left.cmp(right)),
            _ => self
                .display()
                .to_ascii_lowercase()
                .cmp(&other.display().to_ascii_lowercase()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: ValueKind,
    pub sortable: bool,
    pub filterable: bool,
    pub editable: bool,
    pub hideable: bool,
}

impl Column {
    const fn id_column(kind: ValueKind) -> Self {
        Self {
            id: "id",
            label: "Id",
            kind,
            sortable: true,
            filterable: true,
            editable: false,
            hideable: false,
        }
    }

    const fn field(id: &'static str, label: &'static str, kind: ValueKind) -> Self {
        Self {
            id,
            label,
            kind,
            sortable: true,
            filterable: true,
            editable: true,
            hideable: true,
        }
    }
}

pub fn find_column<'a>(columns: &'a [Column], id: &str) -> Option<&'a Column> {
    columns.iter().find(|column| column.id == id)
}

/// A row of one dataset. Identity is fixed at construction; every other
/// field is editable through its string form.
pub trait Record: Clone + fmt::Debug {
    const DATASET: DatasetKind;

    fn id(&self) -> RecordId;

    fn columns() -> &'static [Column];

    fn value(&self, column: &str) -> Option<Value>;

    /// Coerces `raw` into the named field. Fails on unknown or immutable
    /// fields and on values the field type cannot hold.
    fn set_value(&mut self, column: &str, raw: &str) -> Result<()>;

    fn validate_field(column: &str, raw: &str) -> Result<()> {
        let Some(spec) = find_column(Self::columns(), column) else {
            bail!("unknown field {column:?} for {}", Self::DATASET.label());
        };
        if !spec.editable {
            bail!("field {column:?} cannot be edited");
        }
        Value::parse(spec.kind, raw).map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
}

const USER_COLUMNS: [Column; 5] = [
    Column::id_column(ValueKind::Integer),
    Column::field("name", "Name", ValueKind::Text),
    Column::field("email", "Email", ValueKind::Text),
    Column::field("username", "Username", ValueKind::Text),
    Column::field("phone", "Phone", ValueKind::Text),
];

impl Record for User {
    const DATASET: DatasetKind = DatasetKind::Users;

    fn id(&self) -> RecordId {
        RecordId::Int(self.id)
    }

    fn columns() -> &'static [Column] {
        &USER_COLUMNS
    }

    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::Integer(self.id)),
            "name" => Some(Value::Text(self.name.clone())),
            "email" => Some(Value::Text(self.email.clone())),
            "username" => Some(Value::Text(self.username.clone())),
            "phone" => Some(Value::Text(self.phone.clone())),
            _ => None,
        }
    }

    fn set_value(&mut self, column: &str, raw: &str) -> Result<()> {
        Self::validate_field(column, raw)?;
        let slot = match column {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "username" => &mut self.username,
            "phone" => &mut self.phone,
            _ => bail!("unknown field {column:?} for users"),
        };
        *slot = raw.to_owned();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicElement {
    pub id: i64,
    pub name: String,
    pub weight: f64,
    pub symbol: String,
}

const ELEMENT_COLUMNS: [Column; 4] = [
    Column::id_column(ValueKind::Integer),
    Column::field("name", "Name", ValueKind::Text),
    Column::field("weight", "Weight", ValueKind::Decimal),
    Column::field("symbol", "Symbol", ValueKind::Text),
];

impl Record for PeriodicElement {
    const DATASET: DatasetKind = DatasetKind::PeriodicElements;

    fn id(&self) -> RecordId {
        RecordId::Int(self.id)
    }

    fn columns() -> &'static [Column] {
        &ELEMENT_COLUMNS
    }

    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::Integer(self.id)),
            "name" => Some(Value::Text(self.name.clone())),
            "weight" => Some(Value::Decimal(self.weight)),
            "symbol" => Some(Value::Text(self.symbol.clone())),
            _ => None,
        }
    }

    fn set_value(&mut self, column: &str, raw: &str) -> Result<()> {
        Self::validate_field(column, raw)?;
        match column {
            "name" => self.name = raw.to_owned(),
            "symbol" => self.symbol = raw.to_owned(),
            "weight" => {
                if let Value::Decimal(weight) = Value::parse(ValueKind::Decimal, raw)? {
                    self.weight = weight;
                }
            }
            _ => bail!("unknown field {column:?} for periodic elements"),
        }
        Ok(())
    }
}
