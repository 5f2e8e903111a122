use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::error::StorageError;
use crate::filter::{matches_all, Relation};
use crate::model::FieldMap;

/// Read/write consistency requested from the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    One,
    Quorum,
    LocalQuorum,
    All,
}

impl Consistency {
    fn as_cql(&self) -> &'static str {
        match self {
            Consistency::One => "ONE",
            Consistency::Quorum => "QUORUM",
            Consistency::LocalQuorum => "LOCAL_QUORUM",
            Consistency::All => "ALL",
        }
    }
}

/// Per-call execution options. Unset fields inherit from whatever they are merged onto.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    pub ttl: Option<Duration>,
    pub limit: Option<usize>,
    pub consistency: Option<Consistency>,
    pub allow_filtering: bool,
    /// Projection; empty selects every field.
    pub select: Vec<String>,
}

impl Options {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_consistency(mut self, c: Consistency) -> Self {
        self.consistency = Some(c);
        self
    }

    pub fn with_select(mut self, fields: &[&str]) -> Self {
        self.select = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(&self, other: &Options) -> Options {
        Options {
            ttl: other.ttl.or(self.ttl),
            limit: other.limit.or(self.limit),
            consistency: other.consistency.or(self.consistency),
            allow_filtering: self.allow_filtering || other.allow_filtering,
            select: if other.select.is_empty() {
                self.select.clone()
            } else {
                other.select.clone()
            },
        }
    }
}

/// The generic, non-time-aware table the series accessor is layered on.
///
/// Operation constructors never touch the storage engine; they return a
/// pending operation which the caller runs.
pub trait Table: Sized {
    type Op;
    type Error: std::error::Error;

    fn name(&self) -> String;
    fn create(&self) -> Result<(), Self::Error>;
    fn create_if_not_exist(&self) -> Result<(), Self::Error>;
    fn recreate(&self) -> Result<(), Self::Error>;
    fn create_statement(&self) -> Result<String, Self::Error>;
    fn create_if_not_exist_statement(&self) -> Result<String, Self::Error>;

    fn with_options(&self, options: Options) -> Self;

    /// Full-row upsert.
    fn set(&self, row: FieldMap) -> Self::Op;
    fn update(&self, relations: Vec<Relation>, fields: FieldMap) -> Self::Op;
    fn delete(&self, relations: Vec<Relation>) -> Self::Op;
    fn read(&self, relations: Vec<Relation>) -> Self::Op;
    fn read_one(&self, relations: Vec<Relation>) -> Self::Op;
}

/// Primary key layout: partition keys, then clustering keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Keys {
    pub partition: Vec<String>,
    pub clustering: Vec<String>,
}

impl Keys {
    fn all(&self) -> impl Iterator<Item = &String> {
        self.partition.iter().chain(self.clustering.iter())
    }
}

#[derive(Debug, Default)]
struct Store {
    created: bool,
    rows: Vec<FieldMap>,
}

/// In-process table. Every handle derived from the same `new` shares rows.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    keys: Keys,
    options: Options,
    store: Arc<RwLock<Store>>,
}

impl MemoryTable {
    pub fn new(name: &str, keys: Keys) -> Self {
        Self {
            name: name.to_string(),
            keys,
            options: Options::default(),
            store: Arc::new(RwLock::new(Store::default())),
        }
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn op(&self, kind: OpKind) -> MemoryOp {
        MemoryOp {
            table: self.name.clone(),
            keys: self.keys.clone(),
            options: self.options.clone(),
            store: self.store.clone(),
            kind,
        }
    }

    fn render_create(&self, if_not_exists: bool) -> String {
        let columns: Vec<String> = self.keys.all().map(|k| format!("{} blob", k)).collect();
        let clustering = if self.keys.clustering.is_empty() {
            String::new()
        } else {
            format!(", {}", self.keys.clustering.join(", "))
        };
        format!(
            "CREATE TABLE {}{} ({}, PRIMARY KEY (({}){}))",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.name,
            columns.join(", "),
            self.keys.partition.join(", "),
            clustering
        )
    }
}

impl Table for MemoryTable {
    type Op = MemoryOp;
    type Error = StorageError;

    fn name(&self) -> String {
        self.name.clone()
    }

    fn create(&self) -> Result<(), StorageError> {
        let mut store = self.store.write().map_err(|_| StorageError::Poisoned)?;
        if store.created {
            return Err(StorageError::TableExists(self.name.clone()));
        }
        store.created = true;
        debug!(table = %self.name, "created table");
        Ok(())
    }

    fn create_if_not_exist(&self) -> Result<(), StorageError> {
        let mut store = self.store.write().map_err(|_| StorageError::Poisoned)?;
        store.created = true;
        Ok(())
    }

    fn recreate(&self) -> Result<(), StorageError> {
        let mut store = self.store.write().map_err(|_| StorageError::Poisoned)?;
        store.rows.clear();
        store.created = true;
        debug!(table = %self.name, "recreated table");
        Ok(())
    }

    fn create_statement(&self) -> Result<String, StorageError> {
        Ok(self.render_create(false))
    }

    fn create_if_not_exist_statement(&self) -> Result<String, StorageError> {
        Ok(self.render_create(true))
    }

    fn with_options(&self, options: Options) -> Self {
        Self {
            name: self.name.clone(),
            keys: self.keys.clone(),
            options: self.options.merge(&options),
            store: self.store.clone(),
        }
    }

    fn set(&self, row: FieldMap) -> MemoryOp {
        self.op(OpKind::Set { row })
    }

    fn update(&self, relations: Vec<Relation>, fields: FieldMap) -> MemoryOp {
        self.op(OpKind::Update { relations, fields })
    }

    fn delete(&self, relations: Vec<Relation>) -> MemoryOp {
        self.op(OpKind::Delete { relations })
    }

    fn read(&self, relations: Vec<Relation>) -> MemoryOp {
        self.op(OpKind::Read { relations, one: false })
    }

    fn read_one(&self, relations: Vec<Relation>) -> MemoryOp {
        self.op(OpKind::Read { relations, one: true })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Set { row: FieldMap },
    Update { relations: Vec<Relation>, fields: FieldMap },
    Delete { relations: Vec<Relation> },
    Read { relations: Vec<Relation>, one: bool },
}

/// A pending operation against a `MemoryTable`. Nothing happens until `run`.
#[derive(Debug, Clone)]
pub struct MemoryOp {
    table: String,
    keys: Keys,
    options: Options,
    store: Arc<RwLock<Store>>,
    kind: OpKind,
}

impl MemoryOp {
    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn relations(&self) -> &[Relation] {
        match &self.kind {
            OpKind::Set { .. } => &[],
            OpKind::Update { relations, .. }
            | OpKind::Delete { relations }
            | OpKind::Read { relations, .. } => relations,
        }
    }

    /// Execute. Writes return no rows; reads return the matching (projected) rows.
    pub fn run(&self) -> Result<Vec<FieldMap>, StorageError> {
        match &self.kind {
            OpKind::Set { row } => {
                self.upsert(row)?;
                Ok(vec![])
            }
            OpKind::Update { relations, fields } => {
                let mut store = self.writable()?;
                let mut touched = 0;
                for existing in store.rows.iter_mut().filter(|r| matches_all(relations, r)) {
                    for (k, v) in fields {
                        existing.insert(k.clone(), v.clone());
                    }
                    touched += 1;
                }
                debug!(table = %self.table, touched, "update");
                Ok(vec![])
            }
            OpKind::Delete { relations } => {
                let mut store = self.writable()?;
                let before = store.rows.len();
                store.rows.retain(|r| !matches_all(relations, r));
                debug!(table = %self.table, removed = before - store.rows.len(), "delete");
                Ok(vec![])
            }
            OpKind::Read { relations, one } => {
                let store = self.store.read().map_err(|_| StorageError::Poisoned)?;
                if !store.created {
                    return Err(StorageError::TableMissing(self.table.clone()));
                }
                let limit = if *one { Some(1) } else { self.options.limit };
                let rows: Vec<FieldMap> = store
                    .rows
                    .iter()
                    .filter(|r| matches_all(relations, r))
                    .take(limit.unwrap_or(usize::MAX))
                    .map(|r| self.project(r))
                    .collect();
                if *one && rows.is_empty() {
                    return Err(StorageError::NotFound(self.table.clone()));
                }
                Ok(rows)
            }
        }
    }

    /// Run a single-row read and hand back that row.
    pub fn fetch_one(&self) -> Result<FieldMap, StorageError> {
        self.run()?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound(self.table.clone()))
    }

    fn writable(&self) -> Result<std::sync::RwLockWriteGuard<'_, Store>, StorageError> {
        let store = self.store.write().map_err(|_| StorageError::Poisoned)?;
        if !store.created {
            return Err(StorageError::TableMissing(self.table.clone()));
        }
        Ok(store)
    }

    fn upsert(&self, row: &FieldMap) -> Result<(), StorageError> {
        if let Some(missing) = self.keys.all().find(|k| !row.contains_key(*k)) {
            return Err(StorageError::MissingKey(missing.clone()));
        }
        let mut store = self.writable()?;
        let same_key = |existing: &FieldMap| self.keys.all().all(|k| existing.get(k) == row.get(k));
        match store.rows.iter_mut().find(|r| same_key(&**r)) {
            Some(existing) => *existing = row.clone(),
            None => store.rows.push(row.clone()),
        }
        Ok(())
    }

    fn project(&self, row: &FieldMap) -> FieldMap {
        if self.options.select.is_empty() {
            return row.clone();
        }
        row.iter()
            .filter(|(k, _)| self.options.select.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// CQL-style rendering of what this operation would send.
    pub fn statement(&self) -> String {
        let where_clause = |relations: &[Relation]| {
            if relations.is_empty() {
                String::new()
            } else {
                let parts: Vec<String> = relations.iter().map(|r| r.to_string()).collect();
                format!(" WHERE {}", parts.join(" AND "))
            }
        };
        let ttl = self
            .options
            .ttl
            .map(|t| format!(" USING TTL {}", t.as_secs()))
            .unwrap_or_default();

        let mut stmt = match &self.kind {
            OpKind::Set { row } => {
                let cols: Vec<&str> = row.keys().map(String::as_str).collect();
                let vals: Vec<String> = row.values().map(|v| v.to_literal()).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({}){}",
                    self.table,
                    cols.join(", "),
                    vals.join(", "),
                    ttl
                )
            }
            OpKind::Update { relations, fields } => {
                let sets: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v.to_literal()))
                    .collect();
                format!(
                    "UPDATE {}{} SET {}{}",
                    self.table,
                    ttl,
                    sets.join(", "),
                    where_clause(relations)
                )
            }
            OpKind::Delete { relations } => {
                format!("DELETE FROM {}{}", self.table, where_clause(relations))
            }
            OpKind::Read { relations, one } => {
                let cols = if self.options.select.is_empty() {
                    "*".to_string()
                } else {
                    self.options.select.join(", ")
                };
                let limit = if *one { Some(1) } else { self.options.limit };
                let mut s =
                    format!("SELECT {} FROM {}{}", cols, self.table, where_clause(relations));
                if let Some(n) = limit {
                    s.push_str(&format!(" LIMIT {}", n));
                }
                if self.options.allow_filtering {
                    s.push_str(" ALLOW FILTERING");
                }
                s
            }
        };
        if let Some(c) = self.options.consistency {
            stmt.push_str(&format!(" -- consistency {}", c.as_cql()));
        }
        stmt
    }
}
