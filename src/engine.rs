use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::condition::Conditions;
use crate::error::{RelfilterError, Result};
use crate::propagate::{propagate, Propagation, Selections};
use crate::relationship::RelationshipGraph;
use crate::table::Table;

/// Filters a fixed set of base tables.
///
/// The base tables and the relationship graph are shared read-only, so one
/// `TableFilter` can serve any number of concurrent [`TableFilter::filter`]
/// calls.
#[derive(Debug, Clone)]
pub struct TableFilter {
    tables: Arc<BTreeMap<String, Table>>,
    relationships: Arc<RelationshipGraph>,
}

impl TableFilter {
    pub fn new(
        tables: impl IntoIterator<Item = Table>,
        relationships: RelationshipGraph,
    ) -> Result<Self> {
        let mut kept = BTreeMap::new();
        for table in tables {
            let name = table.name().to_owned();
            if kept.insert(name.clone(), table).is_some() {
                return Err(RelfilterError::InvalidArgument(format!(
                    "table '{}' given more than once",
                    name
                )));
            }
        }
        Ok(Self {
            tables: Arc::new(kept),
            relationships: Arc::new(relationships),
        })
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }
    pub fn relationships(&self) -> &RelationshipGraph {
        &self.relationships
    }

    /// Applies each table's conditions, then propagates them across the
    /// relationships until nothing changes. Every base table is present in
    /// the result.
    pub fn filter(&self, conditions: &Conditions) -> FilteredTables {
        let mut selections = Selections::new();
        for (name, set) in conditions.iter() {
            match self.tables.get_key_value(name) {
                Some((name, table)) => {
                    let rows = set.apply(table);
                    debug!(table = name.as_str(), conditions = set.len(), rows = rows.len(), "conditions applied");
                    selections.insert(name.as_str(), rows);
                }
                None => warn!(table = name, "table not found, conditions skipped"),
            }
        }
        let propagation = propagate(&self.tables, &self.relationships, &mut selections);
        debug!(passes = propagation.passes, removed = propagation.removed, "propagation complete");
        let tables = selections
            .iter()
            .filter_map(|(name, rows)| {
                let table = self.tables.get(*name)?;
                Some((name.to_string(), table.select(rows)))
            })
            .collect();
        FilteredTables { tables, propagation }
    }
}

/// The filtered copy of every base table.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct FilteredTables {
    tables: BTreeMap<String, Table>,
    #[serde(skip)]
    propagation: Propagation,
}

impl FilteredTables {
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables.iter().map(|(n, t)| (n.as_str(), t))
    }
    pub fn len(&self) -> usize {
        self.tables.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
    pub fn propagation(&self) -> Propagation {
        self.propagation
    }
    pub fn into_tables(self) -> BTreeMap<String, Table> {
        self.tables
    }
}
