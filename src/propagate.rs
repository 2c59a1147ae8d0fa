//! Fixed-point propagation of row selections across the relationship graph.
//!
//! Each table starts from its own selection (the rows left by its conditions,
//! or all of its rows). A pass visits every table in name order and, for each
//! of its edges `table -> related` on `key`, drops the rows whose key value is
//! not among the key values of the rows currently selected in `related`.
//! Passes repeat until one of them leaves every selection unchanged.
//!
//! Selections only ever lose rows, and a table cannot lose more rows than it
//! has, so the loop ends after at most one pass more than the total number of
//! rows, cycles in the graph included. The fixed point reached does not depend
//! on the visiting order; only the number of passes does.
//!
//! An edge whose key column is missing from either table, or that names a
//! table that does not exist, constrains nothing.

use std::collections::{BTreeMap, HashSet};

use roaring::RoaringBitmap;
use tracing::debug;

use crate::relationship::{Edge, RelationshipGraph};
use crate::table::Table;
use crate::OtherHasher;

/// Row positions currently selected in each table, by table name.
pub type Selections<'t> = BTreeMap<&'t str, RoaringBitmap>;

/// Outcome of one propagation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Propagation {
    /// Full passes made, the final unchanged one included.
    pub passes: usize,
    /// Rows removed from all tables together.
    pub removed: u64,
}

/// Narrows `selections` until every edge is satisfied.
///
/// Tables missing from `selections` are taken to be fully selected.
pub fn propagate<'t>(
    tables: &'t BTreeMap<String, Table>,
    graph: &RelationshipGraph,
    selections: &mut Selections<'t>,
) -> Propagation {
    for (name, table) in tables {
        selections
            .entry(name.as_str())
            .or_insert_with(|| table.all_rows());
    }
    let before: u64 = selections.values().map(RoaringBitmap::len).sum();

    let mut inert: HashSet<Edge, OtherHasher> = HashSet::default();
    let mut passes = 0;
    let mut changed = true;
    while changed {
        changed = false;
        passes += 1;
        for name in tables.keys() {
            for edge in graph.related(name) {
                match narrow(tables, selections, edge) {
                    Some(true) => {
                        changed = true;
                    }
                    Some(false) => (),
                    None => {
                        if inert.insert(edge) {
                            debug!(
                                table = edge.table,
                                related = edge.related,
                                key = edge.key,
                                "relationship is inert"
                            );
                        }
                    }
                }
            }
        }
        debug!(pass = passes, changed, "propagation pass");
    }

    let after: u64 = selections.values().map(RoaringBitmap::len).sum();
    Propagation {
        passes,
        removed: before - after,
    }
}

/// Applies a single edge. `None` when the edge cannot constrain anything,
/// otherwise whether the selection of `edge.table` shrank.
fn narrow(
    tables: &BTreeMap<String, Table>,
    selections: &mut Selections<'_>,
    edge: Edge<'_>,
) -> Option<bool> {
    let table = tables.get(edge.table)?;
    let related = tables.get(edge.related)?;
    let idx = table.schema().position(edge.key)?;
    let related_idx = related.schema().position(edge.key)?;

    let visible: HashSet<_, OtherHasher> = selections
        .get(edge.related)?
        .iter()
        .filter_map(|r| related.row(r as usize))
        .map(|row| &row[related_idx])
        .filter(|v| !v.is_null())
        .collect();

    let current = selections.get_mut(edge.table)?;
    let next: RoaringBitmap = current
        .iter()
        .filter(|&r| {
            table
                .row(r as usize)
                .is_some_and(|row| visible.contains(&row[idx]))
        })
        .collect();
    if next.len() == current.len() {
        return Some(false);
    }
    *current = next;
    Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::Value;

    fn keyed(name: &str, key: &str, values: &[&str]) -> Table {
        Table::from_columns(name, vec![(key, values.iter().map(|v| Value::from(*v)).collect())]).unwrap()
    }

    #[test]
    fn cycle_terminates_at_the_common_keys() {
        let mut tables = BTreeMap::new();
        tables.insert("a".to_string(), keyed("a", "k", &["1", "2", "3"]));
        tables.insert("b".to_string(), keyed("b", "k", &["2", "3", "4"]));
        tables.insert("c".to_string(), keyed("c", "k", &["3", "4", "5"]));
        let graph = RelationshipGraph::new()
            .relate("a", "b", "k")
            .relate("b", "c", "k")
            .relate("c", "a", "k");
        let mut selections = Selections::new();
        let outcome = propagate(&tables, &graph, &mut selections);
        for (name, rows) in &selections {
            assert_eq!(rows.len(), 1, "table {name}");
        }
        assert_eq!(outcome.removed, 6);
        assert!(outcome.passes >= 2);
    }

    #[test]
    fn missing_key_column_is_inert() {
        let mut tables = BTreeMap::new();
        tables.insert("a".to_string(), keyed("a", "k", &["1"]));
        tables.insert("b".to_string(), keyed("b", "j", &["2"]));
        let graph = RelationshipGraph::new().relate_both("a", "b", "k").relate("a", "nowhere", "k");
        let mut selections = Selections::new();
        let outcome = propagate(&tables, &graph, &mut selections);
        assert_eq!(outcome, Propagation { passes: 1, removed: 0 });
    }
}
