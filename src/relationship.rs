use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One directed edge of the graph: `table` is constrained by `related` on `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge<'g> {
    pub table: &'g str,
    pub related: &'g str,
    pub key: &'g str,
}

/// Static adjacency from each table to the tables it references and the
/// column shared with each of them.
///
/// Nothing is validated here. Edges naming tables or columns that do not
/// exist are simply inert during propagation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipGraph {
    adjacency: BTreeMap<String, BTreeMap<String, String>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }
    /// Declares that rows of `table` must reference a key value present in `related`.
    pub fn relate(mut self, table: &str, related: &str, key: &str) -> Self {
        self.adjacency
            .entry(table.to_owned())
            .or_default()
            .insert(related.to_owned(), key.to_owned());
        self
    }
    /// Declares the edge in both directions.
    pub fn relate_both(self, table: &str, related: &str, key: &str) -> Self {
        self.relate(table, related, key).relate(related, table, key)
    }
    pub fn related(&self, table: &str) -> impl Iterator<Item = Edge<'_>> {
        self.adjacency
            .get_key_value(table)
            .into_iter()
            .flat_map(|(table, related)| {
                related.iter().map(move |(r, k)| Edge {
                    table,
                    related: r,
                    key: k,
                })
            })
    }
    pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> {
        self.adjacency.keys().flat_map(|t| self.related(t))
    }
    pub fn is_empty(&self) -> bool {
        self.adjacency.values().all(BTreeMap::is_empty)
    }
}

impl From<BTreeMap<String, BTreeMap<String, String>>> for RelationshipGraph {
    fn from(adjacency: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self { adjacency }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relate_both_adds_the_reverse_edge() {
        let graph = RelationshipGraph::new().relate_both("a", "b", "k").relate("b", "c", "j");
        let edges: Vec<(&str, &str, &str)> = graph.edges().map(|e| (e.table, e.related, e.key)).collect();
        assert_eq!(edges, vec![("a", "b", "k"), ("b", "a", "k"), ("b", "c", "j")]);
        assert_eq!(graph.related("c").count(), 0);
    }

    #[test]
    fn reads_the_nested_map_shape() {
        let graph: RelationshipGraph =
            serde_json::from_str(r#"{"events": {"attendees": "event_url"}}"#).unwrap();
        assert_eq!(graph, RelationshipGraph::new().relate("events", "attendees", "event_url"));
    }
}
