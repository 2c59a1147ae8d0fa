//! Per-column filter conditions and their application to a single table.
//!
//! A condition is either a scalar, which keeps rows whose value equals it, or
//! a sequence, which keeps rows whose value is one of its members. Which of the
//! two applies is decided by the shape of the condition alone. All comparisons
//! are made on folded values (see [`Value::folded`]).

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use roaring::RoaringBitmap;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use tracing::warn;

use crate::datatype::Value;
use crate::table::Table;
use crate::OtherHasher;

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum Condition {
    In(Vec<Value>),
    Equals(Value),
}

impl Condition {
    pub fn predicate(&self) -> Predicate {
        match self {
            Condition::Equals(v) => Predicate::Equals(v.folded()),
            Condition::In(vs) => Predicate::In(vs.iter().filter_map(Value::folded).collect()),
        }
    }
}

/// A condition with its comparison operands folded once up front.
#[derive(Debug)]
pub enum Predicate {
    Equals(Option<String>),
    In(HashSet<String, OtherHasher>),
}

impl Predicate {
    pub fn matches(&self, value: &Value) -> bool {
        let Some(folded) = value.folded() else {
            return false;
        };
        match self {
            Predicate::Equals(Some(wanted)) => &folded == wanted,
            Predicate::Equals(None) => false,
            Predicate::In(members) => members.contains(&folded),
        }
    }
}

/// The conditions placed on one table, in the order they were given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet {
    conditions: Vec<(String, Condition)>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, column: impl Into<String>, condition: Condition) {
        self.conditions.push((column.into(), condition));
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(c, v)| (c.as_str(), v))
    }
    pub fn len(&self) -> usize {
        self.conditions.len()
    }
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Positions of the rows of `table` satisfying every condition.
    ///
    /// Conditions on columns the table does not have are skipped with a
    /// warning.
    pub fn apply(&self, table: &Table) -> RoaringBitmap {
        let mut selected = table.all_rows();
        for (column, condition) in self.iter() {
            let Some(idx) = table.schema().position(column) else {
                warn!(table = table.name(), column, "column not found, condition skipped");
                continue;
            };
            let predicate = condition.predicate();
            selected = selected
                .iter()
                .filter(|&r| {
                    table
                        .row(r as usize)
                        .is_some_and(|row| predicate.matches(&row[idx]))
                })
                .collect();
        }
        selected
    }
}

struct ConditionSetVisitor;

impl<'de> Visitor<'de> for ConditionSetVisitor {
    type Value = ConditionSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map from column names to values or lists of values")
    }
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ConditionSet, A::Error> {
        let mut set = ConditionSet::new();
        while let Some((column, condition)) = map.next_entry::<String, Condition>()? {
            set.conditions.push((column, condition));
        }
        Ok(set)
    }
}

// Keeps document order, which a plain map would lose.
impl<'de> Deserialize<'de> for ConditionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<ConditionSet, D::Error> {
        deserializer.deserialize_map(ConditionSetVisitor)
    }
}

/// Conditions for any number of tables.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(transparent)]
pub struct Conditions {
    tables: BTreeMap<String, ConditionSet>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }
    /// Adds an equality condition.
    pub fn with(mut self, table: &str, column: &str, value: impl Into<Value>) -> Self {
        self.entry(table).push(column, Condition::Equals(value.into()));
        self
    }
    /// Adds a membership condition.
    pub fn with_in<V: Into<Value>>(mut self, table: &str, column: &str, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.entry(table).push(column, Condition::In(values));
        self
    }
    pub fn entry(&mut self, table: &str) -> &mut ConditionSet {
        self.tables.entry(table.to_owned()).or_default()
    }
    pub fn get(&self, table: &str) -> Option<&ConditionSet> {
        self.tables.get(table)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConditionSet)> {
        self.tables.iter().map(|(t, c)| (t.as_str(), c))
    }
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Table {
        Table::from_columns(
            "people",
            vec![
                ("name", vec!["Ann".into(), "Bob".into(), "Cid".into()]),
                ("role", vec!["Director".into(), "Engineer".into(), Value::Null]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn shape_selects_the_strategy() {
        let set: ConditionSet = serde_json::from_str(r#"{"role": ["DIRECTOR", "engineer"], "name": "bob"}"#).unwrap();
        let kinds: Vec<(&str, bool)> = set
            .iter()
            .map(|(c, cond)| (c, matches!(cond, Condition::In(_))))
            .collect();
        assert_eq!(kinds, vec![("role", true), ("name", false)]);
        assert_eq!(set.apply(&people()).iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn unknown_columns_and_empty_sets_do_not_filter() {
        let table = people();
        assert_eq!(ConditionSet::new().apply(&table).len(), 3);
        let mut set = ConditionSet::new();
        set.push("salary", Condition::Equals(10.into()));
        assert_eq!(set.apply(&table).len(), 3);
    }

    #[test]
    fn null_never_matches() {
        let mut set = ConditionSet::new();
        set.push("role", Condition::In(vec![Value::Null, "director".into()]));
        assert_eq!(set.apply(&people()).iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn decimal_conditions_ignore_trailing_zeros() {
        let decimal = |s: &str| Value::Decimal(s.parse().unwrap());
        let prices = vec![decimal("2.50"), 3.into(), decimal("4.25")];
        let table = Table::from_columns("prices", vec![("price", prices)]).unwrap();
        let mut set = ConditionSet::new();
        set.push("price", Condition::In(vec![decimal("2.5"), decimal("3.000")]));
        assert_eq!(set.apply(&table).iter().collect::<Vec<_>>(), vec![0, 1]);
    }
}
