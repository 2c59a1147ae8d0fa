use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use roaring::RoaringBitmap;
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::datatype::Value;
use crate::error::{RelfilterError, Result};
use crate::OtherHasher;

/// Ordered column names of a table together with a name lookup.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize, OtherHasher>,
}
impl Schema {
    fn new(table: &str, columns: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity_and_hasher(columns.len(), OtherHasher::default());
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.clone(), i).is_some() {
                return Err(RelfilterError::DuplicateColumn {
                    table: table.to_owned(),
                    column: column.clone(),
                });
            }
        }
        Ok(Self { columns, index })
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }
    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

pub type Row = Arc<[Value]>;

/// A named, in-memory relation.
///
/// Rows are reference counted so that the filtered copies derived from a
/// base table share storage with it. A table never changes once it has been
/// handed to a [`crate::engine::TableFilter`].
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    schema: Arc<Schema>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new<C: Into<String>>(name: impl Into<String>, columns: Vec<C>) -> Result<Self> {
        let name = name.into();
        let columns = columns.into_iter().map(Into::into).collect();
        let schema = Arc::new(Schema::new(&name, columns)?);
        Ok(Self { name, schema, rows: Vec::new() })
    }

    /// Builds a table from named columns of equal length.
    pub fn from_columns<C: Into<String>>(
        name: impl Into<String>,
        columns: Vec<(C, Vec<Value>)>,
    ) -> Result<Self> {
        let (names, mut values): (Vec<String>, Vec<std::vec::IntoIter<Value>>) = columns
            .into_iter()
            .map(|(c, v)| (c.into(), v.into_iter()))
            .unzip();
        let mut table = Table::new(name, names)?;
        let height = values.first().map(|v| v.len()).unwrap_or(0);
        if let Some(column) = values.iter().position(|v| v.len() != height) {
            return Err(RelfilterError::SchemaMismatch {
                table: table.name.clone(),
                expected: height,
                actual: values[column].len(),
            });
        }
        for _ in 0..height {
            let row: Vec<Value> = values.iter_mut().filter_map(|v| v.next()).collect();
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.schema.len() {
            return Err(RelfilterError::SchemaMismatch {
                table: self.name.clone(),
                expected: self.schema.len(),
                actual: row.len(),
            });
        }
        if self.rows.len() >= u32::MAX as usize {
            return Err(RelfilterError::InvalidArgument(format!(
                "table '{}' cannot hold more than {} rows",
                self.name,
                u32::MAX
            )));
        }
        self.rows.push(Row::from(row));
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }
    pub fn has_column(&self, column: &str) -> bool {
        self.schema.position(column).is_some()
    }
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(|r| &r[..])
    }
    pub fn row(&self, row: usize) -> Option<&[Value]> {
        self.rows.get(row).map(|r| &r[..])
    }
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.schema.position(column)?;
        self.rows.get(row)?.get(idx)
    }
    pub fn column_values<'t>(&'t self, column: &str) -> Option<impl Iterator<Item = &'t Value> + use<'t>> {
        let idx = self.schema.position(column)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Bitmap holding every row position of this table.
    pub fn all_rows(&self) -> RoaringBitmap {
        let mut all = RoaringBitmap::new();
        all.insert_range(0..self.rows.len() as u32);
        all
    }

    /// A filtered copy holding the rows at the given positions, in base order.
    pub fn select(&self, rows: &RoaringBitmap) -> Table {
        Table {
            name: self.name.clone(),
            schema: Arc::clone(&self.schema),
            rows: rows
                .iter()
                .filter_map(|r| self.rows.get(r as usize).map(Arc::clone))
                .collect(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(|v| v.to_string()).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns()
            .iter()
            .enumerate()
            .map(|(i, c)| cells.iter().map(|r| r[i].len()).fold(c.len(), usize::max))
            .collect();
        let header: Vec<String> = self
            .columns()
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect();
        writeln!(f, "{}", header.join("  ").trim_end())?;
        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<w$}", v, w = *w))
                .collect();
            writeln!(f, "{}", line.join("  ").trim_end())?;
        }
        Ok(())
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let rows: Vec<&[Value]> = self.rows().collect();
        let mut s = serializer.serialize_struct("Table", 3)?;
        s.serialize_field("columns", self.columns())?;
        s.serialize_field("rows", &rows)?;
        s.serialize_field("row_count", &self.row_count())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_rows_and_duplicate_columns() {
        let mut t = Table::new("t", vec!["a", "b"]).unwrap();
        assert!(matches!(
            t.push_row(vec![Value::from("x")]),
            Err(RelfilterError::SchemaMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            Table::new("t", vec!["a", "a"]),
            Err(RelfilterError::DuplicateColumn { .. })
        ));
        assert!(Table::from_columns("t", vec![("a", vec![1.into()]), ("b", vec![])]).is_err());
    }

    #[test]
    fn select_keeps_base_order_and_schema() {
        let t = Table::from_columns("t", vec![("k", vec!["a".into(), "b".into(), "c".into()])]).unwrap();
        let picked = t.select(&RoaringBitmap::from_iter([2u32, 0]));
        assert_eq!(picked.columns(), t.columns());
        assert_eq!(picked.value(0, "k"), Some(&Value::from("a")));
        assert_eq!(picked.value(1, "k"), Some(&Value::from("c")));
        let empty = t.select(&RoaringBitmap::new());
        assert!(empty.is_empty());
        assert!(empty.has_column("k"));
    }
}
