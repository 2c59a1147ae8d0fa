//! Parameterized SQL over the attribute/value store.
//!
//! The attribute tables hold one `(key, attribute, value)` triple per cell.
//! A generated query first pivots them back into wide rows (`event_data`,
//! `company_data`, `people_data`), then joins the ones it needs onto the
//! `attendees` bridge table and filters with positional parameters.
//!
//! The joins only ever reach one hop from `attendees`. Unlike
//! [`crate::engine::TableFilter`] this cannot express constraints that travel
//! further, such as companies whose other events match some condition.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::datatype::ColumnType::{self, Date, Integer, Text};
use crate::datatype::Value;
use crate::error::{RelfilterError, Result};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

fn identifier(column: &str) -> Result<&str> {
    if IDENTIFIER.is_match(column) {
        Ok(column)
    } else {
        Err(RelfilterError::InvalidIdentifier(column.to_owned()))
    }
}

/// Attribute values are stored as text. Integer attributes are cast back so
/// that range bounds compare numerically; ISO dates already order as text.
pub fn pivot_column(attribute: &str, column_type: ColumnType) -> String {
    let pivoted = format!("MAX(CASE WHEN attribute = '{}' THEN value END)", attribute);
    match column_type {
        ColumnType::Integer => format!("CAST({} AS INTEGER) AS {}", pivoted, attribute),
        ColumnType::Text | ColumnType::Date => format!("{} AS {}", pivoted, attribute),
    }
}

/// A wide view pivoted out of one attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PivotTable {
    EventData,
    CompanyData,
    PeopleData,
}

impl PivotTable {
    pub const ALL: [PivotTable; 3] = [PivotTable::EventData, PivotTable::CompanyData, PivotTable::PeopleData];

    pub fn name(&self) -> &'static str {
        match self {
            PivotTable::EventData => "event_data",
            PivotTable::CompanyData => "company_data",
            PivotTable::PeopleData => "people_data",
        }
    }
    /// The attribute table the view is pivoted from.
    pub fn source(&self) -> &'static str {
        match self {
            PivotTable::EventData => "event_attributes",
            PivotTable::CompanyData => "company_attributes",
            PivotTable::PeopleData => "people_attributes",
        }
    }
    /// Entity key column, shared by the attribute table and the view.
    pub fn key(&self) -> &'static str {
        match self {
            PivotTable::EventData => "event_url",
            PivotTable::CompanyData => "company_url",
            PivotTable::PeopleData => "person_id",
        }
    }
    /// Attributes pivoted into the view, with the type each is read back as.
    pub fn attributes(&self) -> &'static [(&'static str, ColumnType)] {
        match self {
            PivotTable::EventData => &[
                ("event_name", Text),
                ("event_city", Text),
                ("event_country", Text),
                ("event_start_date", Date),
                ("event_industry", Text),
            ],
            PivotTable::CompanyData => &[
                ("company_name", Text),
                ("company_country", Text),
                ("company_industry", Text),
                ("company_revenue", Integer),
            ],
            PivotTable::PeopleData => &[
                ("company_url", Text),
                ("person_first_name", Text),
                ("person_last_name", Text),
                ("person_email", Text),
                ("person_city", Text),
                ("person_country", Text),
                ("person_seniority", Text),
                ("person_department", Text),
            ],
        }
    }
    /// The view a column is read from, judged by its name prefix.
    pub fn for_column(column: &str) -> Option<PivotTable> {
        if column.starts_with("event_") {
            Some(PivotTable::EventData)
        } else if column.starts_with("company_") {
            Some(PivotTable::CompanyData)
        } else if column.starts_with("person_") {
            Some(PivotTable::PeopleData)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Operator {
    #[serde(rename = "includes")]
    Includes,
    #[serde(rename = "greater-than-equal-to")]
    AtLeast,
    #[serde(rename = "less-than-equal-to")]
    AtMost,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Includes(Vec<Value>),
    AtLeast(Value),
    AtMost(Value),
}

type RawFilterArgument = (String, Operator, serde_json::Value);

/// One `(column, operator, value)` filter.
///
/// In JSON it is written as the triple `["event_city", "includes", ["Berlin"]]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawFilterArgument")]
pub struct FilterArgument {
    pub column: String,
    pub bound: Bound,
}

impl FilterArgument {
    pub fn includes<V: Into<Value>>(column: &str, values: Vec<V>) -> Self {
        Self {
            column: column.to_owned(),
            bound: Bound::Includes(values.into_iter().map(Into::into).collect()),
        }
    }
    pub fn at_least(column: &str, value: impl Into<Value>) -> Self {
        Self { column: column.to_owned(), bound: Bound::AtLeast(value.into()) }
    }
    pub fn at_most(column: &str, value: impl Into<Value>) -> Self {
        Self { column: column.to_owned(), bound: Bound::AtMost(value.into()) }
    }
}

impl TryFrom<RawFilterArgument> for FilterArgument {
    type Error = RelfilterError;

    fn try_from((column, operator, value): RawFilterArgument) -> Result<Self> {
        let invalid = |e: serde_json::Error| {
            RelfilterError::InvalidArgument(format!("filter on '{}': {}", column, e))
        };
        let bound = match operator {
            Operator::Includes => Bound::Includes(serde_json::from_value(value).map_err(invalid)?),
            Operator::AtLeast => Bound::AtLeast(serde_json::from_value(value).map_err(invalid)?),
            Operator::AtMost => Bound::AtMost(serde_json::from_value(value).map_err(invalid)?),
        };
        Ok(Self { column, bound })
    }
}

/// SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Dialect-specific pieces of a generated query.
pub trait QueryBuilder {
    fn base_query(&self) -> String;
    fn main_query(&self, output_columns: &[String]) -> Result<String>;
    fn from_clause(&self, required: &BTreeSet<PivotTable>) -> String;
    fn where_clause(&self, filters: &[FilterArgument]) -> Result<(String, Vec<Value>)>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteQueryBuilder;

impl QueryBuilder for SqliteQueryBuilder {
    fn base_query(&self) -> String {
        let views: Vec<String> = PivotTable::ALL
            .iter()
            .map(|view| {
                let mut select = vec![view.key().to_owned()];
                for (attribute, column_type) in view.attributes() {
                    select.push(pivot_column(attribute, *column_type));
                }
                format!(
                    "{} AS (\n    SELECT {}\n    FROM {}\n    GROUP BY {}\n)",
                    view.name(),
                    select.join(",\n           "),
                    view.source(),
                    view.key()
                )
            })
            .collect();
        format!("WITH {}", views.join(",\n"))
    }

    fn main_query(&self, output_columns: &[String]) -> Result<String> {
        if output_columns.is_empty() {
            return Ok("SELECT DISTINCT NULL".to_owned());
        }
        let columns = output_columns
            .iter()
            .map(|c| identifier(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("SELECT DISTINCT {}", columns.join(", ")))
    }

    fn from_clause(&self, required: &BTreeSet<PivotTable>) -> String {
        let mut clause = String::from("FROM attendees");
        for view in required {
            match view {
                PivotTable::EventData => clause.push_str(" JOIN event_data USING (event_url)"),
                PivotTable::CompanyData => clause.push_str(" JOIN company_data USING (company_url)"),
                PivotTable::PeopleData => {
                    clause.push_str(" LEFT JOIN company_contacts USING (company_url)");
                    clause.push_str(" LEFT JOIN people_data USING (company_url)");
                }
            }
        }
        clause
    }

    fn where_clause(&self, filters: &[FilterArgument]) -> Result<(String, Vec<Value>)> {
        let mut conditions = Vec::with_capacity(filters.len());
        let mut params = Vec::new();
        for filter in filters {
            let column = identifier(&filter.column)?;
            match &filter.bound {
                Bound::Includes(values) => {
                    let marks = vec!["?"; values.len()].join(", ");
                    conditions.push(format!("{} IN ({})", column, marks));
                    params.extend(values.iter().cloned());
                }
                Bound::AtLeast(value) => {
                    conditions.push(format!("{} >= ?", column));
                    params.push(value.clone());
                }
                Bound::AtMost(value) => {
                    conditions.push(format!("{} <= ?", column));
                    params.push(value.clone());
                }
            }
        }
        if conditions.is_empty() {
            return Ok((String::new(), params));
        }
        Ok((format!("WHERE {}", conditions.join(" AND ")), params))
    }
}

/// Assembles complete queries from a [`QueryBuilder`].
#[derive(Debug, Clone, Default)]
pub struct QueryGenerator<B: QueryBuilder> {
    builder: B,
}

impl<B: QueryBuilder> QueryGenerator<B> {
    pub fn new(builder: B) -> Self {
        Self { builder }
    }

    pub fn generate(&self, filters: &[FilterArgument], output_columns: &[String]) -> Result<GeneratedQuery> {
        let required = required_tables(filters, output_columns);
        let (where_clause, params) = self.builder.where_clause(filters)?;
        let sql = format!(
            "{}\n{}\n{}\n{}",
            self.builder.base_query(),
            self.builder.main_query(output_columns)?,
            self.builder.from_clause(&required),
            where_clause
        );
        Ok(GeneratedQuery { sql, params })
    }
}

/// Views needed to resolve every referenced column.
pub fn required_tables(filters: &[FilterArgument], output_columns: &[String]) -> BTreeSet<PivotTable> {
    output_columns
        .iter()
        .map(String::as_str)
        .chain(filters.iter().map(|f| f.column.as_str()))
        .filter_map(PivotTable::for_column)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_columns_that_are_not_identifiers() {
        let generator = QueryGenerator::new(SqliteQueryBuilder);
        let columns = vec!["event_name; DROP TABLE events".to_string()];
        assert!(matches!(
            generator.generate(&[], &columns),
            Err(RelfilterError::InvalidIdentifier(_))
        ));
        let filters = vec![FilterArgument::at_least("1event", "x")];
        assert!(generator.generate(&filters, &[]).is_err());
    }

    #[test]
    fn triples_need_the_right_value_shape() {
        let ok: FilterArgument = serde_json::from_str(r#"["event_city", "includes", ["Berlin"]]"#).unwrap();
        assert_eq!(ok, FilterArgument::includes("event_city", vec!["Berlin"]));
        assert!(serde_json::from_str::<FilterArgument>(r#"["event_city", "includes", "Berlin"]"#).is_err());
        assert!(serde_json::from_str::<FilterArgument>(r#"["event_city", "like", "B%"]"#).is_err());
    }
}
