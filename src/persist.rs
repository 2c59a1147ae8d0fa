use rusqlite::{params_from_iter, Connection};
use std::time::Duration;
use tracing::{debug, info};

use crate::datatype::ColumnType::{self, Date, Integer, Text};
use crate::datatype::Value;
use crate::error::{RelfilterError, Result};
use crate::query::{FilterArgument, GeneratedQuery, PivotTable, QueryBuilder, QueryGenerator};
use crate::sample;
use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

/// Layout of one of the normalized tables.
#[derive(Debug)]
pub struct TableDefinition {
    pub name: &'static str,
    pub columns: &'static [(&'static str, ColumnType)],
    pub primary_key: &'static [&'static str],
}

impl TableDefinition {
    pub fn lookup(name: &str) -> Option<&'static TableDefinition> {
        NORMALIZED.iter().find(|d| d.name == name)
    }
    fn column_list(&self) -> String {
        self.columns.iter().map(|(c, _)| *c).collect::<Vec<_>>().join(", ")
    }
    fn create(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|(c, t)| format!("{} {}", c, t.declared()))
            .collect();
        format!(
            "create table if not exists {} (\n    {},\n    primary key ({})\n);",
            self.name,
            columns.join(",\n    "),
            self.primary_key.join(", ")
        )
    }
    fn insert(&self) -> String {
        format!(
            "insert into {} ({}) values ({}) on conflict ({}) do nothing",
            self.name,
            self.column_list(),
            vec!["?"; self.columns.len()].join(", "),
            self.primary_key.join(", ")
        )
    }
}

pub static NORMALIZED: [TableDefinition; 5] = [
    TableDefinition {
        name: "events",
        columns: &[
            ("event_url", Text),
            ("event_name", Text),
            ("event_start_date", Date),
            ("event_city", Text),
            ("event_country", Text),
            ("event_industry", Text),
        ],
        primary_key: &["event_url"],
    },
    TableDefinition {
        name: "attendees",
        columns: &[
            ("event_url", Text),
            ("company_url", Text),
            ("company_relation_to_event", Text),
        ],
        primary_key: &["event_url", "company_url"],
    },
    TableDefinition {
        name: "companies",
        columns: &[
            ("company_url", Text),
            ("company_name", Text),
            ("company_industry", Text),
            ("company_revenue", Integer),
            ("company_country", Text),
        ],
        primary_key: &["company_url"],
    },
    TableDefinition {
        name: "company_contacts",
        columns: &[
            ("company_url", Text),
            ("office_city", Text),
            ("office_country", Text),
            ("office_address", Text),
            ("office_email", Text),
        ],
        primary_key: &["company_url"],
    },
    TableDefinition {
        name: "employees",
        columns: &[
            ("company_url", Text),
            ("person_id", Text),
            ("person_first_name", Text),
            ("person_last_name", Text),
            ("person_email", Text),
            ("person_city", Text),
            ("person_country", Text),
            ("person_seniority", Text),
            ("person_department", Text),
        ],
        primary_key: &["person_id"],
    },
];

// ------------- Persistence -------------
/// Owns the connection to the relational store. The connection is closed
/// when the store is dropped.
pub struct Store {
    connection: Connection,
}

impl Store {
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        let connection = match &mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        debug!(?mode, "store opened");
        Ok(Self { connection })
    }

    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.connection.busy_timeout(timeout)?;
        Ok(())
    }

    /// Creates the normalized tables and the attribute tables if missing.
    pub fn create_tables(&self) -> Result<()> {
        let mut ddl: Vec<String> = NORMALIZED.iter().map(TableDefinition::create).collect();
        for view in PivotTable::ALL {
            ddl.push(format!(
                "create table if not exists {} (\n    {} text not null,\n    attribute text not null,\n    value text,\n    primary key ({}, attribute)\n);",
                view.source(),
                view.key(),
                view.key()
            ));
        }
        self.connection.execute_batch(&ddl.join("\n"))?;
        Ok(())
    }

    /// Inserts the rows of `table` into the normalized table of the same
    /// name, skipping rows whose primary key is already stored. Returns the
    /// number of rows actually inserted.
    pub fn insert_table(&mut self, table: &Table) -> Result<usize> {
        let definition = TableDefinition::lookup(table.name())
            .ok_or_else(|| RelfilterError::UnknownTable(table.name().to_owned()))?;
        let positions = definition
            .columns
            .iter()
            .map(|(c, _)| {
                table.schema().position(c).ok_or_else(|| {
                    RelfilterError::InvalidArgument(format!("table '{}' has no column '{}'", table.name(), c))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let transaction = self.connection.transaction()?;
        let mut inserted = 0;
        {
            let mut statement = transaction.prepare(&definition.insert())?;
            for row in table.rows() {
                inserted += statement.execute(params_from_iter(positions.iter().map(|&p| &row[p])))?;
            }
        }
        transaction.commit()?;
        debug!(table = table.name(), inserted, "rows inserted");
        Ok(inserted)
    }

    /// Writes every attribute of `view` found in `table` as a
    /// `(key, attribute, value)` triple. Already stored triples are kept.
    pub fn insert_attributes(&mut self, view: PivotTable, table: &Table) -> Result<usize> {
        let key = table.schema().position(view.key()).ok_or_else(|| {
            RelfilterError::InvalidArgument(format!("table '{}' has no key column '{}'", table.name(), view.key()))
        })?;
        let attributes: Vec<(&str, usize)> = view
            .attributes()
            .iter()
            .filter_map(|(a, _)| table.schema().position(a).map(|p| (*a, p)))
            .collect();

        let transaction = self.connection.transaction()?;
        let mut inserted = 0;
        {
            let mut statement = transaction.prepare(&format!(
                "insert into {} ({}, attribute, value) values (?, ?, ?) on conflict do nothing",
                view.source(),
                view.key()
            ))?;
            for row in table.rows() {
                for (attribute, position) in &attributes {
                    inserted += statement.execute((&row[key], attribute, &row[*position]))?;
                }
            }
        }
        transaction.commit()?;
        debug!(source = view.source(), inserted, "attributes inserted");
        Ok(inserted)
    }

    /// Creates the schema and loads the sample dataset, both normalized and
    /// as attributes.
    pub fn load_sample(&mut self) -> Result<()> {
        self.create_tables()?;
        let mut inserted = 0;
        for table in sample::tables()? {
            inserted += self.insert_table(&table)?;
        }
        inserted += self.insert_attributes(PivotTable::EventData, &sample::events()?)?;
        inserted += self.insert_attributes(PivotTable::CompanyData, &sample::companies()?)?;
        inserted += self.insert_attributes(PivotTable::PeopleData, &sample::employees()?)?;
        info!(inserted, "sample data loaded");
        Ok(())
    }

    /// Runs a query, binding `params` positionally. Column names are taken
    /// from the statement.
    pub fn execute(&self, query: &str, params: &[Value]) -> Result<Table> {
        let mut statement = self.connection.prepare(query)?;
        let columns: Vec<String> = statement.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut result = Table::new("result", columns)?;
        let mut rows = statement.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<Value>>>()?;
            result.push_row(values)?;
        }
        Ok(result)
    }

    /// Reads one normalized table back, typed by its declared columns.
    pub fn load_table(&self, name: &str) -> Result<Table> {
        let definition =
            TableDefinition::lookup(name).ok_or_else(|| RelfilterError::UnknownTable(name.to_owned()))?;
        let mut table = Table::new(name, definition.columns.iter().map(|(c, _)| *c).collect())?;
        let mut statement = self.connection.prepare(&format!(
            "select {} from {} order by rowid",
            definition.column_list(),
            definition.name
        ))?;
        let mut rows = statement.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(definition.columns.len());
            for (i, (column, column_type)) in definition.columns.iter().enumerate() {
                let value = column_type.convert(row.get_ref(i)?).map_err(|e| {
                    RelfilterError::Persistence(format!("{}.{}: {}", name, column, e))
                })?;
                values.push(value);
            }
            table.push_row(values)?;
        }
        Ok(table)
    }

    /// All normalized tables as an in-memory snapshot.
    pub fn snapshot(&self) -> Result<Vec<Table>> {
        NORMALIZED.iter().map(|d| self.load_table(d.name)).collect()
    }
}

/// Generates a query from filter arguments and runs it against a store.
pub struct DataQueryService<'s, B: QueryBuilder> {
    generator: QueryGenerator<B>,
    store: &'s Store,
}

impl<'s, B: QueryBuilder> DataQueryService<'s, B> {
    pub fn new(generator: QueryGenerator<B>, store: &'s Store) -> Self {
        Self { generator, store }
    }

    pub fn query_data(&self, filters: &[FilterArgument], output_columns: &[String]) -> Result<Table> {
        let GeneratedQuery { sql, params } = self.generator.generate(filters, output_columns)?;
        debug!(%sql, params = params.len(), "running generated query");
        self.store.execute(&sql, &params)
    }
}
