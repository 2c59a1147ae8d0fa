//! Relfilter – constraint propagation over a small set of related tables.
//!
//! A [`engine::TableFilter`] holds named base tables and a
//! [`relationship::RelationshipGraph`] saying which tables reference which
//! through a shared key column. Filtering takes per-table conditions,
//! narrows each constrained table, and then propagates the narrowing across
//! the graph until no table changes any more: a row survives only if its key
//! value still appears among the surviving rows of every table it is related
//! to. Every base table comes back filtered, constrained or not.
//!
//! ## Modules
//! * [`datatype`] – The cell [`datatype::Value`] and its SQLite and JSON mappings.
//! * [`table`] – Immutable-row tables with a shared schema.
//! * [`condition`] – Equality and membership conditions, compared case-insensitively.
//! * [`relationship`] – The static adjacency between tables.
//! * [`propagate`] – The fixed-point narrowing over row bitmaps.
//! * [`engine`] – [`engine::TableFilter`], tying the above together.
//! * [`query`] – SQL generation over an attribute/value layout of the same data.
//! * [`persist`] – The SQLite store behind the generated queries.
//! * [`sample`] – A small events, companies and people dataset.
//! * [`server`] – The HTTP surface of the `relfilter` binary.
//!
//! ## Quick Start
//! ```
//! use relfilter::{sample, Conditions, TableFilter};
//! let filter = TableFilter::new(sample::tables().unwrap(), sample::relationships()).unwrap();
//! let conditions = Conditions::new().with("events", "event_name", "tech conf");
//! let filtered = filter.filter(&conditions);
//! assert_eq!(filtered.get("events").unwrap().row_count(), 1);
//! assert_eq!(filtered.get("companies").unwrap().row_count(), 2);
//! ```

pub mod condition;
pub mod config;
pub mod datatype;
pub mod engine;
pub mod error;
pub mod persist;
pub mod propagate;
pub mod query;
pub mod relationship;
pub mod sample;
pub mod server;
pub mod table;

use seahash::SeaHasher;
use std::hash::BuildHasherDefault;

// used in hashed collections keyed by values rather than row positions
pub type OtherHasher = BuildHasherDefault<SeaHasher>;

pub use condition::{Condition, ConditionSet, Conditions};
pub use datatype::Value;
pub use engine::{FilteredTables, TableFilter};
pub use error::{RelfilterError, Result};
pub use relationship::RelationshipGraph;
pub use table::Table;
