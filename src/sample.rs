//! The small events/companies/people dataset used by the demo service and tests.
//!
//! Everything here is built fresh on each call.

use chrono::NaiveDate;

use crate::datatype::{Value, DATE_FORMAT};
use crate::error::{RelfilterError, Result};
use crate::relationship::RelationshipGraph;
use crate::table::Table;

fn text(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

fn dates(values: &[&str]) -> Result<Vec<Value>> {
    values
        .iter()
        .map(|v| {
            NaiveDate::parse_from_str(v, DATE_FORMAT)
                .map(Value::from)
                .map_err(|e| RelfilterError::InvalidArgument(format!("bad date '{}': {}", v, e)))
        })
        .collect()
}

pub fn events() -> Result<Table> {
    Table::from_columns(
        "events",
        vec![
            ("event_url", text(&["e1", "e2", "e3", "e4", "e5"])),
            ("event_name", text(&["Tech Conf", "Oil Expo", "Green Energy", "TEch", "Data Summit"])),
            (
                "event_start_date",
                dates(&["2023-09-01", "2023-10-15", "2023-11-20", "2023-11-20", "2023-12-05"])?,
            ),
            ("event_city", text(&["San Francisco", "Houston", "Berlin", "Berlin", "New York"])),
            ("event_country", text(&["USA", "USA", "Germany", "Germany", "USA"])),
            (
                "event_industry",
                text(&["Technology", "Oil & Gas", "Renewable Energy", "Technology", "Technology"]),
            ),
        ],
    )
}

pub fn attendees() -> Result<Table> {
    Table::from_columns(
        "attendees",
        vec![
            ("event_url", text(&["e1", "e1", "e2", "e2", "e3", "e4", "e4", "e5"])),
            ("company_url", text(&["c1", "c2", "c3", "c4", "c2", "c1", "c3", "c4"])),
            (
                "company_relation_to_event",
                text(&["Sponsor", "Attendee", "Sponsor", "Attendee", "Sponsor", "Attendee", "Sponsor", "Sponsor"]),
            ),
        ],
    )
}

pub fn companies() -> Result<Table> {
    Table::from_columns(
        "companies",
        vec![
            ("company_url", text(&["c1", "c2", "c3", "c4"])),
            ("company_name", text(&["TechCorp", "OilGiant", "GreenEnergy", "DataFirm"])),
            ("company_industry", text(&["Technology", "Oil & Gas", "Renewable Energy", "Technology"])),
            (
                "company_revenue",
                [1_000_000i64, 5_000_000, 2_000_000, 3_000_000].into_iter().map(Value::from).collect(),
            ),
            ("company_country", text(&["USA", "USA", "Germany", "USA"])),
        ],
    )
}

pub fn company_contacts() -> Result<Table> {
    Table::from_columns(
        "company_contacts",
        vec![
            ("company_url", text(&["c1", "c2", "c3", "c4"])),
            ("office_city", text(&["San Francisco", "Houston", "Berlin", "New York"])),
            ("office_country", text(&["USA", "USA", "Germany", "USA"])),
            ("office_address", text(&["123 Tech St", "456 Oil Ave", "789 Green Rd", "101 Data Ln"])),
            (
                "office_email",
                text(&["contact@techcorp.com", "info@oilgiant.com", "hello@greenenergy.de", "support@datafirm.com"]),
            ),
        ],
    )
}

pub fn employees() -> Result<Table> {
    Table::from_columns(
        "employees",
        vec![
            ("company_url", text(&["c1", "c1", "c2", "c2", "c3", "c3", "c4"])),
            ("person_id", text(&["p1", "p2", "p3", "p4", "p5", "p6", "p7"])),
            ("person_first_name", text(&["John", "Jane", "Bob", "Alice", "Max", "Anna", "Tom"])),
            ("person_last_name", text(&["Doe", "Smith", "Johnson", "Brown", "Mueller", "Schmidt", "Davis"])),
            (
                "person_email",
                text(&[
                    "john@techcorp.com",
                    "jane@techcorp.com",
                    "bob@oilgiant.com",
                    "alice@oilgiant.com",
                    "max@greenenergy.de",
                    "anna@greenenergy.de",
                    "tom@datafirm.com",
                ]),
            ),
            (
                "person_city",
                text(&["San Francisco", "San Francisco", "Houston", "Houston", "Berlin", "Berlin", "New York"]),
            ),
            ("person_country", text(&["USA", "USA", "USA", "USA", "Germany", "Germany", "USA"])),
            (
                "person_seniority",
                text(&["Director", "Manager", "Director", "Engineer", "Manager", "Director", "Manager"]),
            ),
            (
                "person_department",
                text(&["Engineering", "Marketing", "Operations", "Engineering", "Sales", "Engineering", "Data Science"]),
            ),
        ],
    )
}

/// All five sample tables.
pub fn tables() -> Result<Vec<Table>> {
    Ok(vec![events()?, attendees()?, companies()?, company_contacts()?, employees()?])
}

/// Symmetric links events - attendees - companies, with contacts and
/// employees hanging off companies.
pub fn relationships() -> RelationshipGraph {
    RelationshipGraph::new()
        .relate_both("events", "attendees", "event_url")
        .relate_both("attendees", "companies", "company_url")
        .relate_both("companies", "company_contacts", "company_url")
        .relate_both("companies", "employees", "company_url")
}
