use pretty_assertions::assert_eq;
use relfilter::{sample, Conditions, FilteredTables, RelationshipGraph, Table, TableFilter, Value};

fn sample_filter() -> TableFilter {
    TableFilter::new(sample::tables().unwrap(), sample::relationships()).unwrap()
}

fn tech_conf_managers() -> Conditions {
    Conditions::new()
        .with("events", "event_name", "TECH CONF")
        .with_in("employees", "person_seniority", vec!["director", "manager"])
}

fn column(filtered: &FilteredTables, table: &str, column: &str) -> Vec<String> {
    filtered
        .get(table)
        .unwrap()
        .column_values(column)
        .unwrap()
        .map(|v| v.to_string())
        .collect()
}

fn rows(table: &Table) -> Vec<Vec<Value>> {
    table.rows().map(|r| r.to_vec()).collect()
}

#[test]
fn tech_conf_directors_and_managers() {
    let filtered = sample_filter().filter(&tech_conf_managers());
    assert_eq!(filtered.len(), 5);
    assert_eq!(column(&filtered, "events", "event_url"), vec!["e1"]);
    assert_eq!(column(&filtered, "attendees", "company_url"), vec!["c1", "c2"]);
    assert_eq!(column(&filtered, "companies", "company_name"), vec!["TechCorp", "OilGiant"]);
    assert_eq!(column(&filtered, "company_contacts", "company_url"), vec!["c1", "c2"]);
    assert_eq!(column(&filtered, "employees", "person_id"), vec!["p1", "p2", "p3"]);
}

#[test]
fn conditions_read_from_json() {
    let conditions: Conditions = serde_json::from_str(
        r#"{
            "events": {"event_name": "TECH CONF"},
            "employees": {"person_seniority": ["director", "manager"]}
        }"#,
    )
    .unwrap();
    assert_eq!(conditions, tech_conf_managers());
}

#[test]
fn no_conditions_keeps_everything_connected() {
    let filter = sample_filter();
    let filtered = filter.filter(&Conditions::new());
    for table in filter.tables() {
        assert_eq!(rows(filtered.get(table.name()).unwrap()), rows(table), "table {}", table.name());
    }
    assert_eq!(filtered.propagation().removed, 0);
    assert_eq!(filtered.propagation().passes, 1);
}

#[test]
fn filtering_the_result_again_changes_nothing() {
    let graph = sample::relationships();
    let once = sample_filter().filter(&tech_conf_managers());
    let again = TableFilter::new(once.clone().into_tables().into_values(), graph)
        .unwrap()
        .filter(&Conditions::new());
    for (name, table) in once.iter() {
        assert_eq!(rows(again.get(name).unwrap()), rows(table), "table {name}");
    }
    assert_eq!(again.propagation().removed, 0);
}

#[test]
fn more_conditions_never_add_rows() {
    let filter = sample_filter();
    let loose = filter.filter(&Conditions::new().with("events", "event_country", "usa"));
    let tight = filter.filter(
        &Conditions::new()
            .with("events", "event_country", "usa")
            .with("employees", "person_seniority", "director"),
    );
    for (name, table) in tight.iter() {
        let allowed = rows(loose.get(name).unwrap());
        for row in rows(table) {
            assert!(allowed.contains(&row), "{name} gained {row:?}");
        }
    }
    assert!(tight.get("employees").unwrap().row_count() < loose.get("employees").unwrap().row_count());
}

#[test]
fn every_surviving_key_is_backed_by_its_related_table() {
    let filter = sample_filter();
    let filtered = filter.filter(&tech_conf_managers());
    for edge in filter.relationships().edges() {
        let related: Vec<&Value> = filtered
            .get(edge.related)
            .unwrap()
            .column_values(edge.key)
            .unwrap()
            .collect();
        for value in filtered.get(edge.table).unwrap().column_values(edge.key).unwrap() {
            assert!(related.contains(&value), "{} -> {} on {}", edge.table, edge.related, edge.key);
        }
    }
}

#[test]
fn matching_ignores_case() {
    let filter = sample_filter();
    let expected = rows(filter.filter(&tech_conf_managers()).get("employees").unwrap());
    for spelling in ["tech conf", "Tech Conf", "tEcH cOnF"] {
        let conditions = Conditions::new()
            .with_in("events", "event_name", vec![spelling])
            .with_in("employees", "person_seniority", vec!["DIRECTOR", "Manager"]);
        assert_eq!(rows(filter.filter(&conditions).get("employees").unwrap()), expected, "{spelling}");
    }
    // "TEch" is a different event name, not a prefix match
    let tech = filter.filter(&Conditions::new().with("events", "event_name", "tech"));
    assert_eq!(column(&tech, "events", "event_url"), vec!["e4"]);
    assert_eq!(column(&tech, "companies", "company_url"), vec!["c1", "c3"]);
}

#[test]
fn unrelated_tables_keep_their_rows() {
    let venues = Table::from_columns(
        "venues",
        vec![("venue", vec!["Moscone".into(), "Messe".into()])],
    )
    .unwrap();
    let mut tables = sample::tables().unwrap();
    tables.push(venues);
    let filter = TableFilter::new(tables, sample::relationships()).unwrap();
    let filtered = filter.filter(&tech_conf_managers());
    assert_eq!(filtered.get("venues").unwrap().row_count(), 2);
}

#[test]
fn empty_selection_empties_every_reachable_table() {
    let filtered = sample_filter().filter(&Conditions::new().with("events", "event_city", "Atlantis"));
    for (name, table) in filtered.iter() {
        assert!(table.is_empty(), "{name} still has {} rows", table.row_count());
        assert!(!table.columns().is_empty());
    }
}

#[test]
fn unknown_tables_and_columns_are_ignored() {
    let filtered = sample_filter().filter(
        &Conditions::new()
            .with("venues", "venue", "Moscone")
            .with("events", "event_budget", 10),
    );
    assert_eq!(filtered.len(), 5);
    assert_eq!(filtered.propagation().removed, 0);
    assert_eq!(filtered.get("events").unwrap().row_count(), 5);
}

#[test]
fn propagation_crosses_several_hops() {
    // Tom works for DataFirm, which attends Oil Expo and Data Summit.
    let filtered = sample_filter().filter(&Conditions::new().with("employees", "person_first_name", "tom"));
    assert_eq!(column(&filtered, "companies", "company_url"), vec!["c4"]);
    assert_eq!(column(&filtered, "events", "event_url"), vec!["e2", "e5"]);
    assert_eq!(column(&filtered, "attendees", "event_url"), vec!["e2", "e5"]);
}

#[test]
fn null_keys_never_join() {
    let parents = Table::from_columns("parents", vec![("k", vec!["a".into(), Value::Null])]).unwrap();
    let children = Table::from_columns(
        "children",
        vec![("k", vec![Value::Null, "a".into(), "b".into()]), ("n", vec![1.into(), 2.into(), 3.into()])],
    )
    .unwrap();
    let graph = RelationshipGraph::new().relate_both("parents", "children", "k");
    let filtered = TableFilter::new([parents, children], graph).unwrap().filter(&Conditions::new());
    assert_eq!(column(&filtered, "children", "n"), vec!["2"]);
    assert_eq!(column(&filtered, "parents", "k"), vec!["a"]);
}

#[test]
fn duplicate_table_names_are_rejected() {
    let mut tables = sample::tables().unwrap();
    tables.push(sample::events().unwrap());
    assert!(TableFilter::new(tables, sample::relationships()).is_err());
}

#[test]
fn concurrent_filters_share_the_base_tables() {
    let filter = sample_filter();
    let expected = rows(filter.filter(&tech_conf_managers()).get("employees").unwrap());
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let filter = &filter;
                scope.spawn(move || {
                    if i % 2 == 0 {
                        rows(filter.filter(&tech_conf_managers()).get("employees").unwrap())
                    } else {
                        rows(filter.filter(&Conditions::new()).get("employees").unwrap())
                    }
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let employees = handle.join().unwrap();
            if i % 2 == 0 {
                assert_eq!(employees, expected);
            } else {
                assert_eq!(employees.len(), 7);
            }
        }
    });
    assert_eq!(filter.table("employees").unwrap().row_count(), 7);
}

#[test]
fn filtered_tables_serialize_per_table() {
    let filtered = sample_filter().filter(&tech_conf_managers());
    let json = serde_json::to_value(&filtered).unwrap();
    assert_eq!(json["employees"]["row_count"], 3);
    assert_eq!(json["events"]["rows"][0][2], "2023-09-01");
    assert_eq!(json["companies"]["columns"][3], "company_revenue");
    assert_eq!(json["companies"]["rows"][0][3], 1_000_000);
}
