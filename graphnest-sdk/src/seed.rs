// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Fixed demo dataset
//!
//! A small social graph: people, the cities they live in and who knows whom.

/// Schema statements, node tables before the relationship tables that use them
pub const DEMO_SCHEMA: &[&str] = &[
    "CREATE NODE TABLE Person(id INT64, name STRING, age INT64, PRIMARY KEY(id))",
    "CREATE NODE TABLE City(id INT64, name STRING, population INT64, PRIMARY KEY(id))",
    "CREATE REL TABLE LivesIn(FROM Person TO City, since INT64)",
    "CREATE REL TABLE Knows(FROM Person TO Person, since INT64)",
];

pub const DEMO_DATA: &[&str] = &[
    "CREATE (:Person {id: 1, name: 'Alice', age: 34}), (:Person {id: 2, name: 'Bob', age: 29}), (:Person {id: 3, name: 'Carol', age: 41}), (:Person {id: 4, name: 'Dan', age: 23})",
    "CREATE (:City {id: 1, name: 'Berlin', population: 3645000}), (:City {id: 2, name: 'Lisbon', population: 545000}), (:City {id: 3, name: 'Toronto', population: 2794000})",
    "MATCH (a:Person {id: 1}), (b:City {id: 1}) CREATE (a)-[:LivesIn {since: 2015}]->(b)",
    "MATCH (a:Person {id: 2}), (b:City {id: 2}) CREATE (a)-[:LivesIn {since: 2019}]->(b)",
    "MATCH (a:Person {id: 3}), (b:City {id: 1}) CREATE (a)-[:LivesIn {since: 2008}]->(b)",
    "MATCH (a:Person {id: 4}), (b:City {id: 3}) CREATE (a)-[:LivesIn {since: 2021}]->(b)",
    "MATCH (a:Person {id: 1}), (b:Person {id: 2}) CREATE (a)-[:Knows {since: 2017}]->(b)",
    "MATCH (a:Person {id: 1}), (b:Person {id: 3}) CREATE (a)-[:Knows {since: 2012}]->(b)",
    "MATCH (a:Person {id: 3}), (b:Person {id: 4}) CREATE (a)-[:Knows {since: 2022}]->(b)",
];

/// Every demo statement in execution order
pub fn demo_statements() -> impl Iterator<Item = &'static str> {
    DEMO_SCHEMA.iter().chain(DEMO_DATA.iter()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_precedes_data() {
        let statements: Vec<_> = demo_statements().collect();
        assert_eq!(statements.len(), DEMO_SCHEMA.len() + DEMO_DATA.len());
        assert!(statements[..DEMO_SCHEMA.len()]
            .iter()
            .all(|s| s.starts_with("CREATE NODE TABLE") || s.starts_with("CREATE REL TABLE")));
    }
}
