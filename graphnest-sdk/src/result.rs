// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result handling and typed deserialization
//!
//! Rows are ordered JSON maps, so any `serde` type whose fields match the
//! returned columns can be read straight out of a result.

use crate::error::{Error, Result};
use graphnest::{QueryResult, Row};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Wrapper around `QueryResult` with typed accessors
///
/// # Examples
///
/// ```no_run
/// use serde::Deserialize;
/// use graphnest_sdk::TypedResult;
///
/// #[derive(Deserialize)]
/// struct Person {
///     name: String,
///     age: i64,
/// }
///
/// # async fn run(db: &graphnest_sdk::GraphNest) -> graphnest_sdk::Result<()> {
/// let result = db
///     .execute("MATCH (p:Person) RETURN p.name AS name, p.age AS age")
///     .await?;
/// let people: Vec<Person> = TypedResult::from(result).deserialize_rows()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TypedResult {
    inner: QueryResult,
}

impl TypedResult {
    pub fn new(result: QueryResult) -> Self {
        TypedResult { inner: result }
    }

    pub fn inner(&self) -> &QueryResult {
        &self.inner
    }

    pub fn into_inner(self) -> QueryResult {
        self.inner
    }

    pub fn row_count(&self) -> usize {
        self.inner.row_count()
    }

    /// Column names in RETURN order
    pub fn columns(&self) -> &[String] {
        &self.inner.columns
    }

    pub fn get_row(&self, index: usize) -> Option<&Row> {
        self.inner.rows.get(index)
    }

    /// Deserialize every row into `T`
    pub fn deserialize_rows<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.inner
            .rows
            .iter()
            .map(|row| self.deserialize_row(row))
            .collect()
    }

    pub fn deserialize_row<T: DeserializeOwned>(&self, row: &Row) -> Result<T> {
        let value = Value::Object(row.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// First row as `T`
    pub fn first<T: DeserializeOwned>(&self) -> Result<T> {
        let row = self
            .get_row(0)
            .ok_or_else(|| Error::NotFound("query returned no rows".to_string()))?;
        self.deserialize_row(row)
    }

    /// First column of the first row as `T`
    ///
    /// ```no_run
    /// # async fn run(db: &graphnest_sdk::GraphNest) -> graphnest_sdk::Result<()> {
    /// let result = db.execute("MATCH (p:Person) RETURN count(p) AS count").await?;
    /// let count: i64 = graphnest_sdk::TypedResult::from(result).scalar()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn scalar<T: DeserializeOwned>(&self) -> Result<T> {
        if self.inner.columns.is_empty() {
            return Err(Error::NotFound("query returned no columns".to_string()));
        }
        if self.inner.is_empty() {
            return Err(Error::NotFound("query returned no rows".to_string()));
        }
        let value = self
            .inner
            .first_value()
            .ok_or_else(|| Error::NotFound("first row has no value in its first column".to_string()))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.inner.rows
    }
}

impl From<QueryResult> for TypedResult {
    fn from(result: QueryResult) -> Self {
        TypedResult::new(result)
    }
}
