//! Data Service
//! Mission: Table-scoped CRUD against the hosted relational store
//!
//! Only equality filters and single-column ordering are supported; that is
//! all the dashboard needs.

pub mod demo;
pub mod models;
pub mod rest_client;

pub use demo::DemoDataService;
pub use models::{AuditAction, AuditLog, Condition, Department, Equipment, EquipmentInput};
pub use rest_client::RestDataClient;

use crate::error::DataError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const DEPARTMENTS: &str = "departments";
pub const EQUIPMENTS: &str = "equipments";
pub const AUDIT_LOGS: &str = "audit_logs";

/// `column = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<String>) -> Self {
        Self {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::eq("id", value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Select expression, may embed relations: `*, departments(name)`
    pub columns: String,
    pub filter: Option<Filter>,
    pub order: Option<Order>,
}

impl Query {
    pub fn all() -> Self {
        Self::columns("*")
    }

    pub fn columns(columns: &str) -> Self {
        Self {
            columns: columns.to_string(),
            filter: None,
            order: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    /// Whether the select expression embeds `relation(...)`
    pub fn embeds(&self, relation: &str) -> bool {
        self.columns
            .split(',')
            .map(str::trim)
            .any(|c| c.starts_with(relation) && c[relation.len()..].starts_with('('))
    }
}

#[async_trait]
pub trait DataService: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, DataError>;

    async fn insert(&self, table: &str, records: Vec<Value>) -> Result<(), DataError>;

    async fn update(&self, table: &str, patch: Value, filter: &Filter) -> Result<(), DataError>;

    async fn delete(&self, table: &str, filter: &Filter) -> Result<(), DataError>;
}

/// Select and decode rows into `T`.
pub async fn select_as<T: DeserializeOwned>(
    service: &dyn DataService,
    table: &str,
    query: &Query,
) -> Result<Vec<T>, DataError> {
    service
        .select(table, query)
        .await?
        .into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| DataError::decode(format!("Unexpected {} row: {}", table, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder_and_embeds() {
        let q = Query::columns("*, departments(name)")
            .order("created_at", false)
            .filter(Filter::id("7"));
        assert!(q.embeds("departments"));
        assert!(!q.embeds("equipments"));
        assert_eq!(q.order.as_ref().unwrap().column, "created_at");
        assert_eq!(q.filter.unwrap().value, "7");
        assert!(!Query::all().embeds("departments"));
    }
}
