//! Data REST Client
//! Mission: Table CRUD over the hosted store's REST endpoint (`/rest/v1`)

use crate::auth::SessionStore;
use crate::data::{DataService, Filter, Query};
use crate::error::DataError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct RestDataClient {
    client: Client,
    base_url: String,
    anon_key: String,
    session: Arc<SessionStore>,
}

impl RestDataClient {
    pub fn new(client: Client, project_url: &str, anon_key: &str, session: Arc<SessionStore>) -> Self {
        Self {
            client,
            base_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            session,
        }
    }

    #[inline]
    fn url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    /// Attach the project key and the signed-in user's token (anon key when signed out).
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        request.header("apikey", &self.anon_key).bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, DataError> {
        let resp = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| DataError::network(format!("{} failed: {}", what, e)))?;

        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        Err(parse_error(status.as_u16(), &text))
    }
}

/// Query-string pairs for a select
fn select_params(query: &Query) -> Vec<(String, String)> {
    let mut qp: Vec<(String, String)> = Vec::with_capacity(3);
    qp.push(("select".to_string(), compact_columns(&query.columns)));
    if let Some(order) = &query.order {
        let dir = if order.ascending { "asc" } else { "desc" };
        qp.push(("order".to_string(), format!("{}.{}", order.column, dir)));
    }
    if let Some(filter) = &query.filter {
        qp.push(filter_param(filter));
    }
    qp
}

fn filter_param(filter: &Filter) -> (String, String) {
    (filter.column.clone(), format!("eq.{}", filter.value))
}

/// Whitespace is not allowed inside the select expression.
fn compact_columns(columns: &str) -> String {
    columns.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_error(status: u16, body: &str) -> DataError {
    match serde_json::from_str::<RestErrorBody>(body) {
        Ok(RestErrorBody {
            code: Some(code),
            message,
        }) => DataError::new(code, message.unwrap_or_else(|| body.to_string())),
        Ok(RestErrorBody {
            code: None,
            message: Some(message),
        }) => DataError::new(status.to_string(), message),
        _ => DataError::new(status.to_string(), body.trim().to_string()),
    }
}

#[async_trait]
impl DataService for RestDataClient {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, DataError> {
        let params = select_params(query);
        debug!(table, ?params, "REST select");
        let resp = self
            .send(self.client.get(self.url(table)).query(&params), "select")
            .await?;
        resp.json::<Vec<Value>>()
            .await
            .map_err(|e| DataError::decode(format!("Failed to parse {} rows: {}", table, e)))
    }

    async fn insert(&self, table: &str, records: Vec<Value>) -> Result<(), DataError> {
        let request = self
            .client
            .post(self.url(table))
            .header("Prefer", "return=minimal")
            .json(&records);
        self.send(request, "insert").await?;
        Ok(())
    }

    async fn update(&self, table: &str, patch: Value, filter: &Filter) -> Result<(), DataError> {
        let request = self
            .client
            .patch(self.url(table))
            .query(&[filter_param(filter)])
            .header("Prefer", "return=minimal")
            .json(&patch);
        self.send(request, "update").await?;
        Ok(())
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<(), DataError> {
        let request = self
            .client
            .delete(self.url(table))
            .query(&[filter_param(filter)]);
        self.send(request, "delete").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_params() {
        let query = Query::columns("*,\n departments(name)")
            .order("created_at", false)
            .filter(Filter::id("42"));
        let params = select_params(&query);
        assert_eq!(
            params,
            vec![
                ("select".to_string(), "*,departments(name)".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("id".to_string(), "eq.42".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_error_keeps_code_and_message() {
        let body = r#"{"code":"23505","details":"Key (name)=(Civil) already exists.","hint":null,"message":"duplicate key value violates unique constraint \"departments_name_key\""}"#;
        let err = parse_error(409, body);
        assert!(err.is_unique_violation());
        assert!(err.message.starts_with("duplicate key value"));

        let err = parse_error(502, "Bad Gateway");
        assert_eq!(err.code, "502");
        assert_eq!(err.message, "Bad Gateway");
    }
}
