//! Demo Data Service
//! Mission: In-memory tables seeded with sample inventory, for running without a backend
//!
//! Mirrors the hosted store's behavior where the dashboard depends on it:
//! unique department names, `ON DELETE SET NULL` from equipment to
//! department, relation embedding and an audit row for every equipment change.

use crate::data::{DataService, Filter, Query, AUDIT_LOGS, DEPARTMENTS, EQUIPMENTS};
use crate::error::{DataError, UNIQUE_VIOLATION};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

const NOT_NULL_VIOLATION: &str = "23502";
const UNDEFINED_TABLE: &str = "42P01";

pub struct DemoDataService {
    tables: Mutex<HashMap<String, Vec<Value>>>,
}

impl DemoDataService {
    /// Empty tables
    pub fn empty() -> Self {
        let mut tables = HashMap::new();
        for t in [DEPARTMENTS, EQUIPMENTS, AUDIT_LOGS] {
            tables.insert(t.to_string(), Vec::new());
        }
        Self {
            tables: Mutex::new(tables),
        }
    }

    /// Tables seeded with the sample inventory
    pub fn seeded() -> Self {
        let service = Self::empty();
        let now = Utc::now();
        {
            let mut tables = service.tables.lock();
            let departments = tables.entry(DEPARTMENTS.to_string()).or_default();
            for (id, name) in [
                ("1", "Electronic and Communication"),
                ("2", "Civil"),
                ("3", "Computer Science"),
                ("4", "Mechanical"),
            ] {
                departments.push(json!({ "id": id, "name": name, "created_at": now.to_rfc3339() }));
            }

            let equipments = tables.entry(EQUIPMENTS.to_string()).or_default();
            equipments.push(json!({
                "id": "1",
                "order_no": "10",
                "name": "Signal Generator",
                "purchase_date": "2016-12-03",
                "supplier": "UNION INSTRUMENTS, BANGALORE",
                "amount": 87343,
                "condition": "Serviceable",
                "department_id": "1",
                "room_name": "Microprocessor Lab",
                "quantity": 7,
                "created_at": (now - Duration::minutes(2)).to_rfc3339()
            }));
            equipments.push(json!({
                "id": "2",
                "order_no": "VT/121",
                "name": "EXIDE 100AH Battery (Tubular Type) 12V",
                "purchase_date": "2018-03-17",
                "supplier": "Vasundhara Technologies, Bangalore",
                "amount": 89920,
                "condition": "Serviceable",
                "department_id": "1",
                "room_name": "Power Electronics Lab",
                "quantity": 5,
                "created_at": (now - Duration::minutes(1)).to_rfc3339()
            }));

            let audit = tables.entry(AUDIT_LOGS.to_string()).or_default();
            audit.push(json!({
                "id": "1",
                "equipment_id": "1",
                "order_no": "10",
                "action": "INSERT",
                "performed_at": now.to_rfc3339(),
                "performed_by": null,
                "old_data": null,
                "new_data": { "name": "Signal Generator" }
            }));
        }
        service
    }

    fn table_mut<'a>(
        tables: &'a mut HashMap<String, Vec<Value>>,
        table: &str,
    ) -> Result<&'a mut Vec<Value>, DataError> {
        tables.get_mut(table).ok_or_else(|| {
            DataError::new(
                UNDEFINED_TABLE,
                format!("relation \"public.{}\" does not exist", table),
            )
        })
    }

    fn check_constraints(
        tables: &HashMap<String, Vec<Value>>,
        table: &str,
        row: &Value,
    ) -> Result<(), DataError> {
        if table == DEPARTMENTS {
            let name = row.get("name").and_then(Value::as_str).unwrap_or_default();
            if name.trim().is_empty() {
                return Err(not_null(table, "name"));
            }
            let id = row.get("id");
            let clash = tables.get(DEPARTMENTS).into_iter().flatten().any(|other| {
                other.get("id") != id && other.get("name").and_then(Value::as_str) == Some(name)
            });
            if clash {
                return Err(DataError::new(
                    UNIQUE_VIOLATION,
                    "duplicate key value violates unique constraint \"departments_name_key\"",
                ));
            }
        }
        if table == EQUIPMENTS {
            for column in ["order_no", "name", "condition"] {
                if row.get(column).map(Value::is_null).unwrap_or(true) {
                    return Err(not_null(table, column));
                }
            }
        }
        Ok(())
    }

    fn record_audit(
        tables: &mut HashMap<String, Vec<Value>>,
        action: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) {
        let source = new.or(old);
        let entry = json!({
            "id": Uuid::new_v4().to_string(),
            "equipment_id": source.and_then(|r| r.get("id")).cloned(),
            "order_no": source.and_then(|r| r.get("order_no")).cloned(),
            "action": action,
            "performed_at": Utc::now().to_rfc3339(),
            "performed_by": null,
            "old_data": old.cloned(),
            "new_data": new.cloned(),
        });
        tables.entry(AUDIT_LOGS.to_string()).or_default().push(entry);
    }

    /// Attach `departments(name)` / `equipments(count)` the way the hosted store embeds them.
    fn embed(tables: &HashMap<String, Vec<Value>>, table: &str, query: &Query, row: &mut Value) {
        let Some(obj) = row.as_object_mut() else {
            return;
        };
        if table == EQUIPMENTS && query.embeds(DEPARTMENTS) {
            let department = obj
                .get("department_id")
                .and_then(|id| find_by_id(tables.get(DEPARTMENTS)?, id))
                .and_then(|d| d.get("name").cloned())
                .map(|name| json!({ "name": name }))
                .unwrap_or(Value::Null);
            obj.insert(DEPARTMENTS.to_string(), department);
        }
        if table == DEPARTMENTS && query.embeds(EQUIPMENTS) {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            let count = tables
                .get(EQUIPMENTS)
                .map(|rows| rows.iter().filter(|e| e.get("department_id") == Some(&id)).count())
                .unwrap_or(0);
            obj.insert(EQUIPMENTS.to_string(), json!([{ "count": count }]));
        }
    }
}

impl Default for DemoDataService {
    fn default() -> Self {
        Self::seeded()
    }
}

fn not_null(table: &str, column: &str) -> DataError {
    DataError::new(
        NOT_NULL_VIOLATION,
        format!(
            "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
            column, table
        ),
    )
}

fn find_by_id<'a>(rows: &'a [Value], id: &Value) -> Option<&'a Value> {
    rows.iter().find(|r| r.get("id") == Some(id))
}

/// Equality as the REST filter sees it: everything compared in text form.
fn matches(row: &Value, filter: &Filter) -> bool {
    match row.get(&filter.column) {
        Some(Value::String(s)) => *s == filter.value,
        Some(Value::Null) | None => filter.value == "null",
        Some(other) => other.to_string() == filter.value,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        // nulls last
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl DataService for DemoDataService {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, DataError> {
        let mut tables = self.tables.lock();
        let mut rows: Vec<Value> = Self::table_mut(&mut tables, table)?
            .iter()
            .filter(|r| query.filter.as_ref().map(|f| matches(r, f)).unwrap_or(true))
            .cloned()
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        for row in rows.iter_mut() {
            Self::embed(&tables, table, query, row);
        }
        debug!(table, rows = rows.len(), "Demo select");
        Ok(rows)
    }

    async fn insert(&self, table: &str, records: Vec<Value>) -> Result<(), DataError> {
        let mut tables = self.tables.lock();
        Self::table_mut(&mut tables, table)?;

        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            let mut row = match record {
                Value::Object(map) => Value::Object(map),
                _ => return Err(DataError::new("PGRST102", "Expected a JSON object")),
            };
            if let Some(obj) = row.as_object_mut() {
                obj.entry("id")
                    .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
                obj.entry("created_at")
                    .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            }
            Self::check_constraints(&tables, table, &row)?;
            prepared.push(row);
        }

        for row in prepared {
            if table == EQUIPMENTS {
                Self::record_audit(&mut tables, "INSERT", None, Some(&row));
            }
            Self::table_mut(&mut tables, table)?.push(row);
        }
        Ok(())
    }

    async fn update(&self, table: &str, patch: Value, filter: &Filter) -> Result<(), DataError> {
        let mut tables = self.tables.lock();
        let targets: Vec<usize> = Self::table_mut(&mut tables, table)?
            .iter()
            .enumerate()
            .filter(|(_, r)| matches(r, filter))
            .map(|(i, _)| i)
            .collect();

        let mut changes = Vec::with_capacity(targets.len());
        for &i in &targets {
            let old = tables[table][i].clone();
            let mut new = old.clone();
            merge(&mut new, &patch);
            Self::check_constraints(&tables, table, &new)?;
            changes.push((i, old, new));
        }

        for (i, old, new) in changes {
            if table == EQUIPMENTS {
                Self::record_audit(&mut tables, "UPDATE", Some(&old), Some(&new));
            }
            Self::table_mut(&mut tables, table)?[i] = new;
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<(), DataError> {
        let mut tables = self.tables.lock();
        let rows = Self::table_mut(&mut tables, table)?;
        let (removed, kept): (Vec<Value>, Vec<Value>) =
            rows.drain(..).partition(|r| matches(r, filter));
        *rows = kept;

        if table == DEPARTMENTS {
            let ids: Vec<&Value> = removed.iter().filter_map(|r| r.get("id")).collect();
            if let Some(equipments) = tables.get_mut(EQUIPMENTS) {
                for eq in equipments.iter_mut() {
                    if eq.get("department_id").map(|d| ids.contains(&d)).unwrap_or(false) {
                        let mut patch = Map::new();
                        patch.insert("department_id".to_string(), Value::Null);
                        merge(eq, &Value::Object(patch));
                    }
                }
            }
        }
        if table == EQUIPMENTS {
            for old in &removed {
                Self::record_audit(&mut tables, "DELETE", Some(old), None);
            }
        }
        Ok(())
    }
}
