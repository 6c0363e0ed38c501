//! Inventory Models
//! Mission: Typed rows for departments, equipment and the audit trail

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Condition {
    #[serde(rename = "Serviceable")]
    Serviceable,
    #[serde(rename = "Under Repair")]
    UnderRepair,
    #[serde(rename = "Damaged")]
    Damaged,
}

impl Condition {
    pub fn as_str(&self) -> &str {
        match self {
            Condition::Serviceable => "Serviceable",
            Condition::UnderRepair => "Under Repair",
            Condition::Damaged => "Damaged",
        }
    }

    /// Accepts the display name or a compact form (`under-repair`, `underrepair`).
    pub fn from_label(s: &str) -> Option<Self> {
        let compact: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match compact.as_str() {
            "serviceable" => Some(Condition::Serviceable),
            "underrepair" => Some(Condition::UnderRepair),
            "damaged" => Some(Condition::Damaged),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CountRow {
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Department {
    pub id: String,
    pub name: String,
    /// Present when selected with `equipments(count)`
    #[serde(default)]
    pub equipments: Vec<CountRow>,
}

impl Department {
    pub fn equipment_count(&self) -> i64 {
        self.equipments.first().map(|c| c.count).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DepartmentRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Equipment {
    pub id: String,
    pub order_no: String,
    pub name: String,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    pub condition: Condition,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub quantity: i64,
    /// Present when selected with `departments(name)`
    #[serde(default)]
    pub departments: Option<DepartmentRef>,
}

/// The hosted store returns `null` for quantities that were never set
fn null_as_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}

impl Equipment {
    pub fn department_name(&self) -> Option<&str> {
        self.departments.as_ref().map(|d| d.name.as_str())
    }
}

/// Form payload for inserting or updating equipment
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EquipmentInput {
    pub order_no: String,
    pub name: String,
    pub purchase_date: Option<NaiveDate>,
    pub supplier: Option<String>,
    pub amount: f64,
    pub condition: Condition,
    pub department_id: Option<String>,
    pub room_name: Option<String>,
    pub quantity: i64,
}

impl EquipmentInput {
    fn blank() -> Self {
        Self {
            order_no: String::new(),
            name: String::new(),
            purchase_date: None,
            supplier: None,
            amount: 0.0,
            condition: Condition::Serviceable,
            department_id: None,
            room_name: None,
            quantity: 1,
        }
    }

    /// Pre-fill the form from an existing row (edit mode).
    pub fn from_equipment(eq: &Equipment) -> Self {
        Self {
            order_no: eq.order_no.clone(),
            name: eq.name.clone(),
            purchase_date: eq.purchase_date,
            supplier: eq.supplier.clone(),
            amount: eq.amount.unwrap_or(0.0),
            condition: eq.condition,
            department_id: eq.department_id.clone(),
            room_name: eq.room_name.clone(),
            quantity: eq.quantity,
        }
    }

    /// Apply `key=value` fields on top of `base` (or an empty form) and validate.
    pub fn from_fields(fields: &[(String, String)], base: Option<&Equipment>) -> Result<Self, String> {
        let mut input = base.map(Self::from_equipment).unwrap_or_else(Self::blank);

        for (key, value) in fields {
            let value = value.trim();
            let optional = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
            match key.as_str() {
                "order_no" | "order" => input.order_no = value.to_string(),
                "name" => input.name = value.to_string(),
                "purchase_date" | "date" => {
                    input.purchase_date = match optional {
                        None => None,
                        Some(v) => Some(
                            NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                                .map_err(|_| format!("Invalid purchase date: {}", v))?,
                        ),
                    }
                }
                "supplier" => input.supplier = optional,
                "amount" => input.amount = value.parse::<f64>().unwrap_or(0.0),
                "condition" => {
                    input.condition = Condition::from_label(value)
                        .ok_or_else(|| format!("Unknown condition: {}", value))?
                }
                "department" | "department_id" => input.department_id = optional,
                "room" | "room_name" => input.room_name = optional,
                "quantity" | "qty" => {
                    input.quantity = value
                        .parse::<i64>()
                        .map_err(|_| format!("Invalid quantity: {}", value))?
                }
                other => return Err(format!("Unknown field: {}", other)),
            }
        }

        if input.order_no.trim().is_empty() {
            return Err("Order Number is required".to_string());
        }
        if input.name.trim().is_empty() {
            return Err("Equipment Name is required".to_string());
        }
        if input.quantity < 1 {
            return Err("Quantity must be at least 1".to_string());
        }
        Ok(input)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::Insert => "INSERT",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "INSERT" => Some(AuditAction::Insert),
            "UPDATE" => Some(AuditAction::Update),
            "DELETE" => Some(AuditAction::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuditLog {
    pub id: String,
    #[serde(default)]
    pub order_no: Option<String>,
    pub action: AuditAction,
    pub performed_at: DateTime<Utc>,
    #[serde(default)]
    pub performed_by: Option<String>,
    #[serde(default)]
    pub old_data: Option<Value>,
    #[serde(default)]
    pub new_data: Option<Value>,
}

/// Fields that never count as a change in the audit comparison
const IGNORED_AUDIT_FIELDS: [&str; 3] = ["id", "created_at", "created_by"];

/// One field that differs between `old_data` and `new_data`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

impl AuditLog {
    /// Fields changed by an UPDATE, sorted by name.
    pub fn changes(&self) -> Vec<FieldChange> {
        let (Some(Value::Object(old)), Some(Value::Object(new))) = (&self.old_data, &self.new_data)
        else {
            return Vec::new();
        };

        let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .filter(|k| !IGNORED_AUDIT_FIELDS.contains(&k.as_str()))
            .filter_map(|k| {
                let before = old.get(k).cloned().unwrap_or(Value::Null);
                let after = new.get(k).cloned().unwrap_or(Value::Null);
                (before != after).then(|| FieldChange {
                    field: k.clone(),
                    old: before,
                    new: after,
                })
            })
            .collect()
    }
}
