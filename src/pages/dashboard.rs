//! Equipment inventory dashboard

use crate::data::{
    select_as, Condition, DataService, Department, Equipment, EquipmentInput, Filter, Query,
    DEPARTMENTS, EQUIPMENTS,
};
use crate::export::{dated_filename, export_to_csv};
use crate::format::{format_currency, format_date};
use crate::pages::navbar::render_navbar;
use crate::pages::{or_dash, parse_fields, render_table, Page, PageContext};
use crate::router::HOME_PATH;
use async_trait::async_trait;
use serde_json::json;
use tracing::error;

const TABLE_HEADERS: [&str; 10] = [
    "ID",
    "Order No",
    "Equipment Name",
    "Purchase Date",
    "Supplier",
    "Amount",
    "Condition",
    "Department",
    "Room",
    "Quantity",
];

const EXPORT_HEADERS: [&str; 9] = [
    "Order No",
    "Equipment Name",
    "Purchase Date",
    "Supplier",
    "Amount",
    "Condition",
    "Department",
    "Room",
    "Quantity",
];

/// Totals over the rows currently shown
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryStats {
    pub total_equipment: usize,
    pub total_value: f64,
    pub departments: usize,
    pub total_quantity: i64,
}

pub struct DashboardPage {
    ctx: PageContext,
    departments: Vec<Department>,
    equipments: Vec<Equipment>,
    search: String,
    department_filter: Option<String>,
    condition_filter: Option<Condition>,
    loaded: bool,
}

impl DashboardPage {
    pub fn new(ctx: PageContext) -> Self {
        Self {
            ctx,
            departments: Vec::new(),
            equipments: Vec::new(),
            search: String::new(),
            department_filter: None,
            condition_filter: None,
            loaded: false,
        }
    }

    fn data(&self) -> &dyn DataService {
        self.ctx.data.as_ref()
    }

    async fn load_departments(&mut self) {
        let query = Query::all().order("name", true);
        match select_as::<Department>(self.data(), DEPARTMENTS, &query).await {
            Ok(rows) => self.departments = rows,
            Err(e) => error!("Error loading departments: {}", e),
        }
    }

    async fn load_equipments(&mut self) {
        let query = Query::columns("*, departments(name)").order("created_at", false);
        match select_as::<Equipment>(self.data(), EQUIPMENTS, &query).await {
            Ok(rows) => {
                self.equipments = rows;
                self.loaded = true;
            }
            Err(e) => self
                .ctx
                .toaster
                .danger(format!("Error loading equipment: {}", e.message)),
        }
    }

    /// Rows matching the search box and both filters
    pub fn filtered(&self) -> Vec<&Equipment> {
        let term = self.search.to_lowercase();
        self.equipments
            .iter()
            .filter(|eq| {
                term.is_empty()
                    || eq.order_no.to_lowercase().contains(&term)
                    || eq.name.to_lowercase().contains(&term)
                    || eq
                        .supplier
                        .as_deref()
                        .map(|s| s.to_lowercase().contains(&term))
                        .unwrap_or(false)
            })
            .filter(|eq| match &self.department_filter {
                Some(dept) => eq.department_id.as_deref() == Some(dept.as_str()),
                None => true,
            })
            .filter(|eq| match self.condition_filter {
                Some(cond) => eq.condition == cond,
                None => true,
            })
            .collect()
    }

    pub fn stats(&self) -> InventoryStats {
        let rows = self.filtered();
        InventoryStats {
            total_equipment: rows.len(),
            total_value: rows.iter().map(|eq| eq.amount.unwrap_or(0.0)).sum(),
            departments: self.departments.len(),
            total_quantity: rows.iter().map(|eq| eq.quantity).sum(),
        }
    }

    async fn save(&mut self, id: Option<&str>, args: &[String]) {
        let base = match id {
            Some(id) => match self.equipments.iter().find(|eq| eq.id == id) {
                Some(eq) => Some(eq.clone()),
                None => {
                    self.ctx.toaster.warning(format!("No equipment with id {}", id));
                    return;
                }
            },
            None => None,
        };

        let input = match parse_fields(args)
            .and_then(|fields| EquipmentInput::from_fields(&fields, base.as_ref()))
        {
            Ok(input) => input,
            Err(msg) => {
                self.ctx.toaster.danger(msg);
                return;
            }
        };

        let record = json!(input);
        let result = match id {
            Some(id) => self.data().update(EQUIPMENTS, record, &Filter::id(id)).await,
            None => self.data().insert(EQUIPMENTS, vec![record]).await,
        };
        if let Err(e) = result {
            self.ctx
                .toaster
                .danger(format!("Error saving equipment: {}", e.message));
            return;
        }

        let verb = if id.is_some() { "updated" } else { "added" };
        self.ctx
            .toaster
            .success(format!("Equipment {} successfully", verb));
        self.load_equipments().await;
    }

    async fn delete(&mut self, id: &str) {
        if let Err(e) = self.data().delete(EQUIPMENTS, &Filter::id(id)).await {
            self.ctx
                .toaster
                .danger(format!("Error deleting equipment: {}", e.message));
            return;
        }
        self.ctx.toaster.success("Equipment deleted successfully");
        self.load_equipments().await;
    }

    fn set_filter(&mut self, args: &[String]) {
        let (kind, value) = match args {
            [kind, rest @ ..] if !rest.is_empty() => (kind.as_str(), rest.join(" ")),
            _ => {
                self.ctx
                    .toaster
                    .warning("Usage: filter department|condition <value|all>");
                return;
            }
        };
        let clear = value.eq_ignore_ascii_case("all");
        match kind {
            "department" | "dept" => {
                self.department_filter = if clear {
                    None
                } else {
                    // Accept an id or a department name
                    self.departments
                        .iter()
                        .find(|d| d.id == value || d.name.eq_ignore_ascii_case(&value))
                        .map(|d| d.id.clone())
                        .or(Some(value))
                };
            }
            "condition" => {
                if clear {
                    self.condition_filter = None;
                } else {
                    match Condition::from_label(&value) {
                        Some(c) => self.condition_filter = Some(c),
                        None => self
                            .ctx
                            .toaster
                            .warning(format!("Unknown condition: {}", value)),
                    }
                }
            }
            other => self
                .ctx
                .toaster
                .warning(format!("Unknown filter: {}", other)),
        }
    }

    async fn export(&self) {
        let rows: Vec<Vec<String>> = self
            .filtered()
            .into_iter()
            .map(export_row)
            .collect();

        let filename = dated_filename("equipment-inventory");
        if let Err(e) = export_to_csv(
            &self.ctx.toaster,
            &self.ctx.export_dir,
            &filename,
            &EXPORT_HEADERS,
            &rows,
        )
        .await
        {
            self.ctx.toaster.danger(format!("{:#}", e));
        }
    }
}

#[async_trait]
impl Page for DashboardPage {
    fn title(&self) -> &str {
        "Equipment Inventory"
    }

    async fn load(&mut self) {
        self.load_departments().await;
        self.load_equipments().await;
    }

    fn render(&self) -> String {
        let user = self.ctx.gateway.session().get_user();
        let mut out = vec![render_navbar(user.as_ref(), HOME_PATH), String::new()];
        out.push("Equipment Inventory".to_string());

        let department = self
            .department_filter
            .as_ref()
            .map(|id| {
                self.departments
                    .iter()
                    .find(|d| &d.id == id)
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| id.clone())
            })
            .unwrap_or_else(|| "All Departments".to_string());
        let condition = self
            .condition_filter
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|| "All Conditions".to_string());
        out.push(format!(
            "Search: {:?}  Department: {}  Condition: {}",
            self.search, department, condition
        ));

        let stats = self.stats();
        out.push(format!(
            "Total Equipment: {}  Total Value: {}  Departments: {}  Total Quantity: {}",
            stats.total_equipment,
            format_currency(Some(stats.total_value)),
            stats.departments,
            stats.total_quantity
        ));
        out.push(String::new());

        if !self.loaded {
            out.push("Loading equipment...".to_string());
            return out.join("\n");
        }

        let rows: Vec<Vec<String>> = self
            .filtered()
            .into_iter()
            .map(|eq| {
                vec![
                    eq.id.clone(),
                    eq.order_no.clone(),
                    eq.name.clone(),
                    format_date(eq.purchase_date),
                    or_dash(eq.supplier.as_deref()),
                    format_currency(eq.amount),
                    eq.condition.as_str().to_string(),
                    or_dash(eq.department_name()),
                    or_dash(eq.room_name.as_deref()),
                    eq.quantity.to_string(),
                ]
            })
            .collect();

        if rows.is_empty() {
            out.push("No equipment found".to_string());
        } else {
            out.push(render_table(&TABLE_HEADERS, &rows));
        }
        out.join("\n")
    }

    async fn handle(&mut self, command: &str, args: &[String]) -> bool {
        match command {
            "search" => self.search = args.join(" "),
            "filter" => self.set_filter(args),
            "add" => self.save(None, args).await,
            "edit" => match args.split_first() {
                Some((id, fields)) => {
                    let id = id.clone();
                    self.save(Some(id.as_str()), fields).await
                }
                None => self
                    .ctx
                    .toaster
                    .warning("Usage: edit <id> key=value ..."),
            },
            "delete" => match args.first() {
                Some(id) => {
                    let id = id.clone();
                    self.delete(&id).await
                }
                None => self.ctx.toaster.warning("Usage: delete <id>"),
            },
            "export" => self.export().await,
            "refresh" => self.load().await,
            _ => return false,
        }
        true
    }

    fn commands(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("search <text>", "Filter by order number, name or supplier"),
            ("filter department <id|name|all>", "Filter by department"),
            ("filter condition <value|all>", "Serviceable, Under Repair, Damaged"),
            (
                "add order_no=.. name=.. [purchase_date=YYYY-MM-DD supplier=.. amount=.. condition=.. department=<id> room=.. quantity=..]",
                "Add equipment",
            ),
            ("edit <id> key=value ...", "Update equipment"),
            ("delete <id>", "Delete equipment"),
            ("export", "Export the shown rows to CSV"),
            ("refresh", "Reload from the store"),
        ]
    }
}

/// One CSV row; missing values become empty cells.
fn export_row(eq: &Equipment) -> Vec<String> {
    vec![
        eq.order_no.clone(),
        eq.name.clone(),
        format_date(eq.purchase_date),
        eq.supplier.clone().unwrap_or_default(),
        eq.amount.map(|a| a.to_string()).unwrap_or_default(),
        eq.condition.as_str().to_string(),
        eq.department_name().unwrap_or_default().to_string(),
        eq.room_name.clone().unwrap_or_default(),
        eq.quantity.to_string(),
    ]
}
