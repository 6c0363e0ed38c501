//! Department management

use crate::data::{select_as, Department, Filter, Query, DEPARTMENTS};
use crate::pages::navbar::render_navbar;
use crate::pages::{render_table, Page, PageContext};
use crate::router::DEPARTMENTS_PATH;
use async_trait::async_trait;
use serde_json::json;

pub struct DepartmentsPage {
    ctx: PageContext,
    departments: Vec<Department>,
    loaded: bool,
}

impl DepartmentsPage {
    pub fn new(ctx: PageContext) -> Self {
        Self {
            ctx,
            departments: Vec::new(),
            loaded: false,
        }
    }

    pub fn departments(&self) -> &[Department] {
        &self.departments
    }

    async fn save(&mut self, id: Option<&str>, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            self.ctx.toaster.warning("Department name is required");
            return;
        }

        let data = self.ctx.data.as_ref();
        let result = match id {
            Some(id) => {
                data.update(DEPARTMENTS, json!({ "name": name }), &Filter::id(id))
                    .await
            }
            None => data.insert(DEPARTMENTS, vec![json!({ "name": name })]).await,
        };

        match result {
            Ok(()) => {
                let verb = if id.is_some() { "updated" } else { "added" };
                self.ctx
                    .toaster
                    .success(format!("Department {} successfully", verb));
                self.load().await;
            }
            Err(e) if e.is_unique_violation() => {
                self.ctx.toaster.warning("Department already exists")
            }
            Err(e) => self
                .ctx
                .toaster
                .danger(format!("Error saving department: {}", e.message)),
        }
    }

    async fn delete(&mut self, id: &str) {
        match self.ctx.data.delete(DEPARTMENTS, &Filter::id(id)).await {
            Ok(()) => {
                self.ctx.toaster.success("Department deleted successfully");
                self.load().await;
            }
            Err(e) => self
                .ctx
                .toaster
                .danger(format!("Error deleting department: {}", e.message)),
        }
    }
}

#[async_trait]
impl Page for DepartmentsPage {
    fn title(&self) -> &str {
        "Departments"
    }

    async fn load(&mut self) {
        let query = Query::columns("*, equipments(count)").order("name", true);
        match select_as::<Department>(self.ctx.data.as_ref(), DEPARTMENTS, &query).await {
            Ok(rows) => {
                self.departments = rows;
                self.loaded = true;
            }
            Err(e) => self
                .ctx
                .toaster
                .danger(format!("Error loading departments: {}", e.message)),
        }
    }

    fn render(&self) -> String {
        let user = self.ctx.gateway.session().get_user();
        let mut out = vec![
            render_navbar(user.as_ref(), DEPARTMENTS_PATH),
            String::new(),
            "Departments".to_string(),
            String::new(),
        ];

        if !self.loaded {
            out.push("Loading departments...".to_string());
        } else if self.departments.is_empty() {
            out.push("No departments found. Add your first department!".to_string());
        } else {
            let rows: Vec<Vec<String>> = self
                .departments
                .iter()
                .map(|d| {
                    vec![
                        d.id.clone(),
                        d.name.clone(),
                        format!("{} items", d.equipment_count()),
                    ]
                })
                .collect();
            out.push(render_table(&["ID", "Department", "Equipment"], &rows));
        }
        out.join("\n")
    }

    async fn handle(&mut self, command: &str, args: &[String]) -> bool {
        match command {
            "add" => {
                let name = args.join(" ");
                self.save(None, &name).await
            }
            "rename" => match args.split_first() {
                Some((id, rest)) if !rest.is_empty() => {
                    let id = id.clone();
                    self.save(Some(id.as_str()), &rest.join(" ")).await
                }
                _ => self.ctx.toaster.warning("Usage: rename <id> <name>"),
            },
            "delete" => match args.first() {
                Some(id) => {
                    let id = id.clone();
                    self.delete(&id).await
                }
                None => self.ctx.toaster.warning("Usage: delete <id>"),
            },
            "refresh" => self.load().await,
            _ => return false,
        }
        true
    }

    fn commands(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("add <name>", "Add a department"),
            ("rename <id> <name>", "Rename a department"),
            ("delete <id>", "Delete a department; its equipment is kept unassigned"),
            ("refresh", "Reload from the store"),
        ]
    }
}
