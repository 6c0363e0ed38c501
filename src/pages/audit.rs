//! Audit log viewer
//!
//! Read-only. Rows are written by the store whenever equipment changes.

use crate::data::{select_as, AuditAction, AuditLog, Query, AUDIT_LOGS};
use crate::export::{dated_filename, export_to_csv};
use crate::format::{format_timestamp_date, format_timestamp_time};
use crate::pages::navbar::render_navbar;
use crate::pages::{render_table, Page, PageContext};
use crate::router::AUDIT_PATH;
use async_trait::async_trait;
use serde_json::Value;

const EXPORT_HEADERS: [&str; 5] = ["Date", "Time", "Order No", "Action", "Performed By"];

pub struct AuditPage {
    ctx: PageContext,
    logs: Vec<AuditLog>,
    action_filter: Option<AuditAction>,
    selected: Option<String>,
    loaded: bool,
}

impl AuditPage {
    pub fn new(ctx: PageContext) -> Self {
        Self {
            ctx,
            logs: Vec::new(),
            action_filter: None,
            selected: None,
            loaded: false,
        }
    }

    pub fn filtered(&self) -> Vec<&AuditLog> {
        self.logs
            .iter()
            .filter(|log| self.action_filter.map(|a| log.action == a).unwrap_or(true))
            .collect()
    }

    fn performed_by(log: &AuditLog) -> &str {
        log.performed_by.as_deref().unwrap_or("System")
    }

    fn order_no(log: &AuditLog) -> &str {
        log.order_no.as_deref().unwrap_or("N/A")
    }

    /// Detail view for one entry
    pub fn render_detail(log: &AuditLog) -> String {
        let mut out = vec![
            format!("Audit Log Details ({})", log.id),
            format!(
                "When: {} {}",
                format_timestamp_date(&log.performed_at),
                format_timestamp_time(&log.performed_at)
            ),
            format!("Order No: {}", Self::order_no(log)),
            format!("Action: {}", log.action.as_str()),
            format!("Performed By: {}", Self::performed_by(log)),
            String::new(),
        ];

        match log.action {
            AuditAction::Update => {
                let changes = log.changes();
                if changes.is_empty() {
                    out.push("No changes detected".to_string());
                } else {
                    out.push("Changes:".to_string());
                    for change in changes {
                        out.push(format!(
                            "  {}: {} -> {}",
                            change.field,
                            display_value(&change.old),
                            display_value(&change.new)
                        ));
                    }
                }
            }
            AuditAction::Insert => {
                out.push("New Record:".to_string());
                out.push(pretty(log.new_data.as_ref()));
            }
            AuditAction::Delete => {
                out.push("Deleted Record:".to_string());
                out.push(pretty(log.old_data.as_ref()));
            }
        }
        out.join("\n")
    }

    fn set_filter(&mut self, args: &[String]) {
        match args.first().map(String::as_str) {
            None | Some("all") | Some("ALL") => self.action_filter = None,
            Some(action) => match AuditAction::from_label(action) {
                Some(a) => self.action_filter = Some(a),
                None => self
                    .ctx
                    .toaster
                    .warning(format!("Unknown action: {}", action)),
            },
        }
    }

    fn show(&mut self, args: &[String]) {
        let Some(id) = args.first() else {
            self.ctx.toaster.warning("Usage: show <id>");
            return;
        };
        if self.logs.iter().any(|l| &l.id == id) {
            self.selected = Some(id.clone());
        } else {
            self.ctx
                .toaster
                .warning(format!("No audit log with id {}", id));
        }
    }

    async fn export(&self) {
        let rows: Vec<Vec<String>> = self
            .filtered()
            .into_iter()
            .map(|log| {
                vec![
                    format_timestamp_date(&log.performed_at),
                    format_timestamp_time(&log.performed_at),
                    Self::order_no(log).to_string(),
                    log.action.as_str().to_string(),
                    Self::performed_by(log).to_string(),
                ]
            })
            .collect();

        let filename = dated_filename("audit-logs");
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

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "(empty)".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pretty(value: Option<&Value>) -> String {
    value
        .and_then(|v| serde_json::to_string_pretty(v).ok())
        .unwrap_or_else(|| "null".to_string())
}

#[async_trait]
impl Page for AuditPage {
    fn title(&self) -> &str {
        "Audit Logs"
    }

    async fn load(&mut self) {
        let query = Query::all().order("performed_at", false);
        match select_as::<AuditLog>(self.ctx.data.as_ref(), AUDIT_LOGS, &query).await {
            Ok(rows) => {
                self.logs = rows;
                self.loaded = true;
            }
            Err(e) => self
                .ctx
                .toaster
                .danger(format!("Error loading audit logs: {}", e.message)),
        }
    }

    fn render(&self) -> String {
        let user = self.ctx.gateway.session().get_user();
        let mut out = vec![
            render_navbar(user.as_ref(), AUDIT_PATH),
            String::new(),
            "Audit Logs".to_string(),
        ];
        out.push(format!(
            "Action: {}",
            self.action_filter
                .map(|a| a.as_str().to_string())
                .unwrap_or_else(|| "All Actions".to_string())
        ));
        out.push(String::new());

        if let Some(log) = self
            .selected
            .as_ref()
            .and_then(|id| self.logs.iter().find(|l| &l.id == id))
        {
            out.push(Self::render_detail(log));
            return out.join("\n");
        }

        if !self.loaded {
            out.push("Loading audit logs...".to_string());
            return out.join("\n");
        }

        let rows: Vec<Vec<String>> = self
            .filtered()
            .into_iter()
            .map(|log| {
                vec![
                    log.id.clone(),
                    format!(
                        "{} {}",
                        format_timestamp_date(&log.performed_at),
                        format_timestamp_time(&log.performed_at)
                    ),
                    Self::order_no(log).to_string(),
                    log.action.as_str().to_string(),
                    Self::performed_by(log).to_string(),
                ]
            })
            .collect();

        if rows.is_empty() {
            out.push("No audit logs found".to_string());
        } else {
            out.push(render_table(
                &["ID", "Date & Time", "Order No", "Action", "Performed By"],
                &rows,
            ));
        }
        out.join("\n")
    }

    async fn handle(&mut self, command: &str, args: &[String]) -> bool {
        match command {
            "filter" => self.set_filter(args),
            "show" => self.show(args),
            "close" => self.selected = None,
            "export" => self.export().await,
            "refresh" => self.load().await,
            _ => return false,
        }
        true
    }

    fn commands(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("filter <insert|update|delete|all>", "Filter by action"),
            ("show <id>", "Show one entry with its changes"),
            ("close", "Back to the list"),
            ("export", "Export the shown rows to CSV"),
            ("refresh", "Reload from the store"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthGateway, DemoIdentity, SessionStore};
    use crate::data::{DataService, DemoDataService, Filter, EQUIPMENTS};
    use crate::toast::Toaster;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    fn page(data: Arc<DemoDataService>, export_dir: &Path) -> AuditPage {
        let identity = Arc::new(DemoIdentity::new());
        let store = SessionStore::new(identity.clone());
        AuditPage::new(PageContext {
            data,
            gateway: AuthGateway::new(identity, store),
            toaster: Arc::new(Toaster::new()),
            export_dir: export_dir.to_path_buf(),
        })
    }

    fn log(value: Value) -> AuditLog {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_detail_for_update_without_changes() {
        let entry = log(json!({
            "id": "9",
            "action": "UPDATE",
            "performed_at": "2024-05-01T10:15:00Z",
            "old_data": {"id": "1", "name": "Scope"},
            "new_data": {"id": "1", "name": "Scope"}
        }));
        let detail = AuditPage::render_detail(&entry);
        assert!(detail.contains("No changes detected"));
        assert!(detail.contains("Order No: N/A"));
        assert!(detail.contains("Performed By: System"));
    }

    #[test]
    fn test_detail_for_delete_shows_old_record() {
        let entry = log(json!({
            "id": "9",
            "order_no": "10",
            "action": "DELETE",
            "performed_at": "2024-05-01T10:15:00Z",
            "old_data": {"name": "Signal Generator"}
        }));
        let detail = AuditPage::render_detail(&entry);
        assert!(detail.contains("Deleted Record:"));
        assert!(detail.contains("Signal Generator"));
    }

    #[tokio::test]
    async fn test_filter_show_and_export() {
        let data = Arc::new(DemoDataService::seeded());
        data.update(EQUIPMENTS, json!({ "quantity": 9 }), &Filter::id("1"))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut page = page(data, dir.path());
        page.load().await;
        assert_eq!(page.filtered().len(), 2);

        page.handle("filter", &["update".to_string()]).await;
        assert_eq!(page.filtered().len(), 1);
        let id = page.filtered()[0].id.clone();

        page.handle("show", &[id]).await;
        let view = page.render();
        assert!(view.contains("quantity: 7 -> 9"));

        page.handle("close", &[]).await;
        page.handle("export", &[]).await;
        assert_eq!(
            page.ctx.toaster.take().unwrap().message,
            "Data exported successfully"
        );
        let written =
            std::fs::read_to_string(dir.path().join(dated_filename("audit-logs"))).unwrap();
        assert!(written.starts_with("Date,Time,Order No,Action,Performed By\n"));
        assert!(written.contains("\"UPDATE\",\"System\""));
    }
}
