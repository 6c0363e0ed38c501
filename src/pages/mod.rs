//! Pages
//! Mission: Self-contained views built fresh by the router on every navigation
//!
//! A page loads its own data, renders to text and reacts to the commands the
//! shell forwards to it. Results are reported through the shared toaster.

pub mod audit;
pub mod dashboard;
pub mod departments;
pub mod login;
pub mod navbar;

pub use audit::AuditPage;
pub use dashboard::DashboardPage;
pub use departments::DepartmentsPage;
pub use login::LoginPage;

use crate::auth::AuthGateway;
use crate::data::DataService;
use crate::toast::Toaster;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

#[async_trait]
pub trait Page: Send {
    fn title(&self) -> &str;

    /// Fetch whatever the page shows. Failures surface as toasts.
    async fn load(&mut self);

    fn render(&self) -> String;

    /// Returns false when the command means nothing to this page.
    async fn handle(&mut self, command: &str, args: &[String]) -> bool;

    /// `(usage, description)` pairs for the shell's help output
    fn commands(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }
}

type BuildFn = dyn Fn() -> Box<dyn Page> + Send + Sync;

/// Named constructor for a page. Clones share the same constructor.
#[derive(Clone)]
pub struct PageFactory {
    name: Arc<str>,
    build: Arc<BuildFn>,
}

impl PageFactory {
    pub fn new<F>(name: &str, build: F) -> Self
    where
        F: Fn() -> Box<dyn Page> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            build: Arc::new(build),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self) -> Box<dyn Page> {
        (self.build)()
    }

    /// Whether both handles come from the same registration
    pub fn same_as(&self, other: &PageFactory) -> bool {
        Arc::ptr_eq(&self.build, &other.build)
    }
}

impl std::fmt::Debug for PageFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFactory").field("name", &self.name).finish()
    }
}

/// Collaborators every page may use
#[derive(Clone)]
pub struct PageContext {
    pub data: Arc<dyn DataService>,
    pub gateway: AuthGateway,
    pub toaster: Arc<Toaster>,
    pub export_dir: PathBuf,
}

/// Shown when no route matches and no `/404` route is registered
pub struct NotFoundPage;

#[async_trait]
impl Page for NotFoundPage {
    fn title(&self) -> &str {
        "Not Found"
    }

    async fn load(&mut self) {}

    fn render(&self) -> String {
        "404 - Not Found".to_string()
    }

    async fn handle(&mut self, _command: &str, _args: &[String]) -> bool {
        false
    }
}

/// Split `key=value` arguments. Bare words are rejected.
pub fn parse_fields(args: &[String]) -> Result<Vec<(String, String)>, String> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(k, v)| (k.trim().to_lowercase(), v.to_string()))
                .ok_or_else(|| format!("Expected key=value, got '{}'", arg))
        })
        .collect()
}

/// Left-aligned text table sized to its widest cells
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(headers.to_vec()));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

/// `-` for missing optional text, as the tables show it
pub(crate) fn or_dash(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or("-")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        let args = vec!["name=Signal Generator".to_string(), "QTY=3".to_string()];
        let fields = parse_fields(&args).unwrap();
        assert_eq!(fields[0], ("name".to_string(), "Signal Generator".to_string()));
        assert_eq!(fields[1], ("qty".to_string(), "3".to_string()));
        assert!(parse_fields(&["oops".to_string()]).is_err());
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(
            &["ID", "Name"],
            &[vec!["1".to_string(), "Civil".to_string()]],
        );
        assert_eq!(table, "ID | Name\n---+------\n1  | Civil");
    }

    #[test]
    fn test_factory_identity() {
        let a = PageFactory::new("nf", || Box::new(NotFoundPage));
        let b = a.clone();
        let c = PageFactory::new("nf", || Box::new(NotFoundPage));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert_eq!(a.build().render(), "404 - Not Found");
    }
}
