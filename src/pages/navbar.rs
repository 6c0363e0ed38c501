//! Navbar shown above every protected page

use crate::auth::User;
use crate::router::{AUDIT_PATH, DEPARTMENTS_PATH, HOME_PATH};

pub const BRAND: &str = "GECR Store";

const LINKS: [(&str, &str); 3] = [
    ("Dashboard", HOME_PATH),
    ("Departments", DEPARTMENTS_PATH),
    ("Audit Logs", AUDIT_PATH),
];

/// Brand line, plus links and the signed-in user's name when there is one.
pub fn render_navbar(user: Option<&User>, active_path: &str) -> String {
    let Some(user) = user else {
        return format!("== {} ==", BRAND);
    };

    let links: Vec<String> = LINKS
        .iter()
        .map(|(label, path)| {
            if *path == active_path {
                format!("[{}]", label)
            } else {
                format!("{} ({})", label, path)
            }
        })
        .collect();

    format!(
        "== {} ==  {}  | {} [logout]",
        BRAND,
        links.join("  "),
        user.display_name()
    )
}
