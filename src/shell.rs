//! Terminal Shell
//! Mission: Drive the app from a line-oriented terminal in place of a browser tab
//!
//! The router only reports which page should be visible. The shell mounts it:
//! build a fresh page, load its data, render it. Navigation can start from a
//! command, from a session change or from a background token refresh, so
//! resolved pages arrive over a channel and the input loop selects on both.

use crate::app::App;
use crate::observer::Subscription;
use crate::pages::{Page, PageFactory};
use crate::router::HistoryAdapter;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

const GLOBAL_COMMANDS: [(&str, &str); 7] = [
    ("go <path>", "Navigate to /, /departments, /audit or /login"),
    ("back / forward", "Move through history"),
    ("logout", "Sign out"),
    ("whoami", "Show the signed-in user"),
    ("page", "Render the current page again"),
    ("help", "Show this help"),
    ("quit", "Exit"),
];

/// Split a command line on whitespace, keeping quoted runs together.
///
/// `add name="Signal Generator" qty=2` yields `add`, `name=Signal Generator`, `qty=2`.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

enum Input {
    Line(std::io::Result<Option<String>>),
    Route(Option<PageFactory>),
}

pub struct Shell {
    app: Arc<App>,
    routes: mpsc::UnboundedReceiver<PageFactory>,
    page: Option<Box<dyn Page>>,
    route_subscription: Subscription,
}

impl Shell {
    /// Attach to the app's router. Call before [`App::start`] so the first
    /// resolution is seen.
    pub fn new(app: Arc<App>) -> Self {
        let (tx, routes) = mpsc::unbounded_channel();
        let route_subscription = app.router.on_route(move |factory: &PageFactory| {
            // Receiver gone means the shell has exited
            let _ = tx.send(factory.clone());
        });

        Self {
            app,
            routes,
            page: None,
            route_subscription,
        }
    }

    /// Read commands until `quit` or end of input.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        loop {
            self.mount_pending(output).await?;
            self.flush_toast(output).await?;
            write_out(output, &format!("{}> ", self.app.address())).await?;

            let next = tokio::select! {
                line = lines.next_line() => Input::Line(line),
                factory = self.routes.recv() => Input::Route(factory),
            };

            match next {
                Input::Line(line) => {
                    let Some(line) = line.context("Failed to read command")? else {
                        break;
                    };
                    if !self.execute(&line, output).await? {
                        break;
                    }
                }
                Input::Route(Some(factory)) => {
                    write_out(output, "\n").await?;
                    self.mount(factory, output).await?;
                }
                Input::Route(None) => break,
            }
        }

        self.route_subscription.unsubscribe();
        Ok(())
    }

    /// Run one command line. Returns false when the user asked to quit.
    pub async fn execute<W>(&mut self, line: &str, output: &mut W) -> Result<bool>
    where
        W: AsyncWrite + Unpin,
    {
        let tokens = tokenize(line);
        let Some((command, args)) = tokens.split_first() else {
            return Ok(true);
        };
        debug!(command = %command, "Shell command");

        match command.as_str() {
            "quit" | "exit" => return Ok(false),
            "help" => {
                let help = self.help();
                write_out(output, &help).await?;
            }
            "go" => match args.first() {
                Some(path) => {
                    self.app.router.navigate(path);
                }
                None => self.app.toaster.warning("Usage: go <path>"),
            },
            "back" => {
                if !self.app.history.back() {
                    self.app.toaster.warning("Already at the oldest page");
                }
            }
            "forward" => {
                if !self.app.history.forward() {
                    self.app.toaster.warning("Already at the newest page");
                }
            }
            "logout" => self.app.logout().await,
            "whoami" => {
                let who = match self.app.store.get_user() {
                    Some(user) => format!(
                        "Signed in as {} ({})\n",
                        user.display_name(),
                        user.email.as_deref().unwrap_or("no email")
                    ),
                    None => "Not signed in\n".to_string(),
                };
                write_out(output, &who).await?;
            }
            "page" => self.render_current(output).await?,
            _ => {
                let handled = match self.page.as_mut() {
                    Some(page) => page.handle(command, args).await,
                    None => false,
                };
                if !handled {
                    self.app
                        .toaster
                        .warning(format!("Unknown command: {} (try 'help')", command));
                } else if !self.mount_pending(output).await? {
                    self.render_current(output).await?;
                }
            }
        }
        Ok(true)
    }

    /// Mount the page the router most recently resolved. Returns false when
    /// nothing new arrived.
    async fn mount_pending<W>(&mut self, output: &mut W) -> Result<bool>
    where
        W: AsyncWrite + Unpin,
    {
        let mut latest = None;
        while let Ok(factory) = self.routes.try_recv() {
            latest = Some(factory);
        }
        match latest {
            Some(factory) => self.mount(factory, output).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Build a fresh page, load it and show it.
    async fn mount<W>(&mut self, factory: PageFactory, output: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        debug!(page = factory.name(), "Mounting page");
        let mut page = factory.build();
        page.load().await;
        self.page = Some(page);
        self.render_current(output).await
    }

    async fn render_current<W>(&self, output: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if let Some(page) = &self.page {
            write_out(output, &format!("\n{}\n\n", page.render())).await?;
        }
        Ok(())
    }

    async fn flush_toast<W>(&self, output: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if let Some(toast) = self.app.toaster.take() {
            write_out(output, &format!("[{}] {}\n", toast.level, toast.message)).await?;
        }
        Ok(())
    }

    fn help(&self) -> String {
        let mut entries: Vec<(&str, &str)> = GLOBAL_COMMANDS.to_vec();
        if let Some(page) = &self.page {
            entries.extend(page.commands().iter().copied());
        }
        let width = entries.iter().map(|(u, _)| u.len()).max().unwrap_or(0);
        let mut out = String::from("Commands:\n");
        for (usage, description) in entries {
            out.push_str(&format!("  {:<width$}  {}\n", usage, description, width = width));
        }
        out
    }
}

async fn write_out<W>(output: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    output
        .write_all(text.as_bytes())
        .await
        .context("Failed to write to terminal")?;
    output.flush().await.context("Failed to flush terminal")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use tokio::io::BufReader;

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"add order_no=10 name="Signal Generator"  qty=2"#),
            vec!["add", "order_no=10", "name=Signal Generator", "qty=2"]
        );
        assert_eq!(tokenize("  "), Vec::<String>::new());
        assert_eq!(tokenize("rename 4 ''"), vec!["rename", "4", ""]);
    }

    async fn run_script(script: &str) -> String {
        let app = Arc::new(App::from_config(AppConfig::default(), "/").unwrap());
        let mut shell = Shell::new(app.clone());
        app.start().await;

        let mut out: Vec<u8> = Vec::new();
        shell
            .run(BufReader::new(script.as_bytes()), &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_login_then_browse() {
        let out = run_script(
            "login demo@gecr.com secret\nwhoami\ngo /departments\nadd Electrical\nquit\n",
        )
        .await;

        assert!(out.contains("Inventory Management System"));
        assert!(out.contains("[success] Login successful"));
        assert!(out.contains("Signal Generator"));
        assert!(out.contains("Signed in as demo"));
        assert!(out.contains("[success] Department added successfully"));
        assert!(out.contains("/departments> "));
    }

    #[tokio::test]
    async fn test_protected_go_while_signed_out_stays_on_login() {
        let out = run_script("go /audit\nbogus\nquit\n").await;
        assert!(!out.contains("Audit Logs\nAction"));
        assert!(out.contains("[warning] Unknown command: bogus (try 'help')"));
        assert!(out.contains("/login> "));
    }
}
