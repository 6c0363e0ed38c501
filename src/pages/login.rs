//! Login / sign-up page
//!
//! Signing in does not navigate by itself: the session guard moves the user
//! off `/login` as soon as the store reports the new identity.

use crate::pages::navbar::BRAND;
use crate::pages::{Page, PageContext};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Login,
    SignUp,
}

pub struct LoginPage {
    ctx: PageContext,
    tab: Tab,
}

impl LoginPage {
    pub fn new(ctx: PageContext) -> Self {
        Self {
            ctx,
            tab: Tab::Login,
        }
    }

    async fn sign_in(&mut self, args: &[String]) {
        let [email, password] = args else {
            self.ctx.toaster.warning("Usage: login <email> <password>");
            return;
        };
        match self.ctx.gateway.sign_in(email, password).await {
            Ok(_) => self.ctx.toaster.success("Login successful"),
            Err(e) => self.ctx.toaster.danger(e.message),
        }
    }

    async fn sign_up(&mut self, args: &[String]) {
        let [email, password, username] = args else {
            self.ctx
                .toaster
                .warning("Usage: signup <email> <password> <username>");
            return;
        };
        match self.ctx.gateway.sign_up(email, password, username).await {
            Ok(_) => {
                self.ctx
                    .toaster
                    .success("Account created successfully! Please login.");
                self.tab = Tab::Login;
            }
            Err(e) => self.ctx.toaster.danger(e.message),
        }
    }
}

#[async_trait]
impl Page for LoginPage {
    fn title(&self) -> &str {
        "Login"
    }

    async fn load(&mut self) {}

    fn render(&self) -> String {
        let (login, signup) = match self.tab {
            Tab::Login => ("[Login]", " Sign Up "),
            Tab::SignUp => (" Login ", "[Sign Up]"),
        };
        let form = match self.tab {
            Tab::Login => "login <email> <password>",
            Tab::SignUp => "signup <email> <password> <username>",
        };
        format!(
            "== {} ==\nInventory Management System\n\n{} {}\n\n  {}",
            BRAND, login, signup, form
        )
    }

    async fn handle(&mut self, command: &str, args: &[String]) -> bool {
        match command {
            "login" => {
                self.tab = Tab::Login;
                self.sign_in(args).await;
            }
            "signup" => {
                self.tab = Tab::SignUp;
                self.sign_up(args).await;
            }
            "tab" => {
                self.tab = match args.first().map(String::as_str) {
                    Some("signup") => Tab::SignUp,
                    _ => Tab::Login,
                };
            }
            _ => return false,
        }
        true
    }

    fn commands(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("login <email> <password>", "Sign in"),
            ("signup <email> <password> <username>", "Create an account"),
            ("tab login|signup", "Switch form"),
        ]
    }
}
