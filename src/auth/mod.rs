//! Authentication Module
//! Mission: Track who is signed in and keep every view in agreement about it

pub mod demo;
pub mod gateway;
pub mod identity;
pub mod models;
pub mod rest_client;
pub mod session_store;

pub use demo::DemoIdentity;
pub use gateway::AuthGateway;
pub use identity::{AuthResponse, IdentityChangeCallback, IdentityService};
pub use models::{IdentityEvent, Session, SessionState, User, UserMetadata};
pub use rest_client::RestIdentityClient;
pub use session_store::{AuthGuard, SessionStore};
