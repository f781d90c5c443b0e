//! Credentials and the signed-in session.

pub mod gateway;
pub mod session;
pub mod token_store;

pub use gateway::{AuthGateway, Credentials};
pub use session::{LogoutReason, Session, SessionState};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenPair, TokenStore};
