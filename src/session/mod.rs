pub mod extractors;
pub mod layer;
pub mod manager;
pub mod store;
pub mod token;

pub use extractors::{CurrentSession, CurrentUser, GuestOnly};
pub use manager::SessionManager;
