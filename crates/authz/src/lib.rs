pub mod error;
pub mod service;
pub mod store;

pub use error::{AuthzError, Result};
pub use service::{RoleService, DEFAULT_ROLE};
pub use store::{AuthzStore, InMemoryAuthzStore};
