//! HTTP surface for the lifecycle actions.

mod response;
mod routes;

pub use response::{AppMetadata, GetUserResponse, InviteResponse, MessageResponse, UserBody};
pub use routes::{AppState, Directory, router};
