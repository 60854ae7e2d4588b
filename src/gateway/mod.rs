//! HTTP gateway: router and server lifecycle

mod router;
mod server;

pub use router::{create_router, dispatch, AppState};
pub use server::Gateway;
