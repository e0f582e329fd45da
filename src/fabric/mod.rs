pub mod common;
pub mod lb;
pub mod proto;
pub mod server;
