pub mod notes;
pub mod server;
pub mod utils;
