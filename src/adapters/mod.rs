pub mod api_server;

pub use api_server::{bootstrap, bootstrap_with_model, start_api_server};
