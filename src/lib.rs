pub mod announcer;
pub mod backends;
pub mod catalog;
pub mod config_loader;
pub mod error;
pub mod injector;
pub mod publisher;
pub mod script;
pub mod supabase;

pub use error::{Error, Result};
