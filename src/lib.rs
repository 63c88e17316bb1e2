pub mod config;
pub mod db;
pub mod error;
pub mod google;
pub mod handlers;
pub mod router;
pub mod secrets;
pub mod server;
pub mod startup;

pub use config::Config;
pub use error::AppError;
