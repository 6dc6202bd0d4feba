pub mod config;
pub mod cors;
pub mod error;
pub mod landing;
pub mod logging;
pub mod relay;
pub mod rewrite;
pub mod target;
pub mod translate;
pub mod upstream;

pub use config::Config;
pub use error::RelayError;
pub use relay::RelayServer;
