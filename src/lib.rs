//! imgshift - move images referenced in Markdown notes to an S3-compatible
//! bucket and relink them

pub mod cli;
pub mod config;
pub mod markdown;
pub mod migrate;
pub mod s3;
pub mod source;

pub use config::Config;
pub use migrate::{MigrationReport, Migrator};
