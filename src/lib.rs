//! WordPress Preflight - pre-scan gate for WordPress security scanning
//!
//! Runs the checks a scanner must pass before enumerating a remote
//! site: vulnerability database freshness (with an optional update),
//! server module resolution, redirect triage, and the WordPress
//! identity precondition.
//!
//! # Example
//!
//! ```no_run
//! use wordpress_preflight::{
//!     CliSink, FileDb, Gate, HttpUpdater, Outcome, ParsedOptions, StdinPrompt, default_client,
//! };
//!
//! #[tokio::main]
//! async fn main() -> wordpress_preflight::Result<()> {
//!     let options = ParsedOptions::builder().url("https://example.com").build()?;
//!     let db = FileDb::new(options.data_dir.clone());
//!     let updater = HttpUpdater::new(default_client()?, options.data_dir.clone());
//!
//!     let mut gate = Gate::new(options, db, updater, CliSink::new(std::io::stdout()), StdinPrompt)?;
//!     if let Outcome::ReadyToScan(target) = gate.before_scan().await? {
//!         println!("ready to scan {}", target.url());
//!     }
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod gate;
pub mod options;
pub mod output;
pub mod server;
pub mod target;

pub use db::{FileDb, HttpUpdater, Updater, VulnDatabase};
pub use error::{Error, Result};
pub use gate::{Gate, Outcome};
pub use options::{Format, OptionsBuilder, ParsedOptions};
pub use output::{CliSink, Event, EventSink, JsonSink, Prompt, StdinPrompt};
pub use server::{DirectoryListing, ServerKind, ServerModule};
pub use target::{HomepageResponse, RemoteResource, Target, default_client};
