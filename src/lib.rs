//! modindex - sync and structurally index Terraform module repositories
//!
//! Repositories of a GitHub organization are downloaded as tarballs, split
//! into root modules and `modules/<name>` submodules, and parsed into
//! variables, outputs, resources and data sources. Changelogs become
//! queryable releases, and a corpus-trained learner tags every module.

pub mod cancel;
pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod github;
pub mod hcl;
pub mod learn;
pub mod meta;
pub mod models;
pub mod progress;
pub mod release;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
