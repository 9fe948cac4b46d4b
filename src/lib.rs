//! tokensmith
//!
//! Rule-driven authorization for GitHub App installation tokens and for
//! provisioning their values into GitHub secret stores.
//!
//! ## Features
//!
//! - **Token authorization** - ordered permission rules with last-match-wins
//!   semantics, evaluated per account or per repo
//! - **Provisioning authorization** - ordered secrets rules covering Actions,
//!   Codespaces, Dependabot and environment secrets
//! - **App registry** - picks the installation able to issue a token
//! - **Explanations** - every decision renders as a ✅/❌ tree, rule by rule
//!
//! The core is synchronous and performs no I/O. Rules are compiled once and
//! can be shared across threads for any number of read-only evaluations.
//!
//! ## Example Configuration
//!
//! ```toml
//! [[permissions.rules]]
//! description = "Deployers can write to account-a"
//! consumers = ["account-x/deployer"]
//! permissions = { contents = "write" }
//! [[permissions.rules.resources]]
//! accounts = ["account-a"]
//! all_repos = true
//!
//! [[provision.rules]]
//! secrets = ["*"]
//! requesters = ["account-x/*"]
//! [provision.rules.to.github.repo]
//! actions = "allow"
//! ```

pub mod access_control;
pub mod authorizer;
pub mod config;
pub mod error;
pub mod explain;
pub mod registry;

// Re-export main types
pub use access_control::{ProvisionAuthorizer, TokenAuthorizer};
pub use authorizer::{AuthorizeResult, Authorizer, RequesterDeclarations};
pub use config::{AppConfig, load_config};
pub use error::{AppError, ConfigError, RegistryError, Result};
pub use registry::AppRegistry;
