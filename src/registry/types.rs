//! Registry types
//!
//! Shapes of registered GitHub Apps and their installations, as supplied by
//! the GitHub API client and configuration.

use crate::access_control::PermissionSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A GitHub App known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRegistration {
    pub app: App,
    #[serde(default)]
    pub issuer: IssuerSettings,
    #[serde(default)]
    pub provisioner: ProvisionerSettings,
}

/// Static GitHub App metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: u64,
    pub slug: String,
    pub name: String,
    /// Permissions granted to the app at registration time
    #[serde(default)]
    pub permissions: PermissionSet,
}

/// Whether and for which roles an app may mint tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerSettings {
    pub enabled: bool,
    pub roles: Vec<String>,
}

/// Whether an app may write secrets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerSettings {
    pub enabled: bool,
}

/// An installation together with the repos it can access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRegistration {
    pub installation: Installation,
    #[serde(default)]
    pub repos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub id: u64,
    #[serde(alias = "app")]
    pub app_id: u64,
    pub account: String,
    pub repository_selection: RepositorySelection,
}

/// Repo access mode chosen when the app was installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositorySelection {
    All,
    #[default]
    Selected,
}

impl fmt::Display for RepositorySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositorySelection::All => write!(f, "all"),
            RepositorySelection::Selected => write!(f, "selected"),
        }
    }
}
