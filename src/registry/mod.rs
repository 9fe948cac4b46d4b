//! App/installation registry
//!
//! Indexes registered GitHub Apps and their installations, and answers which
//! installations can issue a token for a declaration or provision secrets
//! into an account.
//!
//! The registry is filled during a build phase and only read afterwards.
//! Every index preserves registration order, which decides which installation
//! wins when several qualify.

pub mod types;

pub use types::{
    App, AppRegistration, Installation, InstallationRegistration, IssuerSettings,
    ProvisionerSettings, RepositorySelection,
};

use crate::access_control::{RepoSelection, TokenDeclaration, TokenRequest};
use crate::error::RegistryError;
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;
use tracing::{debug, trace};

struct InstallationEntry {
    installation: Installation,
    repos: IndexSet<String>,
}

impl InstallationEntry {
    /// Whether the installation can reach every requested repo
    ///
    /// `resolved` holds the concrete repos a repo list expanded to.
    fn covers(&self, repos: &RepoSelection, resolved: &BTreeSet<String>) -> bool {
        if repos.is_all() {
            return self.installation.repository_selection == RepositorySelection::All;
        }
        resolved.iter().all(|repo| self.repos.contains(repo.as_str()))
    }
}

/// Registered apps and installations
#[derive(Default)]
pub struct AppRegistry {
    apps: IndexMap<u64, AppRegistration>,
    installations: IndexMap<u64, InstallationEntry>,
    /// Installation ids per account, in registration order
    by_account: IndexMap<String, Vec<u64>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_app(&mut self, registration: AppRegistration) -> Result<(), RegistryError> {
        let id = registration.app.id;
        if self.apps.contains_key(&id) {
            return Err(RegistryError::DuplicateApp { id });
        }

        debug!(
            app = id,
            slug = %registration.app.slug,
            issuer = registration.issuer.enabled,
            provisioner = registration.provisioner.enabled,
            "Registered app"
        );
        self.apps.insert(id, registration);
        Ok(())
    }

    /// Register an installation of a previously registered app
    pub fn register_installation(
        &mut self,
        registration: InstallationRegistration,
    ) -> Result<(), RegistryError> {
        let InstallationRegistration {
            installation,
            repos,
        } = registration;

        if !self.apps.contains_key(&installation.app_id) {
            return Err(RegistryError::UnknownApp {
                id: installation.app_id,
            });
        }
        if self.installations.contains_key(&installation.id) {
            return Err(RegistryError::DuplicateInstallation {
                id: installation.id,
            });
        }

        debug!(
            installation = installation.id,
            app = installation.app_id,
            account = %installation.account,
            selection = %installation.repository_selection,
            repos = repos.len(),
            "Registered installation"
        );

        let id = installation.id;
        self.by_account
            .entry(installation.account.clone())
            .or_default()
            .push(id);
        self.installations.insert(
            id,
            InstallationEntry {
                installation,
                repos: repos.into_iter().collect(),
            },
        );
        Ok(())
    }

    /// Add repos to an installation
    ///
    /// Fails when the installation has not been registered.
    pub fn register_installation_repos<I, S>(
        &mut self,
        installation_id: u64,
        repos: I,
    ) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .installations
            .get_mut(&installation_id)
            .ok_or(RegistryError::UnknownInstallation {
                id: installation_id,
            })?;

        entry.repos.extend(repos.into_iter().map(Into::into));
        trace!(
            installation = installation_id,
            repos = entry.repos.len(),
            "Registered installation repos"
        );
        Ok(())
    }

    pub fn app(&self, id: u64) -> Option<&AppRegistration> {
        self.apps.get(&id)
    }

    pub fn apps(&self) -> impl Iterator<Item = &AppRegistration> {
        self.apps.values()
    }

    pub fn installation(&self, id: u64) -> Option<&Installation> {
        self.installations.get(&id).map(|entry| &entry.installation)
    }

    pub fn installations(&self) -> impl Iterator<Item = &Installation> {
        self.installations.values().map(|entry| &entry.installation)
    }

    /// Repos registered for an installation, in registration order
    pub fn installation_repos(&self, id: u64) -> Option<impl Iterator<Item = &str>> {
        self.installations
            .get(&id)
            .map(|entry| entry.repos.iter().map(String::as_str))
    }

    /// Repos of `account` registered across its installations
    ///
    /// Unique, in registration order.
    pub fn account_repos(&self, account: &str) -> Vec<String> {
        self.account_installations(account)
            .flat_map(|entry| entry.repos.iter().cloned())
            .collect::<IndexSet<String>>()
            .into_iter()
            .collect()
    }

    /// Every installation able to issue the token `request` declares
    ///
    /// Repo patterns are resolved against the request's known repos, the same
    /// way the token authorizer resolves them, and every resolved repo must be
    /// registered for the installation.
    pub fn find_issuers_for_request(&self, request: &TokenRequest) -> Vec<u64> {
        let declaration = &request.declaration;
        let Some(resolved) = request.resolved_repos() else {
            debug!(
                account = %declaration.account,
                repos = ?declaration.repos,
                "Repo patterns match no known repo, no issuers"
            );
            return Vec::new();
        };

        let issuers: Vec<u64> = self
            .account_installations(&declaration.account)
            .filter(|entry| {
                let installation = &entry.installation;
                let Some(registration) = self.apps.get(&installation.app_id) else {
                    return false;
                };

                let qualifies = Self::can_issue(registration, declaration)
                    && entry.covers(&declaration.repos, &resolved);
                trace!(
                    installation = installation.id,
                    app = installation.app_id,
                    qualifies,
                    "Evaluated issuer candidate"
                );
                qualifies
            })
            .map(|entry| entry.installation.id)
            .collect();

        debug!(
            account = %declaration.account,
            role = ?declaration.role,
            repos = ?resolved,
            issuers = ?issuers,
            "Found token issuers"
        );
        issuers
    }

    /// First installation able to issue the token `request` declares
    pub fn find_installation_for_token(&self, request: &TokenRequest) -> Option<u64> {
        self.find_issuers_for_request(request).into_iter().next()
    }

    /// Installations of provisioner apps in `account`
    ///
    /// When `repo` is given the installation must have access to it.
    pub fn find_provisioners_for_account(&self, account: &str, repo: Option<&str>) -> Vec<u64> {
        self.account_installations(account)
            .filter(|entry| {
                self.apps
                    .get(&entry.installation.app_id)
                    .is_some_and(|registration| registration.provisioner.enabled)
            })
            .filter(|entry| repo.is_none_or(|repo| entry.repos.contains(repo)))
            .map(|entry| entry.installation.id)
            .collect()
    }

    fn account_installations<'a>(
        &'a self,
        account: &str,
    ) -> impl Iterator<Item = &'a InstallationEntry> + 'a {
        self.by_account
            .get(account)
            .into_iter()
            .flatten()
            .filter_map(|id| self.installations.get(id))
    }

    /// Structural issuer checks that do not depend on the installation
    fn can_issue(registration: &AppRegistration, declaration: &TokenDeclaration) -> bool {
        if !registration.issuer.enabled {
            return false;
        }

        let role_ok = match &declaration.role {
            Some(role) => registration.issuer.roles.contains(role),
            None => !declaration.permissions.requires_role(),
        };

        role_ok && registration.app.permissions.satisfies(&declaration.permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::{PermissionLevel, PermissionSet};

    fn app(id: u64, roles: &[&str]) -> AppRegistration {
        AppRegistration {
            app: App {
                id,
                slug: format!("app-{}", id),
                name: format!("App {}", id),
                permissions: PermissionSet::from_iter([("contents", PermissionLevel::Write)]),
            },
            issuer: IssuerSettings {
                enabled: true,
                roles: roles.iter().map(|r| r.to_string()).collect(),
            },
            provisioner: ProvisionerSettings { enabled: false },
        }
    }

    #[test]
    fn test_register_repos_for_unknown_installation_fails() {
        let mut registry = AppRegistry::new();
        let err = registry
            .register_installation_repos(99, ["repo-a"])
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownInstallation { id: 99 });
    }

    #[test]
    fn test_register_installation_requires_app() {
        let mut registry = AppRegistry::new();
        let err = registry
            .register_installation(InstallationRegistration {
                installation: Installation {
                    id: 1,
                    app_id: 5,
                    account: "account-a".into(),
                    repository_selection: RepositorySelection::All,
                },
                repos: vec![],
            })
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownApp { id: 5 });
    }

    #[test]
    fn test_account_repos_are_unique_across_installations() {
        let mut registry = AppRegistry::new();
        registry.register_app(app(1, &[])).unwrap();
        for (id, account, repos) in [
            (10, "account-a", vec!["repo-b", "repo-a"]),
            (20, "account-a", vec!["repo-a", "repo-c"]),
            (30, "account-b", vec!["repo-z"]),
        ] {
            registry
                .register_installation(InstallationRegistration {
                    installation: Installation {
                        id,
                        app_id: 1,
                        account: account.into(),
                        repository_selection: RepositorySelection::Selected,
                    },
                    repos: repos.into_iter().map(String::from).collect(),
                })
                .unwrap();
        }

        assert_eq!(
            registry.account_repos("account-a"),
            vec!["repo-b", "repo-a", "repo-c"]
        );
        assert!(registry.account_repos("account-c").is_empty());
    }

    #[test]
    fn test_duplicate_app_rejected() {
        let mut registry = AppRegistry::new();
        registry.register_app(app(1, &[])).unwrap();
        assert_eq!(
            registry.register_app(app(1, &[])).unwrap_err(),
            RegistryError::DuplicateApp { id: 1 }
        );
    }

    #[test]
    fn test_can_issue_role_gate() {
        let registration = app(1, &["deployer"]);
        let mut declaration = TokenDeclaration {
            shared: false,
            role: None,
            account: "account-a".into(),
            repos: RepoSelection::All,
            permissions: PermissionSet::from_iter([("contents", PermissionLevel::Read)]),
        };
        assert!(AppRegistry::can_issue(&registration, &declaration));

        declaration.permissions = PermissionSet::from_iter([("contents", PermissionLevel::Write)]);
        assert!(!AppRegistry::can_issue(&registration, &declaration));

        declaration.role = Some("deployer".into());
        assert!(AppRegistry::can_issue(&registration, &declaration));

        declaration.role = Some("other".into());
        assert!(!AppRegistry::can_issue(&registration, &declaration));
    }
}
