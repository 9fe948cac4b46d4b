//! Authorization orchestrator
//!
//! Joins the token authorizer, the provision authorizer and the app registry.
//! For every secret a requester declares, the orchestrator resolves the
//! token declaration the secret refers to, authorizes that token, looks up
//! installations able to issue it and authorizes provisioning the secret.

use crate::access_control::{
    Consumer, ProvisionAuthResult, ProvisionAuthorizer, ProvisionRequest, ProvisionTarget,
    RepoRef, TokenAuthResult, TokenAuthorizer, TokenDeclaration, TokenRequest,
};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::registry::AppRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Reference from a secret to a token declaration
///
/// A plain string names a token declared by the same requester. A table
/// names a token declared by another repo, which must be shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenReference {
    Local(String),
    Remote {
        account: String,
        repo: String,
        name: String,
    },
}

impl TokenReference {
    pub fn name(&self) -> &str {
        match self {
            TokenReference::Local(name) => name,
            TokenReference::Remote { name, .. } => name,
        }
    }

    /// Repo declaring the referenced token
    pub fn owner(&self, requester: &RepoRef) -> RepoRef {
        match self {
            TokenReference::Local(_) => requester.clone(),
            TokenReference::Remote { account, repo, .. } => RepoRef::new(account, repo),
        }
    }
}

impl fmt::Display for TokenReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenReference::Local(name) => write!(f, "{}", name),
            TokenReference::Remote {
                account,
                repo,
                name,
            } => write!(f, "{} from repo {}/{}", name, account, repo),
        }
    }
}

/// Secret a requester wants provisioned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretDeclaration {
    pub token: TokenReference,
    #[serde(default)]
    pub to: Vec<ProvisionTarget>,
}

/// Everything one requester repo declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterDeclarations {
    pub account: String,
    pub repo: String,
    #[serde(default)]
    pub tokens: IndexMap<String, TokenDeclaration>,
    #[serde(default)]
    pub secrets: IndexMap<String, SecretDeclaration>,
}

impl RequesterDeclarations {
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.account, &self.repo)
    }
}

/// What happened to the token a secret refers to
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenOutcome {
    Authorized(TokenAuthResult),
    NotFound,
    NotShared,
}

impl TokenOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, TokenOutcome::Authorized(result) if result.is_allowed)
    }
}

/// Combined result for one secret
#[derive(Debug, Clone, Serialize)]
pub struct SecretAuthResult {
    pub requester: RepoRef,
    pub secret: String,
    /// Repo owning the referenced token declaration
    pub token_owner: RepoRef,
    pub token_name: String,
    pub token: TokenOutcome,
    /// Installations able to issue the token, in registration order
    pub issuers: Vec<u64>,
    pub provision: ProvisionAuthResult,
    pub is_allowed: bool,
}

/// Results for every declared secret, in declaration order
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthorizeResult {
    pub secrets: Vec<SecretAuthResult>,
}

impl AuthorizeResult {
    pub fn is_allowed(&self) -> bool {
        self.secrets.iter().all(|secret| secret.is_allowed)
    }

    pub fn denied(&self) -> impl Iterator<Item = &SecretAuthResult> {
        self.secrets.iter().filter(|secret| !secret.is_allowed)
    }
}

/// Orchestrates token, provisioning and issuer decisions
pub struct Authorizer {
    tokens: TokenAuthorizer,
    secrets: ProvisionAuthorizer,
    registry: AppRegistry,
}

impl Authorizer {
    pub fn new(
        tokens: TokenAuthorizer,
        secrets: ProvisionAuthorizer,
        registry: AppRegistry,
    ) -> Self {
        Self {
            tokens,
            secrets,
            registry,
        }
    }

    /// Build authorizers and registry from loaded configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let tokens = TokenAuthorizer::new(&config.permissions.rules)?;
        let secrets = ProvisionAuthorizer::new(&config.provision.rules)?;

        let mut registry = AppRegistry::new();
        for app in &config.apps {
            registry.register_app(app.clone())?;
        }
        for installation in &config.installations {
            registry.register_installation(installation.clone())?;
        }

        info!(
            permission_rules = tokens.rule_count(),
            secrets_rules = secrets.rule_count(),
            apps = config.apps.len(),
            installations = config.installations.len(),
            "Authorizer ready"
        );

        Ok(Self::new(tokens, secrets, registry))
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    pub fn token_authorizer(&self) -> &TokenAuthorizer {
        &self.tokens
    }

    pub fn provision_authorizer(&self) -> &ProvisionAuthorizer {
        &self.secrets
    }

    /// Authorize every secret declared by every requester
    pub fn authorize(&self, requesters: &[RequesterDeclarations]) -> AuthorizeResult {
        let secrets = requesters
            .iter()
            .flat_map(|declarations| {
                declarations.secrets.iter().map(move |(name, secret)| {
                    self.authorize_secret(requesters, declarations, name, secret)
                })
            })
            .collect();

        AuthorizeResult { secrets }
    }

    fn authorize_secret(
        &self,
        requesters: &[RequesterDeclarations],
        declarations: &RequesterDeclarations,
        name: &str,
        secret: &SecretDeclaration,
    ) -> SecretAuthResult {
        let requester = declarations.repo_ref();
        let owner = secret.token.owner(&requester);
        let token_name = secret.token.name();

        let declaration = requesters
            .iter()
            .find(|candidate| candidate.account == owner.account && candidate.repo == owner.repo)
            .and_then(|candidate| candidate.tokens.get(token_name));

        let (token, issuers) = match declaration {
            None => (TokenOutcome::NotFound, Vec::new()),
            Some(declaration) if owner != requester && !declaration.shared => {
                (TokenOutcome::NotShared, Vec::new())
            }
            Some(declaration) => {
                let request = TokenRequest {
                    consumer: Consumer::from(owner.clone()),
                    declaration: declaration.clone(),
                    known_repos: self.registry.account_repos(&declaration.account),
                };
                (
                    TokenOutcome::Authorized(self.tokens.authorize_token(&request)),
                    self.registry.find_issuers_for_request(&request),
                )
            }
        };

        let provision = self.secrets.authorize_secret(&ProvisionRequest {
            requester: requester.clone(),
            name: name.to_string(),
            to: secret.to.clone(),
        });

        let is_allowed = token.is_allowed() && !issuers.is_empty() && provision.is_allowed;
        debug!(
            requester = %requester,
            secret = name,
            token = %secret.token,
            is_allowed,
            "Authorized secret"
        );

        SecretAuthResult {
            requester,
            secret: name.to_string(),
            token_owner: owner,
            token_name: token_name.to_string(),
            token,
            issuers,
            provision,
            is_allowed,
        }
    }
}
