//! Caller identity and per-operation authorization.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tokenledger_common::{LedgerError, OrgId, Result, TxnKind};

use crate::config::LedgerConfig;

/// Verified attributes of the invoking client, supplied by the host.
pub trait CallerIdentity {
    /// Client identifier.
    fn id(&self) -> Result<String>;

    /// Organization (membership service) the client belongs to.
    fn msp_id(&self) -> Result<OrgId>;

    /// Value of a certificate attribute, `None` when unset.
    fn attribute(&self, name: &str) -> Result<Option<String>>;
}

/// Plain identity value, as handed over by a host or built in tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    id: String,
    #[serde(default)]
    msp_id: Option<OrgId>,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

impl Caller {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_msp(mut self, msp_id: impl Into<OrgId>) -> Self {
        self.msp_id = Some(msp_id.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

impl CallerIdentity for Caller {
    fn id(&self) -> Result<String> {
        Ok(self.id.clone())
    }

    fn msp_id(&self) -> Result<OrgId> {
        self.msp_id
            .clone()
            .ok_or_else(|| LedgerError::Identity(format!("no organization for client {}", self.id)))
    }

    fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.attributes.get(name).cloned())
    }
}

/// Rule an operation's caller must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Any caller.
    Open,
    /// Issuer organization and minter role, both.
    IssuerAndRole,
    /// Issuer organization or minter role, either.
    IssuerOrRole,
}

impl FromStr for AuthPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(AuthPolicy::Open),
            "all" | "and" | "issuer-and-role" => Ok(AuthPolicy::IssuerAndRole),
            "any" | "or" | "issuer-or-role" => Ok(AuthPolicy::IssuerOrRole),
            other => Err(format!("unknown authorization policy: {}", other)),
        }
    }
}

impl fmt::Display for AuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthPolicy::Open => f.write_str("open"),
            AuthPolicy::IssuerAndRole => f.write_str("all"),
            AuthPolicy::IssuerOrRole => f.write_str("any"),
        }
    }
}

/// Evaluates caller attributes against the policy of each operation kind.
#[derive(Debug, Clone)]
pub struct AuthorizationGuard {
    issuer_org: OrgId,
    minter_role: String,
    role_attribute: String,
    mint: AuthPolicy,
    transfer: AuthPolicy,
    burn: AuthPolicy,
}

impl AuthorizationGuard {
    /// Guard with Mint restricted to issuer and role, Transfer open and the
    /// configured Burn policy.
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            issuer_org: config.issuer_org.clone(),
            minter_role: config.minter_role.clone(),
            role_attribute: config.role_attribute.clone(),
            mint: AuthPolicy::IssuerAndRole,
            transfer: AuthPolicy::Open,
            burn: config.burn_policy,
        }
    }

    pub fn policy(&self, kind: TxnKind) -> AuthPolicy {
        match kind {
            TxnKind::Mint => self.mint,
            TxnKind::Transfer => self.transfer,
            TxnKind::Burn => self.burn,
        }
    }

    /// Check whether `caller` may perform an operation of `kind`.
    pub fn check<C>(&self, caller: &C, kind: TxnKind) -> Result<()>
    where
        C: CallerIdentity + ?Sized,
    {
        let policy = self.policy(kind);
        if policy == AuthPolicy::Open {
            return Ok(());
        }

        // Either condition suffices under IssuerOrRole, so a caller without
        // an organization is simply not the issuer there.
        let org = match caller.msp_id() {
            Ok(org) => Some(org),
            Err(LedgerError::Identity(_)) if policy == AuthPolicy::IssuerOrRole => None,
            Err(e) => return Err(e),
        };
        let role = caller.attribute(&self.role_attribute)?;
        let is_issuer = org.as_ref() == Some(&self.issuer_org);
        let has_role = role.as_deref() == Some(self.minter_role.as_str());
        let org = org.map_or_else(|| "<none>".to_string(), |org| org.to_string());

        debug!(
            operation = kind.operation(),
            org = %org,
            is_issuer,
            has_role,
            "Evaluating caller"
        );

        let denial = match policy {
            AuthPolicy::IssuerAndRole if !is_issuer => Some(format!(
                "organization {} is not the issuer {}",
                org, self.issuer_org
            )),
            AuthPolicy::IssuerAndRole if !has_role => Some(format!(
                "attribute {} is not {}",
                self.role_attribute, self.minter_role
            )),
            AuthPolicy::IssuerOrRole if !is_issuer && !has_role => Some(format!(
                "organization {} is not the issuer and attribute {} is not {}",
                org, self.role_attribute, self.minter_role
            )),
            _ => None,
        };

        match denial {
            Some(reason) => {
                warn!(operation = kind.operation(), org = %org, %reason, "Caller not authorized");
                Err(LedgerError::Unauthorized {
                    operation: kind,
                    reason,
                })
            }
            None => Ok(()),
        }
    }
}
