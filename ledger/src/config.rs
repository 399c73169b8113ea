//! Ledger configuration.

use tokenledger_common::{validate_id, OrgId};

use crate::auth::AuthPolicy;

/// Accounting engine configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Organization allowed to issue supply.
    pub issuer_org: OrgId,
    /// Role attribute value that grants minting.
    pub minter_role: String,
    /// Name of the caller attribute holding the role.
    pub role_attribute: String,
    /// Asset type tag used to namespace composite keys.
    pub doc_type: String,
    /// Who may burn.
    pub burn_policy: AuthPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            issuer_org: OrgId::new("Org1MSP"),
            minter_role: "Minter".to_string(),
            role_attribute: "UserRole".to_string(),
            doc_type: "token".to_string(),
            burn_policy: AuthPolicy::IssuerOrRole,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(org) = std::env::var("LEDGER_ISSUER_ORG") {
            config.issuer_org = OrgId::new(org);
        }

        if let Ok(role) = std::env::var("LEDGER_MINTER_ROLE") {
            config.minter_role = role;
        }

        if let Ok(attribute) = std::env::var("LEDGER_ROLE_ATTRIBUTE") {
            config.role_attribute = attribute;
        }

        if let Ok(tag) = std::env::var("LEDGER_DOC_TYPE") {
            config.doc_type = tag;
        }

        if let Ok(policy) = std::env::var("LEDGER_BURN_POLICY") {
            if let Ok(policy) = policy.parse() {
                config.burn_policy = policy;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.issuer_org.as_str().is_empty() {
            return Err("Issuer organization cannot be empty".to_string());
        }

        if self.minter_role.is_empty() || self.role_attribute.is_empty() {
            return Err("Minter role and role attribute cannot be empty".to_string());
        }

        validate_id(&self.doc_type, "doc_type").map_err(|e| e.to_string())?;

        if self.burn_policy == AuthPolicy::Open {
            return Err("Burn cannot be open to every caller".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.issuer_org.as_str(), "Org1MSP");
        assert_eq!(config.burn_policy, AuthPolicy::IssuerOrRole);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = LedgerConfig::default();
        config.doc_type = String::new();
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.burn_policy = AuthPolicy::Open;
        assert!(config.validate().is_err());
    }
}
