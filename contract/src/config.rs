//! Contract host configuration.

use tokenledger_ledger::LedgerConfig;

/// Main contract configuration.
#[derive(Debug, Clone)]
pub struct ContractConfig {
    /// Node ID (generated when absent).
    pub node_id: Option<String>,
    /// Accounting engine configuration.
    pub ledger: LedgerConfig,
    /// Re-executions of an invocation whose commit hit a read conflict.
    pub max_commit_retries: u32,
    /// Log level.
    pub log_level: String,
    /// Emit logs as JSON lines.
    pub json_logs: bool,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            ledger: LedgerConfig::default(),
            max_commit_retries: 5,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl ContractConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            ledger: LedgerConfig::from_env(),
            ..Self::default()
        };

        if let Ok(node_id) = std::env::var("CONTRACT_NODE_ID") {
            config.node_id = Some(node_id);
        }

        if let Ok(retries) = std::env::var("CONTRACT_MAX_COMMIT_RETRIES") {
            if let Ok(retries) = retries.parse() {
                config.max_commit_retries = retries;
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.json_logs = format.eq_ignore_ascii_case("json");
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.ledger.validate()?;

        if self.max_commit_retries > 100 {
            return Err("Commit retries cannot exceed 100".to_string());
        }

        if matches!(&self.node_id, Some(id) if id.is_empty()) {
            return Err("Node ID cannot be empty".to_string());
        }

        Ok(())
    }
}
