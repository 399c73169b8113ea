//! Simulation scenarios.

use serde::{Deserialize, Serialize};

/// A scripted scenario, run against an empty ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// Expected result of an operation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expect {
    Success,
    /// Rejected with the given error code.
    Rejected(String),
}

impl Expect {
    fn rejected(code: &str) -> Self {
        Expect::Rejected(code.to_string())
    }
}

/// A step in a scenario. Amounts are signed so malformed input can be
/// scripted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Mint, as the issuer or as an outsider.
    Mint {
        owner: String,
        txn_id: String,
        amount: i64,
        authorized: bool,
        expect: Expect,
    },
    /// Transfer, invoked by the sender.
    Transfer {
        from: String,
        to: String,
        txn_id: String,
        amount: i64,
        expect: Expect,
    },
    /// Burn, as the issuer or as an outsider.
    Burn {
        owner: String,
        txn_id: String,
        amount: i64,
        authorized: bool,
        expect: Expect,
    },
    /// The same mint submitted `copies` times at once. Exactly one copy
    /// may apply, every other one must be rejected as a duplicate.
    ConcurrentMint {
        owner: String,
        txn_id: String,
        amount: u64,
        copies: usize,
    },
    /// Check ledger state.
    Assert { condition: AssertCondition },
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssertCondition {
    BalanceEquals { holder: String, amount: u64 },
    SupplyEquals { amount: u64 },
    /// Total supply equals the sum of holder balances.
    SupplyBalanced,
    TransactionCount { kind: String, count: usize },
}

fn mint(owner: &str, txn_id: &str, amount: i64, expect: Expect) -> ScenarioStep {
    ScenarioStep::Mint {
        owner: owner.to_string(),
        txn_id: txn_id.to_string(),
        amount,
        authorized: true,
        expect,
    }
}

fn transfer(from: &str, to: &str, txn_id: &str, amount: i64, expect: Expect) -> ScenarioStep {
    ScenarioStep::Transfer {
        from: from.to_string(),
        to: to.to_string(),
        txn_id: txn_id.to_string(),
        amount,
        expect,
    }
}

fn burn(owner: &str, txn_id: &str, amount: i64, expect: Expect) -> ScenarioStep {
    ScenarioStep::Burn {
        owner: owner.to_string(),
        txn_id: txn_id.to_string(),
        amount,
        authorized: true,
        expect,
    }
}

fn balance(holder: &str, amount: u64) -> ScenarioStep {
    ScenarioStep::Assert {
        condition: AssertCondition::BalanceEquals {
            holder: holder.to_string(),
            amount,
        },
    }
}

fn supply(amount: u64) -> ScenarioStep {
    ScenarioStep::Assert {
        condition: AssertCondition::SupplyEquals { amount },
    }
}

impl Scenario {
    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "lifecycle" => Ok(Self::lifecycle()),
            "replay" => Ok(Self::replay()),
            "unauthorized" => Ok(Self::unauthorized()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    pub fn names() -> &'static [&'static str] {
        &["lifecycle", "replay", "unauthorized"]
    }

    /// Mint, transfer, replay, burn and overdraw on one asset.
    fn lifecycle() -> Self {
        Self {
            name: "lifecycle".to_string(),
            description: "Mint, transfer and burn with a replay and an overdraw".to_string(),
            steps: vec![
                mint("alice", "t1", 100, Expect::Success),
                supply(100),
                balance("alice", 100),
                mint("alice", "t2", 50, Expect::Success),
                supply(150),
                balance("alice", 150),
                transfer("alice", "bob", "t3", 50, Expect::Success),
                balance("alice", 100),
                balance("bob", 50),
                supply(150),
                transfer("alice", "bob", "t3", 50, Expect::rejected("DUPLICATE_TRANSACTION")),
                balance("alice", 100),
                balance("bob", 50),
                burn("alice", "t4", 30, Expect::Success),
                supply(120),
                balance("alice", 70),
                transfer("bob", "alice", "t5", 1000, Expect::rejected("INSUFFICIENT_BALANCE")),
                balance("bob", 50),
                ScenarioStep::Assert {
                    condition: AssertCondition::SupplyBalanced,
                },
            ],
        }
    }

    /// Every operation replayed under its original transaction id.
    fn replay() -> Self {
        Self {
            name: "replay".to_string(),
            description: "Replayed operations apply exactly once, sequentially or concurrently".to_string(),
            steps: vec![
                mint("alice", "m1", 500, Expect::Success),
                mint("alice", "m1", 500, Expect::rejected("DUPLICATE_TRANSACTION")),
                mint("alice", "m1", 1, Expect::rejected("DUPLICATE_TRANSACTION")),
                transfer("alice", "bob", "x1", 200, Expect::Success),
                transfer("alice", "bob", "x1", 200, Expect::rejected("DUPLICATE_TRANSACTION")),
                burn("bob", "b1", 100, Expect::Success),
                burn("bob", "b1", 100, Expect::rejected("DUPLICATE_TRANSACTION")),
                ScenarioStep::ConcurrentMint {
                    owner: "carol".to_string(),
                    txn_id: "m2".to_string(),
                    amount: 25,
                    copies: 8,
                },
                balance("alice", 300),
                balance("bob", 100),
                balance("carol", 25),
                supply(425),
                ScenarioStep::Assert {
                    condition: AssertCondition::TransactionCount {
                        kind: "MINTTX".to_string(),
                        count: 2,
                    },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::SupplyBalanced,
                },
            ],
        }
    }

    /// Unauthorized and malformed operations leave no trace.
    fn unauthorized() -> Self {
        Self {
            name: "unauthorized".to_string(),
            description: "Outsiders cannot mint or burn, bad amounts are refused".to_string(),
            steps: vec![
                ScenarioStep::Mint {
                    owner: "alice".to_string(),
                    txn_id: "u1".to_string(),
                    amount: 100,
                    authorized: false,
                    expect: Expect::rejected("UNAUTHORIZED"),
                },
                mint("alice", "u2", 0, Expect::rejected("VALIDATION_ERROR")),
                mint("alice", "u3", -10, Expect::rejected("VALIDATION_ERROR")),
                supply(0),
                mint("alice", "u4", 100, Expect::Success),
                ScenarioStep::Burn {
                    owner: "alice".to_string(),
                    txn_id: "u5".to_string(),
                    amount: 10,
                    authorized: false,
                    expect: Expect::rejected("UNAUTHORIZED"),
                },
                burn("alice", "u6", -1, Expect::rejected("VALIDATION_ERROR")),
                burn("alice", "u7", 500, Expect::rejected("INSUFFICIENT_BALANCE")),
                transfer("alice", "alice", "u8", 40, Expect::Success),
                balance("alice", 100),
                supply(100),
                ScenarioStep::Assert {
                    condition: AssertCondition::SupplyBalanced,
                },
            ],
        }
    }
}
