//! Simulation controller.

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use tokenledger_common::{
    Amount, AssetId, BurnRequest, LedgerError, MintRequest, TransferRequest, TxnId, TxnKind,
};
use tokenledger_contract::{ContractConfig, Outcome, TokenContract};
use tokenledger_ledger::{Caller, MemoryStore, SupplyAudit};
use tokenledger_protocol::{Invocation, InvocationResponse};

use crate::holder::{HolderFactory, SimulatedHolder};
use crate::metrics::SimulationMetrics;
use crate::scenario::{AssertCondition, Expect, Scenario, ScenarioStep};

/// Asset every simulation trades in.
pub const SIM_ASSET: &str = "SIMTOKEN";

/// Drives scenarios and random workloads against one contract instance.
pub struct SimulationController {
    asset_id: AssetId,
    contract: Arc<TokenContract<MemoryStore>>,
    issuer: Caller,
    outsider: Caller,
    /// Shared with worker tasks.
    holders: Arc<Vec<SimulatedHolder>>,
    /// Seeds worker generators.
    rng: Arc<Mutex<StdRng>>,
    metrics: Arc<RwLock<SimulationMetrics>>,
    /// Supply the ledger should report.
    expected_supply: Arc<RwLock<u64>>,
}

impl SimulationController {
    pub fn new(config: ContractConfig, holder_count: usize, seed: Option<u64>) -> anyhow::Result<Self> {
        if holder_count < 2 {
            anyhow::bail!("At least 2 holders are required, got {}", holder_count);
        }

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let issuer = HolderFactory::issuer(&config.ledger);
        let contract = TokenContract::new(config, Arc::new(MemoryStore::new()))?;

        Ok(Self {
            asset_id: AssetId::new(SIM_ASSET),
            contract: Arc::new(contract),
            issuer,
            outsider: HolderFactory::outsider(),
            holders: Arc::new(HolderFactory::create_holders(holder_count)),
            rng: Arc::new(Mutex::new(rng)),
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
            expected_supply: Arc::new(RwLock::new(0)),
        })
    }

    pub fn contract(&self) -> &TokenContract<MemoryStore> {
        &self.contract
    }

    /// Mint `initial_balance` to every holder.
    pub async fn initialize(&self, initial_balance: u64) -> anyhow::Result<()> {
        info!(
            holders = self.holders.len(),
            initial_balance, "Seeding holder balances"
        );

        for holder in self.holders.iter() {
            let request = MintRequest::new(
                self.asset_id.clone(),
                holder.id.clone(),
                format!("seed-{}", holder.id),
                initial_balance,
            );
            let submission = self.contract.submit(&self.issuer, &Invocation::Mint(request));
            submission.result?;

            holder.credit(initial_balance).await;
            *self.expected_supply.write().await += initial_balance;
            info!(holder = %holder.id, name = %holder.name, "Holder seeded");
        }

        Ok(())
    }

    /// Run a scripted scenario, failing on the first unmet expectation.
    pub async fn run_scenario(&self, scenario: Scenario) -> anyhow::Result<()> {
        info!(name = %scenario.name, description = %scenario.description, "Running scenario");

        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(step)
                .await
                .map_err(|e| anyhow::anyhow!("{} step {}: {}", scenario.name, index + 1, e))?;
        }

        info!(name = %scenario.name, steps = scenario.steps.len(), "Scenario passed");
        Ok(())
    }

    /// Random transfers and burns from `concurrency` workers, each running
    /// `operations / concurrency` of them.
    pub async fn run_random(&self, operations: usize, concurrency: usize) -> anyhow::Result<()> {
        let concurrency = concurrency.max(1);
        let per_worker = operations / concurrency;
        info!(operations, concurrency, "Running random workload");

        let mut workers = Vec::with_capacity(concurrency);
        for worker in 0..concurrency {
            let seed = self.rng.lock().await.gen::<u64>();
            let context = WorkerContext {
                worker,
                asset_id: self.asset_id.clone(),
                contract: self.contract.clone(),
                issuer: self.issuer.clone(),
                holders: self.holders.clone(),
                metrics: self.metrics.clone(),
                expected_supply: self.expected_supply.clone(),
            };
            workers.push(tokio::spawn(context.run(StdRng::seed_from_u64(seed), per_worker)));
        }

        for result in try_join_all(workers).await? {
            result?;
        }

        Ok(())
    }

    /// Compare ledger state with the shadow balances and supply.
    pub async fn audit(&self) -> anyhow::Result<SupplyAudit> {
        let audit = match self.query(Invocation::AuditSupply(self.asset_id.clone()))? {
            Outcome::Audit(audit) => audit,
            other => anyhow::bail!("Unexpected audit outcome: {:?}", other),
        };

        if !audit.is_balanced() {
            anyhow::bail!(
                "Supply {} does not match balances {}",
                audit.total_supply,
                audit.sum_of_balances
            );
        }

        let expected_supply = *self.expected_supply.read().await;
        if audit.total_supply != Amount::new(expected_supply) {
            anyhow::bail!("Supply {} but expected {}", audit.total_supply, expected_supply);
        }

        for holder in self.holders.iter() {
            let actual = self.balance(&holder.id.to_string())?;
            let expected = holder.expected_balance().await;
            if i128::from(actual) != expected {
                anyhow::bail!("Holder {} has {} but expected {}", holder.id, actual, expected);
            }
            info!(
                holder = %holder.id,
                balance = actual,
                sent = holder.sent_count().await,
                received = holder.received_count().await,
                "Holder audited"
            );
        }

        Ok(audit)
    }

    /// Get simulation metrics.
    pub fn get_metrics(&self) -> SimulationMetrics {
        futures::executor::block_on(async { self.metrics.read().await.clone() })
    }

    async fn execute_step(&self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::Mint {
                owner,
                txn_id,
                amount,
                authorized,
                expect,
            } => {
                let payload = json!({"Id": self.asset_id, "UserId": owner, "TxnId": txn_id, "Amount": amount});
                let response = self.raw(self.caller_for(*authorized), "Mint", payload);
                check(expect, &response)
            }
            ScenarioStep::Transfer {
                from,
                to,
                txn_id,
                amount,
                expect,
            } => {
                let payload = json!({"Id": self.asset_id, "UserId": from, "Receiver": to, "TxnId": txn_id, "Amount": amount});
                let caller = Caller::new(from.clone()).with_msp("HolderMSP");
                let response = self.raw(&caller, "Transfer", payload);
                check(expect, &response)
            }
            ScenarioStep::Burn {
                owner,
                txn_id,
                amount,
                authorized,
                expect,
            } => {
                let payload = json!({"Id": self.asset_id, "UserId": "issuer-admin", "BurnTokenId": owner, "BurnTokenAmount": amount, "TxnId": txn_id});
                let response = self.raw(self.caller_for(*authorized), "Burn", payload);
                check(expect, &response)
            }
            ScenarioStep::ConcurrentMint {
                owner,
                txn_id,
                amount,
                copies,
            } => {
                let submissions = (0..*copies).map(|_| {
                    let contract = self.contract.clone();
                    let issuer = self.issuer.clone();
                    let request = MintRequest::new(
                        self.asset_id.clone(),
                        owner.as_str(),
                        txn_id.as_str(),
                        *amount,
                    );
                    tokio::task::spawn_blocking(move || {
                        contract.submit(&issuer, &Invocation::Mint(request)).result
                    })
                });

                let mut applied = 0;
                for result in try_join_all(submissions).await? {
                    match result {
                        Ok(_) => applied += 1,
                        Err(LedgerError::DuplicateTransaction { .. }) => {}
                        Err(e) => anyhow::bail!("concurrent mint failed: {}", e),
                    }
                }
                if applied != 1 {
                    anyhow::bail!("{} of {} concurrent copies applied", applied, copies);
                }
                Ok(())
            }
            ScenarioStep::Assert { condition } => self.assert(condition),
        }
    }

    fn assert(&self, condition: &AssertCondition) -> anyhow::Result<()> {
        match condition {
            AssertCondition::BalanceEquals { holder, amount } => {
                let actual = self.balance(holder)?;
                if actual != *amount {
                    anyhow::bail!("balance of {} is {}, expected {}", holder, actual, amount);
                }
            }
            AssertCondition::SupplyEquals { amount } => {
                let actual = match self.query(Invocation::AuditSupply(self.asset_id.clone()))? {
                    Outcome::Audit(audit) => audit.total_supply,
                    other => anyhow::bail!("unexpected outcome: {:?}", other),
                };
                if actual != Amount::new(*amount) {
                    anyhow::bail!("supply is {}, expected {}", actual, amount);
                }
            }
            AssertCondition::SupplyBalanced => {
                match self.query(Invocation::AuditSupply(self.asset_id.clone()))? {
                    Outcome::Audit(audit) if audit.is_balanced() => {}
                    other => anyhow::bail!("supply not balanced: {:?}", other),
                }
            }
            AssertCondition::TransactionCount { kind, count } => {
                let kind: TxnKind = kind.parse()?;
                match self.query(Invocation::QueryByKind(kind))? {
                    Outcome::Transactions(records) if records.len() == *count => {}
                    other => anyhow::bail!("expected {} {} record(s), got {:?}", count, kind, other),
                }
            }
        }
        Ok(())
    }

    fn caller_for(&self, authorized: bool) -> &Caller {
        if authorized {
            &self.issuer
        } else {
            &self.outsider
        }
    }

    fn raw(&self, caller: &Caller, function: &str, payload: serde_json::Value) -> InvocationResponse {
        self.contract.invoke_raw(caller, function, &[payload.to_string()])
    }

    fn query(&self, invocation: Invocation) -> anyhow::Result<Outcome> {
        Ok(self.contract.submit(&self.issuer, &invocation).result?)
    }

    fn balance(&self, holder: &str) -> anyhow::Result<u64> {
        let invocation = Invocation::GetBalance {
            owner: holder.into(),
            asset_id: self.asset_id.clone(),
        };
        match self.query(invocation)? {
            Outcome::Balance { amount, .. } => Ok(amount.value()),
            other => anyhow::bail!("unexpected outcome: {:?}", other),
        }
    }
}

fn check(expect: &Expect, response: &InvocationResponse) -> anyhow::Result<()> {
    match (expect, response.code.as_deref()) {
        (Expect::Success, None) if response.is_success() => Ok(()),
        (Expect::Rejected(code), Some(actual)) if code == actual => Ok(()),
        _ => anyhow::bail!(
            "expected {:?}, got {:?} {:?}: {}",
            expect,
            response.status,
            response.code,
            response.message
        ),
    }
}

/// State moved into one random-workload task.
struct WorkerContext {
    worker: usize,
    asset_id: AssetId,
    contract: Arc<TokenContract<MemoryStore>>,
    issuer: Caller,
    holders: Arc<Vec<SimulatedHolder>>,
    metrics: Arc<RwLock<SimulationMetrics>>,
    expected_supply: Arc<RwLock<u64>>,
}

impl WorkerContext {
    async fn run(self, mut rng: StdRng, operations: usize) -> anyhow::Result<()> {
        for i in 0..operations {
            let from = rng.gen_range(0..self.holders.len());
            let to = rng.gen_range(0..self.holders.len());
            let amount = rng.gen_range(1..=250u64);
            let burning = rng.gen_bool(0.05);
            let txn_id = TxnId::new(format!("sim-{}-{}", self.worker, i));

            let sender = &self.holders[from];
            let (caller, invocation) = if burning {
                let request = BurnRequest::new(
                    self.asset_id.clone(),
                    sender.id.clone(),
                    txn_id.clone(),
                    amount,
                );
                (self.issuer.clone(), Invocation::Burn(request))
            } else {
                let request = TransferRequest::new(
                    self.asset_id.clone(),
                    sender.id.clone(),
                    self.holders[to].id.clone(),
                    txn_id.clone(),
                    amount,
                );
                (sender.caller.clone(), Invocation::Transfer(request))
            };

            let contract = self.contract.clone();
            let started = Instant::now();
            let submission =
                tokio::task::spawn_blocking(move || contract.submit(&caller, &invocation)).await?;
            let latency_us = started.elapsed().as_micros() as u64;

            match submission.result {
                Ok(_) => {
                    sender.debit(amount).await;
                    sender.record_sent(txn_id.clone()).await;
                    if burning {
                        *self.expected_supply.write().await -= amount;
                    } else {
                        self.holders[to].credit(amount).await;
                        self.holders[to].record_received(txn_id).await;
                    }
                    self.metrics
                        .write()
                        .await
                        .record_commit(latency_us, submission.attempts);
                }
                Err(LedgerError::InsufficientBalance { .. }) => {
                    self.metrics.write().await.record_rejection();
                }
                Err(e) => {
                    warn!(worker = self.worker, txn_id = %txn_id, error = %e, "Operation failed");
                    self.metrics.write().await.record_failure();
                }
            }
        }

        Ok(())
    }
}
