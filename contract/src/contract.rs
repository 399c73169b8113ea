//! Invocation boundary.
//!
//! Every invocation runs in its own store transaction: the contract opens a
//! view, dispatches to the ledger, and commits the view only when the
//! operation succeeded. A failed operation drops the view, so none of its
//! staged writes survive. Read-only invocations are never committed.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use tokenledger_common::{
    Amount, Asset, AssetId, HistoryEntry, LedgerError, OwnerBalance, OwnerId, Result, TransactionRecord,
};
use tokenledger_ledger::{
    CallerIdentity, Receipt, StateStore, SupplyAudit, TokenLedger, TransactionalStore,
};
use tokenledger_protocol::{Invocation, InvocationResponse};

use crate::config::ContractConfig;
use crate::metrics::{Metrics, SharedMetrics};

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Outcome {
    Applied(Receipt),
    Balance {
        asset_id: AssetId,
        owner: OwnerId,
        amount: Amount,
    },
    Transactions(Vec<TransactionRecord>),
    History(Vec<HistoryEntry>),
    Holders(Vec<OwnerBalance>),
    Audit(SupplyAudit),
    Asset(Option<Asset>),
    Transaction(Option<TransactionRecord>),
}

impl Outcome {
    /// Human-readable summary for the response envelope.
    pub fn message(&self) -> String {
        match self {
            Outcome::Applied(receipt) => format!(
                "{} {} of {} applied",
                receipt.record.kind.operation(),
                receipt.record.txn_id,
                receipt.record.asset_id
            ),
            Outcome::Balance { amount, .. } => format!("balance {}", amount),
            Outcome::Transactions(records) => format!("{} transaction(s)", records.len()),
            Outcome::History(entries) => format!("{} history entr(ies)", entries.len()),
            Outcome::Holders(holders) => format!("{} holder(s)", holders.len()),
            Outcome::Audit(audit) if audit.is_balanced() => "supply balanced".to_string(),
            Outcome::Audit(_) => "supply mismatch".to_string(),
            Outcome::Asset(Some(asset)) => format!("total supply {}", asset.total_supply),
            Outcome::Asset(None) => "asset not found".to_string(),
            Outcome::Transaction(Some(_)) => "transaction found".to_string(),
            Outcome::Transaction(None) => "transaction not found".to_string(),
        }
    }
}

/// Final result of a submitted invocation, after any conflict retries.
#[derive(Debug)]
pub struct Submission {
    /// Host transaction id of the last attempt.
    pub tx_id: String,
    pub attempts: u32,
    pub result: Result<Outcome>,
}

impl Submission {
    pub fn into_response(self) -> InvocationResponse {
        match self.result {
            Ok(outcome) => {
                let payload = encode_payload(&self.tx_id, &outcome);
                InvocationResponse::success(self.tx_id, outcome.message(), payload)
            }
            Err(e) => InvocationResponse::from_error(self.tx_id, &e),
        }
    }
}

/// Payload of a success envelope. The operation already committed, so an
/// encoding failure drops the payload but keeps the success status.
fn encode_payload<T: Serialize>(tx_id: &str, value: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(value) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(tx_id, error = %e, "Dropping unencodable response payload");
            None
        }
    }
}

/// Token contract hosted over a transactional store.
pub struct TokenContract<S: TransactionalStore> {
    config: ContractConfig,
    node_id: String,
    ledger: TokenLedger,
    store: Arc<S>,
    metrics: SharedMetrics,
}

impl<S: TransactionalStore> TokenContract<S> {
    /// Create a contract instance.
    pub fn new(config: ContractConfig, store: Arc<S>) -> Result<Self> {
        config.validate().map_err(LedgerError::invalid)?;
        let ledger = TokenLedger::new(config.ledger.clone())?;
        let node_id = config
            .node_id
            .clone()
            .unwrap_or_else(|| format!("contract-{}", Uuid::new_v4()));

        info!(
            node_id = %node_id,
            issuer_org = %config.ledger.issuer_org,
            burn_policy = %config.ledger.burn_policy,
            "Token contract ready"
        );

        Ok(Self {
            config,
            node_id,
            ledger,
            store,
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Run one invocation in the host transaction `tx_id`.
    ///
    /// Never retries: a commit conflict is returned as a retryable
    /// [`LedgerError::Store`] error.
    #[instrument(skip(self, caller, invocation), fields(function = invocation.name()))]
    pub fn invoke<C>(&self, tx_id: &str, caller: &C, invocation: &Invocation) -> Result<Outcome>
    where
        C: CallerIdentity + ?Sized,
    {
        let mut txn = self.store.begin(tx_id);
        let outcome = self.dispatch(&mut txn, caller, invocation)?;

        if !invocation.is_read_only() {
            let version = self.store.commit(txn)?;
            debug!(tx_id, version, "Invocation committed");
        }

        Ok(outcome)
    }

    /// Run an invocation, re-executing it from scratch in a fresh host
    /// transaction whenever its commit fails read-set validation.
    pub fn submit<C>(&self, caller: &C, invocation: &Invocation) -> Submission
    where
        C: CallerIdentity + ?Sized,
    {
        self.metrics.invocation_received();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let tx_id = Uuid::new_v4().to_string();
            let result = self.invoke(&tx_id, caller, invocation);

            match &result {
                Err(e) if e.is_retryable() && attempts <= self.config.max_commit_retries => {
                    self.metrics.commit_conflicted();
                    self.metrics.commit_retried();
                    warn!(
                        function = invocation.name(),
                        tx_id = %tx_id,
                        attempts,
                        error = %e,
                        "Commit conflict, re-executing"
                    );
                    continue;
                }
                Err(e) => {
                    if e.is_retryable() {
                        self.metrics.commit_conflicted();
                    }
                    self.metrics.invocation_errored(e);
                }
                Ok(_) if invocation.is_read_only() => self.metrics.query_served(),
                Ok(_) => self.metrics.invocation_committed(),
            }

            return Submission {
                tx_id,
                attempts,
                result,
            };
        }
    }

    /// Parse a raw function call, submit it and wrap the result in a
    /// response envelope.
    pub fn invoke_raw<C, A>(&self, caller: &C, function: &str, args: &[A]) -> InvocationResponse
    where
        C: CallerIdentity + ?Sized,
        A: AsRef<str>,
    {
        match Invocation::parse(function, args) {
            Ok(invocation) => self.submit(caller, &invocation).into_response(),
            Err(e) => {
                self.metrics.invocation_received();
                self.metrics.invocation_errored(&e);
                warn!(function, error = %e, "Malformed invocation");
                InvocationResponse::from_error(Uuid::new_v4().to_string(), &e)
            }
        }
    }

    fn dispatch<T, C>(&self, txn: &mut T, caller: &C, invocation: &Invocation) -> Result<Outcome>
    where
        T: StateStore + ?Sized,
        C: CallerIdentity + ?Sized,
    {
        let queries = self.ledger.queries();

        let outcome = match invocation {
            Invocation::Mint(request) => Outcome::Applied(self.ledger.mint(txn, caller, request)?),
            Invocation::Transfer(request) => {
                Outcome::Applied(self.ledger.transfer(txn, caller, request)?)
            }
            Invocation::Burn(request) => Outcome::Applied(self.ledger.burn(txn, caller, request)?),
            Invocation::GetBalance { owner, asset_id } => Outcome::Balance {
                amount: self.ledger.balance_of(&*txn, asset_id, owner)?,
                asset_id: asset_id.clone(),
                owner: owner.clone(),
            },
            Invocation::QueryByKind(kind) => Outcome::Transactions(
                queries.query_by_kind(&*txn, *kind)?.collect::<Result<_>>()?,
            ),
            Invocation::AllOwners => {
                Outcome::Holders(queries.all_owners(&*txn)?.collect::<Result<_>>()?)
            }
            Invocation::HistoryOf(asset_id) => {
                Outcome::History(queries.history_of(&*txn, asset_id)?.collect::<Result<_>>()?)
            }
            Invocation::Holders(asset_id) => Outcome::Holders(queries.holders(&*txn, asset_id)?),
            Invocation::AuditSupply(asset_id) => {
                let audit = queries.audit_supply(&*txn, asset_id)?;
                if !audit.is_balanced() {
                    warn!(
                        asset_id = %asset_id,
                        total_supply = %audit.total_supply,
                        sum_of_balances = %audit.sum_of_balances,
                        "Supply does not match holder balances"
                    );
                }
                Outcome::Audit(audit)
            }
            Invocation::GetAsset(asset_id) => Outcome::Asset(queries.asset(&*txn, asset_id)?),
            Invocation::GetTransaction { txn_id, asset_id } => {
                Outcome::Transaction(queries.transaction(&*txn, txn_id, asset_id)?)
            }
        };

        Ok(outcome)
    }
}
