//! Function-name dispatch of raw invocations.

use thiserror::Error;

use tokenledger_common::{
    AssetId, BurnRequest, DocType, LedgerError, MintRequest, OwnerId, TransferRequest, TxnId, TxnKind,
};

use crate::messages::{BurnPayload, MintPayload, TransferPayload};

/// Malformed invocation.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        function: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Malformed {function} payload: {source}")]
    Payload {
        function: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ProtocolError> for LedgerError {
    fn from(err: ProtocolError) -> Self {
        let field = match &err {
            ProtocolError::UnknownFunction(_) => "function",
            ProtocolError::ArgumentCount { .. } | ProtocolError::Payload { .. } => "args",
        };
        LedgerError::Validation {
            message: err.to_string(),
            field: Some(field.to_string()),
        }
    }
}

/// A parsed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Mint(MintRequest),
    Transfer(TransferRequest),
    Burn(BurnRequest),
    GetBalance { owner: OwnerId, asset_id: AssetId },
    QueryByKind(TxnKind),
    /// Every owner balance record, across assets.
    AllOwners,
    HistoryOf(AssetId),
    Holders(AssetId),
    AuditSupply(AssetId),
    GetAsset(AssetId),
    GetTransaction { txn_id: TxnId, asset_id: AssetId },
}

impl Invocation {
    /// Parse a function name and its string arguments.
    ///
    /// Mint, Transfer and Burn take one JSON document. `GetBalance` takes
    /// the owner then the asset id; `GetTransaction` the txn id then the
    /// asset id. `GetQuery` is accepted as an alias of `QueryByKind`,
    /// `GetAssetHistory` of `HistoryOf`. `GetAllOwners` takes a doc type:
    /// `OWNER` lists balance records, a transaction kind falls back to
    /// `QueryByKind`.
    pub fn parse<S: AsRef<str>>(function: &str, args: &[S]) -> Result<Self, LedgerError> {
        let args: Vec<&str> = args.iter().map(|arg| arg.as_ref()).collect();

        let invocation = match function {
            "Mint" => {
                let payload: MintPayload = json_arg("Mint", &args)?;
                Invocation::Mint(payload.into_request()?)
            }
            "Transfer" => {
                let payload: TransferPayload = json_arg("Transfer", &args)?;
                Invocation::Transfer(payload.into_request()?)
            }
            "Burn" => {
                let payload: BurnPayload = json_arg("Burn", &args)?;
                Invocation::Burn(payload.into_request()?)
            }
            "GetBalance" => {
                let [owner, asset_id] = exact::<2>("GetBalance", &args)?;
                Invocation::GetBalance {
                    owner: checked(OwnerId::new(owner), "owner", OwnerId::validate)?,
                    asset_id: checked(AssetId::new(asset_id), "asset_id", AssetId::validate)?,
                }
            }
            "QueryByKind" | "GetQuery" => {
                let [kind] = exact::<1>("QueryByKind", &args)?;
                Invocation::QueryByKind(kind.parse()?)
            }
            "GetAllOwners" => {
                let [doc_type] = exact::<1>("GetAllOwners", &args)?;
                if doc_type == DocType::Owner.as_str() {
                    Invocation::AllOwners
                } else {
                    Invocation::QueryByKind(doc_type.parse()?)
                }
            }
            "HistoryOf" | "GetAssetHistory" => {
                let [asset_id] = exact::<1>("HistoryOf", &args)?;
                Invocation::HistoryOf(checked(AssetId::new(asset_id), "asset_id", AssetId::validate)?)
            }
            "GetHolders" => {
                let [asset_id] = exact::<1>("GetHolders", &args)?;
                Invocation::Holders(checked(AssetId::new(asset_id), "asset_id", AssetId::validate)?)
            }
            "AuditSupply" => {
                let [asset_id] = exact::<1>("AuditSupply", &args)?;
                Invocation::AuditSupply(checked(AssetId::new(asset_id), "asset_id", AssetId::validate)?)
            }
            "GetAsset" => {
                let [asset_id] = exact::<1>("GetAsset", &args)?;
                Invocation::GetAsset(checked(AssetId::new(asset_id), "asset_id", AssetId::validate)?)
            }
            "GetTransaction" => {
                let [txn_id, asset_id] = exact::<2>("GetTransaction", &args)?;
                Invocation::GetTransaction {
                    txn_id: checked(TxnId::new(txn_id), "txn_id", TxnId::validate)?,
                    asset_id: checked(AssetId::new(asset_id), "asset_id", AssetId::validate)?,
                }
            }
            other => return Err(ProtocolError::UnknownFunction(other.to_string()).into()),
        };
        Ok(invocation)
    }

    /// Function name, as logged and counted.
    pub fn name(&self) -> &'static str {
        match self {
            Invocation::Mint(_) => "Mint",
            Invocation::Transfer(_) => "Transfer",
            Invocation::Burn(_) => "Burn",
            Invocation::GetBalance { .. } => "GetBalance",
            Invocation::QueryByKind(_) => "QueryByKind",
            Invocation::AllOwners => "GetAllOwners",
            Invocation::HistoryOf(_) => "HistoryOf",
            Invocation::Holders(_) => "GetHolders",
            Invocation::AuditSupply(_) => "AuditSupply",
            Invocation::GetAsset(_) => "GetAsset",
            Invocation::GetTransaction { .. } => "GetTransaction",
        }
    }

    /// Kind of state change, `None` for queries.
    pub fn txn_kind(&self) -> Option<TxnKind> {
        match self {
            Invocation::Mint(_) => Some(TxnKind::Mint),
            Invocation::Transfer(_) => Some(TxnKind::Transfer),
            Invocation::Burn(_) => Some(TxnKind::Burn),
            _ => None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.txn_kind().is_none()
    }
}

fn exact<'a, const N: usize>(function: &'static str, args: &[&'a str]) -> Result<[&'a str; N], ProtocolError> {
    <[&str; N]>::try_from(args).map_err(|_| ProtocolError::ArgumentCount {
        function,
        expected: N,
        actual: args.len(),
    })
}

fn json_arg<T: serde::de::DeserializeOwned>(function: &'static str, args: &[&str]) -> Result<T, ProtocolError> {
    let [document] = exact::<1>(function, args)?;
    serde_json::from_str(document).map_err(|source| ProtocolError::Payload { function, source })
}

fn checked<T>(
    value: T,
    field: &'static str,
    validate: impl FnOnce(&T, &'static str) -> tokenledger_common::Result<()>,
) -> Result<T, LedgerError> {
    validate(&value, field)?;
    Ok(value)
}
