//! Invocation payloads and response envelope.
//!
//! Payload field names follow the JSON documents submitted by existing
//! clients (`Id`, `UserId`, `TxnId`, ...). Amounts arrive as signed
//! integers and are checked for positivity when converted to requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tokenledger_common::{
    Amount, AssetId, BurnRequest, LedgerError, MintRequest, OrgId, OwnerId, Result,
    TransferRequest, TxnId,
};

fn optional_org(name: Option<String>) -> Option<OrgId> {
    name.filter(|n| !n.is_empty()).map(OrgId::new)
}

/// Mint payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintPayload {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "UserId")]
    pub user_id: String,
    #[serde(rename = "TxnId")]
    pub txn_id: String,
    #[serde(rename = "Amount")]
    pub amount: i64,
    #[serde(rename = "OrgName", default, skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    /// Ignored; the stored kind is derived from the operation.
    #[serde(rename = "DocType", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
}

impl MintPayload {
    /// Convert to a validated request.
    pub fn into_request(self) -> Result<MintRequest> {
        let request = MintRequest {
            asset_id: AssetId::new(self.id),
            owner: OwnerId::new(self.user_id),
            txn_id: TxnId::new(self.txn_id),
            amount: Amount::positive(self.amount, "Amount")?,
            org_name: optional_org(self.org_name),
        };
        request.validate()?;
        Ok(request)
    }
}

/// Transfer payload. `UserId` is the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPayload {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "UserId")]
    pub user_id: String,
    #[serde(rename = "Receiver")]
    pub receiver: String,
    #[serde(rename = "TxnId")]
    pub txn_id: String,
    #[serde(rename = "Amount")]
    pub amount: i64,
    #[serde(rename = "DocType", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
}

impl TransferPayload {
    pub fn into_request(self) -> Result<TransferRequest> {
        let request = TransferRequest {
            asset_id: AssetId::new(self.id),
            sender: OwnerId::new(self.user_id),
            receiver: OwnerId::new(self.receiver),
            txn_id: TxnId::new(self.txn_id),
            amount: Amount::positive(self.amount, "Amount")?,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Burn payload. `BurnTokenId` names the owner whose balance is burned,
/// `UserId` the user asking for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnPayload {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "UserId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "BurnTokenId")]
    pub burn_token_id: String,
    #[serde(rename = "BurnTokenAmount")]
    pub burn_token_amount: i64,
    #[serde(rename = "TxnId")]
    pub txn_id: String,
    #[serde(rename = "OrgName", default, skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    #[serde(rename = "DocType", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
}

impl BurnPayload {
    pub fn into_request(self) -> Result<BurnRequest> {
        let request = BurnRequest {
            asset_id: AssetId::new(self.id),
            owner: OwnerId::new(self.burn_token_id),
            txn_id: TxnId::new(self.txn_id),
            amount: Amount::positive(self.burn_token_amount, "BurnTokenAmount")?,
            requested_by: self.user_id.filter(|u| !u.is_empty()).map(OwnerId::new),
            org_name: optional_org(self.org_name),
        };
        request.validate()?;
        Ok(request)
    }
}

/// Invocation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Rejected,
    Failed,
}

/// Response envelope returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub status: ResponseStatus,
    pub message: String,
    /// Host transaction id of the invocation.
    pub txid: String,
    /// Stable error code for rejections and failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl InvocationResponse {
    /// Successful invocation.
    pub fn success(txid: impl Into<String>, message: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            txid: txid.into(),
            code: None,
            payload,
        }
    }

    /// Invocation that ended in an error. Store failures are reported as
    /// `Failed`, everything else as `Rejected`.
    pub fn from_error(txid: impl Into<String>, error: &LedgerError) -> Self {
        let status = match error {
            LedgerError::Store(_) => ResponseStatus::Failed,
            _ => ResponseStatus::Rejected,
        };
        Self {
            status,
            message: error.to_string(),
            txid: txid.into(),
            code: Some(error.error_code().to_string()),
            payload: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_payload_field_names() {
        let payload: MintPayload = serde_json::from_str(
            r#"{"Id":"TOKEN1","UserId":"alice","TxnId":"t1","Amount":100,"OrgName":"Org1MSP","DocType":"MINTTX"}"#,
        )
        .unwrap();
        let request = payload.into_request().unwrap();

        assert_eq!(request.asset_id, AssetId::new("TOKEN1"));
        assert_eq!(request.owner, OwnerId::new("alice"));
        assert_eq!(request.amount, Amount::new(100));
        assert_eq!(request.org_name, Some(OrgId::new("Org1MSP")));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let payload: TransferPayload = serde_json::from_str(
            r#"{"Id":"TOKEN1","UserId":"alice","Receiver":"bob","TxnId":"t3","Amount":-5}"#,
        )
        .unwrap();
        let err = payload.into_request().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_burn_payload_maps_owner_and_requester() {
        let payload: BurnPayload = serde_json::from_str(
            r#"{"Id":"TOKEN1","UserId":"admin","BurnTokenId":"alice","BurnTokenAmount":30,"TxnId":"t4"}"#,
        )
        .unwrap();
        let request = payload.into_request().unwrap();

        assert_eq!(request.owner, OwnerId::new("alice"));
        assert_eq!(request.requested_by, Some(OwnerId::new("admin")));
        assert_eq!(request.amount, Amount::new(30));
    }

    #[test]
    fn test_error_envelope() {
        let err = LedgerError::AssetNotFound(AssetId::new("NOPE"));
        let response = InvocationResponse::from_error("tx-1", &err);

        assert_eq!(response.status, ResponseStatus::Rejected);
        assert_eq!(response.code.as_deref(), Some("ASSET_NOT_FOUND"));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "REJECTED");
        assert_eq!(json["txid"], "tx-1");
        assert!(json.get("payload").is_none());
    }
}
