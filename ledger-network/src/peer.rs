use crate::config::{EndorsementMode, PeerConfig};
use ledger_common::{Endorsement, ErrorDetail, PeerRef, PeerResponse, TransactionRequest};

use bytes::Bytes;
use log::trace;
use serde_json::{json, Value};

pub const UNAVAILABLE_STATUS: u32 = 14;

pub struct Peer {
    name: PeerRef,
    mode: EndorsementMode,
    commit_code: String,
}

impl Peer {
    pub fn new(config: &PeerConfig) -> Self {
        Self {
            name: PeerRef::new(config.name.as_str()),
            mode: config.endorsement.clone(),
            commit_code: config.commit_code.clone(),
        }
    }

    pub fn peer(&self) -> &PeerRef {
        &self.name
    }

    pub fn commit_code(&self) -> &str {
        &self.commit_code
    }

    pub fn is_reachable(&self) -> bool {
        self.mode != EndorsementMode::Unreachable
    }

    pub fn endorse(&self, request: &TransactionRequest) -> PeerResponse {
        trace!(
            "{} simulating {}:{} for {}",
            self.name,
            request.chaincode_id,
            request.function_name,
            request.transaction_id
        );
        match &self.mode {
            EndorsementMode::Echo => self.endorsed(echo_payload(request)),
            EndorsementMode::Payload { payload } => self.endorsed(payload.clone()),
            EndorsementMode::Error { status, message } => self.failed(*status, message),
            EndorsementMode::Unreachable => {
                self.failed(UNAVAILABLE_STATUS, &format!("failed to connect to {}", self.name))
            }
        }
    }

    fn endorsed(&self, payload: String) -> PeerResponse {
        PeerResponse::Endorsed(Endorsement {
            peer: self.name.clone(),
            status: 200,
            message: "OK".to_string(),
            payload: Bytes::from(payload),
        })
    }

    fn failed(&self, status: u32, message: &str) -> PeerResponse {
        PeerResponse::Failed(ErrorDetail {
            peer: self.name.clone(),
            status,
            message: message.to_string(),
        })
    }
}

fn echo_payload(request: &TransactionRequest) -> String {
    let args: Vec<Value> = request
        .arguments
        .iter()
        .map(|arg| serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone())))
        .collect();
    json!({ "function": request.function_name, "args": args }).to_string()
}
