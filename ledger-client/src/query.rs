use crate::classifier::classify;
use ledger_common::{ChannelHandle, SubmissionError, TransactionRequest};

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use serde_json::Value;
use tokio::time;

pub const HISTORY_FUNCTION: &str = "queryHistoryForKey";

pub struct ChaincodeQuery {
    channel: Arc<dyn ChannelHandle>,
    timeout: Duration,
}

impl ChaincodeQuery {
    pub fn new(channel: Arc<dyn ChannelHandle>, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    pub async fn evaluate(&self, request: &TransactionRequest) -> Result<Vec<Value>, SubmissionError> {
        let function = &request.function_name;
        let result = time::timeout(self.timeout, self.channel.send_proposal(request, self.timeout))
            .await
            .map_err(|_| {
                SubmissionError::ProposalSend(format!("no query response within {:?}", self.timeout))
            })?
            .map_err(|err| SubmissionError::ProposalSend(err.to_string()))?;

        if result.responses.is_empty() {
            error!("queryChaincode - fcn: {function}. No responses returned from peers");
            return Err(SubmissionError::ProposalUnavailable);
        }

        let classified = classify(result.responses)?;
        for (i, endorsement) in classified.valid.iter().enumerate() {
            info!(
                "Query result from peer [{i}] {}: {}",
                endorsement.peer,
                endorsement.payload_str()
            );
        }

        // Only the first valid response is used.
        let first = &classified.valid[0];
        let json: Value = serde_json::from_slice(&first.payload)
            .map_err(|err| SubmissionError::MalformedPayload(err.to_string()))?;
        Ok(unwrap_payload(function, json))
    }
}

/// Strips the ledger key wrapper from list results. History queries keep the
/// whole payload since it carries transaction ids and timestamps.
pub fn unwrap_payload(function: &str, json: Value) -> Vec<Value> {
    match json {
        Value::Array(items) if function == HISTORY_FUNCTION => vec![Value::Array(items)],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(mut fields) => match fields.remove("Record") {
                    Some(record) if is_truthy(&record) => record,
                    Some(record) => {
                        fields.insert("Record".to_string(), record);
                        Value::Object(fields)
                    }
                    None => Value::Object(fields),
                },
                other => other,
            })
            .collect(),
        other => vec![other],
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
