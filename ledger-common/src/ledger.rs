use crate::TransactionId;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub number: u64,
    pub previous_hash: String,
    pub data_hash: String,
    pub transactions: Vec<TransactionId>,
}

/// A committed transaction as seen by one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub transaction_id: TransactionId,
    pub block_number: u64,
    pub validation_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub height: u64,
    pub current_block_hash: String,
    pub previous_block_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeInfo {
    pub name: String,
    pub version: String,
    pub path: String,
}
