use ledger_common::{BlockInfo, ChannelInfo, OrderingOutcome, OrderingRequest, TransactionId};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};
use tokio::sync::{
    mpsc::{Receiver, Sender},
    oneshot,
};

pub const CHANNEL_CAPACITY: usize = 1000;

pub type OrderingJob = (OrderingRequest, oneshot::Sender<OrderingOutcome>);
pub type OrderingSender = Sender<OrderingJob>;
pub type OrderingReceiver = Receiver<OrderingJob>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvent {
    pub block_number: u64,
    pub transactions: Vec<TransactionId>,
}

#[derive(Debug)]
struct Ledger {
    blocks: Vec<BlockInfo>,
    index: HashMap<TransactionId, u64>,
}

/// The chain as cut by the orderer. Written before a block is broadcast, so a
/// late subscriber can still learn the outcome.
#[derive(Debug, Clone)]
pub struct CommitLog(Arc<RwLock<Ledger>>);

impl Default for CommitLog {
    fn default() -> Self {
        let genesis = BlockInfo {
            number: 0,
            previous_hash: String::new(),
            data_hash: data_hash(&[]),
            transactions: Vec::new(),
        };
        Self(Arc::new(RwLock::new(Ledger {
            blocks: vec![genesis],
            index: HashMap::new(),
        })))
    }
}

impl CommitLog {
    pub fn record(&self, block: &BlockEvent) {
        let mut ledger = self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous_hash = ledger.blocks.last().map(block_hash).unwrap_or_default();
        for tx_id in &block.transactions {
            ledger.index.insert(tx_id.clone(), block.block_number);
        }
        ledger.blocks.push(BlockInfo {
            number: block.block_number,
            previous_hash,
            data_hash: data_hash(&block.transactions),
            transactions: block.transactions.clone(),
        });
    }

    pub fn block_of(&self, tx_id: &TransactionId) -> Option<u64> {
        let ledger = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        ledger.index.get(tx_id).copied()
    }

    pub fn block(&self, number: u64) -> Option<BlockInfo> {
        let ledger = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        ledger.blocks.iter().find(|block| block.number == number).cloned()
    }

    pub fn info(&self) -> ChannelInfo {
        let ledger = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (current_block_hash, previous_block_hash) = match ledger.blocks.last() {
            Some(last) => (block_hash(last), last.previous_hash.clone()),
            None => (String::new(), String::new()),
        };
        ChannelInfo {
            height: ledger.blocks.len() as u64,
            current_block_hash,
            previous_block_hash,
        }
    }
}

pub fn block_hash(block: &BlockInfo) -> String {
    let mut hasher = Sha256::new();
    hasher.update(block.number.to_be_bytes());
    hasher.update(block.previous_hash.as_bytes());
    hasher.update(block.data_hash.as_bytes());
    hex::encode(hasher.finalize())
}

fn data_hash(transactions: &[TransactionId]) -> String {
    let mut hasher = Sha256::new();
    for tx_id in transactions {
        hasher.update(tx_id.as_str().as_bytes());
    }
    hex::encode(hasher.finalize())
}
