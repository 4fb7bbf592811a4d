mod error;
mod ledger;
mod message;
mod session;
mod txid;

pub use error::{ChannelError, SubmissionError};
pub use ledger::{BlockInfo, ChaincodeInfo, ChannelInfo, TransactionInfo};
pub use message::{
    CommitOutcome, Endorsement, ErrorDetail, OrderingOutcome, OrderingRequest, PeerRef,
    PeerResponse, Proposal, ProposalResult, SubmissionOutcome, SubmissionResult,
    TransactionRequest, TxEvent, ORDERING_SUCCESS, ORDERING_TIMEOUT, VALID,
};
pub use session::{
    ChannelHandle, ClientSession, EventSource, SessionProvider, Subscription, SubscriptionSink,
};
pub use txid::TransactionId;
