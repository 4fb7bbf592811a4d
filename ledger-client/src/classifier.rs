use ledger_common::{Endorsement, ErrorDetail, PeerResponse, SubmissionError};

use log::{debug, warn};

/// Payload fragments a peer returns when chaincode execution failed.
pub const FAILURE_MARKERS: [&str; 2] = [
    "transaction returned with failure",
    "failed to execute transaction",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedResponses {
    pub valid: Vec<Endorsement>,
    pub errors: Vec<ErrorDetail>,
}

impl ClassifiedResponses {
    pub fn partition(responses: Vec<PeerResponse>) -> Self {
        let mut classified = Self::default();
        for response in responses {
            match response {
                PeerResponse::Failed(detail) => {
                    warn!("received error response from peer {}", detail);
                    classified.errors.push(detail);
                }
                PeerResponse::Endorsed(endorsement) => match failure_marker(&endorsement) {
                    Some(marker) => {
                        warn!(
                            "peer {} endorsed with a failure payload ({})",
                            endorsement.peer, marker
                        );
                        classified.errors.push(ErrorDetail {
                            message: endorsement.payload_str().into_owned(),
                            peer: endorsement.peer,
                            status: endorsement.status,
                        });
                    }
                    None => {
                        debug!("valid response from peer {}", endorsement.peer);
                        classified.valid.push(endorsement);
                    }
                },
            }
        }
        classified
    }

    pub fn len(&self) -> usize {
        self.valid.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn classify(responses: Vec<PeerResponse>) -> Result<ClassifiedResponses, SubmissionError> {
    let classified = ClassifiedResponses::partition(responses);
    if classified.valid.is_empty() {
        return Err(SubmissionError::NoValidResponses(classified.errors));
    }
    Ok(classified)
}

fn failure_marker(endorsement: &Endorsement) -> Option<&'static str> {
    let payload = endorsement.payload_str();
    FAILURE_MARKERS
        .into_iter()
        .find(|marker| payload.contains(marker))
}
