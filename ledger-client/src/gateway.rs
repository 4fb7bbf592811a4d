use crate::config::GatewayConfig;
use crate::coordinator::SubmissionCoordinator;
use crate::inspect::LedgerInspector;
use crate::query::ChaincodeQuery;
use ledger_common::{
    BlockInfo, ChaincodeInfo, ChannelHandle, ChannelInfo, ClientSession, PeerRef,
    SessionProvider, SubmissionError, SubmissionResult, TransactionId, TransactionInfo,
    TransactionRequest,
};

use std::collections::HashMap;
use std::sync::Arc;

use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaincodeCall {
    #[serde(default)]
    pub peers: Vec<String>,
    pub channel: String,
    pub chaincode: String,
    pub function: String,
    #[serde(default)]
    pub args: Value,
}

impl ChaincodeCall {
    /// Arguments travel as one element: the JSON encoding of `args`.
    pub fn to_request(&self, transaction_id: TransactionId) -> Result<TransactionRequest, SubmissionError> {
        let encoded = serde_json::to_string(&self.args)
            .map_err(|err| SubmissionError::Internal(format!("cannot encode arguments: {err}")))?;
        Ok(TransactionRequest::new(
            self.channel.as_str(),
            self.chaincode.as_str(),
            self.function.as_str(),
            vec![encoded],
            self.peers.iter().map(|peer| PeerRef::new(peer.as_str())).collect(),
            transaction_id,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub org: String,
    pub user: String,
}

impl Identity {
    pub fn new(org: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            user: user.into(),
        }
    }
}

type ChannelKey = (Identity, String);

#[derive(Default)]
struct Connections {
    sessions: HashMap<Identity, Arc<dyn ClientSession>>,
    channels: HashMap<ChannelKey, Arc<dyn ChannelHandle>>,
}

pub struct Gateway<P> {
    provider: P,
    config: GatewayConfig,
    connections: Mutex<Connections>,
}

impl<P: SessionProvider> Gateway<P> {
    pub fn new(provider: P, config: GatewayConfig) -> Self {
        Self {
            provider,
            config,
            connections: Default::default(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn inspector(&self) -> LedgerInspector {
        LedgerInspector::new(self.config.proposal_timeout)
    }

    /// Submits `call` and waits for the commit verdict. Never fails: every
    /// fault is folded into the returned result.
    pub async fn submit_transaction(&self, call: &ChaincodeCall, identity: &Identity) -> SubmissionResult {
        info!(
            "============ invokeChaincode - chaincode {}, function {}, on the channel '{}' for org: {}",
            call.chaincode, call.function, call.channel, identity.org
        );
        let (session, channel) = match self.connect(&call.channel, identity).await {
            Ok(connection) => connection,
            Err(err) => {
                error!("invokeChaincode - Failed to invoke chaincode. cause:{err}");
                return SubmissionResult::failure(None, err);
            }
        };

        let tx_id = session.new_transaction_id();
        let request = match call.to_request(tx_id.clone()) {
            Ok(request) => request,
            Err(err) => return SubmissionResult::failure(Some(tx_id), err),
        };
        info!(
            "txId: {tx_id}. Invoke transaction request to the ledger on peers {:?}",
            call.peers
        );

        let result = SubmissionCoordinator::new(channel, &self.config)
            .run(&request)
            .await;
        if result.is_success() {
            info!(
                "txId: {tx_id}. Successfully invoked chaincode {}, function {}, on the channel '{}' for org: {}",
                call.chaincode, call.function, call.channel, identity.org
            );
        } else {
            error!("txId: {tx_id}. {}", result.describe());
        }
        result
    }

    pub async fn query_chaincode(
        &self,
        call: &ChaincodeCall,
        identity: &Identity,
    ) -> Result<Vec<Value>, SubmissionError> {
        info!(
            "============ START queryChaincode for fcn: {} on the channel '{}' for org: {}",
            call.function, call.channel, identity.org
        );
        let (session, channel) = self.connect(&call.channel, identity).await?;
        let request = call.to_request(session.new_transaction_id())?;
        ChaincodeQuery::new(channel, self.config.proposal_timeout)
            .evaluate(&request)
            .await
            .map_err(|err| {
                error!("queryChaincode - fcn: {}. Failed to query due to error: {err}", call.function);
                err
            })
    }

    pub async fn get_block_by_number(
        &self,
        peer: &str,
        channel_name: &str,
        number: u64,
        identity: &Identity,
    ) -> Result<BlockInfo, SubmissionError> {
        let (_, channel) = self.connect(channel_name, identity).await?;
        self.inspector()
            .block(channel.as_ref(), number, &PeerRef::new(peer))
            .await
    }

    pub async fn get_transaction_by_id(
        &self,
        peer: &str,
        channel_name: &str,
        tx_id: &TransactionId,
        identity: &Identity,
    ) -> Result<TransactionInfo, SubmissionError> {
        let (_, channel) = self.connect(channel_name, identity).await?;
        self.inspector()
            .transaction(channel.as_ref(), tx_id, &PeerRef::new(peer))
            .await
    }

    pub async fn query_channel_info(
        &self,
        peer: &str,
        channel_name: &str,
        identity: &Identity,
    ) -> Result<ChannelInfo, SubmissionError> {
        let (_, channel) = self.connect(channel_name, identity).await?;
        self.inspector()
            .channel_info(channel.as_ref(), &PeerRef::new(peer))
            .await
    }

    pub async fn get_instantiated_chaincodes(
        &self,
        peer: &str,
        channel_name: &str,
        identity: &Identity,
    ) -> Result<Vec<ChaincodeInfo>, SubmissionError> {
        let (_, channel) = self.connect(channel_name, identity).await?;
        self.inspector()
            .instantiated_chaincodes(channel.as_ref(), &PeerRef::new(peer))
            .await
    }

    pub async fn get_channels_for_peer(
        &self,
        peer: &str,
        identity: &Identity,
    ) -> Result<Vec<String>, SubmissionError> {
        let session = self.session(identity).await?;
        self.inspector()
            .channels(session.as_ref(), &PeerRef::new(peer))
            .await
    }

    pub async fn get_chaincodes_for_peer(
        &self,
        peer: &str,
        identity: &Identity,
    ) -> Result<Vec<ChaincodeInfo>, SubmissionError> {
        let session = self.session(identity).await?;
        self.inspector()
            .installed_chaincodes(session.as_ref(), &PeerRef::new(peer))
            .await
    }

    pub async fn close(&self) {
        let mut connections = self.connections.lock().await;
        info!(
            "closing {} sessions and {} channel handles",
            connections.sessions.len(),
            connections.channels.len()
        );
        connections.sessions.clear();
        connections.channels.clear();
    }

    pub async fn cached_channels(&self) -> usize {
        self.connections.lock().await.channels.len()
    }

    async fn connect(
        &self,
        channel_name: &str,
        identity: &Identity,
    ) -> Result<(Arc<dyn ClientSession>, Arc<dyn ChannelHandle>), SubmissionError> {
        let session = self.session(identity).await?;
        let channel = self.channel(identity, session.as_ref(), channel_name).await?;
        Ok((session, channel))
    }

    // The lock is not held while authenticating.
    async fn session(&self, identity: &Identity) -> Result<Arc<dyn ClientSession>, SubmissionError> {
        if let Some(session) = self.connections.lock().await.sessions.get(identity) {
            return Ok(session.clone());
        }
        let session = self
            .provider
            .session_for(&identity.org, &identity.user)
            .await?;
        info!(
            "Successfully got the client session for the organization \"{}\"",
            identity.org
        );
        let mut connections = self.connections.lock().await;
        Ok(connections
            .sessions
            .entry(identity.clone())
            .or_insert(session)
            .clone())
    }

    async fn channel(
        &self,
        identity: &Identity,
        session: &dyn ClientSession,
        channel_name: &str,
    ) -> Result<Arc<dyn ChannelHandle>, SubmissionError> {
        let mut connections = self.connections.lock().await;
        let key = (identity.clone(), channel_name.to_string());
        if let Some(channel) = connections.channels.get(&key) {
            return Ok(channel.clone());
        }
        let channel = session
            .channel(channel_name)
            .ok_or_else(|| SubmissionError::ChannelNotFound(channel_name.to_string()))?;
        connections.channels.insert(key, channel.clone());
        Ok(channel)
    }
}

#[cfg(test)]
mod gateway_test {
    use super::*;
    use ledger_network::{MemoryNetwork, MemorySessionProvider, NetworkConfig};

    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::Instant;

    const ENROLMENT: Duration = Duration::from_secs(60);

    struct SlowEnrolment(MemorySessionProvider);

    #[async_trait]
    impl SessionProvider for SlowEnrolment {
        async fn session_for(
            &self,
            org: &str,
            user: &str,
        ) -> Result<Arc<dyn ClientSession>, SubmissionError> {
            if user == "slow" {
                tokio::time::sleep(ENROLMENT).await;
            }
            self.0.session_for(org, user).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cached_session_is_not_blocked_by_pending_enrolment() {
        let network = MemoryNetwork::spawn(NetworkConfig::default());
        let gateway = Gateway::new(SlowEnrolment(network.provider()), GatewayConfig::default());
        let admin = Identity::new("Org1", "admin");
        gateway
            .query_channel_info("peer0", "mychannel", &admin)
            .await
            .unwrap();

        let start = Instant::now();
        let slow = Identity::new("Org1", "slow");
        let pending = gateway.query_channel_info("peer0", "mychannel", &slow);
        let cached = async {
            let info = gateway.query_channel_info("peer0", "mychannel", &admin).await;
            (info, start.elapsed())
        };
        let (pending, (cached, cached_after)) = tokio::join!(pending, cached);

        assert!(pending.is_ok());
        assert!(cached.is_ok());
        assert!(cached_after < ENROLMENT);
        assert!(start.elapsed() >= ENROLMENT);
        assert_eq!(gateway.cached_channels().await, 2);
    }

    #[test]
    fn arguments_are_encoded_as_one_json_element() {
        let call = ChaincodeCall {
            peers: vec!["peer0".into(), "peer1".into()],
            channel: "mychannel".into(),
            chaincode: "ngo".into(),
            function: "createDonor".into(),
            args: json!({"donorUserName": "edge", "email": "edge@example.com"}),
        };
        let request = call.to_request("tx".into()).unwrap();
        assert_eq!(request.arguments.len(), 1);
        let decoded: Value = serde_json::from_str(&request.arguments[0]).unwrap();
        assert_eq!(decoded, call.args);
        assert_eq!(request.target_peers.len(), 2);
        assert_eq!(request.function_name, "createDonor");
    }

    #[test]
    fn call_deserializes_with_defaults() {
        let call: ChaincodeCall = serde_json::from_value(json!({
            "channel": "mychannel",
            "chaincode": "ngo",
            "function": "queryAllNGOs"
        }))
        .unwrap();
        assert!(call.peers.is_empty());
        assert_eq!(call.args, Value::Null);
    }
}
