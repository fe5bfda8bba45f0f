//! HTTP client for a Blockchain.info-style chain data API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tally_core::error::NetworkError;
use tally_core::traits::{BroadcastClient, FeeClient, MultiAddressClient, UnspentOutputsClient};
use tally_core::types::{AddressItem, ChainId, FeeRates, MultiAddress, UnspentOutput, XPub};
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// Body the backend returns with a 500 when none of the keys hold coins.
const NO_FREE_OUTPUTS: &str = "No free outputs to spend";

#[derive(Debug, Deserialize)]
struct UnspentResponse {
    #[serde(default)]
    unspent_outputs: Vec<UnspentOutput>,
}

#[derive(Debug, Deserialize)]
struct MultiAddressResponse {
    #[serde(default)]
    addresses: Vec<AddressItem>,
    info: InfoResponse,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    latest_block: LatestBlock,
}

#[derive(Debug, Deserialize)]
struct LatestBlock {
    height: u64,
}

#[derive(Debug, Deserialize)]
struct PushTxResponse {
    #[serde(rename = "txHash")]
    tx_hash: String,
}

impl From<MultiAddressResponse> for MultiAddress {
    fn from(r: MultiAddressResponse) -> Self {
        MultiAddress {
            addresses: r.addresses,
            latest_block_height: r.info.latest_block.height,
        }
    }
}

fn map_transport(e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout
    } else if e.is_decode() {
        NetworkError::Decode(e.to_string())
    } else {
        NetworkError::Transport(e.to_string())
    }
}

/// `a|b|c` list used by the `active` query parameter.
pub fn active_param(xpubs: &[XPub]) -> String {
    xpubs
        .iter()
        .map(|x| x.address.as_str())
        .collect::<Vec<_>>()
        .join("|")
}

/// Implements every chain data trait against one backend.
#[derive(Clone)]
pub struct HttpChainClient {
    client: Client,
    base_url: String,
}

impl HttpChainClient {
    pub fn new(config: &ClientConfig) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(map_transport)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send and decode, mapping non-success statuses to [`NetworkError::Status`].
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, NetworkError> {
        let response = request.send().await.map_err(map_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::Status { status: status.as_u16(), body });
        }
        let bytes = response.bytes().await.map_err(map_transport)?;
        serde_json::from_slice(&bytes).map_err(|e| NetworkError::Decode(e.to_string()))
    }

    // ── Endpoints ─────────────────────────────────────────────────────────────

    async fn fetch_unspent(&self, xpubs: &[XPub]) -> Result<Vec<UnspentOutput>, NetworkError> {
        let request = self
            .client
            .get(self.url("unspent"))
            .query(&[("active", active_param(xpubs))]);
        match self.send::<UnspentResponse>(request).await {
            Ok(response) => Ok(response.unspent_outputs),
            Err(NetworkError::Status { status, body })
                if status == StatusCode::INTERNAL_SERVER_ERROR.as_u16() && body.contains(NO_FREE_OUTPUTS) =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl UnspentOutputsClient for HttpChainClient {
    async fn unspent_outputs(&self, xpubs: &[XPub]) -> Result<Vec<UnspentOutput>, NetworkError> {
        let outputs = self.fetch_unspent(xpubs).await?;
        debug!(xpubs = xpubs.len(), outputs = outputs.len(), "client: unspent outputs");
        Ok(outputs)
    }
}

#[async_trait]
impl MultiAddressClient for HttpChainClient {
    async fn multi_address(&self, xpubs: &[XPub]) -> Result<MultiAddress, NetworkError> {
        let request = self
            .client
            .get(self.url("multiaddr"))
            .query(&[("active", active_param(xpubs)), ("n", "0".to_string())]);
        let response: MultiAddressResponse = self.send(request).await?;
        debug!(
            xpubs = xpubs.len(),
            height = response.info.latest_block.height,
            "client: multiaddr"
        );
        Ok(response.into())
    }
}

#[async_trait]
impl FeeClient for HttpChainClient {
    async fn fees(&self, chain: ChainId) -> Result<FeeRates, NetworkError> {
        let request = self.client.get(self.url(&format!("mempool/fees/{}", chain.ticker())));
        let rates: FeeRates = self.send(request).await?;
        if rates.limits.min > rates.limits.max {
            return Err(NetworkError::Malformed(format!(
                "fee limits inverted: min {} > max {}",
                rates.limits.min, rates.limits.max
            )));
        }
        Ok(rates)
    }
}

#[async_trait]
impl BroadcastClient for HttpChainClient {
    async fn push_transaction(&self, encoded: &str, lock_secret: Option<&str>) -> Result<String, NetworkError> {
        let mut form = vec![("tx", encoded.to_string())];
        if let Some(secret) = lock_secret {
            form.push(("lock_secret", secret.to_string()));
        }
        let request = self
            .client
            .post(self.url("pushtx"))
            .query(&[("format", "json")])
            .form(&form);
        let response: PushTxResponse = self.send(request).await.inspect_err(|e| {
            warn!(error = %e, "client: pushtx failed");
        })?;
        Ok(response.tx_hash)
    }
}
