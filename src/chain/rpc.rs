//! JSON-RPC implementations of the chain and wallet collaborators.
//!
//! Both speak plain JSON-RPC 2.0 over HTTP. The chain side talks to the DAO
//! gateway node; the wallet side talks to an EIP-1193 style signer bridge and
//! maps its provider error codes onto [`WalletError`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::chain::{
    Address, ChainClient, ChainError, Connection, Receipt, TxHandle, TxRequest, Wallet, WalletError,
};

/// EIP-1193: user rejected the request.
const USER_REJECTED: i64 = 4001;
/// EIP-1193: provider disconnected from all chains / from the requested chain.
const DISCONNECTED: i64 = 4900;
const CHAIN_DISCONNECTED: i64 = 4901;
/// Node-side `execution reverted`.
const EXECUTION_REVERTED: i64 = 3;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Failure of one JSON-RPC round trip.
#[derive(Debug)]
pub enum RpcFailure {
    Transport(String),
    Error(RpcErrorObject),
    Decode(String),
}

/// Shared HTTP JSON-RPC plumbing.
pub struct JsonRpcTransport {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    /// `timeout` bounds each whole round trip; `None` lets a call wait as long
    /// as the endpoint takes to answer.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcFailure> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        trace!("-> {} #{}", method, request.id);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|err| RpcFailure::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(RpcFailure::Transport(format!("HTTP {}", response.status())));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| RpcFailure::Decode(err.to_string()))?;

        if let Some(error) = body.error {
            debug!("<- {} failed with {}: {}", method, error.code, error.message);
            return Err(RpcFailure::Error(error));
        }

        serde_json::from_value(body.result)
            .map_err(|err| RpcFailure::Decode(format!("{}: {}", method, err)))
    }
}

impl From<RpcFailure> for ChainError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Transport(msg) => ChainError::Unreachable(msg),
            RpcFailure::Error(err) => ChainError::Rpc {
                code: err.code,
                message: err.message,
            },
            RpcFailure::Decode(msg) => ChainError::Decode(msg),
        }
    }
}

impl From<RpcFailure> for WalletError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Transport(msg) => WalletError::Transport(msg),
            RpcFailure::Decode(msg) => WalletError::Refused(msg),
            RpcFailure::Error(err) => match err.code {
                USER_REJECTED => WalletError::Rejected,
                DISCONNECTED | CHAIN_DISCONNECTED => WalletError::Disconnected,
                EXECUTION_REVERTED => WalletError::Reverted(err.message),
                _ => WalletError::Refused(err.message),
            },
        }
    }
}

fn parse_amount(method: &str, raw: String) -> Result<u128, ChainError> {
    raw.trim()
        .parse()
        .map_err(|_| ChainError::Decode(format!("{}: `{}` is not an amount", method, raw)))
}

/// Chain reads against the DAO gateway node.
pub struct JsonRpcChain {
    transport: JsonRpcTransport,
}

impl JsonRpcChain {
    pub fn new(transport: JsonRpcTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ChainClient for JsonRpcChain {
    async fn stored_value(&self) -> Result<u128, ChainError> {
        let raw: String = self.transport.call("dao_storedValue", json!([])).await?;
        parse_amount("dao_storedValue", raw)
    }

    async fn balance_of(&self, owner: &Address) -> Result<u128, ChainError> {
        let raw: String = self.transport.call("dao_balanceOf", json!([owner])).await?;
        parse_amount("dao_balanceOf", raw)
    }

    async fn members(&self) -> Result<Vec<Address>, ChainError> {
        Ok(self.transport.call("dao_members", json!([])).await?)
    }

    async fn receipt(&self, tx: &TxHandle) -> Result<Option<Receipt>, ChainError> {
        Ok(self.transport.call("dao_getReceipt", json!([tx])).await?)
    }
}

/// Wallet reached through a JSON-RPC signer bridge.
pub struct RpcWallet {
    transport: JsonRpcTransport,
}

impl RpcWallet {
    pub fn new(transport: JsonRpcTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Wallet for RpcWallet {
    async fn connect(&self) -> Result<Connection, WalletError> {
        let accounts: Vec<Address> = self.transport.call("eth_requestAccounts", json!([])).await?;
        let account = accounts
            .into_iter()
            .next()
            .ok_or_else(|| WalletError::Refused("wallet exposed no accounts".to_string()))?;

        let chain_id: String = self.transport.call("eth_chainId", json!([])).await?;
        let chain_id = u64::from_str_radix(chain_id.trim_start_matches("0x"), 16)
            .map_err(|_| WalletError::Refused(format!("bad chain id `{}`", chain_id)))?;

        Ok(Connection { account, chain_id })
    }

    async fn sign_and_send(&self, request: TxRequest) -> Result<TxHandle, WalletError> {
        Ok(self.transport.call("wallet_sendContractCall", json!([request])).await?)
    }
}
