// src/publishing.rs
use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{keccak256, Address, Bytes, TxHash};
use alloy::providers::{PendingTransactionConfig, PendingTransactionError, Provider, ProviderBuilder, WatchTxError};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolCall;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::{ChainConfig, ConfigError};
use crate::types::{ErrorKind, ScaledPrice, ValueType};

sol! {
    interface ISignedPriceFeed {
        function updatePrice(int256 newPrice) external;
    }
}

sol! {
    interface IUnsignedPriceFeed {
        function updatePrice(uint256 newPrice) external;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    /// Nothing was accepted by the node (encoding, signing, nonce, fee, RPC).
    #[error("submission failed: {0}")]
    Submission(String),
    /// Mined with status 0.
    #[error("transaction {tx_hash} reverted in block {block_number:?}")]
    Reverted { tx_hash: TxHash, block_number: Option<u64> },
    #[error("transaction {tx_hash} not confirmed within {waited:?}")]
    ConfirmationTimeout { tx_hash: TxHash, waited: Duration },
    /// Sent, but its fate could not be observed.
    #[error("transaction {tx_hash} unconfirmed: {reason}")]
    Unconfirmed { tx_hash: TxHash, reason: String },
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::Submission(_) | PublishError::Reverted { .. } => ErrorKind::Submission,
            PublishError::ConfirmationTimeout { .. } | PublishError::Unconfirmed { .. } => {
                ErrorKind::ConfirmationTimeout
            }
        }
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            PublishError::Submission(_) => None,
            PublishError::Reverted { tx_hash, .. }
            | PublishError::ConfirmationTimeout { tx_hash, .. }
            | PublishError::Unconfirmed { tx_hash, .. } => Some(*tx_hash),
        }
    }
}

#[async_trait::async_trait]
pub trait ChainPublisher: Send + Sync + 'static {
    /// Sign and send `updatePrice(value)`; returns once the node accepted it.
    async fn submit(&self, price: &ScaledPrice) -> Result<TxHash, PublishError>;
    /// Block until `tx_hash` is included (or the bounded wait runs out).
    async fn confirm(&self, tx_hash: TxHash) -> Result<Confirmation, PublishError>;

    async fn publish(&self, price: &ScaledPrice) -> Result<Confirmation, PublishError> {
        let tx_hash = self.submit(price).await?;
        self.confirm(tx_hash).await
    }
}

/// Publishes through a signing alloy provider to the feed contract.
pub struct ContractPublisher<P> {
    provider: P,
    contract: Address,
    value_type: ValueType,
    confirmations: u64,
    submit_timeout: Duration,
    confirm_timeout: Duration,
}

/// Build the signing provider. No network traffic happens until the first call.
pub fn connect(
    chain: &ChainConfig,
    value_type: ValueType,
) -> Result<ContractPublisher<impl Provider + Clone + 'static>, ConfigError> {
    let signer: PrivateKeySigner = chain
        .private_key
        .expose()
        .parse()
        .map_err(|e| ConfigError::Invalid { key: "PRIVATE_KEY", reason: format!("{e}") })?;
    let wallet_address = signer.address();

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .on_http(chain.rpc_url.clone());

    tracing::info!(
        wallet = %wallet_address,
        contract = %chain.contract,
        rpc_host = chain.rpc_url.host_str().unwrap_or_default(),
        ?value_type,
        "chain publisher ready"
    );

    Ok(ContractPublisher {
        provider,
        contract: chain.contract,
        value_type,
        confirmations: chain.confirmations,
        submit_timeout: chain.submit_timeout,
        confirm_timeout: chain.confirm_timeout,
    })
}

/// ABI-encoded `updatePrice` call for the feed's declared argument type.
pub fn update_calldata(price: &ScaledPrice, value_type: ValueType) -> Result<Bytes, PublishError> {
    let encode = |e| PublishError::Submission(format!("encode {price}: {e}"));
    let data = match value_type {
        ValueType::Int256 => {
            ISignedPriceFeed::updatePriceCall { newPrice: price.to_int256().map_err(encode)? }.abi_encode()
        }
        ValueType::Uint256 => {
            IUnsignedPriceFeed::updatePriceCall { newPrice: price.to_uint256().map_err(encode)? }.abi_encode()
        }
    };
    Ok(data.into())
}

#[async_trait::async_trait]
impl<P> ChainPublisher for ContractPublisher<P>
where
    P: Provider + Clone + 'static,
{
    async fn submit(&self, price: &ScaledPrice) -> Result<TxHash, PublishError> {
        let tx = TransactionRequest::default()
            .with_to(self.contract)
            .with_input(update_calldata(price, self.value_type)?);
        let sent = timeout(self.submit_timeout, self.provider.send_transaction(tx)).await;

        match sent {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) => Err(PublishError::Submission(e.to_string())),
            Err(_) => Err(PublishError::Submission(format!(
                "node did not accept the transaction within {:?}",
                self.submit_timeout
            ))),
        }
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<Confirmation, PublishError> {
        let watch = PendingTransactionConfig::new(tx_hash)
            .with_required_confirmations(self.confirmations)
            .with_timeout(Some(self.confirm_timeout));

        let included = match self.provider.watch_pending_transaction(watch).await {
            Ok(pending) => pending.await,
            Err(e) => Err(e),
        };
        match included {
            Ok(_) => {}
            Err(PendingTransactionError::TxWatcher(WatchTxError::Timeout)) => {
                return Err(PublishError::ConfirmationTimeout { tx_hash, waited: self.confirm_timeout });
            }
            Err(e) => return Err(PublishError::Unconfirmed { tx_hash, reason: e.to_string() }),
        }

        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| PublishError::Unconfirmed { tx_hash, reason: format!("receipt: {e}") })?
            .ok_or_else(|| PublishError::Unconfirmed { tx_hash, reason: "receipt not found".into() })?;

        let block_number = receipt.block_number();
        if !receipt.status() {
            return Err(PublishError::Reverted { tx_hash, block_number });
        }
        Ok(Confirmation { tx_hash, block_number })
    }
}

/// Logs the call it would make and "confirms" immediately. `--dry-run`.
pub struct DryRunPublisher;

#[async_trait::async_trait]
impl ChainPublisher for DryRunPublisher {
    async fn submit(&self, price: &ScaledPrice) -> Result<TxHash, PublishError> {
        let tx_hash = keccak256(price.to_string().as_bytes());
        tracing::info!(tx = %tx_hash, "[DRY-RUN] updatePrice({}) value_type={:?}", price.value, price.value_type);
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<Confirmation, PublishError> {
        Ok(Confirmation { tx_hash, block_number: None })
    }
}
