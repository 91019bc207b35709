//! Wallet collaborator.
//!
//! The core never speaks a wallet protocol. It reads connection state and
//! asks for connect/disconnect; hosts plug in whatever adapter they have.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::error::AuthError;
use crate::session::SessionStore;

/// Every wallet adapter implements this trait.
pub trait WalletConnection: Send + Sync {
    /// Connected public address, if any.
    fn address(&self) -> Option<String>;

    fn is_connected(&self) -> bool {
        self.address().is_some()
    }

    /// Record a connection to `address`.
    fn connect(&self, address: &str) -> Result<(), AuthError>;

    /// Drop the connection. Disconnecting while disconnected is a no-op.
    fn disconnect(&self) -> Result<(), AuthError>;
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Accepts base58 public keys of 32 to 44 characters.
pub fn validate_address(address: &str) -> Result<&str, AuthError> {
    let trimmed = address.trim();
    let valid = (32..=44).contains(&trimmed.len())
        && trimmed.chars().all(|c| BASE58_ALPHABET.contains(c));
    if valid {
        Ok(trimmed)
    } else {
        Err(AuthError::InvalidAddress(address.to_string()))
    }
}

/// In-process wallet state. Lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryWallet {
    address: Mutex<Option<String>>,
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(address: &str) -> Result<Self, AuthError> {
        let wallet = Self::new();
        wallet.connect(address)?;
        Ok(wallet)
    }
}

impl WalletConnection for MemoryWallet {
    fn address(&self) -> Option<String> {
        self.address
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn connect(&self, address: &str) -> Result<(), AuthError> {
        let address = validate_address(address)?;
        *self
            .address
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(address.to_string());
        Ok(())
    }

    fn disconnect(&self) -> Result<(), AuthError> {
        self.address
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        Ok(())
    }
}

const WALLET_KEY: &str = "wallet_address";

/// Wallet state persisted next to the session, so separate processes
/// sharing one database see the same connection.
pub struct StoredWallet {
    store: Arc<SessionStore>,
}

impl StoredWallet {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }
}

impl WalletConnection for StoredWallet {
    fn address(&self) -> Option<String> {
        self.store.kv_get(WALLET_KEY).ok().flatten()
    }

    fn connect(&self, address: &str) -> Result<(), AuthError> {
        let address = validate_address(address)?;
        self.store.kv_set(WALLET_KEY, address)?;
        info!(address, "wallet connected");
        Ok(())
    }

    fn disconnect(&self) -> Result<(), AuthError> {
        if self.address().is_some() {
            self.store.kv_delete(WALLET_KEY)?;
            info!("wallet disconnected");
        }
        Ok(())
    }
}
