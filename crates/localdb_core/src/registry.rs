//! Collection registry.
//!
//! Every store the database knows about is declared here, once, ahead of
//! time. A store is created lazily in the backend the first time a
//! transaction references it.

use crate::error::CoreError;
use localdb_storage::StoreSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field used to order paginated scans.
pub const CREATED_AT_INDEX: &str = "createdAt";

/// A declared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StoreName {
    /// Database-wide context record.
    Context,
    /// HD and imported wallets.
    Wallet,
    /// Accounts grouped across networks under one derivation index.
    IndexedAccount,
    /// Network-specific accounts.
    Account,
    /// Derivation paths used per wallet.
    AccountDerivation,
    /// Encrypted credentials.
    Credential,
    /// Paired hardware devices.
    Device,
    /// Address lookup entries.
    Address,
    /// Messages signed by the user.
    SignedMessage,
    /// Transactions signed by the user.
    SignedTransaction,
    /// Sites granted access to accounts.
    ConnectedSite,
    /// Items written by cloud sync.
    CloudSyncItem,
}

impl StoreName {
    /// Every declared store, in declaration order.
    pub const ALL: [StoreName; 12] = [
        StoreName::Context,
        StoreName::Wallet,
        StoreName::IndexedAccount,
        StoreName::Account,
        StoreName::AccountDerivation,
        StoreName::Credential,
        StoreName::Device,
        StoreName::Address,
        StoreName::SignedMessage,
        StoreName::SignedTransaction,
        StoreName::ConnectedSite,
        StoreName::CloudSyncItem,
    ];

    /// Returns the store's name in the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Context => "Context",
            Self::Wallet => "Wallet",
            Self::IndexedAccount => "IndexedAccount",
            Self::Account => "Account",
            Self::AccountDerivation => "AccountDerivation",
            Self::Credential => "Credential",
            Self::Device => "Device",
            Self::Address => "Address",
            Self::SignedMessage => "SignedMessage",
            Self::SignedTransaction => "SignedTransaction",
            Self::ConnectedSite => "ConnectedSite",
            Self::CloudSyncItem => "CloudSyncItem",
        }
    }

    /// Returns the field paginated scans are ordered by, if any.
    #[must_use]
    pub const fn ordering_index(self) -> Option<&'static str> {
        match self {
            Self::SignedMessage | Self::SignedTransaction | Self::ConnectedSite => {
                Some(CREATED_AT_INDEX)
            }
            _ => None,
        }
    }

    /// Returns whether single-record reads of this store are cached.
    #[must_use]
    pub const fn is_hot(self) -> bool {
        matches!(
            self,
            Self::Wallet | Self::Account | Self::IndexedAccount | Self::Device
        )
    }

    /// Returns the backend schema for this store.
    #[must_use]
    pub fn schema(self) -> StoreSchema {
        let schema = StoreSchema::new(self.as_str());
        match self.ordering_index() {
            Some(index) => schema.with_index(index),
            None => schema,
        }
    }

    /// Returns the schema of every declared store.
    #[must_use]
    pub fn all_schemas() -> Vec<StoreSchema> {
        Self::ALL.iter().map(|s| s.schema()).collect()
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CoreError::invalid_operation(format!("unknown store: {s}")))
    }
}

/// Named whole-store reads served through the aggregate cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateKey {
    /// Every wallet.
    AllWallets,
    /// Every account.
    AllAccounts,
    /// Every indexed account.
    AllIndexedAccounts,
    /// Every device.
    AllDevices,
}

impl AggregateKey {
    /// Every aggregate key.
    pub const ALL: [AggregateKey; 4] = [
        AggregateKey::AllWallets,
        AggregateKey::AllAccounts,
        AggregateKey::AllIndexedAccounts,
        AggregateKey::AllDevices,
    ];

    /// Returns the store the aggregate reads.
    #[must_use]
    pub const fn store(self) -> StoreName {
        match self {
            Self::AllWallets => StoreName::Wallet,
            Self::AllAccounts => StoreName::Account,
            Self::AllIndexedAccounts => StoreName::IndexedAccount,
            Self::AllDevices => StoreName::Device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_name_round_trips_through_str() {
        for name in StoreName::ALL {
            assert_eq!(name.as_str().parse::<StoreName>().unwrap(), name);
        }
        assert!("Nope".parse::<StoreName>().is_err());
    }

    #[test]
    fn ordering_index_only_on_dated_stores() {
        assert_eq!(StoreName::SignedMessage.ordering_index(), Some("createdAt"));
        assert_eq!(StoreName::Wallet.ordering_index(), None);
        assert!(StoreName::ConnectedSite.schema().has_index("createdAt"));
        assert!(StoreName::Account.schema().indexes.is_empty());
    }

    #[test]
    fn hot_stores() {
        let hot: Vec<StoreName> = StoreName::ALL.into_iter().filter(|s| s.is_hot()).collect();
        assert_eq!(
            hot,
            vec![
                StoreName::Wallet,
                StoreName::IndexedAccount,
                StoreName::Account,
                StoreName::Device
            ]
        );
    }

    #[test]
    fn aggregates_map_to_hot_stores() {
        for key in AggregateKey::ALL {
            assert!(key.store().is_hot());
        }
    }

    #[test]
    fn all_schemas_are_keyed_by_id() {
        let schemas = StoreName::all_schemas();
        assert_eq!(schemas.len(), 12);
        assert!(schemas.iter().all(|s| s.key_path == "id"));
    }
}
