//! Account identity: the outgoing addresses owned by the swept account.

use serde::{Deserialize, Serialize};

use super::Address;

/// The account's send-as addresses and the one refreshed threads go to.
///
/// Built once at run start and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    addresses: Vec<Address>,
}

impl AccountIdentity {
    /// Builds an identity from the store-ordered address list.
    ///
    /// Returns `None` if the list is empty, since there is nowhere to refresh
    /// threads into.
    pub fn from_addresses(addresses: Vec<Address>) -> Option<Self> {
        if addresses.is_empty() {
            None
        } else {
            Some(Self { addresses })
        }
    }

    /// All owned addresses, in store order.
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// The refresh target: the first address the store returned.
    pub fn forward_target(&self) -> &Address {
        &self.addresses[0]
    }
}
