//! Guest List
//!
//! Optional allow-list consulted by the ledger before mint and redeem.
//! When the ledger has no guest list installed, every account is allowed.

use crate::BTreeSet;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Set of accounts allowed to mint and redeem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct GuestList {
    guests: BTreeSet<Address>,
}

impl GuestList {
    /// Create an empty guest list (admits nobody)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a guest list admitting exactly `guests`
    pub fn with_guests<I: IntoIterator<Item = Address>>(guests: I) -> Self {
        Self { guests: guests.into_iter().collect() }
    }

    /// Admit an account; returns false if it was already admitted
    pub fn invite(&mut self, account: Address) -> bool {
        self.guests.insert(account)
    }

    /// Remove an account; returns false if it was not admitted
    pub fn revoke(&mut self, account: &Address) -> bool {
        self.guests.remove(account)
    }

    /// Whether `account` may mint or redeem
    pub fn authorized(&self, account: &Address) -> bool {
        self.guests.contains(account)
    }

    /// Number of admitted accounts
    pub fn len(&self) -> usize {
        self.guests.len()
    }

    /// True if nobody is admitted
    pub fn is_empty(&self) -> bool {
        self.guests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_list_membership() {
        let alice = [1u8; 32];
        let bob = [2u8; 32];

        let mut list = GuestList::with_guests([alice]);
        assert!(list.authorized(&alice));
        assert!(!list.authorized(&bob));

        assert!(list.invite(bob));
        assert!(!list.invite(bob));
        assert!(list.authorized(&bob));

        assert!(list.revoke(&alice));
        assert!(!list.authorized(&alice));
        assert_eq!(list.len(), 1);
    }
}
