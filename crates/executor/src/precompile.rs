//! Precompile account priming (§4.8 `activatePrecompiles`): the first call into a precompile
//! address in a clean state would otherwise be billed the `CallNewAccount` gas surcharge a call
//! to an empty account always pays. Priming every precompile with a nonzero balance up front means
//! an engine booted against genesis state bills calls to `0x1`-`0x9` the same way mainnet clients
//! do.

use alloy_primitives::U256;
use execd_state::{Account, JournalDb, StateCommitter};

use crate::constants::PRECOMPILE_ADDRESSES;

/// Primes every precompile address in `state` with `balance = 1`, if it doesn't already exist.
pub fn prime_precompiles<C: StateCommitter>(state: &mut JournalDb<C>) {
    for address in PRECOMPILE_ADDRESSES {
        if !state.account_exists(address) {
            state.put_account(address, Account { balance: U256::from(1), ..Account::empty() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execd_state::NoopStateCommitter;

    #[test]
    fn test_primes_every_precompile_exactly_once() {
        let mut db = JournalDb::new(NoopStateCommitter);
        prime_precompiles(&mut db);
        for address in PRECOMPILE_ADDRESSES {
            assert_eq!(db.get_account(address).balance, U256::from(1));
        }
    }

    #[test]
    fn test_does_not_clobber_an_existing_precompile_account() {
        let mut db = JournalDb::new(NoopStateCommitter);
        let addr = PRECOMPILE_ADDRESSES[0];
        db.put_account(addr, Account { nonce: 7, balance: U256::from(100), ..Account::empty() });
        prime_precompiles(&mut db);
        assert_eq!(db.get_account(addr).nonce, 7);
        assert_eq!(db.get_account(addr).balance, U256::from(100));
    }
}
