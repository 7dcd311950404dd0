// Credit balance per user, in KiB

use log::debug;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

pub trait CreditLedger: Send + Sync {
    /// Adds `delta_kb` (negative to charge) to the user's balance.
    fn adjust_credits(&self, username: &str, delta_kb: i64);

    fn credits(&self, username: &str) -> i64;
}

#[derive(Debug, Default)]
pub struct UserCredits {
    balances: RwLock<HashMap<String, i64>>,
}

impl UserCredits {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CreditLedger for UserCredits {
    fn adjust_credits(&self, username: &str, delta_kb: i64) {
        let mut balances = self.balances.write().unwrap_or_else(PoisonError::into_inner);
        let balance = balances.entry(username.to_string()).or_insert(0);
        *balance += delta_kb;
        debug!("Credits for {}: {} KiB ({:+})", username, balance, delta_kb);
    }

    fn credits(&self, username: &str) -> i64 {
        self.balances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_credits() {
        let ledger = UserCredits::new();
        assert_eq!(ledger.credits("alice"), 0);
        ledger.adjust_credits("alice", 3072);
        ledger.adjust_credits("alice", -1024);
        assert_eq!(ledger.credits("alice"), 2048);
        assert_eq!(ledger.credits("bob"), 0);
    }
}
