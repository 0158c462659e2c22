use async_trait::async_trait;
use dashmap::DashMap;

use crate::engine::EngineError;
use crate::model::UserId;

/// External reward ledger. Called once per party when an exchange completes.
#[async_trait]
pub trait RewardLedger: Send + Sync {
    async fn credit_user(&self, user: UserId, amount: u32) -> Result<(), EngineError>;
}

/// Balances kept in memory.
#[derive(Default)]
pub struct MemoryLedger {
    balances: DashMap<UserId, u64>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, user: UserId) -> u64 {
        self.balances.get(&user).map(|b| *b.value()).unwrap_or(0)
    }
}

#[async_trait]
impl RewardLedger for MemoryLedger {
    async fn credit_user(&self, user: UserId, amount: u32) -> Result<(), EngineError> {
        let mut balance = self.balances.entry(user).or_insert(0);
        *balance = balance.saturating_add(u64::from(amount));
        Ok(())
    }
}
