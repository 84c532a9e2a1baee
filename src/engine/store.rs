use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::AssignmentDecision;

/// Decisions stay queryable for 30 days.
const DECISION_TTL_SECS: u64 = 30 * 24 * 3600;

/// Persistence seam for assignment decisions, keyed by ticket id.
#[async_trait]
pub trait DecisionStore: Send + Sync {
    async fn save_decision(&self, decision: &AssignmentDecision) -> Result<()>;
    async fn get_decision(&self, ticket_id: &str) -> Result<Option<AssignmentDecision>>;
}

/// Redis-backed decision store with a local read-through cache.
///
/// Decisions are immutable once written; the cache never needs invalidation,
/// only eviction on process restart.
pub struct RedisDecisionStore {
    redis_client: Arc<redis::Client>,
    cache: Arc<RwLock<HashMap<String, AssignmentDecision>>>,
}

impl RedisDecisionStore {
    pub fn new(redis_url: &str) -> Result<Self> {
        let redis_client = redis::Client::open(redis_url)?;

        Ok(Self {
            redis_client: Arc::new(redis_client),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn key(ticket_id: &str) -> String {
        format!("assignment_decision:{}", ticket_id)
    }
}

#[async_trait]
impl DecisionStore for RedisDecisionStore {
    async fn save_decision(&self, decision: &AssignmentDecision) -> Result<()> {
        let mut conn = self.redis_client.get_async_connection().await?;
        let payload = serde_json::to_string(decision)?;

        redis::cmd("SETEX")
            .arg(Self::key(&decision.ticket_id))
            .arg(DECISION_TTL_SECS)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;

        let mut cache = self.cache.write().await;
        cache.insert(decision.ticket_id.clone(), decision.clone());

        Ok(())
    }

    async fn get_decision(&self, ticket_id: &str) -> Result<Option<AssignmentDecision>> {
        {
            let cache = self.cache.read().await;
            if let Some(decision) = cache.get(ticket_id) {
                return Ok(Some(decision.clone()));
            }
        }

        let mut conn = self.redis_client.get_async_connection().await?;
        let payload: Option<String> = conn.get(Self::key(ticket_id)).await?;

        match payload {
            Some(json) => {
                let decision: AssignmentDecision = serde_json::from_str(&json)?;

                let mut cache = self.cache.write().await;
                cache.insert(ticket_id.to_string(), decision.clone());

                Ok(Some(decision))
            }
            None => Ok(None),
        }
    }
}

/// In-memory store for handler tests.
#[cfg(test)]
pub struct MemoryDecisionStore {
    decisions: RwLock<HashMap<String, AssignmentDecision>>,
}

#[cfg(test)]
impl MemoryDecisionStore {
    pub fn new() -> Self {
        Self {
            decisions: RwLock::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl DecisionStore for MemoryDecisionStore {
    async fn save_decision(&self, decision: &AssignmentDecision) -> Result<()> {
        let mut decisions = self.decisions.write().await;
        decisions.insert(decision.ticket_id.clone(), decision.clone());
        Ok(())
    }

    async fn get_decision(&self, ticket_id: &str) -> Result<Option<AssignmentDecision>> {
        let decisions = self.decisions.read().await;
        Ok(decisions.get(ticket_id).cloned())
    }
}
