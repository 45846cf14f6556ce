//! Operator reads and status updates.

use crate::error::{Result, WmsError};
use crate::events::{EventBus, RealtimeEventType};
use crate::models::{Operator, OperatorStatus, PaginationInfo};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct OperatorListPage {
    pub operators: Vec<Operator>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Clone)]
pub struct OperatorService {
    pool: PgPool,
    bus: EventBus,
}

impl OperatorService {
    pub fn new(pool: PgPool, bus: EventBus) -> Self {
        Self { pool, bus }
    }

    pub async fn get_operator(&self, id: Uuid) -> Result<Operator> {
        Operator::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| WmsError::NotFound(format!("operator {id} not found")))
    }

    pub async fn list_operators(
        &self,
        status: Option<OperatorStatus>,
        page: i64,
        limit: i64,
    ) -> Result<OperatorListPage> {
        if page < 1 {
            return Err(WmsError::InvalidInput(format!("page must be >= 1, got {page}")));
        }
        if !(1..=200).contains(&limit) {
            return Err(WmsError::InvalidInput(format!(
                "limit must be between 1 and 200, got {limit}"
            )));
        }

        let (operators, total) = Operator::list(&self.pool, status, page, limit).await?;
        Ok(OperatorListPage {
            operators,
            pagination: PaginationInfo::new(page, limit, total),
        })
    }

    /// Update availability and broadcast the change. The publish is
    /// best-effort and never fails the update.
    pub async fn update_status(&self, id: Uuid, status: OperatorStatus) -> Result<Operator> {
        let operator = Operator::update_status(&self.pool, id, status)
            .await?
            .ok_or_else(|| WmsError::NotFound(format!("operator {id} not found")))?;

        let payload = json!({
            "operatorId": operator.id,
            "status": operator.status,
            "name": operator.name,
        });
        if let Err(e) = self
            .bus
            .publish(RealtimeEventType::OperatorStatusUpdated, payload)
            .await
        {
            warn!(operator_id = %id, error = %e, "Failed to publish OPERATOR_STATUS_UPDATED");
        }

        Ok(operator)
    }
}
