//! # PostgreSQL Message Queue (pgmq) Client
//!
//! Thin sqlx integration over the pgmq SQL function surface. One named
//! queue carries task-generation jobs; retries ride on the visibility
//! timeout.

use sqlx::{PgPool, Row};
use tracing::debug;

/// Message read from a queue with delivery metadata.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Message id assigned by pgmq.
    pub msg_id: i64,
    /// Delivery attempt count (1 on first read).
    pub read_ct: i32,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
    pub vt: chrono::DateTime<chrono::Utc>,
    pub message: serde_json::Value,
}

/// Queue depth snapshot for health reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueDepth {
    pub queue_name: String,
    pub queue_length: i64,
}

#[derive(Debug, Clone)]
pub struct PgmqClient {
    pool: PgPool,
}

impl PgmqClient {
    pub fn new_with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the queue if it does not exist yet.
    pub async fn create_queue(&self, queue_name: &str) -> Result<(), sqlx::Error> {
        debug!(queue = queue_name, "Creating queue");
        sqlx::query("SELECT pgmq_create($1)")
            .bind(queue_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Send one JSON message; returns the pgmq message id.
    pub async fn send(
        &self,
        queue_name: &str,
        message: &serde_json::Value,
        delay_seconds: Option<i32>,
    ) -> Result<i64, sqlx::Error> {
        let delay = delay_seconds.unwrap_or(0);
        let row = sqlx::query("SELECT pgmq_send($1, $2, $3) as msg_id")
            .bind(queue_name)
            .bind(message)
            .bind(delay)
            .fetch_one(&self.pool)
            .await?;
        let msg_id: i64 = row.get("msg_id");
        debug!(queue = queue_name, msg_id, "Message sent");
        Ok(msg_id)
    }

    /// Read up to `qty` messages, hiding them for `visibility_timeout`
    /// seconds.
    pub async fn read(
        &self,
        queue_name: &str,
        visibility_timeout: i32,
        qty: i32,
    ) -> Result<Vec<QueueMessage>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT msg_id, read_ct, enqueued_at, vt, message \
             FROM pgmq_read($1, $2, $3)",
        )
        .bind(queue_name)
        .bind(visibility_timeout)
        .bind(qty)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| QueueMessage {
                msg_id: row.get("msg_id"),
                read_ct: row.get("read_ct"),
                enqueued_at: row.get("enqueued_at"),
                vt: row.get("vt"),
                message: row.get("message"),
            })
            .collect())
    }

    /// Delete (acknowledge) a message.
    pub async fn delete(&self, queue_name: &str, msg_id: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT pgmq_delete($1, $2) as deleted")
            .bind(queue_name)
            .bind(msg_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("deleted"))
    }

    /// Move a message to the archive table for inspection.
    pub async fn archive(&self, queue_name: &str, msg_id: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT pgmq_archive($1, $2) as archived")
            .bind(queue_name)
            .bind(msg_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("archived"))
    }

    /// Push a message's visibility out by `vt_seconds` from now, used for
    /// backoff between delivery attempts.
    pub async fn set_visibility_timeout(
        &self,
        queue_name: &str,
        msg_id: i64,
        vt_seconds: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pgmq_set_vt($1, $2, $3)")
            .bind(queue_name)
            .bind(msg_id)
            .bind(vt_seconds)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Current queue depth.
    pub async fn queue_depth(&self, queue_name: &str) -> Result<QueueDepth, sqlx::Error> {
        let row = sqlx::query("SELECT queue_length FROM pgmq_metrics($1)")
            .bind(queue_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(QueueDepth {
            queue_name: queue_name.to_string(),
            queue_length: row.get("queue_length"),
        })
    }
}
