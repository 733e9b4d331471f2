use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopfloor_shared::{ItemKey, OrderNumber};
use uuid::Uuid;

use crate::CoreResult;

/// The user a mutation is performed for. Passed explicitly into every
/// mutating call; the initials end up on each audit note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub initials: String,
}

impl Actor {
    pub fn new(initials: impl Into<String>) -> Self {
        Self {
            initials: initials.into(),
        }
    }
}

/// What an audit note is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditSubject {
    Order { order_number: OrderNumber },
    Item { key: ItemKey },
}

impl AuditSubject {
    pub fn order_number(&self) -> OrderNumber {
        match self {
            AuditSubject::Order { order_number } => *order_number,
            AuditSubject::Item { key } => key.order_number,
        }
    }

    /// Item number, `0` for order-level notes
    pub fn item_number(&self) -> i32 {
        match self {
            AuditSubject::Order { .. } => 0,
            AuditSubject::Item { key } => key.item_number,
        }
    }
}

/// Append-only audit trail entry. Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditNote {
    pub id: Uuid,
    pub subject: AuditSubject,
    pub text: String,
    pub author: String,
    pub status_label: String,
    pub created_at: DateTime<Utc>,
}

impl AuditNote {
    pub fn new(
        subject: AuditSubject,
        text: String,
        author: String,
        status_label: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject,
            text,
            author,
            status_label,
            created_at,
        }
    }

    pub fn for_item(key: ItemKey, text: String, actor: &Actor, status_label: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            AuditSubject::Item { key },
            text,
            actor.initials.clone(),
            status_label.to_string(),
            at,
        )
    }

    pub fn for_order(
        order_number: OrderNumber,
        text: String,
        author: &str,
        status_label: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            AuditSubject::Order { order_number },
            text,
            author.to_string(),
            status_label.to_string(),
            at,
        )
    }
}

/// Destination for audit notes. Implemented by the order store's unit of work
/// so a note commits or rolls back together with the mutation it records.
#[async_trait]
pub trait AuditSink: Send {
    async fn append_note(&mut self, note: &AuditNote) -> CoreResult<()>;
}
