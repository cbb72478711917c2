//! Wire messages carried on the order and request topics. JSON payloads
//! with a message id for correlation; consumers stay idempotent against
//! redelivery regardless of the id.

use serde::{Deserialize, Serialize};
use skytask_domain::{ImageType, MatchOutcome, MatchReport, Order};
use uuid::Uuid;

/// Published to `order.<image_type>.created` after an order is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedMessage {
    pub message_id: String,
    pub order_id: String,
    pub image_type: ImageType,
}

impl OrderCreatedMessage {
    pub fn for_order(order: &Order) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            order_id: order.order_id.clone(),
            image_type: order.image_type,
        }
    }
}

/// Published to `request.<id>.status` by matcher-side services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatusMessage {
    pub message_id: String,
    pub request_id: String,
    pub order_id: String,
    #[serde(flatten)]
    pub outcome: MatchOutcome,
    pub reason: Option<String>,
}

impl RequestStatusMessage {
    pub fn for_report(report: &MatchReport) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            request_id: report.request_id.clone(),
            order_id: report.order_id.clone(),
            outcome: report.outcome.clone(),
            reason: report.reason.clone(),
        }
    }

    pub fn into_report(self) -> MatchReport {
        MatchReport {
            request_id: self.request_id,
            order_id: self.order_id,
            outcome: self.outcome,
            reason: self.reason,
        }
    }
}
