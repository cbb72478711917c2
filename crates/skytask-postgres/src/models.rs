use std::str::FromStr;

use chrono::{DateTime, Utc};
use skytask_domain::{
    DomainError, DomainResult, FrequencyUnit, ImageType, Order, ReasonCode, Recurrence,
    RequestStatus, RevisitFrequency, ScheduleRequest,
};
use tokio_postgres::Row;

/// Schedule counters are stored as INTEGER. A value past `i32::MAX`
/// cannot round-trip through the column, so it is rejected instead of
/// clamped to a wrong number.
pub(crate) fn int_column(field: &str, value: u32) -> DomainResult<i32> {
    i32::try_from(value).map_err(|_| {
        DomainError::InvalidRecurrence(format!("{field} {value} exceeds storage range"))
    })
}

/// Image order row as stored in `image_orders`.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub order_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub priority: i32,
    pub image_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub delivery_deadline: DateTime<Utc>,
    pub repeat_order: bool,
    pub revisit_count: i32,
    pub revisit_frequency_amount: Option<i32>,
    pub revisit_frequency_unit: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OrderRow {
    pub fn from_row(row: &Row) -> Self {
        Self {
            order_id: row.get("order_id"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            priority: row.get("priority"),
            image_type: row.get("image_type"),
            start_time: row.get("start_time"),
            end_time: row.get("end_time"),
            delivery_deadline: row.get("delivery_deadline"),
            repeat_order: row.get("repeat_order"),
            revisit_count: row.get("revisit_count"),
            revisit_frequency_amount: row.get("revisit_frequency_amount"),
            revisit_frequency_unit: row.get("revisit_frequency_unit"),
            created_at: row.get("created_at"),
        }
    }

    pub fn into_domain(self) -> DomainResult<Order> {
        let frequency = match (self.revisit_frequency_amount, self.revisit_frequency_unit) {
            (Some(amount), Some(unit)) => Some(RevisitFrequency {
                amount: u32::try_from(amount).map_err(|_| {
                    DomainError::InvalidRecurrence(format!(
                        "negative revisit frequency amount: {amount}"
                    ))
                })?,
                unit: FrequencyUnit::from_str(&unit)?,
            }),
            (None, None) => None,
            _ => {
                return Err(DomainError::InvalidRecurrence(format!(
                    "partial revisit frequency stored for order {}",
                    self.order_id
                )))
            }
        };

        Ok(Order {
            order_id: self.order_id,
            latitude: self.latitude,
            longitude: self.longitude,
            priority: self.priority,
            image_type: ImageType::from_str(&self.image_type)?,
            start_time: self.start_time,
            end_time: self.end_time,
            delivery_deadline: self.delivery_deadline,
            recurrence: Recurrence {
                repeat: self.repeat_order,
                revisit_count: u32::try_from(self.revisit_count).unwrap_or(0),
                frequency,
            },
            created_at: Some(self.created_at),
        })
    }
}

/// Schedule request row as stored in `schedule_requests`.
#[derive(Debug, Clone)]
pub struct ScheduleRequestRow {
    pub request_id: String,
    pub order_id: String,
    pub order_type: String,
    pub visit_index: i32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub status: String,
    pub status_reason: Option<String>,
    pub reason_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleRequestRow {
    pub fn from_row(row: &Row) -> Self {
        Self {
            request_id: row.get("request_id"),
            order_id: row.get("order_id"),
            order_type: row.get("order_type"),
            visit_index: row.get("visit_index"),
            window_start: row.get("window_start"),
            window_end: row.get("window_end"),
            status: row.get("status"),
            status_reason: row.get("status_reason"),
            reason_code: row.get("reason_code"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    pub fn into_domain(self) -> DomainResult<ScheduleRequest> {
        let reason_code = self
            .reason_code
            .as_deref()
            .map(ReasonCode::from_str)
            .transpose()?;

        Ok(ScheduleRequest {
            request_id: self.request_id,
            order_id: self.order_id,
            order_type: ImageType::from_str(&self.order_type)?,
            visit_index: u32::try_from(self.visit_index).unwrap_or(0),
            window_start: self.window_start,
            window_end: self.window_end,
            status: RequestStatus::from_str(&self.status)?,
            status_reason: self.status_reason,
            reason_code,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_row_rejects_partial_frequency() {
        let now = Utc::now();
        let row = OrderRow {
            order_id: "order-1".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            priority: 1,
            image_type: "low".to_string(),
            start_time: now,
            end_time: now,
            delivery_deadline: now,
            repeat_order: true,
            revisit_count: 1,
            revisit_frequency_amount: Some(1),
            revisit_frequency_unit: None,
            created_at: now,
        };

        assert!(matches!(
            row.into_domain(),
            Err(DomainError::InvalidRecurrence(_))
        ));
    }

    #[test]
    fn test_int_column_rejects_out_of_range_instead_of_clamping() {
        assert_eq!(int_column("visit index", 7).unwrap(), 7);
        assert_eq!(int_column("visit index", i32::MAX as u32).unwrap(), i32::MAX);

        assert!(matches!(
            int_column("visit index", i32::MAX as u32 + 1),
            Err(DomainError::InvalidRecurrence(_))
        ));
        assert!(matches!(
            int_column("revisit count", u32::MAX),
            Err(DomainError::InvalidRecurrence(_))
        ));
    }

    #[test]
    fn test_request_row_parses_enums() {
        let now = Utc::now();
        let row = ScheduleRequestRow {
            request_id: "req-1".to_string(),
            order_id: "order-1".to_string(),
            order_type: "spotlight".to_string(),
            visit_index: 2,
            window_start: now,
            window_end: now,
            status: "rejected".to_string(),
            status_reason: Some("window elapsed".to_string()),
            reason_code: Some("expired".to_string()),
            created_at: now,
            updated_at: now,
        };

        let request = row.into_domain().unwrap();
        assert_eq!(request.order_type, ImageType::Spotlight);
        assert_eq!(request.status, RequestStatus::Rejected);
        assert_eq!(request.reason_code, Some(ReasonCode::Expired));
        assert_eq!(request.visit_index, 2);
    }
}
