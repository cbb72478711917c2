//! Recurrence expansion: one order becomes `revisit_count + 1` schedule
//! request drafts, each window shifted by a whole number of revisit
//! intervals.

use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::types::{Order, Recurrence, ScheduleRequestDraft};

/// Hard cap on revisits per order. Each visit becomes a stored schedule
/// request and a match dispatch, so the count bounds fan-out downstream.
pub const MAX_REVISIT_COUNT: u32 = 10_000;

/// Validate recurrence parameters at the intake boundary.
///
/// `repeat = true` requires a frequency; `repeat = false` forbids one
/// (the pair travels together or not at all).
pub fn validate_recurrence(recurrence: &Recurrence) -> DomainResult<()> {
    if recurrence.repeat && recurrence.frequency.is_none() {
        return Err(DomainError::InvalidRecurrence(
            "repeat is set but revisit frequency is missing".to_string(),
        ));
    }
    if !recurrence.repeat && recurrence.frequency.is_some() {
        return Err(DomainError::InvalidRecurrence(
            "revisit frequency given without repeat".to_string(),
        ));
    }
    if recurrence.revisit_count > MAX_REVISIT_COUNT {
        return Err(DomainError::InvalidRecurrence(format!(
            "revisit count {} exceeds the maximum of {MAX_REVISIT_COUNT}",
            recurrence.revisit_count
        )));
    }
    Ok(())
}

/// Expand an order into its schedule request drafts.
///
/// Pure function: no persistence, no overlap checks against other orders
/// (opportunity matching owns those). Visit `k` gets the order window
/// shifted by `k * interval`; a non-recurring order yields exactly one
/// draft with the order window itself.
pub fn expand_order(order: &Order) -> DomainResult<Vec<ScheduleRequestDraft>> {
    validate_recurrence(&order.recurrence)?;

    let visits = order.recurrence.revisit_count.checked_add(1).ok_or_else(|| {
        DomainError::InvalidRecurrence(format!(
            "revisit count too large: {}",
            order.recurrence.revisit_count
        ))
    })?;
    let interval = order
        .recurrence
        .frequency
        .map(|f| f.interval())
        .unwrap_or_else(chrono::Duration::zero);

    let mut drafts = Vec::with_capacity(visits as usize);
    for visit_index in 0..visits {
        let offset = interval * i32::try_from(visit_index).map_err(|_| {
            DomainError::InvalidRecurrence(format!("revisit count too large: {visits}"))
        })?;
        drafts.push(ScheduleRequestDraft {
            request_id: Uuid::new_v4().to_string(),
            order_id: order.order_id.clone(),
            order_type: order.image_type,
            visit_index,
            window_start: order.start_time + offset,
            window_end: order.end_time + offset,
        });
    }

    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrequencyUnit, ImageType, RevisitFrequency};
    use chrono::{Duration, TimeZone, Utc};

    fn order_with_recurrence(recurrence: Recurrence) -> Order {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Order {
            order_id: "order-1".to_string(),
            latitude: 10.0,
            longitude: 20.0,
            priority: 1,
            image_type: ImageType::Spotlight,
            start_time: start,
            end_time: start + Duration::hours(1),
            delivery_deadline: start + Duration::hours(2),
            recurrence,
            created_at: None,
        }
    }

    #[test]
    fn test_non_recurring_order_yields_single_draft() {
        let order = order_with_recurrence(Recurrence::none());

        let drafts = expand_order(&order).unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].visit_index, 0);
        assert_eq!(drafts[0].window_start, order.start_time);
        assert_eq!(drafts[0].window_end, order.end_time);
        assert_eq!(drafts[0].order_id, "order-1");
    }

    #[test]
    fn test_recurring_order_yields_revisit_count_plus_one_drafts() {
        // Spec-level example: 2 revisits, 1 day apart, 1 hour window.
        let order = order_with_recurrence(Recurrence {
            repeat: true,
            revisit_count: 2,
            frequency: Some(RevisitFrequency {
                amount: 1,
                unit: FrequencyUnit::Days,
            }),
        });

        let drafts = expand_order(&order).unwrap();

        assert_eq!(drafts.len(), 3);
        for (k, draft) in drafts.iter().enumerate() {
            let offset = Duration::days(k as i64);
            assert_eq!(draft.visit_index, k as u32);
            assert_eq!(draft.window_start, order.start_time + offset);
            assert_eq!(draft.window_end, order.end_time + offset);
            assert_eq!(draft.order_type, ImageType::Spotlight);
        }

        // Every window lies within [start, end + n * interval].
        let last = drafts.last().unwrap();
        assert_eq!(last.window_end, order.end_time + Duration::days(2));
    }

    #[test]
    fn test_zero_revisit_count_with_repeat_yields_one_draft() {
        let order = order_with_recurrence(Recurrence {
            repeat: true,
            revisit_count: 0,
            frequency: Some(RevisitFrequency {
                amount: 6,
                unit: FrequencyUnit::Hours,
            }),
        });

        let drafts = expand_order(&order).unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].window_start, order.start_time);
        assert_eq!(drafts[0].window_end, order.end_time);
    }

    #[test]
    fn test_repeat_without_frequency_is_invalid() {
        let order = order_with_recurrence(Recurrence {
            repeat: true,
            revisit_count: 3,
            frequency: None,
        });

        let result = expand_order(&order);

        assert!(matches!(result, Err(DomainError::InvalidRecurrence(_))));
    }

    #[test]
    fn test_frequency_without_repeat_is_invalid() {
        let order = order_with_recurrence(Recurrence {
            repeat: false,
            revisit_count: 0,
            frequency: Some(RevisitFrequency {
                amount: 1,
                unit: FrequencyUnit::Weeks,
            }),
        });

        assert!(matches!(
            expand_order(&order),
            Err(DomainError::InvalidRecurrence(_))
        ));
    }

    #[test]
    fn test_revisit_count_above_cap_is_rejected() {
        let order = order_with_recurrence(Recurrence {
            repeat: true,
            revisit_count: MAX_REVISIT_COUNT + 1,
            frequency: Some(RevisitFrequency {
                amount: 1,
                unit: FrequencyUnit::Days,
            }),
        });

        assert!(matches!(
            expand_order(&order),
            Err(DomainError::InvalidRecurrence(_))
        ));
    }

    #[test]
    fn test_revisit_count_u32_max_is_rejected_without_allocating() {
        let order = order_with_recurrence(Recurrence {
            repeat: true,
            revisit_count: u32::MAX,
            frequency: Some(RevisitFrequency {
                amount: 1,
                unit: FrequencyUnit::Hours,
            }),
        });

        assert!(matches!(
            expand_order(&order),
            Err(DomainError::InvalidRecurrence(_))
        ));
    }

    #[test]
    fn test_zero_length_window_is_accepted() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut order = order_with_recurrence(Recurrence::none());
        order.end_time = start;
        order.start_time = start;

        let drafts = expand_order(&order).unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].window_start, drafts[0].window_end);
    }

    #[test]
    fn test_minute_frequency_offsets() {
        let order = order_with_recurrence(Recurrence {
            repeat: true,
            revisit_count: 1,
            frequency: Some(RevisitFrequency {
                amount: 90,
                unit: FrequencyUnit::Minutes,
            }),
        });

        let drafts = expand_order(&order).unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(
            drafts[1].window_start - drafts[0].window_start,
            Duration::minutes(90)
        );
    }

    #[test]
    fn test_draft_ids_are_unique() {
        let order = order_with_recurrence(Recurrence {
            repeat: true,
            revisit_count: 4,
            frequency: Some(RevisitFrequency {
                amount: 1,
                unit: FrequencyUnit::Hours,
            }),
        });

        let drafts = expand_order(&order).unwrap();

        let mut ids: Vec<_> = drafts.iter().map(|d| d.request_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }
}
