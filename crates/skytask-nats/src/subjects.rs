//! Stream and subject naming. The topic shapes `order.<image_type>.created`
//! and `request.<id>.status` are an interoperability contract with the
//! other tasking services and must not change.

use skytask_domain::ImageType;

/// Stream holding order lifecycle events.
pub const ORDERS_STREAM: &str = "orders";
/// Subject filter covering every order-created topic.
pub const ORDER_CREATED_FILTER: &str = "order.*.created";

/// Stream holding per-request status events.
pub const REQUESTS_STREAM: &str = "requests";
/// Subject filter covering every request-status topic.
pub const REQUEST_STATUS_FILTER: &str = "request.*.status";

/// Stream receiving messages that exhausted their delivery attempts.
pub const DEADLETTER_STREAM: &str = "deadletter";
pub const DEADLETTER_FILTER: &str = "deadletter.>";

/// Subjects a stream must bind so its filter matches.
pub fn stream_subjects(stream: &str) -> Vec<String> {
    match stream {
        ORDERS_STREAM => vec![ORDER_CREATED_FILTER.to_string()],
        REQUESTS_STREAM => vec![REQUEST_STATUS_FILTER.to_string()],
        _ => vec![format!("{stream}.>")],
    }
}

pub fn order_created_subject(image_type: ImageType) -> String {
    format!("order.{image_type}.created")
}

pub fn request_status_subject(request_id: &str) -> String {
    format!("request.{request_id}.status")
}

/// Dead-letter subject for a poisoned message, keyed by the stream it
/// failed on so operators can inspect per source.
pub fn deadletter_subject(stream: &str) -> String {
    format!("{DEADLETTER_STREAM}.{stream}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_created_subject_matches_topic_convention() {
        assert_eq!(
            order_created_subject(ImageType::Spotlight),
            "order.spotlight.created"
        );
        assert_eq!(order_created_subject(ImageType::Low), "order.low.created");
    }

    #[test]
    fn test_request_status_subject_embeds_request_id() {
        assert_eq!(
            request_status_subject("9f3b"),
            "request.9f3b.status"
        );
    }

    #[test]
    fn test_deadletter_subject_keys_by_stream() {
        assert_eq!(deadletter_subject(ORDERS_STREAM), "deadletter.orders");
    }
}
