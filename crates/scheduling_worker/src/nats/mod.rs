mod order_created_processor;
mod request_status_processor;

pub use order_created_processor::create_order_created_processor;
pub use request_status_processor::create_request_status_processor;
