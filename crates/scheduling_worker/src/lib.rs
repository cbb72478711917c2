pub mod nats;
pub mod scheduling_worker;

pub use nats::*;
pub use scheduling_worker::*;
