pub mod backoff;
pub mod circular_buffer;
pub mod frame;
pub mod health;
pub mod log_sampling;
pub mod throttle;
pub mod types;

pub use backoff::*;
pub use circular_buffer::*;
pub use frame::*;
pub use health::*;
pub use log_sampling::*;
pub use throttle::*;
pub use types::*;
