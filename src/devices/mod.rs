//! Reference peripherals for the bus.

pub mod clock;
pub mod console;

pub use clock::Clock;
pub use console::{Console, ErrorListener};
