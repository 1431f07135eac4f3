pub mod booking;
pub mod catalog;
pub mod payment;
pub mod pricing;

pub use booking::*;
pub use catalog::*;
pub use payment::*;
pub use pricing::{Commission, PriceQuote};
