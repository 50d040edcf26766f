pub mod booking;
pub mod users;

pub use booking::{BookingGrid, ClaimOutcome, GridSnapshot};
pub use users::UserRegistry;
