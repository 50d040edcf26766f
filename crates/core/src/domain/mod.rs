pub mod booking;
pub mod user;

pub use booking::{
    BookedSlot, DayOption, DaySchedule, SlotOption, DEFAULT_DAY_LABEL, DEFAULT_TIME_LABEL,
};
pub use user::{OwnerLabel, UserId, UserProfile};
