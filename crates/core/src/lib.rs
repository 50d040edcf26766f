pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod grid;
pub mod session;

pub use domain::{BookedSlot, DayOption, DaySchedule, OwnerLabel, SlotOption, UserId, UserProfile};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{RegistrationAction, RegistrationEvent, RegistrationFlow, RegistrationState};
pub use grid::{CellAddress, CellRange, GridError, Slot};
pub use session::{InMemorySessionStore, Session, SessionStore};
