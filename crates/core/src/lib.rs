pub mod config;
pub mod errors;
pub mod poll;
pub mod slots;

pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use poll::{mention, ClaimEvent, PollDefinition};
pub use slots::{reconcile, SlotGroups, SlotIndex, EMPTY_SLOT, MEMBER_SEPARATOR, SLOT_COUNT};
