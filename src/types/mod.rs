//! Type definitions

pub mod itinerary;
pub mod messages;
pub mod patch;
pub mod planning;
pub mod point;

pub use itinerary::*;
pub use messages::*;
pub use patch::*;
pub use planning::*;
pub use point::*;
