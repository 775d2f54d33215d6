pub mod ids;
pub mod message;
pub mod profile;

pub use ids::ConnectionId;
pub use message::Message;
pub use profile::{Profile, ProfileRecord};
