pub mod channel;
pub mod reading;
pub mod response;
pub mod snapshot;

pub use channel::{default_channels, Channel, ChannelProfile};
pub use reading::{Reading, Status};
pub use response::PollResponse;
pub use snapshot::{Observation, Snapshot};
