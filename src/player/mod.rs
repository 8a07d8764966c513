mod session;

pub use session::{PlaybackSession, PositionTick};
