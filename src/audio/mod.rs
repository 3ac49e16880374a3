//! Buffering subsystem: queues, channel buffers, sessions and the
//! registry the switch callback reads from

pub mod buffer;
pub mod queue;
pub mod registry;
pub mod session;

pub use buffer::{ChannelBuffer, HalfBufferPair};
pub use queue::{AccumulationQueue, QueueStats, SharedQueue};
pub use session::{BufferManager, Session, SessionChannels};
