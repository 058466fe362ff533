pub mod fanout;
pub mod message_purge;

pub use fanout::FanoutWorker;
pub use message_purge::MessagePurgeWorker;
