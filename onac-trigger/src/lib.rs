pub mod channel;
pub mod dispatcher;

pub use channel::{TriggerChannel, TriggerError, TriggerSink};
pub use dispatcher::TriggerDispatcher;
