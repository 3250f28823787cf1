pub mod connection;
pub mod multiplexer;
pub mod poll;
pub mod shutdown;
pub mod timeout;

pub use multiplexer::Multiplexer;
