//! RAG side-channel: worker transports, the bounded priority queue,
//! and the multiplexer that fronts them.

pub mod multiplexer;
pub mod queue;
pub mod worker;
