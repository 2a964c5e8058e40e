pub mod pipeline;
pub mod probe;
pub mod stage;
pub mod transcode;
