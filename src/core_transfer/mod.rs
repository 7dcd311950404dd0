// File transfers: slot accounting, data connections and the streaming pipeline.

pub mod counter;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod throttle;
pub mod transcode;

pub use counter::TransferCounter;
pub use data::{ActiveTarget, DataChannel, PassiveListener};
pub use pipeline::TransferPipeline;
pub use state::{DataType, Direction};
