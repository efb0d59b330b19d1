pub mod error;
pub mod config;
pub mod pubsub;
pub mod mixer;
pub mod node;
pub mod uart;
pub mod ffi;

pub use error::{MixError, NodeError, Result};
pub use config::{parse_start_args, NodeConfig, UsageError};

pub use pubsub::{
    Message, Notifier, Topic,
    Publisher, Subscriber,
    TopicRegistry,
};

pub use mixer::{Mixer, MixerParser, MixingPipeline, SimpleMixerParser};

pub use node::{
    NodeCommand, NodeController, NodeFactory, NodeHandle, NodeId, NodeIo,
    NodeState, StopOutcome,
};

pub use uart::{SerialSink, SerialTransport};
