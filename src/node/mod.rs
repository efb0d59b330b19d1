pub mod types;
pub mod source;
pub mod subscriptions;
pub mod inputs;
pub mod safety;
pub mod output;
pub mod commands;
pub mod control_loop;
pub mod lifecycle;

pub use types::{
    ActuatorArmed, ActuatorControls, GroupMask, NodeId, NodeInfo, OutputFrame, OutputVector, Version,
    ARMED_TOPIC, DEFAULT_BITRATE, MAX_OUTPUTS, NUM_CONTROLS, NUM_CONTROL_GROUPS,
};
pub use source::{ArmingSource, ControlSource, NodeIo, SubscriptionHandle, TopicControlSource};
pub use subscriptions::{PollSet, SubscriptionManager};
pub use inputs::{GroupSlot, InputAggregator, InputBuffer};
pub use safety::{SafetyGate, FAILSAFE_OUTPUT};
pub use output::{BusTransport, LogTransport, OutputSink};
pub use commands::{CommandReply, NodeCommand, NodeController};
pub use control_loop::{ControlLoop, TickOutcome};
pub use lifecycle::{NodeFactory, NodeHandle, NodeState, StopOutcome};
