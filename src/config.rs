/**
 * Node Configuration
 *
 * Node settings and the `start` command line.
 */

use std::time::Duration;
use thiserror::Error;

use crate::node::types::{NodeId, DEFAULT_BITRATE, MAX_OUTPUTS};

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(5);
pub const DEFAULT_STOP_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_STOP_RETRIES: u32 = 10;

pub const USAGE: &str = "usage: actuator_node start <node_id> [bitrate]";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError{
    #[error("missing command")]
    MissingCommand,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("missing node id")]
    MissingNodeId,

    #[error("Invalid Node ID {0}")]
    InvalidNodeId(String),

    #[error("Invalid bitrate {0}")]
    InvalidBitrate(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig{
    pub node_id: NodeId,
    pub bitrate: u32,
    /// Upper bound on one poll wait; also bounds shutdown latency
    pub poll_timeout: Duration,
    pub stop_interval: Duration,
    pub stop_retries: u32,
    pub max_outputs: usize,
}

impl NodeConfig{
    pub fn new(node_id: NodeId) -> Self{
        NodeConfig{
            node_id,
            bitrate: DEFAULT_BITRATE,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            stop_interval: DEFAULT_STOP_INTERVAL,
            stop_retries: DEFAULT_STOP_RETRIES,
            max_outputs: MAX_OUTPUTS,
        }
    }

    /// Zero selects the default bitrate
    pub fn with_bitrate(mut self, bitrate: u32) -> Self{
        self.bitrate = if bitrate == 0{ DEFAULT_BITRATE }else{ bitrate };
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self{
        self.poll_timeout = timeout;
        self
    }

    pub fn with_stop_policy(mut self, interval: Duration, retries: u32) -> Self{
        self.stop_interval = interval;
        self.stop_retries = retries;
        self
    }

    pub fn with_max_outputs(mut self, max_outputs: usize) -> Self{
        self.max_outputs = max_outputs.min(MAX_OUTPUTS);
        self
    }

    /// Longest a graceful stop is allowed to take
    pub fn stop_window(&self) -> Duration{
        self.stop_interval * self.stop_retries
    }
}

/// Parse `start <node_id> [bitrate]` (program name already stripped)
pub fn parse_start_args<S: AsRef<str>>(args: &[S]) -> Result<NodeConfig, UsageError>{
    let command = args.first().ok_or(UsageError::MissingCommand)?.as_ref();
    if command != "start"{
        return Err(UsageError::UnknownCommand(command.to_string()));
    }

    let raw_id = args.get(1).ok_or(UsageError::MissingNodeId)?.as_ref();
    let node_id = raw_id.trim().parse::<i64>().ok()
        .and_then(NodeId::new)
        .ok_or_else(|| UsageError::InvalidNodeId(raw_id.to_string()))?;

    let mut config = NodeConfig::new(node_id);

    if let Some(raw_bitrate) = args.get(2){
        let raw_bitrate = raw_bitrate.as_ref();
        let bitrate = raw_bitrate.trim().parse::<i64>()
            .map_err(|_| UsageError::InvalidBitrate(raw_bitrate.to_string()))?;
        //non-positive falls back to the default
        if bitrate > 0{
            let bitrate = u32::try_from(bitrate).map_err(|_| UsageError::InvalidBitrate(raw_bitrate.to_string()))?;
            config = config.with_bitrate(bitrate);
        }
    }

    Ok(config)
}
