/**
 * Node Output
 *
 * The bus transport and the per-node sink it opens.
 */

use tracing::{debug, info};

use crate::error::NodeError;
use super::types::{NodeId, NodeInfo, OutputFrame};

/// Receives mixed frames and arm-state edges for one node
#[cfg_attr(test, mockall::automock)]
pub trait OutputSink: Send{
    fn transmit(&mut self, frame: &OutputFrame) -> Result<(), NodeError>;

    /// Called once per change of the effective arm state
    fn arm_changed(&mut self, armed: bool) -> Result<(), NodeError>;
}

/// Shared bus setup; `init` runs at most once per factory
#[cfg_attr(test, mockall::automock)]
pub trait BusTransport: Send{
    fn init(&mut self, bitrate: u32) -> Result<(), NodeError>;

    fn open_node(&mut self, node_id: NodeId, info: &NodeInfo) -> Result<Box<dyn OutputSink>, NodeError>;
}

/// Transport that only reports frames through tracing
#[derive(Debug, Default)]
pub struct LogTransport{
    bitrate: Option<u32>,
}

impl LogTransport{
    pub fn new() -> Self{
        Self::default()
    }
}

impl BusTransport for LogTransport{
    fn init(&mut self, bitrate: u32) -> Result<(), NodeError>{
        info!(bitrate, "log transport ready");
        self.bitrate = Some(bitrate);
        Ok(())
    }

    fn open_node(&mut self, node_id: NodeId, info: &NodeInfo) -> Result<Box<dyn OutputSink>, NodeError>{
        if self.bitrate.is_none(){
            return Err(NodeError::Init("transport not initialized".into()));
        }
        info!(%node_id, name = %info.name, "node online (log transport)");
        Ok(Box::new(LogSink{ frames: 0 }))
    }
}

pub struct LogSink{
    frames: u64,
}

impl OutputSink for LogSink{
    fn transmit(&mut self, frame: &OutputFrame) -> Result<(), NodeError>{
        self.frames += 1;
        let state = if frame.armed{ "ARMED" }else{ "DISARMED" };
        debug!(
            node = %frame.node_id,
            seq = self.frames,
            outputs = ?frame.outputs.values(),
            state,
            "bus out"
        );
        Ok(())
    }

    fn arm_changed(&mut self, armed: bool) -> Result<(), NodeError>{
        info!(armed, "bus arm state");
        Ok(())
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::node::types::OutputVector;

    #[test]
    fn test_log_transport_requires_init(){
        let mut transport = LogTransport::new();
        let id = NodeId::new(10).unwrap();
        assert!(matches!(transport.open_node(id, &NodeInfo::default()), Err(NodeError::Init(_))));

        transport.init(500_000).unwrap();
        let mut sink = transport.open_node(id, &NodeInfo::default()).unwrap();
        let frame = OutputFrame{ node_id: id, outputs: OutputVector::default(), armed: false };
        assert!(sink.transmit(&frame).is_ok());
        assert!(sink.arm_changed(true).is_ok());
    }
}
