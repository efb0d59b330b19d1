pub mod protocol;
pub use protocol::*;

use std::io::Write;
use std::time::Duration;
use serialport::SerialPort;
use tracing::info;

use crate::error::NodeError;
use crate::node::output::{BusTransport, OutputSink};
use crate::node::types::{NodeId, NodeInfo, OutputFrame};

/// Bus transport over a serial port; the bitrate doubles as the baud rate
pub struct SerialTransport{
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport{
    pub fn new(port_name: &str) -> Self{
        SerialTransport{
            port_name: port_name.to_string(),
            port: None,
        }
    }

    pub fn port_name(&self) -> &str{
        &self.port_name
    }
}

impl BusTransport for SerialTransport{
    fn init(&mut self, bitrate: u32) -> Result<(), NodeError>{
        info!(port = %self.port_name, bitrate, "opening serial bus");

        let port = serialport::new(&self.port_name, bitrate)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|e| NodeError::Init(format!("failed to open {}: {}", self.port_name, e)))?;

        self.port = Some(port);
        Ok(())
    }

    fn open_node(&mut self, node_id: NodeId, info: &NodeInfo) -> Result<Box<dyn OutputSink>, NodeError>{
        let port = self.port.as_ref()
            .ok_or_else(|| NodeError::Init("serial bus not initialized".into()))?
            .try_clone()
            .map_err(|e| NodeError::Init(format!("failed to share {}: {}", self.port_name, e)))?;

        info!(
            %node_id,
            name = %info.name,
            sw = format_args!("{}.{}", info.software_version.major, info.software_version.minor),
            "node online"
        );
        Ok(Box::new(SerialSink::new(port, node_id)))
    }
}

/// Writes output and arm frames to any byte stream
pub struct SerialSink<W: Write + Send>{
    port: W,
    node_id: NodeId,
}

impl<W: Write + Send> SerialSink<W>{
    pub fn new(port: W, node_id: NodeId) -> Self{
        SerialSink{ port, node_id }
    }

    pub fn into_inner(self) -> W{
        self.port
    }

    fn send_frame(&mut self, msg_type: MsgType, payload: &[u8]) -> Result<(), NodeError>{
        let frame = encode_frame(msg_type, payload)
            .ok_or_else(|| NodeError::Transmit("Payload too large".into()))?;

        self.port.write_all(&frame).map_err(|e| NodeError::Transmit(e.to_string()))?;
        self.port.flush().map_err(|e| NodeError::Transmit(e.to_string()))?;
        Ok(())
    }
}

impl<W: Write + Send> OutputSink for SerialSink<W>{
    fn transmit(&mut self, frame: &OutputFrame) -> Result<(), NodeError>{
        self.send_frame(MsgType::Output, &output_payload(frame))
    }

    fn arm_changed(&mut self, armed: bool) -> Result<(), NodeError>{
        self.send_frame(MsgType::Arm, &arm_payload(self.node_id.get(), armed))
    }
}
