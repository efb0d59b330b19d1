//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actuator_node::node::{BusTransport, NodeId, NodeInfo, OutputFrame, OutputSink};
use actuator_node::{NodeConfig, NodeError};

/// Group 0 control 0 to output 0, group 0 control 1 (doubled) to output 1
pub const GROUP0_MIXER: &[u8] = b"# two outputs, group 0 only\n\
M: 1\nO: 10000 10000 0 -10000 10000\nS: 0 0 10000 10000 0 -10000 10000\n\
M: 1\nO: 10000 10000 0 -20000 20000\nS: 0 1 20000 20000 0 -20000 20000\n\0";

pub fn fast_config(id: i64) -> NodeConfig{
    NodeConfig::new(NodeId::new(id).unwrap())
        .with_poll_timeout(Duration::from_millis(5))
        .with_stop_policy(Duration::from_millis(50), 10)
}

#[derive(Default)]
pub struct Recorded{
    pub frames: Vec<OutputFrame>,
    pub arm_edges: Vec<bool>,
}

/// Sink that keeps everything it is given
pub struct RecordingSink{
    pub log: Arc<Mutex<Recorded>>,
}

impl OutputSink for RecordingSink{
    fn transmit(&mut self, frame: &OutputFrame) -> Result<(), NodeError>{
        self.log.lock().unwrap().frames.push(*frame);
        Ok(())
    }

    fn arm_changed(&mut self, armed: bool) -> Result<(), NodeError>{
        self.log.lock().unwrap().arm_edges.push(armed);
        Ok(())
    }
}

/// Transport that counts init calls and hands out recording sinks
#[derive(Clone, Default)]
pub struct CountingTransport{
    pub inits: Arc<AtomicUsize>,
    pub opens: Arc<AtomicUsize>,
    pub log: Arc<Mutex<Recorded>>,
}

impl CountingTransport{
    pub fn init_count(&self) -> usize{
        self.inits.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize{
        self.opens.load(Ordering::SeqCst)
    }
}

impl BusTransport for CountingTransport{
    fn init(&mut self, _bitrate: u32) -> Result<(), NodeError>{
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn open_node(&mut self, _node_id: NodeId, _info: &NodeInfo) -> Result<Box<dyn OutputSink>, NodeError>{
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSink{ log: Arc::clone(&self.log) }))
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool{
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline{
        if cond(){
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
