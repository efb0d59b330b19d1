/**
 * Node Lifecycle
 *
 * Uninitialized -> Starting -> Running -> StopRequested -> Stopped
 *
 * The factory owns the bus transport and allows one running node at a time.
 * Stopping is cooperative first; a loop that does not exit within the retry
 * window is detached.
 */

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::mixer::MixingPipeline;
use super::commands::NodeController;
use super::control_loop::ControlLoop;
use super::output::BusTransport;
use super::source::NodeIo;
use super::types::{NodeId, NodeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState{
    Uninitialized = 0,
    Starting = 1,
    Running = 2,
    StopRequested = 3,
    Stopped = 4,
}

impl NodeState{
    fn from_u8(value: u8) -> Self{
        match value{
            1 => NodeState::Starting,
            2 => NodeState::Running,
            3 => NodeState::StopRequested,
            4 => NodeState::Stopped,
            _ => NodeState::Uninitialized,
        }
    }
}

//clears the factory's active flag when the loop thread is done with the
//bus, including on panic
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard{
    fn drop(&mut self){
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Node state readable from any thread
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell{
    pub fn new(state: NodeState) -> Self{
        StateCell(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> NodeState{
        NodeState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: NodeState){
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome{
    /// Loop exited and released its subscriptions
    Graceful,
    /// Loop did not exit in time and was detached; the factory stays
    /// active until it does exit
    Forced,
    AlreadyStopped,
}

pub struct NodeFactory{
    transport: Box<dyn BusTransport>,
    transport_ready: bool,
    active: Arc<AtomicBool>,
    info: NodeInfo,
}

impl NodeFactory{
    pub fn new(transport: Box<dyn BusTransport>) -> Self{
        NodeFactory{
            transport,
            transport_ready: false,
            active: Arc::new(AtomicBool::new(false)),
            info: NodeInfo::default(),
        }
    }

    pub fn with_node_info(mut self, info: NodeInfo) -> Self{
        self.info = info;
        self
    }

    pub fn is_active(&self) -> bool{
        self.active.load(Ordering::SeqCst)
    }

    pub fn transport_initialized(&self) -> bool{
        self.transport_ready
    }

    pub fn start(&mut self, config: NodeConfig, io: NodeIo) -> Result<NodeHandle>{
        self.start_with_pipeline(config, io, MixingPipeline::default())
    }

    pub fn start_with_pipeline(&mut self, config: NodeConfig, io: NodeIo, pipeline: MixingPipeline) -> Result<NodeHandle>{
        if self.active.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err(){
            warn!(node = %config.node_id, "node already started");
            return Err(NodeError::AlreadyStarted);
        }

        let state = Arc::new(StateCell::new(NodeState::Starting));
        match self.launch(&config, io, pipeline, &state){
            Ok(handle) => Ok(handle),
            Err(e) =>{
                error!(node = %config.node_id, error = %e, "node start failed");
                state.set(NodeState::Uninitialized);
                self.active.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn launch(&mut self, config: &NodeConfig, io: NodeIo, pipeline: MixingPipeline, state: &Arc<StateCell>) -> Result<NodeHandle>{
        if !self.transport_ready{
            self.transport.init(config.bitrate)?;
            self.transport_ready = true;
        }

        let sink = self.transport.open_node(config.node_id, &self.info)?;
        let controller = NodeController::new(pipeline).with_max_outputs(config.max_outputs);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut control_loop = ControlLoop::new(config, io, sink, controller.clone());
        let thread_shutdown = Arc::clone(&shutdown);
        let thread_state = Arc::clone(state);
        let thread_active = Arc::clone(&self.active);

        state.set(NodeState::Running);
        let thread = thread::Builder::new()
            .name(format!("actuator-node-{}", config.node_id))
            .spawn(move ||{
                let _active = ActiveGuard(thread_active);
                control_loop.run(&thread_shutdown, &thread_state);
            })?;

        info!(node = %config.node_id, bitrate = config.bitrate, "node started");

        Ok(NodeHandle{
            controller,
            shutdown,
            state: Arc::clone(state),
            thread: Some(thread),
            active: Arc::clone(&self.active),
            stop_interval: config.stop_interval,
            stop_retries: config.stop_retries,
            node_id: config.node_id,
        })
    }
}

/// Running node; dropping it stops the node
pub struct NodeHandle{
    controller: NodeController,
    shutdown: Arc<AtomicBool>,
    state: Arc<StateCell>,
    thread: Option<JoinHandle<()>>,
    active: Arc<AtomicBool>,
    stop_interval: Duration,
    stop_retries: u32,
    node_id: NodeId,
}

impl NodeHandle{
    pub fn controller(&self) -> &NodeController{
        &self.controller
    }

    pub fn state(&self) -> NodeState{
        self.state.get()
    }

    pub fn node_id(&self) -> NodeId{
        self.node_id
    }

    pub fn stop(mut self) -> StopOutcome{
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> StopOutcome{
        let thread = match self.thread.take(){
            Some(thread) => thread,
            None => return StopOutcome::AlreadyStopped,
        };

        self.shutdown.store(true, Ordering::SeqCst);
        debug!(node = %self.node_id, "stop requested");

        let mut finished = thread.is_finished();
        for _ in 0..self.stop_retries{
            if finished{
                break;
            }
            thread::sleep(self.stop_interval);
            finished = thread.is_finished();
        }

        if finished{
            if thread.join().is_err(){
                error!(node = %self.node_id, "control loop panicked");
            }
            self.active.store(false, Ordering::SeqCst);
            info!(node = %self.node_id, "node stopped");
            StopOutcome::Graceful
        }else{
            //dropping the JoinHandle detaches the thread; its ActiveGuard
            //releases the factory once the loop finally exits
            warn!(
                node = %self.node_id,
                waited_ms = (self.stop_interval * self.stop_retries).as_millis() as u64,
                "control loop did not exit, detaching"
            );
            drop(thread);
            StopOutcome::Forced
        }
    }
}

impl Drop for NodeHandle{
    fn drop(&mut self){
        self.shutdown_inner();
    }
}
