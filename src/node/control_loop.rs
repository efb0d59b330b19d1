/**
 * Control Loop
 *
 * One iteration:
 * 1. reconcile subscriptions against the mixer's required groups
 * 2. bounded poll, copying fresh inputs into the buffer
 * 3. mix and clamp (skipped when no mixer is loaded)
 * 4. transmit the frame with the current arm state
 * 5. refresh arming and notify the sink on an edge
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{error, info, warn};

use crate::config::NodeConfig;
use super::commands::NodeController;
use super::inputs::{InputAggregator, InputBuffer};
use super::lifecycle::{NodeState, StateCell};
use super::output::OutputSink;
use super::source::NodeIo;
use super::subscriptions::SubscriptionManager;
use super::types::{GroupMask, NodeId, OutputFrame, OutputVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome{
    /// Poll failed; nothing mixed or sent this tick
    PollFailed,
    /// No mixer loaded; nothing sent
    Idle,
    /// A frame with this many channels went to the sink
    Transmitted(usize),
}

pub struct ControlLoop{
    node_id: NodeId,
    io: NodeIo,
    sink: Box<dyn OutputSink>,
    controller: NodeController,
    subscriptions: SubscriptionManager,
    aggregator: InputAggregator,
    buffer: InputBuffer,
    outputs: OutputVector,
    max_outputs: usize,
}

impl ControlLoop{
    pub fn new(config: &NodeConfig, io: NodeIo, sink: Box<dyn OutputSink>, controller: NodeController) -> Self{
        ControlLoop{
            node_id: config.node_id,
            io,
            sink,
            controller,
            subscriptions: SubscriptionManager::new(),
            aggregator: InputAggregator::new(config.poll_timeout),
            buffer: InputBuffer::new(),
            outputs: OutputVector::default(),
            max_outputs: config.max_outputs,
        }
    }

    pub fn subscribed(&self) -> GroupMask{
        self.subscriptions.subscribed()
    }

    pub fn poll_set_len(&self) -> usize{
        self.subscriptions.poll_set().len()
    }

    pub fn inputs(&self) -> &InputBuffer{
        &self.buffer
    }

    /// Last frame values handed to the sink
    pub fn last_outputs(&self) -> &OutputVector{
        &self.outputs
    }

    pub fn tick(&mut self) -> TickOutcome{
        let required = self.controller.groups_required();
        self.subscriptions.reconcile(self.io.controls.as_mut(), &mut self.buffer, required);

        if let Err(e) = self.aggregator.poll(self.io.controls.as_mut(), self.subscriptions.poll_set(), &mut self.buffer){
            error!(error = %e, "poll error");
            //back off one poll period before the next attempt
            thread::sleep(self.aggregator.timeout());
            return TickOutcome::PollFailed;
        }

        let frame ={
            let shared = self.controller.lock();
            match shared.pipeline.mix(&self.buffer, self.max_outputs){
                Some(mut outputs) =>{
                    shared.gate.clamp(&mut outputs);
                    self.outputs = outputs;
                    Some(OutputFrame{ node_id: self.node_id, outputs, armed: shared.gate.is_armed() })
                }
                None => None,
            }
        };

        let outcome = match frame{
            Some(frame) =>{
                if let Err(e) = self.sink.transmit(&frame){
                    warn!(error = %e, "output transmit failed");
                }
                TickOutcome::Transmitted(frame.outputs.noutputs)
            }
            None => TickOutcome::Idle,
        };

        let edge ={
            let mut shared = self.controller.lock();
            if let Some(armed) = self.io.arming.check(){
                shared.gate.update_arm(armed.armed, armed.lockdown);
            }
            shared.gate.take_arm_notification()
        };
        if let Some(armed) = edge{
            if let Err(e) = self.sink.arm_changed(armed){
                warn!(error = %e, "arm notification failed");
            }
        }

        outcome
    }

    /// Tick until `shutdown` is set, then release every subscription
    pub fn run(&mut self, shutdown: &AtomicBool, state: &StateCell){
        info!(node = %self.node_id, "control loop running");

        while !shutdown.load(Ordering::SeqCst){
            self.tick();
        }

        state.set(NodeState::StopRequested);
        self.teardown();
        state.set(NodeState::Stopped);

        info!(node = %self.node_id, "control loop stopped");
    }

    pub fn teardown(&mut self){
        self.subscriptions.release_all(self.io.controls.as_mut(), &mut self.buffer);
    }
}
