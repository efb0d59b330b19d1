/**
 * Node Input
 *
 * Where actuator control groups and the arming record come from.
 *
 * The loop only sees the ControlSource and ArmingSource traits; the
 * topic-registry implementations here are what the binary and the FFI use.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::NodeError;
use crate::pubsub::{Subscriber, TopicRegistry};
use super::types::{control_topic_name, ActuatorArmed, ActuatorControls, ARMED_TOPIC, NUM_CONTROL_GROUPS};

/// Opaque token for one live control-group subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle{
    pub group: usize,
    pub id: u64,
}

/// Per-group actuator control subscriptions
#[cfg_attr(test, mockall::automock)]
pub trait ControlSource: Send{
    fn subscribe(&mut self, group: usize) -> Result<SubscriptionHandle, NodeError>;

    fn unsubscribe(&mut self, handle: SubscriptionHandle);

    /// Wait up to `timeout` for any handle to have new data.
    ///
    /// Returns one readiness flag per handle, in the order given. An empty
    /// vector of `false`s means the wait timed out.
    fn poll(&mut self, handles: &[SubscriptionHandle], timeout: Duration) -> Result<Vec<bool>, NodeError>;

    /// Copy the latest sample for a handle, marking it seen
    fn fetch(&mut self, handle: SubscriptionHandle) -> Option<ActuatorControls>;
}

/// Source of arming updates; `None` when nothing changed since the last check
#[cfg_attr(test, mockall::automock)]
pub trait ArmingSource: Send{
    fn check(&mut self) -> Option<ActuatorArmed>;
}

impl ArmingSource for Subscriber<ActuatorArmed>{
    fn check(&mut self) -> Option<ActuatorArmed>{
        if self.updated(){
            self.copy()
        }else{
            None
        }
    }
}

/// Control groups backed by `actuator_controls_N` topics in a registry
pub struct TopicControlSource{
    registry: Arc<TopicRegistry>,
    subscriptions: HashMap<u64, Subscriber<ActuatorControls>>,
    next_id: u64,
}

impl TopicControlSource{
    pub fn new(registry: Arc<TopicRegistry>) -> Self{
        TopicControlSource{
            registry,
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn active_subscriptions(&self) -> usize{
        self.subscriptions.len()
    }
}

impl ControlSource for TopicControlSource{
    fn subscribe(&mut self, group: usize) -> Result<SubscriptionHandle, NodeError>{
        if group >= NUM_CONTROL_GROUPS{
            return Err(NodeError::Subscription{
                group,
                reason: format!("only {} control groups exist", NUM_CONTROL_GROUPS),
            });
        }

        let id = self.next_id;
        self.next_id += 1;

        let subscriber = self.registry.subscribe::<ActuatorControls>(&control_topic_name(group));
        self.subscriptions.insert(id, subscriber);

        Ok(SubscriptionHandle{ group, id })
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle){
        self.subscriptions.remove(&handle.id);
    }

    fn poll(&mut self, handles: &[SubscriptionHandle], timeout: Duration) -> Result<Vec<bool>, NodeError>{
        if handles.is_empty(){
            thread::sleep(timeout);
            return Ok(Vec::new());
        }

        let mut subs = Vec::with_capacity(handles.len());
        for handle in handles{
            match self.subscriptions.get(&handle.id){
                Some(sub) => subs.push(sub),
                None => return Err(NodeError::Poll(format!("unknown subscription {}", handle.id))),
            }
        }

        self.registry.notifier().wait_until(timeout, || subs.iter().any(|s| s.updated()));

        Ok(subs.iter().map(|s| s.updated()).collect())
    }

    fn fetch(&mut self, handle: SubscriptionHandle) -> Option<ActuatorControls>{
        self.subscriptions.get(&handle.id)?.copy()
    }
}

/// Input collaborators handed to a node at start
pub struct NodeIo{
    pub controls: Box<dyn ControlSource>,
    pub arming: Box<dyn ArmingSource>,
}

impl NodeIo{
    pub fn new(controls: Box<dyn ControlSource>, arming: Box<dyn ArmingSource>) -> Self{
        NodeIo{ controls, arming }
    }

    pub fn from_registry(registry: &Arc<TopicRegistry>) -> Self{
        NodeIo{
            controls: Box::new(TopicControlSource::new(Arc::clone(registry))),
            arming: Box::new(registry.subscribe::<ActuatorArmed>(ARMED_TOPIC)),
        }
    }
}
