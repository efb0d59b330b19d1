use tracing::{debug, info, warn};

use super::inputs::InputBuffer;
use super::source::{ControlSource, SubscriptionHandle};
use super::types::{GroupMask, NUM_CONTROL_GROUPS};

/// Active handles in ascending group order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSet{
    handles: Vec<SubscriptionHandle>,
}

impl PollSet{
    pub fn handles(&self) -> &[SubscriptionHandle]{
        &self.handles
    }

    pub fn len(&self) -> usize{
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool{
        self.handles.is_empty()
    }

    fn rebuild(&mut self, buffer: &InputBuffer){
        self.handles.clear();
        for group in 0..NUM_CONTROL_GROUPS{
            if let Some(handle) = buffer.slot(group).handle{
                self.handles.push(handle);
            }
        }
    }
}

/// Keeps the subscribed group set converged on the required one
#[derive(Debug, Default)]
pub struct SubscriptionManager{
    subscribed: GroupMask,
    //groups whose last acquisition failed, so the warning is logged once
    failing: GroupMask,
    poll_set: PollSet,
}

impl SubscriptionManager{
    pub fn new() -> Self{
        Self::default()
    }

    pub fn subscribed(&self) -> GroupMask{
        self.subscribed
    }

    pub fn poll_set(&self) -> &PollSet{
        &self.poll_set
    }

    /// Subscribe newly required groups and release ones no longer required.
    ///
    /// A group whose acquisition fails stays out of the subscribed mask and
    /// the poll set; it is retried on the next call. Returns whether the
    /// poll set was rebuilt.
    pub fn reconcile(&mut self, source: &mut dyn ControlSource, buffer: &mut InputBuffer, required: GroupMask) -> bool{
        let to_subscribe = required.difference(self.subscribed);
        let to_release = self.subscribed.difference(required);

        if to_subscribe.is_empty() && to_release.is_empty(){
            return false;
        }

        for group in 0..NUM_CONTROL_GROUPS{
            if to_subscribe.contains(group){
                match source.subscribe(group){
                    Ok(handle) =>{
                        info!(group, "subscribed to actuator_controls_{}", group);
                        buffer.slot_mut(group).handle = Some(handle);
                        self.subscribed.insert(group);
                        self.failing.remove(group);
                    }
                    Err(e) =>{
                        if self.failing.contains(group){
                            debug!(group, error = %e, "control group subscription still failing");
                        }else{
                            warn!(group, error = %e, "control group subscription failed");
                            self.failing.insert(group);
                        }
                        buffer.slot_mut(group).handle = None;
                    }
                }
            }

            if to_release.contains(group){
                if let Some(handle) = buffer.slot_mut(group).handle.take(){
                    info!(group, "unsubscribed from actuator_controls_{}", group);
                    source.unsubscribe(handle);
                }
                self.subscribed.remove(group);
            }
        }

        self.poll_set.rebuild(buffer);
        true
    }

    /// Release every held subscription
    pub fn release_all(&mut self, source: &mut dyn ControlSource, buffer: &mut InputBuffer){
        for group in self.subscribed.iter(){
            if let Some(handle) = buffer.slot_mut(group).handle.take(){
                source.unsubscribe(handle);
            }
        }
        self.subscribed = GroupMask::EMPTY;
        self.failing = GroupMask::EMPTY;
        self.poll_set.rebuild(buffer);
    }
}
