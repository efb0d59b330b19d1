use std::time::Duration;
use tracing::trace;

use crate::error::NodeError;
use crate::mixer::ControlInputs;
use super::source::{ControlSource, SubscriptionHandle};
use super::subscriptions::PollSet;
use super::types::{ActuatorControls, GroupMask, NUM_CONTROLS, NUM_CONTROL_GROUPS};

/// Per-group state; index i always refers to control group i
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupSlot{
    pub handle: Option<SubscriptionHandle>,
    pub controls: ActuatorControls,
    //set when the last poll delivered fresh data for this group
    pub fresh: bool,
}

/// Latest input per control group, held across ticks
#[derive(Debug, Clone, Default)]
pub struct InputBuffer{
    slots: [GroupSlot; NUM_CONTROL_GROUPS],
}

impl InputBuffer{
    pub fn new() -> Self{
        Self::default()
    }

    pub fn slot(&self, group: usize) -> &GroupSlot{
        &self.slots[group]
    }

    pub fn slot_mut(&mut self, group: usize) -> &mut GroupSlot{
        &mut self.slots[group]
    }

    pub fn controls(&self, group: usize) -> &ActuatorControls{
        &self.slots[group].controls
    }
}

impl ControlInputs for InputBuffer{
    fn control(&self, group: usize, index: usize) -> Option<f32>{
        if group >= NUM_CONTROL_GROUPS || index >= NUM_CONTROLS{
            return None;
        }
        Some(self.slots[group].controls.control[index])
    }
}

/// Bounded wait across the poll set, copying fresh samples into the buffer
#[derive(Debug, Clone, Copy)]
pub struct InputAggregator{
    timeout: Duration,
}

impl InputAggregator{
    pub fn new(timeout: Duration) -> Self{
        InputAggregator{ timeout }
    }

    pub fn timeout(&self) -> Duration{
        self.timeout
    }

    /// Returns the groups that delivered new data this tick.
    ///
    /// An empty mask is a timeout: the buffer keeps its previous values.
    pub fn poll(&self, source: &mut dyn ControlSource, poll_set: &PollSet, buffer: &mut InputBuffer) -> Result<GroupMask, NodeError>{
        for group in 0..NUM_CONTROL_GROUPS{
            buffer.slot_mut(group).fresh = false;
        }

        let ready = source.poll(poll_set.handles(), self.timeout)?;

        let mut fresh = GroupMask::EMPTY;
        for (handle, is_ready) in poll_set.handles().iter().zip(ready){
            if !is_ready{
                continue;
            }
            if let Some(controls) = source.fetch(*handle){
                let slot = buffer.slot_mut(handle.group);
                slot.controls = controls;
                slot.fresh = true;
                fresh.insert(handle.group);
            }
        }

        if fresh.is_empty(){
            trace!("poll timeout, holding last inputs");
        }
        Ok(fresh)
    }
}
