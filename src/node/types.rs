/**
 * Node data model
 *
 * Messages consumed from the topic bus, the group bitmask used to track
 * required/subscribed control groups, and the output vector handed to
 * the bus transport.
 */

use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

/// Number of actuator control groups a node can listen to
pub const NUM_CONTROL_GROUPS: usize = 4;
/// Channels per actuator control group
pub const NUM_CONTROLS: usize = 8;
/// Output channels one node drives
pub const MAX_OUTPUTS: usize = 8;
/// Bus bitrate used when none (or a non-positive one) is given
pub const DEFAULT_BITRATE: u32 = 1_000_000;

pub const ARMED_TOPIC: &str = "actuator_armed";

pub fn control_topic_name(group: usize) -> String{
    format!("actuator_controls_{}", group)
}

/// Microseconds since the first call in this process
pub fn absolute_time_us() -> u64{
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

/// One actuator control group sample
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActuatorControls{
    pub timestamp: u64,
    pub control: [f32; NUM_CONTROLS],
}

impl ActuatorControls{
    pub fn new(control: [f32; NUM_CONTROLS]) -> Self{
        ActuatorControls{ timestamp: absolute_time_us(), control }
    }
}

/// Arming record from the safety topic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorArmed{
    pub armed: bool,
    pub lockdown: bool,
}

impl ActuatorArmed{
    /// Armed and not locked down
    pub fn effective(&self) -> bool{
        self.armed && !self.lockdown
    }
}

/// One bit per control group
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GroupMask(u32);

impl GroupMask{
    pub const EMPTY: GroupMask = GroupMask(0);

    pub fn from_bits(bits: u32) -> Self{
        GroupMask(bits & Self::all().0)
    }

    pub fn all() -> Self{
        GroupMask((1u32 << NUM_CONTROL_GROUPS) - 1)
    }

    pub fn bits(&self) -> u32{
        self.0
    }

    pub fn contains(&self, group: usize) -> bool{
        group < NUM_CONTROL_GROUPS && self.0 & (1 << group) != 0
    }

    pub fn insert(&mut self, group: usize){
        if group < NUM_CONTROL_GROUPS{
            self.0 |= 1 << group;
        }
    }

    pub fn remove(&mut self, group: usize){
        if group < NUM_CONTROL_GROUPS{
            self.0 &= !(1 << group);
        }
    }

    /// Groups set here but not in `other`
    pub fn difference(&self, other: GroupMask) -> GroupMask{
        GroupMask(self.0 & !other.0)
    }

    pub fn count(&self) -> usize{
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool{
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_{
        (0..NUM_CONTROL_GROUPS).filter(move |&g| self.contains(g))
    }
}

impl fmt::Debug for GroupMask{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result{
        write!(f, "GroupMask({:#06b})", self.0)
    }
}

/// Mixed output values for one iteration
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutputVector{
    pub timestamp: u64,
    pub noutputs: usize,
    pub output: [f32; MAX_OUTPUTS],
}

impl OutputVector{
    pub fn values(&self) -> &[f32]{
        &self.output[..self.noutputs.min(MAX_OUTPUTS)]
    }
}

/// Validated unicast bus address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u8);

impl NodeId{
    pub const MAX: u8 = 127;

    //0 is the broadcast/unset address
    pub fn new(id: i64) -> Option<Self>{
        if (1..=Self::MAX as i64).contains(&id){
            Some(NodeId(id as u8))
        }else{
            None
        }
    }

    pub fn get(&self) -> u8{
        self.0
    }
}

impl fmt::Display for NodeId{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result{
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version{
    pub major: u8,
    pub minor: u8,
}

/// Identity advertised by the node on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo{
    pub name: String,
    pub software_version: Version,
    pub hardware_version: Version,
}

impl Default for NodeInfo{
    fn default() -> Self{
        NodeInfo{
            name: "org.actuator-node".to_string(),
            software_version: Version{
                major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
                minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            },
            hardware_version: Version{ major: 1, minor: 0 },
        }
    }
}

/// Frame handed to the output sink each mixing iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputFrame{
    pub node_id: NodeId,
    pub outputs: OutputVector,
    pub armed: bool,
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_effective_arm(){
        assert!(ActuatorArmed{ armed: true, lockdown: false }.effective());
        assert!(!ActuatorArmed{ armed: true, lockdown: true }.effective());
        assert!(!ActuatorArmed{ armed: false, lockdown: false }.effective());
    }

    #[test]
    fn test_group_mask_ops(){
        let mut mask = GroupMask::EMPTY;
        mask.insert(0);
        mask.insert(2);
        mask.insert(9); //out of range, ignored
        assert_eq!(mask.bits(), 0b0101);
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 2]);

        let other = GroupMask::from_bits(0b0011);
        assert_eq!(mask.difference(other).bits(), 0b0100);
        assert_eq!(other.difference(mask).bits(), 0b0010);

        mask.remove(0);
        assert!(!mask.contains(0));
        assert!(mask.contains(2));
    }

    #[test]
    fn test_group_mask_truncates_unknown_groups(){
        assert_eq!(GroupMask::from_bits(0xFF).bits(), 0x0F);
        assert_eq!(GroupMask::all().count(), NUM_CONTROL_GROUPS);
    }

    #[test]
    fn test_node_id_unicast_range(){
        assert!(NodeId::new(0).is_none());
        assert!(NodeId::new(-3).is_none());
        assert!(NodeId::new(128).is_none());
        assert_eq!(NodeId::new(1).unwrap().get(), 1);
        assert_eq!(NodeId::new(127).unwrap().get(), 127);
    }

    #[test]
    fn test_output_vector_values(){
        let mut out = OutputVector::default();
        out.output[0] = 0.5;
        out.output[1] = -0.5;
        out.noutputs = 2;
        assert_eq!(out.values(), &[0.5, -0.5]);
    }

    #[test]
    fn test_control_topic_name(){
        assert_eq!(control_topic_name(3), "actuator_controls_3");
    }
}
