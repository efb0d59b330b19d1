/**
 * Node Commands
 *
 * Configuration path into a running node. Callers on any thread go through
 * `NodeController`, which takes the shared lock for every mutation so the
 * control loop never sees a half-applied mixer or arm state.
 */

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::error::{NodeError, Result};
use crate::mixer::MixingPipeline;
use super::safety::SafetyGate;
use super::types::{GroupMask, MAX_OUTPUTS};

pub const CMD_ARM: u32 = 0x01;
pub const CMD_DISARM: u32 = 0x02;
pub const CMD_SET_ARM_OK: u32 = 0x03;
pub const CMD_CLEAR_ARM_OK: u32 = 0x04;
pub const CMD_FORCE_SAFETY_OFF: u32 = 0x05;
pub const CMD_GET_OUTPUT_COUNT: u32 = 0x10;
pub const CMD_MIXER_RESET: u32 = 0x11;

/// State shared between the control loop and the command path
pub struct NodeShared{
    pub pipeline: MixingPipeline,
    pub gate: SafetyGate,
    /// Channels actually transmitted per frame
    pub max_outputs: usize,
}

#[derive(Debug)]
pub enum NodeCommand<'a>{
    Arm,
    Disarm,
    /// No safety switch on this platform; accepted and ignored
    SetArmOk,
    ClearArmOk,
    ForceSafetyOff,
    GetOutputCount,
    MixerReset,
    MixerLoadBuf(&'a [u8]),
}

impl NodeCommand<'static>{
    /// Map a raw command code; mixer loads carry a buffer and have no code
    pub fn from_code(code: u32) -> Result<Self>{
        match code{
            CMD_ARM => Ok(NodeCommand::Arm),
            CMD_DISARM => Ok(NodeCommand::Disarm),
            CMD_SET_ARM_OK => Ok(NodeCommand::SetArmOk),
            CMD_CLEAR_ARM_OK => Ok(NodeCommand::ClearArmOk),
            CMD_FORCE_SAFETY_OFF => Ok(NodeCommand::ForceSafetyOff),
            CMD_GET_OUTPUT_COUNT => Ok(NodeCommand::GetOutputCount),
            CMD_MIXER_RESET => Ok(NodeCommand::MixerReset),
            _ => Err(NodeError::UnsupportedCommand),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandReply{
    Done,
    OutputCount(usize),
    GroupsRequired(GroupMask),
}

/// Cloneable handle onto a node's mixer and arm state
#[derive(Clone)]
pub struct NodeController{
    shared: Arc<Mutex<NodeShared>>,
}

impl NodeController{
    pub fn new(pipeline: MixingPipeline) -> Self{
        NodeController{
            shared: Arc::new(Mutex::new(NodeShared{
                pipeline,
                gate: SafetyGate::new(),
                max_outputs: MAX_OUTPUTS,
            })),
        }
    }

    pub fn with_max_outputs(self, max_outputs: usize) -> Self{
        self.lock().max_outputs = max_outputs.min(MAX_OUTPUTS);
        self
    }

    //poison is ignored: every mutation below is a single assignment or a
    //full pipeline swap
    pub(crate) fn lock(&self) -> MutexGuard<'_, NodeShared>{
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn load_mixer(&self, buf: &[u8]) -> Result<GroupMask>{
        let mut shared = self.lock();
        shared.pipeline.load(buf).map_err(|e|{
            warn!(error = %e, "rejected mixer definition");
            NodeError::MixConfig(e)
        })
    }

    pub fn reset_mixer(&self){
        debug!("mixer reset");
        self.lock().pipeline.unload();
    }

    pub fn output_count(&self) -> usize{
        let shared = self.lock();
        shared.pipeline.output_count().min(shared.max_outputs)
    }

    pub fn groups_required(&self) -> GroupMask{
        self.lock().pipeline.groups_required()
    }

    pub fn arm(&self){
        self.lock().gate.force_arm(true);
    }

    pub fn disarm(&self){
        self.lock().gate.force_arm(false);
    }

    pub fn is_armed(&self) -> bool{
        self.lock().gate.is_armed()
    }

    pub fn execute(&self, command: NodeCommand<'_>) -> Result<CommandReply>{
        match command{
            NodeCommand::Arm => self.arm(),
            NodeCommand::Disarm => self.disarm(),
            NodeCommand::SetArmOk | NodeCommand::ClearArmOk | NodeCommand::ForceSafetyOff =>{}
            NodeCommand::GetOutputCount => return Ok(CommandReply::OutputCount(self.output_count())),
            NodeCommand::MixerReset => self.reset_mixer(),
            NodeCommand::MixerLoadBuf(buf) => return self.load_mixer(buf).map(CommandReply::GroupsRequired),
        }
        Ok(CommandReply::Done)
    }
}
