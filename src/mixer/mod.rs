/**
 * Mixing Pipeline
 *
 * Owns the active mixer and the group requirement it implies. The mixer is
 * an injected capability: anything implementing `Mixer`, produced from
 * definition text by a `MixerParser`.
 */

pub mod simple;

pub use simple::{MixerGroup, Scaler, SimpleMixerParser};

use tracing::{debug, info};

use crate::error::MixError;
use crate::node::types::{absolute_time_us, GroupMask, OutputVector, MAX_OUTPUTS};

/// Longest mixer definition accepted by `load`
pub const MIXER_BUF_MAX: usize = 1024;

/// Read access to the latest per-group control values
pub trait ControlInputs{
    /// `None` when (group, index) is outside the input buffer
    fn control(&self, group: usize, index: usize) -> Option<f32>;
}

pub trait Mixer: Send{
    /// Write up to `outputs.len()` values, returning how many were written
    fn mix(&self, inputs: &dyn ControlInputs, outputs: &mut [f32]) -> usize;

    /// Control groups this mixer reads from
    fn groups_required(&self) -> GroupMask;

    fn output_count(&self) -> usize;
}

pub trait MixerParser: Send{
    fn parse(&self, text: &str) -> Result<Box<dyn Mixer>, MixError>;
}

pub struct MixingPipeline{
    parser: Box<dyn MixerParser>,
    mixer: Option<Box<dyn Mixer>>,
    required: GroupMask,
}

impl MixingPipeline{
    pub fn new(parser: Box<dyn MixerParser>) -> Self{
        MixingPipeline{
            parser,
            mixer: None,
            required: GroupMask::EMPTY,
        }
    }

    /// Replace the active mixer with one parsed from `buf`.
    ///
    /// On any failure the previous mixer is discarded too and the
    /// requirement mask is cleared; there is never a partially applied mixer.
    pub fn load(&mut self, buf: &[u8]) -> Result<GroupMask, MixError>{
        let parsed = mixer_text(buf).and_then(|text| self.parser.parse(text));

        match parsed{
            Ok(mixer) =>{
                self.required = mixer.groups_required();
                info!(outputs = mixer.output_count(), groups = ?self.required, "mixer loaded");
                self.mixer = Some(mixer);
                Ok(self.required)
            }
            Err(e) =>{
                debug!(error = %e, "mixer load failed");
                self.unload();
                Err(e)
            }
        }
    }

    pub fn unload(&mut self){
        self.mixer = None;
        self.required = GroupMask::EMPTY;
    }

    pub fn is_loaded(&self) -> bool{
        self.mixer.is_some()
    }

    pub fn groups_required(&self) -> GroupMask{
        self.required
    }

    pub fn output_count(&self) -> usize{
        self.mixer.as_ref().map_or(0, |m| m.output_count().min(MAX_OUTPUTS))
    }

    /// Run the mixer once; `None` when no mixer is loaded
    pub fn mix(&self, inputs: &dyn ControlInputs, max_channels: usize) -> Option<OutputVector>{
        let mixer = self.mixer.as_ref()?;
        let limit = max_channels.min(MAX_OUTPUTS);

        let mut outputs = OutputVector::default();
        let written = mixer.mix(inputs, &mut outputs.output[..limit]);
        outputs.noutputs = written.min(limit);
        outputs.timestamp = absolute_time_us();
        Some(outputs)
    }
}

impl Default for MixingPipeline{
    fn default() -> Self{
        Self::new(Box::new(SimpleMixerParser))
    }
}

//null-terminated text, at most MIXER_BUF_MAX bytes before the terminator
fn mixer_text(buf: &[u8]) -> Result<&str, MixError>{
    let len = match buf.iter().position(|&b| b == 0){
        Some(nul) => nul,
        None => buf.len(),
    };
    if len > MIXER_BUF_MAX{
        return Err(MixError::TooLong{ max: MIXER_BUF_MAX });
    }
    std::str::from_utf8(&buf[..len]).map_err(|_| MixError::InvalidUtf8)
}
