/**
 * Simple Mixer
 *
 * Text-defined mixer: each output is the sum of scaled control inputs,
 * passed through an output scaler.
 *
 *   Z:                                        null mixer, one output at 0
 *   M: <control count>                        simple mixer header
 *   O: <-ve> <+ve> <offset> <lower> <upper>   output scaler
 *   S: <group> <index> <-ve> <+ve> <offset> <lower> <upper>
 *
 * Scaler values are integers in units of 1/10000. Blank lines and lines
 * starting with '#' are skipped.
 */

use crate::error::MixError;
use crate::node::types::{GroupMask, MAX_OUTPUTS, NUM_CONTROLS, NUM_CONTROL_GROUPS};
use super::{ControlInputs, Mixer, MixerParser};

const SCALE: f32 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaler{
    pub negative: f32,
    pub positive: f32,
    pub offset: f32,
    pub lower: f32,
    pub upper: f32,
}

impl Scaler{
    pub const IDENTITY: Scaler = Scaler{
        negative: 1.0,
        positive: 1.0,
        offset: 0.0,
        lower: -1.0,
        upper: 1.0,
    };

    pub fn apply(&self, input: f32) -> f32{
        let scaled = if input < 0.0{
            input * self.negative
        }else{
            input * self.positive
        };
        //lower <= upper is checked at parse time
        (scaled + self.offset).clamp(self.lower, self.upper)
    }

    fn from_fields(fields: [i32; 5], line: usize) -> Result<Self, MixError>{
        let scaler = Scaler{
            negative: fields[0] as f32 / SCALE,
            positive: fields[1] as f32 / SCALE,
            offset: fields[2] as f32 / SCALE,
            lower: fields[3] as f32 / SCALE,
            upper: fields[4] as f32 / SCALE,
        };
        if scaler.lower > scaler.upper{
            return Err(MixError::Syntax{ line, message: "lower limit above upper limit".into() });
        }
        Ok(scaler)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ControlScaler{
    group: usize,
    index: usize,
    scaler: Scaler,
}

#[derive(Debug, Clone, PartialEq)]
struct SimpleMixer{
    output: Scaler,
    controls: Vec<ControlScaler>,
}

impl SimpleMixer{
    fn mix_one(&self, inputs: &dyn ControlInputs) -> f32{
        let sum: f32 = self.controls.iter()
            .map(|c| c.scaler.apply(inputs.control(c.group, c.index).unwrap_or(0.0)))
            .sum();
        self.output.apply(sum)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum MixerEntry{
    Null,
    Simple(SimpleMixer),
}

/// Ordered set of mixers, one output each
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MixerGroup{
    entries: Vec<MixerEntry>,
}

impl Mixer for MixerGroup{
    fn mix(&self, inputs: &dyn ControlInputs, outputs: &mut [f32]) -> usize{
        let mut written = 0;
        for (entry, out) in self.entries.iter().zip(outputs.iter_mut()){
            *out = match entry{
                MixerEntry::Null => 0.0,
                MixerEntry::Simple(m) => m.mix_one(inputs),
            };
            written += 1;
        }
        written
    }

    fn groups_required(&self) -> GroupMask{
        let mut mask = GroupMask::EMPTY;
        for entry in &self.entries{
            if let MixerEntry::Simple(m) = entry{
                for c in &m.controls{
                    mask.insert(c.group);
                }
            }
        }
        mask
    }

    fn output_count(&self) -> usize{
        self.entries.len()
    }
}

//simple mixer under construction
struct Pending{
    expected: usize,
    output: Option<Scaler>,
    controls: Vec<ControlScaler>,
}

/// Parser for the text format described at the top of this module
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleMixerParser;

impl SimpleMixerParser{
    pub fn parse_group(&self, text: &str) -> Result<MixerGroup, MixError>{
        let mut entries = Vec::new();
        let mut pending: Option<Pending> = None;

        for (i, raw) in text.lines().enumerate(){
            let line = i + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#'){
                continue;
            }

            let (tag, rest) = split_tag(trimmed, line)?;
            match tag{
                'Z' =>{
                    expect_idle(&pending, line)?;
                    entries.push(MixerEntry::Null);
                }
                'M' =>{
                    expect_idle(&pending, line)?;
                    let [count] = parse_fields::<1>(rest, line)?;
                    if count < 0{
                        return Err(MixError::Syntax{ line, message: "negative control count".into() });
                    }
                    pending = Some(Pending{ expected: count as usize, output: None, controls: Vec::new() });
                }
                'O' =>{
                    let p = match pending.as_mut(){
                        Some(p) if p.output.is_none() => p,
                        _ => return Err(MixError::Syntax{ line, message: "O: without a preceding M:".into() }),
                    };
                    p.output = Some(Scaler::from_fields(parse_fields::<5>(rest, line)?, line)?);
                }
                'S' =>{
                    let p = match pending.as_mut(){
                        Some(p) if p.output.is_some() => p,
                        _ => return Err(MixError::Syntax{ line, message: "S: before O:".into() }),
                    };
                    let f = parse_fields::<7>(rest, line)?;
                    let group = usize::try_from(f[0]).unwrap_or(usize::MAX);
                    let index = usize::try_from(f[1]).unwrap_or(usize::MAX);
                    if group >= NUM_CONTROL_GROUPS{
                        return Err(MixError::GroupOutOfRange{ line, group });
                    }
                    if index >= NUM_CONTROLS{
                        return Err(MixError::IndexOutOfRange{ line, index });
                    }
                    let scaler = Scaler::from_fields([f[2], f[3], f[4], f[5], f[6]], line)?;
                    p.controls.push(ControlScaler{ group, index, scaler });
                }
                other =>{
                    return Err(MixError::Syntax{ line, message: format!("unknown mixer tag '{}'", other) });
                }
            }

            //close the simple mixer once all its scalers are in
            let complete = matches!(&pending, Some(p) if p.output.is_some() && p.controls.len() == p.expected);
            if complete{
                if let Some(p) = pending.take(){
                    if let Some(output) = p.output{
                        entries.push(MixerEntry::Simple(SimpleMixer{ output, controls: p.controls }));
                    }
                }
            }
        }

        if pending.is_some(){
            return Err(MixError::Syntax{ line: text.lines().count(), message: "incomplete mixer definition".into() });
        }
        if entries.is_empty(){
            return Err(MixError::Empty);
        }
        if entries.len() > MAX_OUTPUTS{
            return Err(MixError::TooManyOutputs{ count: entries.len(), max: MAX_OUTPUTS });
        }

        Ok(MixerGroup{ entries })
    }
}

impl MixerParser for SimpleMixerParser{
    fn parse(&self, text: &str) -> Result<Box<dyn Mixer>, MixError>{
        Ok(Box::new(self.parse_group(text)?))
    }
}

fn split_tag(line_text: &str, line: usize) -> Result<(char, &str), MixError>{
    let mut chars = line_text.chars();
    match (chars.next(), chars.next()){
        (Some(tag), Some(':')) => Ok((tag, chars.as_str())),
        _ => Err(MixError::Syntax{ line, message: format!("expected '<tag>:', got '{}'", line_text) }),
    }
}

fn expect_idle(pending: &Option<Pending>, line: usize) -> Result<(), MixError>{
    if pending.is_some(){
        return Err(MixError::Syntax{ line, message: "previous mixer is incomplete".into() });
    }
    Ok(())
}

fn parse_fields<const K: usize>(rest: &str, line: usize) -> Result<[i32; K], MixError>{
    let mut out = [0i32; K];
    let mut tokens = rest.split_whitespace();
    for slot in out.iter_mut(){
        let token = tokens.next().ok_or_else(|| MixError::Syntax{
            line,
            message: format!("expected {} values", K),
        })?;
        *slot = token.parse().map_err(|_| MixError::Syntax{
            line,
            message: format!("'{}' is not an integer", token),
        })?;
    }
    if tokens.next().is_some(){
        return Err(MixError::Syntax{ line, message: format!("expected {} values", K) });
    }
    Ok(out)
}
