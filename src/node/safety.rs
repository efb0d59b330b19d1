/**
 * Safety Gate
 *
 * Output clamping and the armed/disarmed state.
 */

use tracing::{info, warn};

use super::types::OutputVector;

/// Value substituted for NaN, infinite or out-of-band outputs.
///
/// The minimum, not zero: zero may be a valid mid-range command.
pub const FAILSAFE_OUTPUT: f32 = -1.0;

/// Replace any invalid channel value with [`FAILSAFE_OUTPUT`]
pub fn clamp_value(value: f32) -> f32{
    if !value.is_finite() || !(-1.0..=1.0).contains(&value){
        FAILSAFE_OUTPUT
    }else{
        value
    }
}

#[derive(Debug, Default)]
pub struct SafetyGate{
    armed: bool,
    //effective arm state not yet reported to the output sink
    pending: Option<bool>,
}

impl SafetyGate{
    pub fn new() -> Self{
        Self::default()
    }

    /// Clamp every produced channel in place; returns how many were replaced
    pub fn clamp(&self, outputs: &mut OutputVector) -> usize{
        let mut replaced = 0;
        let n = outputs.values().len();
        for value in outputs.output[..n].iter_mut(){
            let clamped = clamp_value(*value);
            if clamped.to_bits() != value.to_bits(){
                replaced += 1;
                *value = clamped;
            }
        }
        if replaced > 0{
            warn!(replaced, "invalid output values replaced with failsafe");
        }
        replaced
    }

    pub fn is_armed(&self) -> bool{
        self.armed
    }

    /// Apply an arming record; true when the effective state changed
    pub fn update_arm(&mut self, armed: bool, lockdown: bool) -> bool{
        self.set_armed(armed && !lockdown)
    }

    /// Arm or disarm directly, bypassing the arming topic
    pub fn force_arm(&mut self, armed: bool) -> bool{
        self.set_armed(armed)
    }

    /// The last unreported edge, at most once
    pub fn take_arm_notification(&mut self) -> Option<bool>{
        self.pending.take()
    }

    fn set_armed(&mut self, armed: bool) -> bool{
        let changed = self.armed != armed;
        self.armed = armed;
        if changed{
            info!(armed, "actuator arm state changed");
            self.pending = Some(armed);
        }
        changed
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::node::types::MAX_OUTPUTS;
    use proptest::prelude::*;

    #[test]
    fn test_clamp_examples(){
        assert_eq!(clamp_value(f32::NAN), -1.0);
        assert_eq!(clamp_value(f32::INFINITY), -1.0);
        assert_eq!(clamp_value(f32::NEG_INFINITY), -1.0);
        assert_eq!(clamp_value(5.0), -1.0);
        assert_eq!(clamp_value(-5.0), -1.0);
        assert_eq!(clamp_value(2.3), -1.0);
        assert_eq!(clamp_value(0.5), 0.5);
        assert_eq!(clamp_value(1.0), 1.0);
        assert_eq!(clamp_value(-1.0), -1.0);
        assert_eq!(clamp_value(0.0), 0.0);
    }

    #[test]
    fn test_clamp_vector_only_touches_produced_channels(){
        let gate = SafetyGate::new();
        let mut out = OutputVector::default();
        out.output = [0.2, f32::NAN, 1.5, -0.7, 9.0, 9.0, 9.0, 9.0];
        out.noutputs = 4;

        assert_eq!(gate.clamp(&mut out), 2);
        assert_eq!(&out.output[..4], &[0.2, -1.0, -1.0, -0.7]);
        assert_eq!(out.output[4], 9.0);
    }

    #[test]
    fn test_lockdown_overrides_armed(){
        let mut gate = SafetyGate::new();
        gate.update_arm(true, true);
        assert!(!gate.is_armed());
        gate.update_arm(true, false);
        assert!(gate.is_armed());
    }

    #[test]
    fn test_arm_edge_reported_once(){
        let mut gate = SafetyGate::new();
        assert!(gate.update_arm(true, false));
        assert_eq!(gate.take_arm_notification(), Some(true));

        assert!(gate.update_arm(true, true));
        assert!(!gate.update_arm(true, true));
        assert_eq!(gate.take_arm_notification(), Some(false));
        assert_eq!(gate.take_arm_notification(), None);
    }

    #[test]
    fn test_force_arm_and_disarm(){
        let mut gate = SafetyGate::new();
        assert!(gate.force_arm(true));
        assert!(!gate.force_arm(true));
        assert!(gate.force_arm(false));
        //two edges collapse into the latest state
        assert_eq!(gate.take_arm_notification(), Some(false));
    }

    proptest!{
        #[test]
        fn test_clamp_output_always_in_band(values in prop::array::uniform8(any::<f32>())){
            let gate = SafetyGate::new();
            let mut out = OutputVector{ timestamp: 0, noutputs: MAX_OUTPUTS, output: values };
            gate.clamp(&mut out);
            for (orig, clamped) in values.iter().zip(out.output.iter()){
                prop_assert!((-1.0..=1.0).contains(clamped));
                if orig.is_finite() && (-1.0..=1.0).contains(orig){
                    prop_assert_eq!(orig.to_bits(), clamped.to_bits());
                }else{
                    prop_assert_eq!(*clamped, -1.0);
                }
            }
        }
    }
}
