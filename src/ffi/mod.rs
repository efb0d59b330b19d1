use std::collections::HashMap;
use std::ffi::{c_char, CStr};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::warn;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::node::{
    ActuatorArmed, ActuatorControls, CommandReply, LogTransport, NodeCommand, NodeFactory, NodeHandle,
    NodeId, NodeIo, StopOutcome, BusTransport, ARMED_TOPIC, NUM_CONTROLS, NUM_CONTROL_GROUPS,
};
use crate::node::types::control_topic_name;
use crate::pubsub::{Publisher, TopicRegistry};
use crate::uart::SerialTransport;

/// In-process node with its own topic bus
pub struct ActuatorNodeRuntime{
    handle: Option<NodeHandle>,
    controls: Vec<Publisher<ActuatorControls>>,
    armed: Publisher<ActuatorArmed>,
}

//one factory per bus for the whole process, keyed by port (None is the log bus)
static FACTORIES: OnceLock<Mutex<HashMap<Option<String>, NodeFactory>>> = OnceLock::new();

fn factories() -> MutexGuard<'static, HashMap<Option<String>, NodeFactory>>{
    FACTORIES.get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn transport_for(port: &Option<String>) -> Box<dyn BusTransport>{
    match port{
        Some(name) => Box::new(SerialTransport::new(name)),
        None => Box::new(LogTransport::new()),
    }
}

unsafe fn set_status(status: *mut i32, value: i32){
    if !status.is_null(){
        unsafe{ *status = value; }
    }
}

fn errno(e: &NodeError) -> i32{
    let code = match e{
        NodeError::MixConfig(_) => libc::EINVAL,
        NodeError::UnsupportedCommand => libc::ENOTTY,
        NodeError::AlreadyStarted => libc::EBUSY,
        NodeError::Subscription{ .. } => libc::ENOENT,
        NodeError::Poll(_) => libc::EINTR,
        NodeError::Init(_) | NodeError::Transmit(_) | NodeError::Io(_) => libc::EIO,
    };
    -code
}

/// Start the process's node; `port` selects a serial bus, null logs frames
/// instead. Returns null on failure, with the errno in `status` when given:
/// -EINVAL for a bad node id or port, -EBUSY while a node is running.
#[no_mangle]
pub unsafe extern "C" fn actuator_node_start(
    node_id: i32,
    bitrate: i32,
    port: *const c_char,
    status: *mut i32,
) -> *mut ActuatorNodeRuntime{
    let node_id = match NodeId::new(node_id as i64){
        Some(id) => id,
        None =>{
            unsafe{ set_status(status, -libc::EINVAL); }
            return ptr::null_mut();
        }
    };

    let port = if port.is_null(){
        None
    }else{
        match unsafe{ CStr::from_ptr(port) }.to_str(){
            Ok(s) => Some(s.to_string()),
            Err(_) =>{
                unsafe{ set_status(status, -libc::EINVAL); }
                return ptr::null_mut();
            }
        }
    };

    let registry = Arc::new(TopicRegistry::new());
    let config = NodeConfig::new(node_id).with_bitrate(bitrate.max(0) as u32);

    let started ={
        let mut factories = factories();
        if factories.values().any(NodeFactory::is_active){
            Err(NodeError::AlreadyStarted)
        }else{
            factories.entry(port.clone())
                .or_insert_with(|| NodeFactory::new(transport_for(&port)))
                .start(config, NodeIo::from_registry(&registry))
        }
    };

    let handle = match started{
        Ok(handle) => handle,
        Err(e) =>{
            warn!(error = %e, "ffi node start failed");
            unsafe{ set_status(status, errno(&e)); }
            return ptr::null_mut();
        }
    };

    let runtime = Box::new(ActuatorNodeRuntime{
        handle: Some(handle),
        controls: (0..NUM_CONTROL_GROUPS)
            .map(|g| registry.advertise::<ActuatorControls>(&control_topic_name(g)))
            .collect(),
        armed: registry.advertise::<ActuatorArmed>(ARMED_TOPIC),
    });
    unsafe{ set_status(status, 0); }
    Box::into_raw(runtime)
}

/// Publish up to 8 control values for one group
#[no_mangle]
pub unsafe extern "C" fn actuator_node_publish_controls(
    rt: *mut ActuatorNodeRuntime,
    group: u32,
    values: *const f32,
    len: usize,
) -> i32{
    if rt.is_null() || values.is_null() || len > NUM_CONTROLS{
        return -libc::EINVAL;
    }

    unsafe{
        let runtime = &*rt;
        let publisher = match runtime.controls.get(group as usize){
            Some(p) => p,
            None => return -libc::EINVAL,
        };

        let mut control = [0.0f32; NUM_CONTROLS];
        control[..len].copy_from_slice(std::slice::from_raw_parts(values, len));
        publisher.publish(ActuatorControls::new(control));
    }
    0
}

#[no_mangle]
pub unsafe extern "C" fn actuator_node_publish_armed(rt: *mut ActuatorNodeRuntime, armed: bool, lockdown: bool) -> i32{
    if rt.is_null(){
        return -libc::EINVAL;
    }
    unsafe{
        let runtime = &*rt;
        runtime.armed.publish(ActuatorArmed{ armed, lockdown });
    }
    0
}

unsafe fn node_handle<'a>(rt: *mut ActuatorNodeRuntime) -> Option<&'a NodeHandle>{
    if rt.is_null(){
        return None;
    }
    unsafe{ (*rt).handle.as_ref() }
}

/// Load a null-terminated mixer definition
#[no_mangle]
pub unsafe extern "C" fn actuator_node_mixer_load(rt: *mut ActuatorNodeRuntime, buf: *const c_char) -> i32{
    if buf.is_null(){
        return -libc::EINVAL;
    }
    let handle = match unsafe{ node_handle(rt) }{
        Some(h) => h,
        None => return -libc::EINVAL,
    };

    let text = unsafe{ CStr::from_ptr(buf) };
    match handle.controller().load_mixer(text.to_bytes_with_nul()){
        Ok(_) => 0,
        Err(e) => errno(&e),
    }
}

#[no_mangle]
pub unsafe extern "C" fn actuator_node_mixer_reset(rt: *mut ActuatorNodeRuntime) -> i32{
    match unsafe{ node_handle(rt) }{
        Some(h) =>{
            h.controller().reset_mixer();
            0
        }
        None => -libc::EINVAL,
    }
}

#[no_mangle]
pub unsafe extern "C" fn actuator_node_output_count(rt: *mut ActuatorNodeRuntime, out_count: *mut u32) -> i32{
    if out_count.is_null(){
        return -libc::EINVAL;
    }
    match unsafe{ node_handle(rt) }{
        Some(h) =>{
            unsafe{ *out_count = h.controller().output_count() as u32; }
            0
        }
        None => -libc::EINVAL,
    }
}

#[no_mangle]
pub unsafe extern "C" fn actuator_node_arm(rt: *mut ActuatorNodeRuntime, armed: bool) -> i32{
    match unsafe{ node_handle(rt) }{
        Some(h) =>{
            if armed{
                h.controller().arm();
            }else{
                h.controller().disarm();
            }
            0
        }
        None => -libc::EINVAL,
    }
}

/// Raw command code; the output count query returns the count itself
#[no_mangle]
pub unsafe extern "C" fn actuator_node_command(rt: *mut ActuatorNodeRuntime, code: u32) -> i32{
    let handle = match unsafe{ node_handle(rt) }{
        Some(h) => h,
        None => return -libc::EINVAL,
    };

    let result = NodeCommand::from_code(code).and_then(|cmd| handle.controller().execute(cmd));
    match result{
        Ok(CommandReply::OutputCount(n)) => n as i32,
        Ok(_) => 0,
        Err(e) => errno(&e),
    }
}

/// Stop the node and free the runtime. Returns -ETIMEDOUT when the loop
/// had to be detached.
#[no_mangle]
pub unsafe extern "C" fn actuator_node_stop(rt: *mut ActuatorNodeRuntime) -> i32{
    if rt.is_null(){
        return -libc::EINVAL;
    }

    let mut runtime = unsafe{ Box::from_raw(rt) };
    let outcome = match runtime.handle.take(){
        Some(handle) => handle.stop(),
        None => StopOutcome::AlreadyStopped,
    };
    match outcome{
        StopOutcome::Forced => -libc::ETIMEDOUT,
        _ => 0,
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::node::commands::{CMD_ARM, CMD_GET_OUTPUT_COUNT};
    use serial_test::serial;
    use std::ffi::CString;

    const TWO_OUTPUTS: &str = "M: 1\nO: 10000 10000 0 -10000 10000\nS: 0 0 10000 10000 0 -10000 10000\n\
M: 1\nO: 10000 10000 0 -10000 10000\nS: 1 0 10000 10000 0 -10000 10000\n";

    #[test]
    #[serial]
    fn test_ffi_start_stop(){
        unsafe{
            let mut status = 1;
            let rt = actuator_node_start(12, 0, ptr::null(), &mut status);
            assert!(!rt.is_null());
            assert_eq!(status, 0);
            assert_eq!(actuator_node_stop(rt), 0);
        }
    }

    #[test]
    #[serial]
    fn test_ffi_single_node_per_process(){
        unsafe{
            let first = actuator_node_start(12, 0, ptr::null(), ptr::null_mut());
            assert!(!first.is_null());

            let mut status = 0;
            let second = actuator_node_start(13, 0, ptr::null(), &mut status);
            assert!(second.is_null());
            assert_eq!(status, -libc::EBUSY);

            assert_eq!(actuator_node_stop(first), 0);
            let third = actuator_node_start(13, 0, ptr::null(), &mut status);
            assert!(!third.is_null());
            assert_eq!(status, 0);

            //the log bus factory is reused, not rebuilt
            {
                let factories = factories();
                assert_eq!(factories.keys().filter(|k| k.is_none()).count(), 1);
                assert!(factories[&None].transport_initialized());
            }
            assert_eq!(actuator_node_stop(third), 0);
        }
    }

    #[test]
    fn test_ffi_rejects_bad_node_id(){
        unsafe{
            let mut status = 0;
            assert!(actuator_node_start(0, 0, ptr::null(), &mut status).is_null());
            assert_eq!(status, -libc::EINVAL);
            assert!(actuator_node_start(200, 0, ptr::null(), ptr::null_mut()).is_null());
        }
    }

    #[test]
    #[serial]
    fn test_ffi_mixer_and_commands(){
        let mixer = CString::new(TWO_OUTPUTS).unwrap();
        let broken = CString::new("S: 9 0").unwrap();

        unsafe{
            let rt = actuator_node_start(4, 500_000, ptr::null(), ptr::null_mut());
            assert!(!rt.is_null());

            assert_eq!(actuator_node_mixer_load(rt, mixer.as_ptr()), 0);
            let mut count = 0u32;
            assert_eq!(actuator_node_output_count(rt, &mut count), 0);
            assert_eq!(count, 2);
            assert_eq!(actuator_node_command(rt, CMD_GET_OUTPUT_COUNT), 2);

            let values = [0.1f32, 0.2];
            assert_eq!(actuator_node_publish_controls(rt, 0, values.as_ptr(), values.len()), 0);
            assert_eq!(actuator_node_publish_controls(rt, 4, values.as_ptr(), values.len()), -libc::EINVAL);
            assert_eq!(actuator_node_publish_armed(rt, true, false), 0);

            assert_eq!(actuator_node_command(rt, CMD_ARM), 0);
            assert_eq!(actuator_node_command(rt, 0xBEEF), -libc::ENOTTY);
            assert_eq!(actuator_node_arm(rt, false), 0);

            assert_eq!(actuator_node_mixer_load(rt, broken.as_ptr()), -libc::EINVAL);
            assert_eq!(actuator_node_output_count(rt, &mut count), 0);
            assert_eq!(count, 0);

            assert_eq!(actuator_node_mixer_reset(rt), 0);
            assert_eq!(actuator_node_stop(rt), 0);
        }
    }

    #[test]
    fn test_ffi_null_runtime(){
        unsafe{
            let mut count = 0u32;
            assert_eq!(actuator_node_output_count(ptr::null_mut(), &mut count), -libc::EINVAL);
            assert_eq!(actuator_node_mixer_reset(ptr::null_mut()), -libc::EINVAL);
            assert_eq!(actuator_node_stop(ptr::null_mut()), -libc::EINVAL);
        }
    }
}
