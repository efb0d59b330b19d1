/**
 * Actuator Node Binary
 *
 * Usage: actuator_node start <node_id> [bitrate]
 *
 * Frames go to the serial port named by ACTUATOR_NODE_PORT, or to the log
 * when it is unset. Commands on stdin drive the node until `stop` or EOF.
 */

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use actuator_node::config::{parse_start_args, USAGE};
use actuator_node::node::{
    ActuatorArmed, ActuatorControls, BusTransport, LogTransport, NodeFactory, NodeIo, StopOutcome,
    ARMED_TOPIC, NUM_CONTROLS,
};
use actuator_node::node::types::control_topic_name;
use actuator_node::pubsub::TopicRegistry;
use actuator_node::uart::SerialTransport;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const PORT_ENV: &str = "ACTUATOR_NODE_PORT";

/// Control values for `set`; any bad word rejects the whole line
fn parse_set_values<'a>(words: impl Iterator<Item = &'a str>) -> Result<[f32; NUM_CONTROLS], String>{
    let mut values = [0.0f32; NUM_CONTROLS];
    let mut count = 0;
    for word in words{
        if count == NUM_CONTROLS{
            return Err(format!("at most {} values", NUM_CONTROLS));
        }
        values[count] = word.parse().map_err(|_| format!("'{}' is not a number", word))?;
        count += 1;
    }
    if count == 0{
        return Err("no values given".to_string());
    }
    Ok(values)
}

fn main() -> ExitCode{
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,actuator_node=debug")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match parse_start_args(&args){
        Ok(config) => config,
        Err(e) =>{
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            return ExitCode::from(1);
        }
    };

    let transport: Box<dyn BusTransport> = match std::env::var(PORT_ENV){
        Ok(port) => Box::new(SerialTransport::new(&port)),
        Err(_) => Box::new(LogTransport::new()),
    };

    let registry = Arc::new(TopicRegistry::new());
    let mut factory = NodeFactory::new(transport);
    let handle = match factory.start(config, NodeIo::from_registry(&registry)){
        Ok(handle) => handle,
        Err(e) =>{
            error!(error = %e, "start failed");
            return ExitCode::from(1);
        }
    };

    let controls = registry.advertise::<ActuatorControls>(&control_topic_name(0));
    let armed = registry.advertise::<ActuatorArmed>(ARMED_TOPIC);
    let controller = handle.controller().clone();

    println!("\n[Commands]");
    println!("  load <file>      - load a mixer definition");
    println!("  reset            - unload the mixer");
    println!("  set <v0> <v1>..  - publish group 0 controls");
    println!("  arm / disarm     - publish the arming state");
    println!("  count            - active output count");
    println!("  stop             - stop the node and exit\n");

    let stdin = io::stdin();
    for line in stdin.lock().lines(){
        let line = match line{
            Ok(line) => line,
            Err(_) => break,
        };
        let mut words = line.split_whitespace();

        match words.next(){
            Some("load") =>{
                let path = match words.next(){
                    Some(path) => path,
                    None =>{
                        println!("load needs a file");
                        continue;
                    }
                };
                match std::fs::read(path){
                    Ok(mut buf) =>{
                        buf.push(0);
                        match controller.load_mixer(&buf){
                            Ok(groups) => println!("[MIXER] groups {:?}, {} outputs", groups, controller.output_count()),
                            Err(e) => println!("[MIXER] rejected: {}", e),
                        }
                    }
                    Err(e) => println!("cannot read {}: {}", path, e),
                }
            }
            Some("reset") =>{
                controller.reset_mixer();
                println!("[MIXER] reset");
            }
            Some("set") =>{
                match parse_set_values(words){
                    Ok(values) =>{
                        controls.publish(ActuatorControls::new(values));
                    }
                    Err(e) => println!("[SET] rejected: {}", e),
                }
            }
            Some("arm") =>{
                armed.publish(ActuatorArmed{ armed: true, lockdown: false });
            }
            Some("disarm") =>{
                armed.publish(ActuatorArmed{ armed: false, lockdown: false });
            }
            Some("count") => println!("{}", controller.output_count()),
            Some("stop") | Some("exit") => break,
            Some(other) => println!("Unknown command: {}", other),
            None =>{}
        }
        let _ = io::stdout().flush();
    }

    match handle.stop(){
        StopOutcome::Forced => error!("node did not stop in time"),
        outcome => info!(?outcome, "shutdown"),
    }
    ExitCode::SUCCESS
}
