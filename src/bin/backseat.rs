/**
 * Back-seat link driver
 *
 * Connects to the vehicle's front seat and runs the autonomy cycle:
 * 1. Receives navigation telemetry, tracks the datum-relative position
 * 2. Sends a status heartbeat every cycle
 * 3. Translates autonomy directives into motion commands
 *
 * Usage: backseat [host] [port]
 * Default: localhost, 8042
 */

use std::path::Path;
use std::sync::Arc;

use log::{error, warn};

use backseat_link::mission_log::{FileMissionLog, MissionLog, NullMissionLog};
use backseat_link::{BackseatClient, BackseatDriver, NullAutonomy};

fn main(){
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let host = args.get(1).map(|s| s.as_str()).unwrap_or("localhost");
    let port: u16 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(8042);

    println!("==============================================");
    println!("  Backseat Link Driver");
    println!("==============================================");
    println!("  Front seat: {}:{}", host, port);
    println!("==============================================\n");

    //blocks until the front seat answers
    let client = Arc::new(BackseatClient::connect(host, port));

    let mission_log: Box<dyn MissionLog> = match FileMissionLog::create(Path::new("logs")){
        Ok(file_log) => Box::new(file_log),
        Err(err) =>{
            warn!("mission log unavailable ({}), recording nothing", err);
            Box::new(NullMissionLog)
        }
    };

    //the autonomy engine plugs in here; the null engine just keeps the
    //heartbeat and telemetry flowing
    let mut driver = BackseatDriver::new(client, Box::new(NullAutonomy))
        .with_mission_log(mission_log);

    if let Err(err) = driver.run(){
        error!("fatal transport error: {}", err);
        std::process::exit(1);
    }
}
