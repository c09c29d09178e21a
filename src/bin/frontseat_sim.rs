/**
 * Simulated front seat
 *
 * Stands in for the vehicle controller during bench tests:
 * 1. Accepts back-seat connections
 * 2. Emits a navigation fix once a second, walking north-east
 * 3. Prints every sentence the back seat sends
 *
 * Usage: frontseat_sim [host] [port]
 * Default: 0.0.0.0, 8000
 */

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::error;

use backseat_link::protocol::{self, encode, Message, NavUpdate};
use backseat_link::FrontseatServer;

//base position: outer Boston harbor
const BASE_LATITUDE: f64 = 42.5;
const BASE_LONGITUDE: f64 = -71.0;

fn main(){
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let host = args.get(1).map(|s| s.as_str()).unwrap_or("0.0.0.0");
    let port: u16 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(8000);

    let server = match FrontseatServer::bind(host, port){
        Ok(server) => Arc::new(server),
        Err(err) =>{
            error!("{}", err);
            std::process::exit(1);
        }
    };

    println!("==============================================");
    println!("  Front Seat Simulator");
    println!("==============================================");
    println!("  Listening on {}:{}", host, port);
    println!("==============================================\n");

    let handle = Arc::clone(&server).start();

    let mut latitude = BASE_LATITUDE;
    let mut longitude = BASE_LONGITUDE;

    while !handle.is_finished(){
        let timestamp = protocol::timestamp_now();
        let fix = NavUpdate{
            timestamp: timestamp.clone(),
            latitude,
            longitude,
            quality: "1".to_string(),
            altitude: 10.0,
            depth: 2.0,
            heading: 45.0,
            roll: 0.0,
            pitch: 0.0,
            fix_time: timestamp,
        };
        server.send_command(&encode(&Message::Telemetry(fix)));

        for chunk in server.receive_mail(){
            let text = String::from_utf8_lossy(&chunk).into_owned();
            for line in text.lines(){
                let line = line.trim();
                if !line.is_empty(){
                    println!("from backseat: {}", line);
                }
            }
        }

        //about 8 m north-east per tick
        latitude += 0.00005;
        longitude += 0.00007;

        thread::sleep(Duration::from_secs(1));
    }

    match handle.join(){
        Ok(Ok(())) => {}
        Ok(Err(err)) =>{
            error!("fatal transport error: {}", err);
            std::process::exit(1);
        }
        Err(_) =>{
            error!("transport thread panicked");
            std::process::exit(1);
        }
    }
}
