/**
 * Link driver
 *
 * The back-seat control cycle that:
 * 1. Pumps the transport client on its own thread
 * 2. Folds inbound telemetry into the vehicle state
 * 3. Asks the detector and autonomy collaborators what to do
 * 4. Turns directives into motion commands on the wire
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::mission_log::{MissionLog, NullMissionLog};
use crate::nav::{StateTracker, VehicleState};
use crate::protocol::{self, Message};
use crate::transport::{BackseatClient, TransportError};

const STATUS_OK_CODE: u16 = 1;
const STATUS_OK_TEXT: &str = "backseat autonomy ok";
const LOG_SCOPE_ALL: &str = "ALL";

/// The autonomy engine. Gets a state snapshot each cycle and answers with
/// `""` or semicolon-joined directives (`turn <heading>`, `<value> thruster`).
pub trait Autonomy: Send{
    fn decide(&mut self, state: &VehicleState) -> String;
}

/// The buoy detector. Gets a state snapshot and answers with the bearing
/// angles of red and green buoys, in degrees off the bow.
pub trait Detector: Send{
    fn run(&mut self, state: &VehicleState) -> (Vec<f64>, Vec<f64>);
}

/// Autonomy that never asks for anything. Keeps the link alive on its own.
pub struct NullAutonomy;

impl Autonomy for NullAutonomy{
    fn decide(&mut self, _state: &VehicleState) -> String{
        return String::new();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState{
    Idle,
    Running,
    /// Terminal. There is no restart.
    Terminated,
}

enum LinkStatus{
    Up,
    Stopped,
    Failed(TransportError),
}

/// Request a driver shutdown from another thread.
pub fn request_shutdown(flag: &Arc<AtomicBool>){
    flag.store(false, Ordering::SeqCst);
}

pub struct BackseatDriver{
    client: Arc<BackseatClient>,
    tracker: StateTracker,
    autonomy: Box<dyn Autonomy>,
    detector: Option<Box<dyn Detector>>,
    mission_log: Box<dyn MissionLog>,
    warp: f64,
    state: DriverState,
    running: Arc<AtomicBool>,
    link: Option<JoinHandle<Result<(), TransportError>>>,
    mission_time: f64,
    last_cycle: Instant,
}

impl BackseatDriver{
    pub fn new(client: Arc<BackseatClient>, autonomy: Box<dyn Autonomy>) -> Self{
        BackseatDriver{
            client,
            tracker: StateTracker::new(),
            autonomy,
            detector: None,
            mission_log: Box::new(NullMissionLog),
            warp: 1.0,
            state: DriverState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            link: None,
            mission_time: 0.0,
            last_cycle: Instant::now(),
        }
    }

    /// Time warp: cycle cadence and the mission clock both run this many
    /// times faster than the wall clock.
    pub fn with_warp(mut self, warp: f64) -> Self{
        assert!(warp > 0.0, "warp must be positive");
        self.warp = warp;
        return self;
    }

    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self{
        self.detector = Some(detector);
        return self;
    }

    pub fn with_mission_log(mut self, mission_log: Box<dyn MissionLog>) -> Self{
        self.mission_log = mission_log;
        return self;
    }

    pub fn state(&self) -> DriverState{
        return self.state;
    }

    pub fn vehicle_state(&self) -> &VehicleState{
        return self.tracker.state();
    }

    /// Warp-scaled seconds since the driver started running.
    pub fn mission_time(&self) -> f64{
        return self.mission_time;
    }

    /// Flag for [`request_shutdown`]; share it with whoever may need to
    /// stop the driver.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool>{
        return Arc::clone(&self.running);
    }

    /// Launch the transport pump and announce ourselves to the front seat
    /// by turning its logging on.
    pub fn start(&mut self){
        if self.state != DriverState::Idle{
            return;
        }

        self.link = Some(Arc::clone(&self.client).start());
        self.send(&Message::LogControl{
            scope: LOG_SCOPE_ALL.to_string(),
            enable: true,
        });

        self.running.store(true, Ordering::SeqCst);
        self.state = DriverState::Running;
        self.last_cycle = Instant::now();
        info!("backseat driver running (warp {})", self.warp);
    }

    /// Run cycles until shutdown is requested or the transport dies. The
    /// sleep caps how often cycles start; a slow collaborator stretches
    /// the cycle, it is never preempted.
    pub fn run(&mut self) -> Result<(), TransportError>{
        self.start();

        let mut result = Ok(());
        while self.running.load(Ordering::SeqCst){
            self.cycle();

            match self.link_status(){
                LinkStatus::Up => {}
                LinkStatus::Stopped => break,
                LinkStatus::Failed(err) =>{
                    result = Err(err);
                    break;
                }
            }

            thread::sleep(Duration::from_secs_f64(1.0 / self.warp));
        }

        self.terminate();
        return result;
    }

    fn cycle(&mut self){
        let now = Instant::now();
        let delta = now.duration_since(self.last_cycle).as_secs_f64() * self.warp;
        self.last_cycle = now;
        self.mission_time += delta;

        self.send(&Message::Status{
            timestamp: protocol::timestamp_now(),
            code: STATUS_OK_CODE,
            text: STATUS_OK_TEXT.to_string(),
        });

        for chunk in self.client.receive_mail(){
            let text = String::from_utf8_lossy(&chunk).into_owned();
            //one tcp chunk may carry several sentences
            for line in text.lines(){
                let line = line.trim();
                if line.is_empty(){
                    continue;
                }

                self.mission_log.log_event("RECEIVED", line);
                if let Err(err) = self.tracker.receive_telemetry(line){
                    warn!("dropped inbound sentence: {}", err);
                }
            }
        }

        let state = self.tracker.snapshot();
        if let Some((x, y)) = state.position{
            self.mission_log.log_position(x, y, state.heading.unwrap_or(0.0));
        }

        //bearings are context for the autonomy engine; nothing in the link
        //itself consumes them
        if let Some(detector) = self.detector.as_mut(){
            let (red, green) = detector.run(&state);
            if !red.is_empty() || !green.is_empty(){
                debug!("buoy bearings: red {:?}, green {:?}", red, green);
            }
        }

        let directives = self.autonomy.decide(&state);
        if !directives.is_empty(){
            let timestamp = protocol::timestamp_now();
            for command in protocol::translate_directives(&directives, &timestamp){
                self.send(&command);
            }
        }
    }

    fn send(&mut self, msg: &Message){
        let sentence = protocol::encode(msg);
        self.mission_log.log_event("SENT", sentence.trim_end());
        self.client.send_message(&sentence);
    }

    fn link_status(&mut self) -> LinkStatus{
        let finished = self
            .link
            .as_ref()
            .map_or(true, |handle| handle.is_finished());
        if !finished{
            return LinkStatus::Up;
        }

        let Some(handle) = self.link.take() else{
            return LinkStatus::Stopped;
        };

        match handle.join(){
            Ok(Ok(())) =>{
                info!("transport stopped, driver winding down");
                LinkStatus::Stopped
            }
            Ok(Err(err)) =>{
                error!("transport loop died: {}", err);
                LinkStatus::Failed(err)
            }
            Err(_) =>{
                error!("transport thread panicked");
                LinkStatus::Failed(TransportError::LinkDown)
            }
        }
    }

    fn terminate(&mut self){
        self.running.store(false, Ordering::SeqCst);
        self.client.stop();
        if let Some(handle) = self.link.take(){
            let _ = handle.join();
        }
        self.state = DriverState::Terminated;
        info!("backseat driver terminated");
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::transport::FrontseatServer;
    use std::time::Duration;

    //hands out one scripted directive string per cycle, then stays quiet
    struct ScriptedAutonomy{
        script: Vec<String>,
    }

    impl Autonomy for ScriptedAutonomy{
        fn decide(&mut self, _state: &VehicleState) -> String{
            if self.script.is_empty(){
                return String::new();
            }
            return self.script.remove(0);
        }
    }

    struct FixedDetector;

    impl Detector for FixedDetector{
        fn run(&mut self, _state: &VehicleState) -> (Vec<f64>, Vec<f64>){
            return (vec![-5.0], vec![4.0]);
        }
    }

    #[test]
    fn test_new_driver_is_idle(){
        let server = Arc::new(FrontseatServer::bind("127.0.0.1", 0).unwrap());
        let port = server.local_addr().unwrap().port();
        let server_handle = Arc::clone(&server).start();

        let client = Arc::new(BackseatClient::connect("127.0.0.1", port));
        let driver = BackseatDriver::new(client, Box::new(NullAutonomy));
        assert_eq!(driver.state(), DriverState::Idle);
        assert_eq!(*driver.vehicle_state(), VehicleState::default());

        server.stop();
        server_handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_driver_cycle_end_to_end(){
        let server = Arc::new(FrontseatServer::bind("127.0.0.1", 0).unwrap());
        let port = server.local_addr().unwrap().port();
        let server_handle = Arc::clone(&server).start();

        let client = Arc::new(BackseatClient::connect("127.0.0.1", port));
        let autonomy = ScriptedAutonomy{
            script: vec!["turn 090;5 thruster".to_string()],
        };
        let mut driver = BackseatDriver::new(client, Box::new(autonomy))
            .with_detector(Box::new(FixedDetector))
            .with_warp(10.0);
        let shutdown = driver.shutdown_flag();

        let worker = thread::spawn(move ||{
            let result = driver.run();
            (driver, result)
        });

        //feed the driver a fix so autonomy sees a live state
        server.send_command(
            "$BFNVG,123456.78,4230.00,N,07100.00,W,1,10.00,2.00,90.00,0.00,0.00,123456.00\r\n",
        );

        let mut inbound = String::new();
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline{
            for chunk in server.receive_mail(){
                inbound.push_str(&String::from_utf8_lossy(&chunk));
            }
            //several heartbeats means several full cycles ran, so the fix
            //sent above has been through the tracker
            let done = inbound.contains("$BPLOG,ALL,ON")
                && inbound.matches("$BPSTS,").count() >= 5
                && inbound.contains(",090,,,1")
                && inbound.contains(",,5,0,");
            if done{
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }

        //logging on at start, heartbeats every cycle, both motion commands
        assert!(inbound.contains("$BPLOG,ALL,ON"), "no log control in {:?}", inbound);
        assert!(inbound.contains("$BPSTS,"), "no heartbeat in {:?}", inbound);
        assert!(inbound.contains(",090,,,1"), "no turn command in {:?}", inbound);
        assert!(inbound.contains(",,5,0,"), "no thrust command in {:?}", inbound);

        request_shutdown(&shutdown);
        let (driver, result) = worker.join().unwrap();
        result.unwrap();
        assert_eq!(driver.state(), DriverState::Terminated);

        //the fix made it into the tracker
        assert_eq!(driver.vehicle_state().position, Some((0.0, 0.0)));
        assert_eq!(driver.vehicle_state().heading, Some(90.0));

        server.stop();
        server_handle.join().unwrap().unwrap();
    }
}
