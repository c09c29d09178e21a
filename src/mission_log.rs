use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use chrono::Local;
use log::warn;

/// Mission recording seam. The driver reports every sentence it sends and
/// receives plus the vehicle track; what happens to them is up to the
/// implementation.
pub trait MissionLog: Send{
    fn log_event(&mut self, direction: &str, message: &str);
    fn log_position(&mut self, x: f64, y: f64, heading: f64);
}

/// Discards everything. For tests and the simulator.
pub struct NullMissionLog;

impl MissionLog for NullMissionLog{
    fn log_event(&mut self, _direction: &str, _message: &str){}
    fn log_position(&mut self, _x: f64, _y: f64, _heading: f64){}
}

/// One pair of files per mission: a timestamped event log and a position
/// track as csv rows of elapsed milliseconds, x, y, heading.
pub struct FileMissionLog{
    events: BufWriter<File>,
    positions: BufWriter<File>,
    start: Instant,
}

impl FileMissionLog{
    pub fn create(dir: &Path) -> io::Result<Self>{
        fs::create_dir_all(dir)?;

        let stamp = Local::now().format("%Y%m%dT%H%M%S");
        let events = File::create(dir.join(format!("log-{}.txt", stamp)))?;
        let positions = File::create(dir.join(format!("data-{}.csv", stamp)))?;

        Ok(FileMissionLog{
            events: BufWriter::new(events),
            positions: BufWriter::new(positions),
            start: Instant::now(),
        })
    }

    fn write_line(writer: &mut BufWriter<File>, line: &str){
        //a failed log write should not take the mission down
        let result = writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.flush());
        if result.is_err(){
            warn!("mission log write failed");
        }
    }
}

impl MissionLog for FileMissionLog{
    fn log_event(&mut self, direction: &str, message: &str){
        let line = format!(
            "[{}] [{}]: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            direction,
            message,
        );
        Self::write_line(&mut self.events, &line);
    }

    fn log_position(&mut self, x: f64, y: f64, heading: f64){
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        let line = format!("{:.1},{:.3},{:.3},{:.2}\n", elapsed_ms, x, y, heading);
        Self::write_line(&mut self.positions, &line);
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_file_log_writes_both_files(){
        let dir = std::env::temp_dir().join(format!("backseat-link-test-{}", std::process::id()));

        {
            let mut log = FileMissionLog::create(&dir).unwrap();
            log.log_event("SENT", "$BPLOG,ALL,ON*32");
            log.log_event("RECEIVED", "$BFNVG,...");
            log.log_position(1.5, -2.5, 270.0);
        }

        let mut event_text = String::new();
        let mut track_text = String::new();
        for entry in fs::read_dir(&dir).unwrap(){
            let path = entry.unwrap().path();
            let content = fs::read_to_string(&path).unwrap();
            match path.extension().and_then(|e| e.to_str()){
                Some("txt") => event_text = content,
                Some("csv") => track_text = content,
                _ => {}
            }
        }

        assert!(event_text.contains("[SENT]: $BPLOG,ALL,ON*32"));
        assert!(event_text.contains("[RECEIVED]"));
        assert!(track_text.lines().any(|l| l.ends_with(",1.500,-2.500,270.00")));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_null_log_is_silent(){
        let mut log = NullMissionLog;
        log.log_event("SENT", "anything");
        log.log_position(0.0, 0.0, 0.0);
    }
}
