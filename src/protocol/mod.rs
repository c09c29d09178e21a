pub mod nav;
pub use nav::NavUpdate;

use chrono::{Local, Timelike};
use thiserror::Error;

//sentence layout: $<TAG>,<field>,...*<hex checksum>\r\n
//the checksum and the leading '$' are optional on decode
pub const FIELD_DELIMITER: char = ',';
pub const CHECKSUM_DELIMITER: char = '*';

/// Errors raised while decoding an inbound sentence. All of them are
/// recoverable: the sentence is dropped and the link keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError{
    #[error("unrecognized sentence tag {0:?}")]
    UnrecognizedTag(String),

    #[error("{tag} sentence too short: expected {expected} fields, got {got}")]
    TruncatedSentence{ tag: &'static str, expected: usize, got: usize },

    #[error("malformed {field} field {value:?}")]
    MalformedField{ field: &'static str, value: String },

    #[error("sentence {0:?} is not a navigation update")]
    NotNavigation(String),
}

/// The closed set of sentences this link exchanges.
#[derive(Debug, Clone, PartialEq)]
pub enum Message{
    /// Back-seat heartbeat: `$BPSTS,<ts>,<code>,<text>`
    Status{ timestamp: String, code: u16, text: String },
    /// Front-seat logging control: `$BPLOG,<scope>,<ON|OFF>`
    LogControl{ scope: String, enable: bool },
    /// Heading change request: `$BPRMB` with horizontal mode 1
    Turn{ timestamp: String, heading: String },
    /// Thrust request: `$BPRMB` with speed mode 0
    Thrust{ timestamp: String, speed: String },
    /// Front-seat navigation update: `$BFNVG,...`
    Telemetry(NavUpdate),
}

//xor over the body, same fold shape as the frame checksum on the vehicle bus
fn checksum(body: &str) -> u8{
    return body.bytes().fold(0u8, |acc, b| acc ^ b);
}

/// Wall-clock time as the protocol carries it: `HHMMSS.cc` (hundredths).
pub fn timestamp_now() -> String{
    let now = Local::now();
    //nanosecond() can exceed 1e9 during a leap second, clamp to .99
    let hundredths = (now.nanosecond() / 10_000_000).min(99);
    return format!("{}{:02}", now.format("%H%M%S."), hundredths);
}

/// Render a message to its wire sentence, checksum and CRLF included.
pub fn encode(msg: &Message) -> String{
    let body = match msg{
        Message::Status{ timestamp, code, text } =>{
            format!("BPSTS,{},{},{}", timestamp, code, text)
        }
        Message::LogControl{ scope, enable } =>{
            let state = if *enable{ "ON" }else{ "OFF" };
            format!("BPLOG,{},{}", scope, state)
        }
        Message::Turn{ timestamp, heading } =>{
            format!("BPRMB,{},{},,,1", timestamp, heading)
        }
        Message::Thrust{ timestamp, speed } =>{
            format!("BPRMB,{},,{},0,", timestamp, speed)
        }
        Message::Telemetry(nav) => nav.render(),
    };

    return format!("${}*{:02X}\r\n", body, checksum(&body));
}

/// Decode one inbound sentence. Never panics; unknown or malformed input
/// comes back as a [`ProtocolError`] for the caller to drop and diagnose.
pub fn decode(raw: &str) -> Result<Message, ProtocolError>{
    let line = raw.trim();
    let line = line.strip_prefix('$').unwrap_or(line);

    //cut the trailing checksum off before splitting fields
    let body = match line.split_once(CHECKSUM_DELIMITER){
        Some((before, _)) => before,
        None => line,
    };

    let fields: Vec<&str> = body.split(FIELD_DELIMITER).collect();

    match fields[0]{
        "BFNVG" => Ok(Message::Telemetry(NavUpdate::parse(&fields)?)),
        "BPSTS" => decode_status(&fields),
        "BPLOG" => decode_log_control(&fields),
        "BPRMB" => decode_motion(&fields),
        tag => Err(ProtocolError::UnrecognizedTag(tag.to_string())),
    }
}

fn require(tag: &'static str, fields: &[&str], expected: usize) -> Result<(), ProtocolError>{
    if fields.len() < expected{
        return Err(ProtocolError::TruncatedSentence{ tag, expected, got: fields.len() });
    }
    return Ok(());
}

fn decode_status(fields: &[&str]) -> Result<Message, ProtocolError>{
    require("BPSTS", fields, 4)?;

    let code = fields[2].parse::<u16>().map_err(|_| ProtocolError::MalformedField{
        field: "status code",
        value: fields[2].to_string(),
    })?;

    //status text may itself contain commas
    Ok(Message::Status{
        timestamp: fields[1].to_string(),
        code,
        text: fields[3..].join(","),
    })
}

fn decode_log_control(fields: &[&str]) -> Result<Message, ProtocolError>{
    require("BPLOG", fields, 3)?;

    let enable = match fields[2]{
        "ON" => true,
        "OFF" => false,
        other =>{
            return Err(ProtocolError::MalformedField{
                field: "log state",
                value: other.to_string(),
            });
        }
    };

    Ok(Message::LogControl{ scope: fields[1].to_string(), enable })
}

//BPRMB carries both motion requests: fields are
//[tag, timestamp, heading, speed, speed mode, horizontal mode]
fn decode_motion(fields: &[&str]) -> Result<Message, ProtocolError>{
    require("BPRMB", fields, 6)?;

    if fields[5] == "1" && !fields[2].is_empty(){
        return Ok(Message::Turn{
            timestamp: fields[1].to_string(),
            heading: fields[2].to_string(),
        });
    }

    if fields[4] == "0" && !fields[3].is_empty(){
        return Ok(Message::Thrust{
            timestamp: fields[1].to_string(),
            speed: fields[3].to_string(),
        });
    }

    Err(ProtocolError::MalformedField{
        field: "motion mode",
        value: fields[1..].join(","),
    })
}

/// Translate an autonomy directive string into motion commands.
///
/// The directive string is `""` or a semicolon-separated list. A directive
/// is accepted only when it has exactly two whitespace-separated tokens and
/// either the first token is `turn` (heading request) or the second token is
/// `thruster` (speed request, shape `<value> thruster`). Everything else is
/// silently discarded. Turn is keyed on the first token and thrust on the
/// second; keep it that way.
pub fn translate_directives(raw: &str, timestamp: &str) -> Vec<Message>{
    let mut commands = Vec::new();

    for directive in raw.split(';'){
        let tokens: Vec<&str> = directive.split_whitespace().collect();
        if tokens.len() != 2{
            continue;
        }

        if tokens[0] == "turn"{
            commands.push(Message::Turn{
                timestamp: timestamp.to_string(),
                heading: tokens[1].to_string(),
            });
        }else if tokens[1] == "thruster"{
            commands.push(Message::Thrust{
                timestamp: timestamp.to_string(),
                speed: tokens[0].to_string(),
            });
        }
    }

    return commands;
}
