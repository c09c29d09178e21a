use super::ProtocolError;

//BFNVG field positions, tag included:
//[BFNVG, timestamp, lat, N|S, lon, E|W, quality, altitude, depth, heading, roll, pitch, fix time]
const FIELD_COUNT: usize = 13;

/// A decoded front-seat navigation update.
#[derive(Debug, Clone, PartialEq)]
pub struct NavUpdate{
    pub timestamp: String,
    /// decimal degrees, south negative
    pub latitude: f64,
    /// decimal degrees, west negative
    pub longitude: f64,
    /// position quality indicator, passed through untouched
    pub quality: String,
    /// meters above bottom
    pub altitude: f64,
    /// meters below surface
    pub depth: f64,
    /// degrees true
    pub heading: f64,
    pub roll: f64,
    pub pitch: f64,
    /// time of the position fix, as the front seat sent it
    pub fix_time: String,
}

impl NavUpdate{
    pub(crate) fn parse(fields: &[&str]) -> Result<Self, ProtocolError>{
        if fields.len() < FIELD_COUNT{
            return Err(ProtocolError::TruncatedSentence{
                tag: "BFNVG",
                expected: FIELD_COUNT,
                got: fields.len(),
            });
        }

        //the fix-time field may still carry a checksum suffix
        let fix_time = match fields[12].split_once('*'){
            Some((before, _)) => before,
            None => fields[12],
        };

        Ok(NavUpdate{
            timestamp: fields[1].to_string(),
            latitude: parse_angle(fields[2], fields[3], 2, "latitude")?,
            longitude: parse_angle(fields[4], fields[5], 3, "longitude")?,
            quality: fields[6].to_string(),
            altitude: parse_number(fields[7], "altitude")?,
            depth: parse_number(fields[8], "depth")?,
            heading: parse_number(fields[9], "heading")?,
            roll: parse_number(fields[10], "roll")?,
            pitch: parse_number(fields[11], "pitch")?,
            fix_time: fix_time.to_string(),
        })
    }

    pub(crate) fn render(&self) -> String{
        let (lat, ns) = render_angle(self.latitude, 2, 'N', 'S');
        let (lon, ew) = render_angle(self.longitude, 3, 'E', 'W');

        return format!(
            "BFNVG,{},{},{},{},{},{},{:.2},{:.2},{:.2},{:.2},{:.2},{}",
            self.timestamp, lat, ns, lon, ew, self.quality,
            self.altitude, self.depth, self.heading, self.roll, self.pitch,
            self.fix_time,
        );
    }
}

fn malformed(field: &'static str, value: &str) -> ProtocolError{
    return ProtocolError::MalformedField{ field, value: value.to_string() };
}

fn parse_number(value: &str, field: &'static str) -> Result<f64, ProtocolError>{
    return value.trim().parse::<f64>().map_err(|_| malformed(field, value));
}

//geodetic angles come in as <degrees><minutes.decimal> with a fixed
//integer-degree width: 2 digits for latitude, 3 for longitude
fn parse_angle(
    value: &str,
    hemisphere: &str,
    degree_digits: usize,
    field: &'static str,
) -> Result<f64, ProtocolError>{
    let degrees: f64 = value
        .get(..degree_digits)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed(field, value))?;

    let minutes: f64 = value
        .get(degree_digits..)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed(field, value))?;

    let magnitude = degrees + minutes / 60.0;

    match hemisphere{
        "N" | "E" => Ok(magnitude),
        "S" | "W" => Ok(-magnitude),
        other => Err(malformed(field, other)),
    }
}

fn render_angle(value: f64, degree_digits: usize, positive: char, negative: char) -> (String, char){
    let hemisphere = if value < 0.0{ negative }else{ positive };
    let magnitude = value.abs();
    let degrees = magnitude.trunc();
    let minutes = (magnitude - degrees) * 60.0;

    //minutes render mm.mmmm, degree width matches the parse side
    let rendered = format!(
        "{:0width$}{:07.4}",
        degrees as u32,
        minutes,
        width = degree_digits,
    );

    return (rendered, hemisphere);
}
