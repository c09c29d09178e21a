pub mod projection;
pub use projection::{band_letter, to_utm, zone_number, UtmCoord};

use log::info;

use crate::protocol::{self, Message, ProtocolError};

/// The first geodetic fix of the session and its UTM origin. Set once,
/// immutable afterwards; every local position is measured against it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datum{
    pub latitude: f64,
    pub longitude: f64,
    pub origin: UtmCoord,
}

/// Latest known vehicle state. Everything is `None` until the first
/// navigation sentence decodes; after that the scalar fields always hold
/// the most recent update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleState{
    /// decimal degrees
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// meters east/north of the datum
    pub position: Option<(f64, f64)>,
    /// degrees true
    pub heading: Option<f64>,
    pub depth: Option<f64>,
    pub altitude: Option<f64>,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub fix_time: Option<String>,
    pub datum: Option<Datum>,
}

/// Single-writer tracker: only the driver's decode step mutates it.
#[derive(Default)]
pub struct StateTracker{
    state: VehicleState,
    datum: Option<Datum>,
}

impl StateTracker{
    pub fn new() -> Self{
        return StateTracker::default();
    }

    /// Decode one inbound sentence and fold it into the vehicle state.
    /// Anything that is not a well-formed navigation update leaves the
    /// state untouched and comes back as an error for the caller to log.
    pub fn receive_telemetry(&mut self, raw: &str) -> Result<(), ProtocolError>{
        let nav = match protocol::decode(raw)?{
            Message::Telemetry(nav) => nav,
            _ => return Err(ProtocolError::NotNavigation(raw.trim().to_string())),
        };

        let datum = match self.datum{
            Some(datum) => datum,
            None =>{
                let origin = projection::to_utm(nav.latitude, nav.longitude, None);
                let datum = Datum{
                    latitude: nav.latitude,
                    longitude: nav.longitude,
                    origin,
                };
                info!(
                    "datum set at ({:.6}, {:.6}), utm {}{}",
                    datum.latitude, datum.longitude, origin.zone, origin.band,
                );
                self.datum = Some(datum);
                datum
            }
        };

        //every fix is projected in the datum's zone and band; a vehicle that
        //truly crosses a zone boundary gets a distorted local position
        let here = projection::to_utm(
            nav.latitude,
            nav.longitude,
            Some((datum.origin.zone, datum.origin.band)),
        );

        self.state.latitude = Some(nav.latitude);
        self.state.longitude = Some(nav.longitude);
        self.state.position = Some((
            here.easting - datum.origin.easting,
            here.northing - datum.origin.northing,
        ));
        self.state.heading = Some(nav.heading);
        self.state.depth = Some(nav.depth);
        self.state.altitude = Some(nav.altitude);
        self.state.roll = Some(nav.roll);
        self.state.pitch = Some(nav.pitch);
        self.state.fix_time = Some(nav.fix_time);
        self.state.datum = Some(datum);

        return Ok(());
    }

    pub fn state(&self) -> &VehicleState{
        return &self.state;
    }

    /// Clone of the current state for collaborators outside the
    /// single-writer boundary.
    pub fn snapshot(&self) -> VehicleState{
        return self.state.clone();
    }

    pub fn datum(&self) -> Option<&Datum>{
        return self.datum.as_ref();
    }
}
