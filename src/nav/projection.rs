//! WGS-84 to UTM forward projection.

use std::f64::consts::FRAC_PI_2;

/// WGS-84 semi-major axis in meters
const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS-84 first eccentricity squared
const WGS84_E2: f64 = 2.0 * WGS84_F - WGS84_F * WGS84_F;

/// UTM central scale factor
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

//latitude bands, 8 degrees each from 80S, skipping I and O
const BAND_LETTERS: &[u8] = b"CDEFGHJKLMNPQRSTUVWX";

/// A planar position in a UTM zone, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmCoord{
    pub easting: f64,
    pub northing: f64,
    pub zone: u8,
    pub band: char,
}

/// Zone for a longitude. Plain 6-degree zones; the Norway and Svalbard
/// exceptions are not applied.
pub fn zone_number(longitude: f64) -> u8{
    let zone = ((longitude + 180.0) / 6.0).floor() as i32 + 1;
    return zone.clamp(1, 60) as u8;
}

/// Band letter for a latitude, clamped to the C..X range.
pub fn band_letter(latitude: f64) -> char{
    let index = (((latitude + 80.0) / 8.0).floor() as i32).clamp(0, 19);
    return BAND_LETTERS[index as usize] as char;
}

//bands C..M are south of the equator
fn is_southern(band: char) -> bool{
    return band < 'N';
}

/// Project a geodetic fix into UTM. `force` pins the zone and band (and
/// with the band, the hemisphere offset) instead of deriving them from the
/// fix itself; positions far outside the forced zone come out distorted.
pub fn to_utm(latitude: f64, longitude: f64, force: Option<(u8, char)>) -> UtmCoord{
    let (zone, band) = match force{
        Some(pinned) => pinned,
        None => (zone_number(longitude), band_letter(latitude)),
    };

    let lat = latitude.to_radians().clamp(-FRAC_PI_2 + 1e-9, FRAC_PI_2 - 1e-9);
    let lon = longitude.to_radians();
    let lon0 = (f64::from(zone) * 6.0 - 183.0).to_radians();

    let e2 = WGS84_E2;
    let ep2 = e2 / (1.0 - e2);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();

    //radius of curvature in the prime vertical
    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let t = lat.tan() * lat.tan();
    let c = ep2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - lon0);

    //meridional arc from the equator
    let m = WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0) * lat
            - (3.0 * e2 / 8.0 + 3.0 * e2 * e2 / 32.0 + 45.0 * e2 * e2 * e2 / 1024.0)
                * (2.0 * lat).sin()
            + (15.0 * e2 * e2 / 256.0 + 45.0 * e2 * e2 * e2 / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e2 * e2 * e2 / 3072.0) * (6.0 * lat).sin());

    let easting = K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;

    let mut northing = K0
        * (m + n
            * lat.tan()
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    if is_southern(band){
        northing += FALSE_NORTHING_SOUTH;
    }

    return UtmCoord{ easting, northing, zone, band };
}
