//! Great-circle distance and geofence containment.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by [`haversine_meters`].
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Absorbs float noise from the degree/radian round trip, so a point placed
/// exactly on the boundary still counts as inside.
const BOUNDARY_TOLERANCE_METERS: f64 = 1e-6;

/// A WGS 84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Coordinates {
  pub fn new(latitude: f64, longitude: f64) -> Self {
    Self { latitude, longitude }
  }

  /// Both components finite and within their degree ranges.
  pub fn is_valid(&self) -> bool {
    self.latitude.is_finite()
      && self.longitude.is_finite()
      && (-90.0..=90.0).contains(&self.latitude)
      && (-180.0..=180.0).contains(&self.longitude)
  }

  pub fn distance_to(&self, other: &Coordinates) -> f64 {
    haversine_meters(
      self.latitude,
      self.longitude,
      other.latitude,
      other.longitude,
    )
  }
}

/// Great-circle distance in meters between two points given in degrees.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
  let phi1 = lat1.to_radians();
  let phi2 = lat2.to_radians();
  let d_phi = (lat2 - lat1).to_radians();
  let d_lambda = (lon2 - lon1).to_radians();

  let a = (d_phi / 2.0).sin().powi(2)
    + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
  let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

  EARTH_RADIUS_METERS * c
}

/// A circular allowed area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
  pub center:        Coordinates,
  pub radius_meters: u32,
}

/// Where a submitted position falls relative to a [`Geofence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
  Inside { distance_meters: u64 },
  Outside { distance_meters: u64 },
}

impl Geofence {
  /// Classify `point`. The exact distance decides containment; the reported
  /// `distance_meters` is only rounded to whole meters.
  pub fn place(&self, point: &Coordinates) -> Placement {
    let distance = self.center.distance_to(point);
    let distance_meters = distance.round() as u64;
    if distance > f64::from(self.radius_meters) + BOUNDARY_TOLERANCE_METERS {
      Placement::Outside { distance_meters }
    } else {
      Placement::Inside { distance_meters }
    }
  }
}
