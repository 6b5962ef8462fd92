//! Delivery-ETA estimation (geolocation collaborator).
//!
//! The checkout path never calls into this module: it receives an already
//! computed ETA. This lives next to the catalog because the presentation
//! layer derives ETAs from shop locations before submitting an order.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;
const BASE_DELIVERY_TIME_MINUTES: f64 = 10.0;
const AVERAGE_SPEED_KMH: f64 = 20.0;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to `other` in kilometers (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }

    /// Render as `"lat, lng"`, the wire format orders carry.
    pub fn format(&self) -> String {
        format!("{:.6}, {:.6}", self.lat, self.lng)
    }

    /// Parse `"lat, lng"` (or `"lat,lng"`). Returns `None` on malformed input.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(',').map(str::trim);
        let lat = parts.next()?.parse().ok()?;
        let lng = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { lat, lng })
    }
}

impl core::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.format())
    }
}

/// Estimate delivery time for a courier distance: base handling time plus
/// travel at the fleet's average speed, rounded up to whole minutes.
pub fn estimate_delivery_minutes(distance_km: f64) -> u32 {
    let travel_minutes = (distance_km / AVERAGE_SPEED_KMH) * 60.0;
    (BASE_DELIVERY_TIME_MINUTES + travel_minutes).ceil() as u32
}
