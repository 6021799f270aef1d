use lasertag_core::player::{GpsBounds, MapPosition};

/// Floor on the bounds range used as a normalization denominator. Keeps the
/// projection finite when every fix in a session is (nearly) identical.
pub const MIN_COORD_RANGE: f64 = 1e-4;

/// Widen the session bounds to include a new fix.
pub fn widen(bounds: &mut GpsBounds, latitude: f64, longitude: f64) {
    bounds.min_lat = bounds.min_lat.min(latitude);
    bounds.max_lat = bounds.max_lat.max(latitude);
    bounds.min_lng = bounds.min_lng.min(longitude);
    bounds.max_lng = bounds.max_lng.max(longitude);
}

/// Project an absolute fix into the 0-100 minimap space via min-max
/// normalization over the session bounds. The vertical axis is inverted so
/// north renders at the top of the screen.
pub fn to_minimap(bounds: &GpsBounds, latitude: f64, longitude: f64) -> MapPosition {
    let lat_range = (bounds.max_lat - bounds.min_lat).max(MIN_COORD_RANGE);
    let lng_range = (bounds.max_lng - bounds.min_lng).max(MIN_COORD_RANGE);

    let x = (longitude - bounds.min_lng) / lng_range * 100.0;
    let y = (latitude - bounds.min_lat) / lat_range * 100.0;

    MapPosition {
        x: x.clamp(0.0, 100.0),
        y: (100.0 - y).clamp(0.0, 100.0),
    }
}
