use geo::Centroid;
use geojson::{Geometry, Value};

/// Returns true when the geometry carries at least one coordinate.
pub fn has_coordinates(geometry: &Geometry) -> bool {
    fn value_has_coordinates(value: &Value) -> bool {
        match value {
            Value::Point(position) => !position.is_empty(),
            Value::MultiPoint(points) => points.iter().any(|p| !p.is_empty()),
            Value::LineString(line) => !line.is_empty(),
            Value::MultiLineString(lines) => lines.iter().any(|l| !l.is_empty()),
            Value::Polygon(rings) => rings.iter().any(|r| !r.is_empty()),
            Value::MultiPolygon(polygons) => polygons
                .iter()
                .any(|rings| rings.iter().any(|r| !r.is_empty())),
            Value::GeometryCollection(geometries) => geometries.iter().any(has_coordinates),
        }
    }

    value_has_coordinates(&geometry.value)
}

/// Centroid of a GeoJSON geometry as a GeoJSON point.
///
/// Returns `None` for empty or malformed geometries.
pub fn centroid_of(geometry: &Geometry) -> Option<Geometry> {
    if !has_coordinates(geometry) {
        return None;
    }

    let shape = geo::Geometry::<f64>::try_from(&geometry.value).ok()?;
    let center = shape.centroid()?;

    Some(point(center.x(), center.y()))
}

pub fn point(longitude: f64, latitude: f64) -> Geometry {
    Geometry::new(Value::Point(vec![longitude, latitude]))
}

/// Longitude/latitude of a point geometry.
pub fn point_coordinates(geometry: &Geometry) -> Option<(f64, f64)> {
    match &geometry.value {
        Value::Point(position) if position.len() >= 2 => Some((position[0], position[1])),
        _ => None,
    }
}
