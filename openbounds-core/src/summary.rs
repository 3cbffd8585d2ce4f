//! Geometry summaries derived from feature collections.
//!
//! Bounding boxes, demo points, label points and catalog geometries are all
//! computed here by converting GeoJSON geometries into `geo` types.

use geo::{
    BooleanOps, BoundingRect, Centroid, Coord, GeometryCollection, InteriorPoint, LineString,
    MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect,
};

use crate::geojson::{Feature, FeatureCollection, Geometry, Position};

/// Axis-aligned bounds in source coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum x (longitude).
    pub min_x: f64,
    /// Minimum y (latitude).
    pub min_y: f64,
    /// Maximum x (longitude).
    pub max_x: f64,
    /// Maximum y (latitude).
    pub max_y: f64,
}

impl Bounds {
    /// Read a GeoJSON `bbox` member in its 2D or 3D form.
    pub fn from_bbox(bbox: &[f64]) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = match *bbox {
            [min_x, min_y, max_x, max_y] | [min_x, min_y, _, max_x, max_y, _] => {
                (min_x, min_y, max_x, max_y)
            }
            _ => return None,
        };
        if [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            Some(Self {
                min_x,
                min_y,
                max_x,
                max_y,
            })
        } else {
            None
        }
    }

    /// Encode as a 2D GeoJSON `bbox` member.
    pub fn to_bbox(self) -> Vec<f64> {
        vec![self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Bounds covering every coordinate of `features`, if any.
    pub fn of_features(features: &[Feature]) -> Option<Self> {
        features
            .iter()
            .filter_map(|feature| feature.geometry.as_ref())
            .filter_map(to_geo)
            .filter_map(|geometry| geometry.bounding_rect())
            .map(Self::from)
            .reduce(Self::merge)
    }

    /// Closed polygon tracing the bounds counter-clockwise.
    pub fn to_polygon(self) -> Geometry {
        Geometry::Polygon(vec![vec![
            vec![self.min_x, self.min_y],
            vec![self.max_x, self.min_y],
            vec![self.max_x, self.max_y],
            vec![self.min_x, self.max_y],
            vec![self.min_x, self.min_y],
        ]])
    }

    fn merge(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

impl From<Rect<f64>> for Bounds {
    fn from(rect: Rect<f64>) -> Self {
        let min = rect.min();
        let max = rect.max();
        Self {
            min_x: min.x,
            min_y: min.y,
            max_x: max.x,
            max_y: max.y,
        }
    }
}

/// Convert a GeoJSON geometry into its `geo` counterpart.
///
/// Returns `None` when any position has fewer than two finite ordinates.
pub fn to_geo(geometry: &Geometry) -> Option<geo::Geometry<f64>> {
    let converted = match geometry {
        Geometry::Point(position) => geo::Geometry::Point(Point::from(coord(position)?)),
        Geometry::MultiPoint(positions) => geo::Geometry::MultiPoint(MultiPoint::new(
            positions
                .iter()
                .map(|position| coord(position).map(Point::from))
                .collect::<Option<Vec<_>>>()?,
        )),
        Geometry::LineString(positions) => geo::Geometry::LineString(line(positions)?),
        Geometry::MultiLineString(lines) => geo::Geometry::MultiLineString(MultiLineString::new(
            lines
                .iter()
                .map(|positions| line(positions))
                .collect::<Option<Vec<_>>>()?,
        )),
        Geometry::Polygon(rings) => geo::Geometry::Polygon(polygon(rings)?),
        Geometry::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(MultiPolygon::new(
            polygons
                .iter()
                .map(|rings| polygon(rings))
                .collect::<Option<Vec<_>>>()?,
        )),
    };
    Some(converted)
}

/// Representative point for a set of features, as a GeoJSON Point.
///
/// Uses the interior point of all geometries taken together, falling back to
/// their centroid.
pub fn demo_point(features: &[Feature]) -> Option<Geometry> {
    let geometries: Vec<_> = features
        .iter()
        .filter_map(|feature| feature.geometry.as_ref())
        .filter_map(to_geo)
        .collect();
    let collection = GeometryCollection(geometries);
    collection
        .interior_point()
        .or_else(|| collection.centroid())
        .map(point_geometry)
}

/// One label-placement point per feature that has a usable geometry.
///
/// Each point carries the originating feature's properties.
pub fn label_points(collection: &FeatureCollection) -> FeatureCollection {
    let features = collection
        .features
        .iter()
        .filter_map(|feature| {
            let geometry = to_geo(feature.geometry.as_ref()?)?;
            let point = geometry.interior_point()?;
            Some(Feature::new(
                Some(point_geometry(point)),
                feature.properties.clone(),
            ))
        })
        .collect();
    FeatureCollection::new(features)
}

/// Summary shape for a catalog entry.
///
/// Polygonal geometries are unioned; when there are none (or the union is
/// empty) the bounds polygon is used instead.
pub fn summary_geometry(features: &[Feature], bounds: Option<Bounds>) -> Option<Geometry> {
    let mut merged: Option<MultiPolygon<f64>> = None;
    for geometry in features
        .iter()
        .filter_map(|feature| feature.geometry.as_ref())
        .filter_map(to_geo)
    {
        let shape = match geometry {
            geo::Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
            geo::Geometry::MultiPolygon(polygons) => polygons,
            _ => continue,
        };
        merged = Some(match merged {
            Some(accumulated) => accumulated.union(&shape),
            None => shape,
        });
    }
    match merged {
        Some(shape) if !shape.0.is_empty() => Some(multipolygon_geometry(&shape)),
        _ => bounds
            .or_else(|| Bounds::of_features(features))
            .map(Bounds::to_polygon),
    }
}

/// Encode a `geo` point as a GeoJSON Point.
pub fn point_geometry(point: Point<f64>) -> Geometry {
    Geometry::Point(vec![point.x(), point.y()])
}

fn coord(position: &[f64]) -> Option<Coord<f64>> {
    match *position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Some(Coord { x, y }),
        _ => None,
    }
}

fn line(positions: &[Position]) -> Option<LineString<f64>> {
    positions
        .iter()
        .map(|position| coord(position))
        .collect::<Option<Vec<_>>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Position>]) -> Option<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    let interiors = interiors
        .iter()
        .map(|ring| line(ring))
        .collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(line(exterior)?, interiors))
}

fn ring_positions(ring: &LineString<f64>) -> Vec<Position> {
    ring.coords().map(|c| vec![c.x, c.y]).collect()
}

fn polygon_rings(polygon: &Polygon<f64>) -> Vec<Vec<Position>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_positions)
        .collect()
}

fn multipolygon_geometry(shape: &MultiPolygon<f64>) -> Geometry {
    match shape.0.as_slice() {
        [single] => Geometry::Polygon(polygon_rings(single)),
        many => Geometry::MultiPolygon(many.iter().map(polygon_rings).collect()),
    }
}
