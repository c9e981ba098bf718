use std::path::Path;

use anyhow::{Context, Result};
use geo::{BoundingRect, Contains, Coord, MultiPolygon, Point, Rect};
use rstar::{RTree, RTreeObject, AABB};
use shapefile as shp;

/// A landmass shape's bounding box in the R-tree, pointing back at its
/// MultiPolygon by index.
#[derive(Debug, Clone)]
struct ShapeBounds {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for ShapeBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// The union of landmass polygons loaded from a shapefile, with an R-tree
/// over shape bounding boxes so containment tests skip far-away shapes.
#[derive(Debug, Clone)]
pub struct Landmass {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<ShapeBounds>,
    bounds: Rect<f64>,
}

impl Landmass {
    /// Build from a list of landmass MultiPolygons.
    pub fn new(shapes: Vec<MultiPolygon<f64>>) -> Result<Self> {
        let boxes: Vec<ShapeBounds> = shapes.iter().enumerate()
            .filter_map(|(idx, shape)| shape.bounding_rect().map(|bbox| ShapeBounds { idx, bbox }))
            .collect();
        let bounds = boxes.iter()
            .map(|b| b.bbox)
            .reduce(|a, b| Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            ))
            .context("landmass has no shapes with a bounding box")?;
        Ok(Self { rtree: RTree::bulk_load(boxes), shapes, bounds })
    }

    /// Load every polygon record from a shapefile (e.g. Natural Earth
    /// admin-0 countries) as one landmass.
    pub fn from_shapefile(path: &Path) -> Result<Self> {
        let shapes = shp::read_shapes(path)
            .with_context(|| format!("read shapefile {}", path.display()))?;
        let polygons: Vec<MultiPolygon<f64>> = shapes.iter()
            .filter_map(|shape| match shape {
                shp::Shape::Polygon(p) => Some(shp_to_geo(p)),
                _ => None,
            })
            .collect();
        if polygons.is_empty() {
            anyhow::bail!("no polygon records in {}", path.display());
        }
        Self::new(polygons)
    }

    /// Number of landmass shapes.
    #[inline]
    pub fn len(&self) -> usize { self.shapes.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Bounding rectangle of all shapes (the sampling region).
    #[inline]
    pub fn bounds(&self) -> Rect<f64> { self.bounds }

    /// Whether the point lies on land. R-tree narrows to shapes whose
    /// bounding box covers the point, then each runs a full containment test.
    pub fn contains(&self, point: Point<f64>) -> bool {
        let envelope = AABB::from_point([point.x(), point.y()]);
        self.rtree
            .locate_in_envelope_intersecting(&envelope)
            .any(|b| self.shapes[b.idx].contains(&point))
    }
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>. Shapefile rings are
/// CW for exteriors, CCW for holes, each exterior followed by its holes.
fn shp_to_geo(polygon: &shp::Polygon) -> MultiPolygon<f64> {
    fn ensure_closed(coords: &mut Vec<Coord<f64>>) {
        if !coords.is_empty() && coords[0] != coords[coords.len() - 1] {
            coords.push(coords[0]);
        }
    }

    fn signed_area(pts: &[Coord<f64>]) -> f64 {
        let mut a = 0.0;
        for w in pts.windows(2) {
            a += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        a / 2.0
    }

    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    let mut exterior: Option<geo::LineString<f64>> = None;
    let mut holes: Vec<geo::LineString<f64>> = Vec::new();

    for ring in polygon.rings() {
        let mut coords: Vec<Coord<f64>> =
            ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect();
        ensure_closed(&mut coords);
        let is_exterior = signed_area(&coords) < 0.0; // CW => exterior
        let ls = geo::LineString(coords);
        if is_exterior {
            if let Some(ext) = exterior.take() {
                polys.push(geo::Polygon::new(ext, std::mem::take(&mut holes)));
            }
            exterior = Some(ls);
        } else {
            holes.push(ls);
        }
    }
    if let Some(ext) = exterior {
        polys.push(geo::Polygon::new(ext, holes));
    }

    MultiPolygon(polys)
}
