//! Filled regions and the boolean algebra used for clipping and layering.
//!
//! A region keeps the path it was built from, with curves intact, until a
//! boolean operation touches it. Boolean operations flatten both operands,
//! resolve their winding rules into plain polygon sets and run them through
//! `geo`. The result is stored back as polygon outlines under the even-odd
//! rule.

use crate::style::WindingRule;
use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use kurbo::{Affine, BezPath, PathEl, Point, Rect, Shape};

/// A subtraction removing less than this fraction of a region's area leaves
/// the region untouched, slivers included.
const AREA_EPSILON: f64 = 1e-6;

/// A path interpreted as a filled area under a winding rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    path: BezPath,
    rule: WindingRule,
}

impl Default for Region {
    fn default() -> Self {
        Self::empty()
    }
}

impl Region {
    pub fn new(path: BezPath, rule: WindingRule) -> Self {
        Self { path, rule }
    }

    pub fn empty() -> Self {
        Self::new(BezPath::new(), WindingRule::NonZero)
    }

    pub fn rect(rect: Rect) -> Self {
        Self::new(rect.to_path(0.1), WindingRule::NonZero)
    }

    pub fn path(&self) -> &BezPath {
        &self.path
    }

    pub fn rule(&self) -> WindingRule {
        self.rule
    }

    pub fn into_path(self) -> BezPath {
        self.path
    }

    /// True when the region covers no area under its winding rule.
    ///
    /// A path made only of lines (or of a single point) counts as empty.
    pub fn is_empty(&self) -> bool {
        let Some(bounds) = self.bounds() else {
            return true;
        };
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return true;
        }
        self.area() <= f64::EPSILON * bounds.area()
    }

    /// Bounding box, or `None` for a region without geometry.
    pub fn bounds(&self) -> Option<Rect> {
        if self.path.elements().is_empty() {
            return None;
        }
        Some(self.path.bounding_box())
    }

    /// Point of the first subpath, where a pen would start drawing.
    pub fn first_point(&self) -> Option<Point> {
        self.path.elements().iter().find_map(|el| match el {
            PathEl::MoveTo(p) => Some(*p),
            _ => None,
        })
    }

    pub fn contains(&self, point: Point) -> bool {
        !self.path.elements().is_empty() && self.rule.contains(self.path.winding(point))
    }

    /// Covered area with the winding rule applied.
    pub fn area(&self) -> f64 {
        self.to_polygons().unsigned_area()
    }

    pub fn transform(&mut self, affine: Affine) {
        self.path.apply_affine(affine);
    }

    pub fn union(&self, other: &Region) -> Region {
        if other.path.elements().is_empty() {
            return self.clone();
        }
        if self.path.elements().is_empty() {
            return other.clone();
        }
        Region::from_polygons(&self.to_polygons().union(&other.to_polygons()))
    }

    pub fn intersect(&self, other: &Region) -> Region {
        if !self.bounds_overlap(other) {
            return Region::empty();
        }
        Region::from_polygons(&self.to_polygons().intersection(&other.to_polygons()))
    }

    /// Remove `other` from this region.
    ///
    /// When `other` takes away no area the region is returned unchanged, curves
    /// included, so repeated subtraction of disjoint regions is stable.
    pub fn subtract(&self, other: &Region) -> Region {
        if !self.bounds_overlap(other) {
            return self.clone();
        }
        let mine = self.to_polygons();
        let before = mine.unsigned_area();
        let result = mine.difference(&other.to_polygons());
        let after = result.unsigned_area();
        if (before - after).abs() <= before * AREA_EPSILON {
            return self.clone();
        }
        Region::from_polygons(&result)
    }

    /// True when the bounding boxes share a region of positive area.
    pub fn bounds_overlap(&self, other: &Region) -> bool {
        match (self.bounds(), other.bounds()) {
            (Some(a), Some(b)) => rects_overlap(a, b),
            _ => false,
        }
    }

    /// Flatten and resolve the winding rule into a set of simple polygons.
    ///
    /// Rings whose outlines never meet go straight to `geo`. As soon as an
    /// outline crosses or touches itself or another ring, coverage is
    /// computed by a band sweep instead, since `geo` reads such rings
    /// even-odd.
    pub(crate) fn to_polygons(&self) -> MultiPolygon<f64> {
        let Some(bounds) = self.bounds() else {
            return MultiPolygon::new(vec![]);
        };
        let rings = rings(&self.path, tolerance_for(bounds));
        let edges = edges(&rings);
        let (simple, heights) = meetings(&edges, &rings);
        if !simple {
            return sweep(&edges, heights, self.rule);
        }
        match self.rule {
            WindingRule::EvenOdd => resolve_even_odd(rings),
            WindingRule::NonZero => resolve_non_zero(rings),
        }
    }

    pub(crate) fn from_polygons(polygons: &MultiPolygon<f64>) -> Region {
        let mut path = BezPath::new();
        for polygon in polygons.iter() {
            if polygon.unsigned_area() <= 0.0 {
                continue;
            }
            append_ring(&mut path, polygon.exterior());
            for interior in polygon.interiors() {
                append_ring(&mut path, interior);
            }
        }
        Region::new(path, WindingRule::EvenOdd)
    }
}

pub(crate) fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// Flattening tolerance scaled to the size of the geometry.
fn tolerance_for(bounds: Rect) -> f64 {
    (bounds.width().max(bounds.height()) * 1e-4).max(1e-9)
}

fn append_ring(path: &mut BezPath, ring: &LineString<f64>) {
    let coords = &ring.0;
    // geo rings repeat the first coordinate at the end
    let n = if coords.len() > 1 && coords.first() == coords.last() {
        coords.len() - 1
    } else {
        coords.len()
    };
    if n < 3 {
        return;
    }
    path.move_to((coords[0].x, coords[0].y));
    for c in &coords[1..n] {
        path.line_to((c.x, c.y));
    }
    path.close_path();
}

/// Flatten a path into closed point rings. Open subpaths are closed
/// implicitly; rings with fewer than three points are dropped.
fn rings(path: &BezPath, tolerance: f64) -> Vec<Vec<Coord<f64>>> {
    let mut rings = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();
    kurbo::flatten(path.iter(), tolerance, |el| match el {
        PathEl::MoveTo(p) => {
            finish_ring(&mut current, &mut rings);
            current.push(Coord { x: p.x, y: p.y });
        }
        PathEl::LineTo(p) => {
            let c = Coord { x: p.x, y: p.y };
            if current.last() != Some(&c) {
                current.push(c);
            }
        }
        PathEl::ClosePath => finish_ring(&mut current, &mut rings),
        _ => {}
    });
    finish_ring(&mut current, &mut rings);
    rings
}

fn finish_ring(ring: &mut Vec<Coord<f64>>, rings: &mut Vec<Vec<Coord<f64>>>) {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() >= 3 {
        rings.push(std::mem::take(ring));
    } else {
        ring.clear();
    }
}

fn ring_signed_area(ring: &[Coord<f64>]) -> f64 {
    let n = ring.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

fn ring_polygon(ring: Vec<Coord<f64>>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Polygon::new(LineString::from(ring), vec![])])
}

fn resolve_even_odd(rings: Vec<Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    let mut rings = rings.into_iter();
    let Some(first) = rings.next() else {
        return MultiPolygon::new(vec![]);
    };
    rings.fold(ring_polygon(first), |acc, ring| acc.xor(&ring_polygon(ring)))
}

/// Resolve nonzero winding by tracking which parts of the plane carry which
/// winding number. Each ring adds its orientation (+1 or -1) to every point it
/// encloses.
fn resolve_non_zero(rings: Vec<Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    if rings.is_empty() {
        return MultiPolygon::new(vec![]);
    }
    let orientations: Vec<f64> = rings.iter().map(|r| ring_signed_area(r).signum()).collect();
    if orientations.iter().all(|o| *o == orientations[0]) {
        let mut rings = rings.into_iter();
        let first = ring_polygon(rings.next().unwrap_or_default());
        return rings.fold(first, |acc, ring| acc.union(&ring_polygon(ring)));
    }

    // (winding number, area carrying it)
    let mut buckets: Vec<(i32, MultiPolygon<f64>)> = Vec::new();
    for (ring, orientation) in rings.into_iter().zip(orientations) {
        let step = if orientation < 0.0 { -1 } else { 1 };
        let shape = ring_polygon(ring);
        let mut uncovered = shape.clone();
        let mut next: Vec<(i32, MultiPolygon<f64>)> = Vec::new();
        for (winding, area) in buckets {
            let inside = area.intersection(&shape);
            let outside = area.difference(&shape);
            uncovered = uncovered.difference(&area);
            push_bucket(&mut next, winding, outside);
            push_bucket(&mut next, winding + step, inside);
        }
        push_bucket(&mut next, step, uncovered);
        buckets = next;
    }

    buckets
        .into_iter()
        .filter(|(winding, _)| *winding != 0)
        .fold(MultiPolygon::new(vec![]), |acc, (_, area)| acc.union(&area))
}

fn push_bucket(buckets: &mut Vec<(i32, MultiPolygon<f64>)>, winding: i32, area: MultiPolygon<f64>) {
    if area.unsigned_area() <= 0.0 {
        return;
    }
    match buckets.iter_mut().find(|(w, _)| *w == winding) {
        Some((_, existing)) => *existing = existing.union(&area),
        None => buckets.push((winding, area)),
    }
}


#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Coord<f64>,
    to: Coord<f64>,
    ring: usize,
    index: usize,
}

impl Edge {
    fn y_min(&self) -> f64 {
        self.from.y.min(self.to.y)
    }

    fn y_max(&self) -> f64 {
        self.from.y.max(self.to.y)
    }

    fn x_min(&self) -> f64 {
        self.from.x.min(self.to.x)
    }

    fn x_max(&self) -> f64 {
        self.from.x.max(self.to.x)
    }

    fn x_at(&self, y: f64) -> f64 {
        self.from.x + (y - self.from.y) * (self.to.x - self.from.x) / (self.to.y - self.from.y)
    }

    /// Winding contribution when crossed by a horizontal ray.
    fn step(&self) -> i32 {
        if self.to.y > self.from.y {
            1
        } else {
            -1
        }
    }
}

fn edges(rings: &[Vec<Coord<f64>>]) -> Vec<Edge> {
    let mut edges = Vec::new();
    for (ring_index, ring) in rings.iter().enumerate() {
        let n = ring.len();
        for index in 0..n {
            let (from, to) = (ring[index], ring[(index + 1) % n]);
            if from != to {
                edges.push(Edge {
                    from,
                    to,
                    ring: ring_index,
                    index,
                });
            }
        }
    }
    edges
}

fn adjacent(a: &Edge, b: &Edge, rings: &[Vec<Coord<f64>>]) -> bool {
    if a.ring != b.ring {
        return false;
    }
    let n = rings[a.ring].len();
    (a.index + 1) % n == b.index || (b.index + 1) % n == a.index
}

enum Meeting {
    Apart,
    Point(Coord<f64>),
    Overlap,
}

fn cross(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

fn dot(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.x + a.y * b.y
}

const MEET_EPSILON: f64 = 1e-12;

fn meet(p: &Edge, q: &Edge) -> Meeting {
    let r = p.to - p.from;
    let s = q.to - q.from;
    let qp = q.from - p.from;
    let (rr, ss) = (dot(r, r), dot(s, s));
    let denom = cross(r, s);
    let within = |t: f64| (-MEET_EPSILON..=1.0 + MEET_EPSILON).contains(&t);

    if denom.abs() <= MEET_EPSILON * (rr * ss).sqrt() {
        if cross(qp, r).abs() > MEET_EPSILON * (rr * dot(qp, qp)).sqrt() {
            return Meeting::Apart;
        }
        // Collinear: compare the parameter ranges along p
        let t0 = dot(qp, r) / rr;
        let t1 = t0 + dot(s, r) / rr;
        let (lo, hi) = (t0.min(t1).max(0.0), t0.max(t1).min(1.0));
        return if hi < lo - MEET_EPSILON {
            Meeting::Apart
        } else if hi - lo <= MEET_EPSILON {
            Meeting::Point(p.from + r * lo)
        } else {
            Meeting::Overlap
        };
    }

    let t = cross(qp, s) / denom;
    let u = cross(qp, r) / denom;
    if within(t) && within(u) {
        Meeting::Point(p.from + r * t)
    } else {
        Meeting::Apart
    }
}

/// Find where ring outlines meet. Returns whether the rings are simple and
/// pairwise disjoint, together with the heights of every meeting point.
/// Adjacent edges of one ring may share their common vertex.
fn meetings(edges: &[Edge], rings: &[Vec<Coord<f64>>]) -> (bool, Vec<f64>) {
    let mut order: Vec<&Edge> = edges.iter().collect();
    order.sort_by(|a, b| a.x_min().total_cmp(&b.x_min()));
    let mut simple = true;
    let mut heights = Vec::new();
    for (i, a) in order.iter().enumerate() {
        for b in &order[i + 1..] {
            if b.x_min() > a.x_max() {
                break;
            }
            if b.y_min() > a.y_max() || a.y_min() > b.y_max() {
                continue;
            }
            match meet(a, b) {
                Meeting::Apart => {}
                Meeting::Point(_) if adjacent(a, b, rings) => {}
                Meeting::Point(c) => {
                    simple = false;
                    heights.push(c.y);
                }
                // Overlap ends are vertices, which the sweep visits anyway
                Meeting::Overlap => simple = false,
            }
        }
    }
    (simple, heights)
}

#[derive(Debug, Clone, Copy)]
struct Crossing {
    top: f64,
    middle: f64,
    bottom: f64,
    step: i32,
}

/// Coverage of arbitrary rings under `rule`.
///
/// The plane is cut into horizontal bands at every vertex and meeting point,
/// so no two edges cross inside a band. Within a band the edges are ordered
/// by their position at mid height and the winding number is accumulated
/// from left to right; each run that the rule counts as inside becomes one
/// trapezoid. The bands are then united.
fn sweep(edges: &[Edge], mut heights: Vec<f64>, rule: WindingRule) -> MultiPolygon<f64> {
    heights.extend(edges.iter().flat_map(|e| [e.from.y, e.to.y]));
    heights.sort_by(f64::total_cmp);
    heights.dedup();

    let mut pending: Vec<&Edge> = edges.iter().filter(|e| e.from.y != e.to.y).collect();
    pending.sort_by(|a, b| a.y_min().total_cmp(&b.y_min()));
    let mut pending = pending.into_iter().peekable();
    let mut active: Vec<&Edge> = Vec::new();
    let mut bands = Vec::new();

    for band in heights.windows(2) {
        let (y0, y1) = (band[0], band[1]);
        let mid = (y0 + y1) / 2.0;
        while let Some(edge) = pending.next_if(|e| e.y_min() < mid) {
            active.push(edge);
        }
        active.retain(|e| e.y_max() > mid);

        let mut crossings: Vec<Crossing> = active
            .iter()
            .map(|e| Crossing {
                top: e.x_at(y0),
                middle: e.x_at(mid),
                bottom: e.x_at(y1),
                step: e.step(),
            })
            .collect();
        crossings.sort_by(|a, b| a.middle.total_cmp(&b.middle));

        let mut pieces = Vec::new();
        let mut winding = 0;
        let mut start: Option<Crossing> = None;
        for crossing in crossings {
            let was_inside = rule.contains(winding);
            winding += crossing.step;
            match (was_inside, rule.contains(winding), start) {
                (false, true, _) => start = Some(crossing),
                (true, false, Some(left)) => {
                    pieces.extend(trapezoid(left, crossing, y0, y1));
                    start = None;
                }
                _ => {}
            }
        }
        if !pieces.is_empty() {
            bands.push(MultiPolygon::new(pieces));
        }
    }
    union_all(bands)
}

fn trapezoid(left: Crossing, right: Crossing, y0: f64, y1: f64) -> Option<Polygon<f64>> {
    let area = ((right.top - left.top) + (right.bottom - left.bottom)) / 2.0 * (y1 - y0);
    if area <= 0.0 {
        return None;
    }
    let mut coords = vec![
        Coord { x: left.top, y: y0 },
        Coord { x: right.top, y: y0 },
        Coord { x: right.bottom, y: y1 },
        Coord { x: left.bottom, y: y1 },
    ];
    coords.dedup();
    if coords.len() < 3 {
        return None;
    }
    Some(Polygon::new(LineString::from(coords), vec![]))
}

/// Pairwise union, keeping operands of similar size.
fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    while parts.len() > 1 {
        parts = parts
            .chunks(2)
            .map(|pair| {
                pair[1..]
                    .iter()
                    .fold(pair[0].clone(), |acc, part| acc.union(part))
            })
            .collect();
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}
