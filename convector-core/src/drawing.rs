//! Drawing: the ordered list of painted regions produced by a canvas.

use crate::region::Region;
use crate::style::Color;
use kurbo::{Point, Rect};

/// One unit of paint.
#[derive(Debug, Clone, PartialEq)]
pub struct Splash {
    pub color: Color,
    pub region: Region,
}

impl Splash {
    pub fn new(color: Color, region: Region) -> Self {
        Self { color, region }
    }

    /// Where the pen starts drawing this splash.
    pub fn start(&self) -> Point {
        self.region.first_point().unwrap_or(Point::ORIGIN)
    }
}

/// Splashes in paint order; later splashes cover earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drawing {
    splashes: Vec<Splash>,
}

impl Drawing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a splash. Empty regions are ignored.
    pub fn paint(&mut self, color: Color, region: Region) {
        if region.is_empty() {
            return;
        }
        log::debug!(target: "drawing", "splash {} ({} elements)", color, region.path().elements().len());
        self.splashes.push(Splash::new(color, region));
    }

    pub fn splashes(&self) -> &[Splash] {
        &self.splashes
    }

    pub fn into_splashes(self) -> Vec<Splash> {
        self.splashes
    }

    pub fn len(&self) -> usize {
        self.splashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splashes.is_empty()
    }

    /// Bounding box over all splashes.
    pub fn bounds(&self) -> Option<Rect> {
        self.splashes
            .iter()
            .filter_map(|s| s.region.bounds())
            .reduce(|a, b| a.union(b))
    }

    /// Sum of the distances between consecutive splash start points.
    pub fn total_travel(&self) -> f64 {
        travel(self.splashes.iter().map(Splash::start))
    }

    /// Replace the splashes with pairwise-disjoint regions that look the same
    /// when painted in order.
    ///
    /// A splash absorbs every earlier splash of the same color whose bounding
    /// box meets its own, then is cut out of every earlier splash of another
    /// color. Splashes that become empty are dropped.
    pub fn merge_layers(&mut self) {
        let before = self.splashes.len();
        let mut accepted: Vec<Splash> = Vec::with_capacity(before);
        for mut splash in std::mem::take(&mut self.splashes) {
            while let Some(i) = accepted
                .iter()
                .position(|a| a.color == splash.color && a.region.bounds_overlap(&splash.region))
            {
                let older = accepted.remove(i);
                splash.region = older.region.union(&splash.region);
            }
            accepted.retain_mut(|older| {
                if older.color == splash.color || !older.region.bounds_overlap(&splash.region) {
                    return true;
                }
                older.region = older.region.subtract(&splash.region);
                !older.region.is_empty()
            });
            accepted.push(splash);
        }
        log::debug!(target: "drawing", "merged {} splashes into {}", before, accepted.len());
        self.splashes = accepted;
    }

    /// Greedy nearest-neighbor reordering to shorten pen travel.
    ///
    /// The first splash stays in place. Each following position takes the
    /// remaining splash starting closest to the previous splash's start. If the
    /// result travels further than the current order, nothing changes.
    /// Splashes move as a whole; subpaths within a splash keep their order.
    pub fn optimize(&mut self) {
        let n = self.splashes.len();
        if n < 3 {
            return;
        }
        let starts: Vec<Point> = self.splashes.iter().map(Splash::start).collect();
        let mut order: Vec<usize> = (0..n).collect();
        for i in 1..n {
            let previous = starts[order[i - 1]];
            let mut best = i;
            let mut best_distance = f64::INFINITY;
            for (j, &candidate) in order.iter().enumerate().skip(i) {
                let distance = (starts[candidate] - previous).hypot2();
                if distance < best_distance {
                    best = j;
                    best_distance = distance;
                }
            }
            order.swap(i, best);
        }

        let original = travel(starts.iter().copied());
        let optimized = travel(order.iter().map(|&i| starts[i]));
        if optimized > original {
            log::debug!(target: "drawing", "greedy order travels further ({} > {}), kept input order", optimized, original);
            return;
        }
        log::debug!(target: "drawing", "pen travel {} -> {}", original, optimized);

        let mut slots: Vec<Option<Splash>> = std::mem::take(&mut self.splashes)
            .into_iter()
            .map(Some)
            .collect();
        self.splashes = order.iter().filter_map(|&i| slots[i].take()).collect();
    }
}

fn travel(points: impl Iterator<Item = Point>) -> f64 {
    let mut total = 0.0;
    let mut previous: Option<Point> = None;
    for p in points {
        if let Some(prev) = previous {
            total += (p - prev).hypot();
        }
        previous = Some(p);
    }
    total
}
