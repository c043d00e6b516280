//! Pattern-based regeneration planting.
//!
//! Configured by one or more items; each item iterates the stand's
//! light-resolution (2 m) pixels inside the stand polygon and either
//! randomly seeds saplings at a target fraction, stamps a fixed pattern
//! at every matching offset, or stamps the pattern at a regular spacing
//! or at random positions a fixed number of times.

use rand::Rng;

use crate::engine::ids::StandId;
use crate::error::SetupError;
use crate::host::{Host, Point};

/// Light-resolution pixel size, meters, matching the host simulator's
/// sapling grid.
pub const PIXEL_SIZE_M: f64 = 2.0;

/// A fixed regeneration pattern: a boolean bitmask sampled at
/// [`PIXEL_SIZE_M`] resolution, `true` cells get a sapling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantingPattern {
    Rect2,
    Rect10,
    Rect20,
    Circle5,
    Circle10,
}

impl PlantingPattern {
    pub fn from_name(name: &str) -> Result<Self, SetupError> {
        match name {
            "rect2" => Ok(PlantingPattern::Rect2),
            "rect10" => Ok(PlantingPattern::Rect10),
            "rect20" => Ok(PlantingPattern::Rect20),
            "circle5" => Ok(PlantingPattern::Circle5),
            "circle10" => Ok(PlantingPattern::Circle10),
            other => Err(SetupError::UnknownPlantingPattern(other.to_string())),
        }
    }

    /// Side length of the pattern's square bounding kernel, in pixels.
    fn side(self) -> usize {
        match self {
            PlantingPattern::Rect2 => 2,
            PlantingPattern::Rect10 => 5,
            PlantingPattern::Rect20 => 10,
            PlantingPattern::Circle5 => 5,
            PlantingPattern::Circle10 => 10,
        }
    }

    /// `true` at `(x, y)` (0-based, within the kernel) if the pattern
    /// plants a sapling there.
    pub fn hit(self, x: usize, y: usize) -> bool {
        let n = self.side();
        if x >= n || y >= n {
            return false;
        }
        match self {
            PlantingPattern::Rect2 | PlantingPattern::Rect10 | PlantingPattern::Rect20 => true,
            PlantingPattern::Circle5 | PlantingPattern::Circle10 => {
                let r = n as f64 / 2.0;
                let cx = x as f64 + 0.5 - r;
                let cy = y as f64 + 0.5 - r;
                (cx * cx + cy * cy).sqrt() <= r
            }
        }
    }
}

/// One planting configuration item.
#[derive(Debug, Clone)]
pub struct PlantingItem {
    pub species_id: String,
    pub target_fraction: f64,
    pub initial_height_m: f64,
    pub initial_age_years: u32,
    pub pattern: Option<PlantingPattern>,
    pub spacing_m: f64,
    pub offset_x: i32,
    pub offset_y: i32,
    pub random: bool,
    pub count: u32,
    pub clear: bool,
    pub species_index: u32,
}

impl PlantingItem {
    pub fn new(species_id: impl Into<String>, species_index: u32, target_fraction: f64) -> Self {
        Self {
            species_id: species_id.into(),
            target_fraction,
            initial_height_m: 0.05,
            initial_age_years: 1,
            pattern: None,
            spacing_m: 10.0,
            offset_x: 0,
            offset_y: 0,
            random: false,
            count: 0,
            clear: false,
            species_index,
        }
    }

    /// Runs this item over the stand's bounding box, restricted to pixels
    /// that actually belong to the stand.
    pub fn run<S: Host>(&self, stand: StandId, host: &mut S, rng: &mut impl Rng) {
        let Some(bbox) = host.bounding_box(stand) else {
            return;
        };
        let nx = ((bbox.max.x - bbox.min.x) / PIXEL_SIZE_M).round().max(0.0) as i64;
        let ny = ((bbox.max.y - bbox.min.y) / PIXEL_SIZE_M).round().max(0.0) as i64;

        let pixels: Vec<(i64, i64)> = (0..ny)
            .flat_map(|gy| (0..nx).map(move |gx| (gx, gy)))
            .filter(|&(gx, gy)| {
                let p = Point {
                    x: bbox.min.x + (gx as f64 + 0.5) * PIXEL_SIZE_M,
                    y: bbox.min.y + (gy as f64 + 0.5) * PIXEL_SIZE_M,
                };
                host.stand_id_at(p) == Some(stand)
            })
            .collect();

        if pixels.is_empty() {
            return;
        }

        match self.pattern {
            None => self.run_random_fraction(stand, &pixels, bbox.min, host, rng),
            Some(pattern) => {
                if self.count > 0 {
                    self.run_stamped_count(stand, &pixels, bbox.min, pattern, host, rng);
                } else {
                    self.run_pattern_offsets(stand, &pixels, bbox.min, pattern, host);
                }
            }
        }
    }

    fn seed_cell<S: Host>(&self, stand: StandId, cell: Point, host: &mut S) {
        if self.clear {
            host.clear_saplings(cell, true);
        }
        host.add_sapling(cell, self.initial_height_m, self.initial_age_years, self.species_index);
        let _ = stand;
    }

    /// (a) Randomly seed pixels at the target fraction.
    fn run_random_fraction<S: Host>(
        &self,
        stand: StandId,
        pixels: &[(i64, i64)],
        origin: Point,
        host: &mut S,
        rng: &mut impl Rng,
    ) {
        for &(gx, gy) in pixels {
            if rng.gen::<f64>() < self.target_fraction {
                let cell = pixel_center(origin, gx, gy);
                self.seed_cell(stand, cell, host);
            }
        }
    }

    /// (b) Stamp the pattern at every pixel whose offset position falls
    /// on a pattern hit.
    fn run_pattern_offsets<S: Host>(
        &self,
        stand: StandId,
        pixels: &[(i64, i64)],
        origin: Point,
        pattern: PlantingPattern,
        host: &mut S,
    ) {
        let n = pattern.side() as i64;
        for &(gx, gy) in pixels {
            let px = (gx + self.offset_x as i64).rem_euclid(n) as usize;
            let py = (gy + self.offset_y as i64).rem_euclid(n) as usize;
            if pattern.hit(px, py) {
                let cell = pixel_center(origin, gx, gy);
                self.seed_cell(stand, cell, host);
            }
        }
    }

    /// (c) Stamp the pattern `count` times, either at a regular spacing
    /// or at random positions within the stand.
    fn run_stamped_count<S: Host>(
        &self,
        stand: StandId,
        pixels: &[(i64, i64)],
        origin: Point,
        pattern: PlantingPattern,
        host: &mut S,
        rng: &mut impl Rng,
    ) {
        let spacing_px = (self.spacing_m / PIXEL_SIZE_M).round().max(1.0) as i64;
        let centers: Vec<(i64, i64)> = if self.random {
            (0..self.count)
                .filter_map(|_| pixels.get(rng.gen_range(0..pixels.len())).copied())
                .collect()
        } else {
            pixels
                .iter()
                .copied()
                .filter(|&(gx, gy)| gx % spacing_px == 0 && gy % spacing_px == 0)
                .take(self.count as usize)
                .collect()
        };

        let half = pattern.side() as i64 / 2;
        for (cx, cy) in centers {
            for dy in 0..pattern.side() as i64 {
                for dx in 0..pattern.side() as i64 {
                    if !pattern.hit(dx as usize, dy as usize) {
                        continue;
                    }
                    let gx = cx + dx - half;
                    let gy = cy + dy - half;
                    if pixels.contains(&(gx, gy)) {
                        let cell = pixel_center(origin, gx, gy);
                        self.seed_cell(stand, cell, host);
                    }
                }
            }
        }
    }
}

fn pixel_center(origin: Point, gx: i64, gy: i64) -> Point {
    Point {
        x: origin.x + (gx as f64 + 0.5) * PIXEL_SIZE_M,
        y: origin.y + (gy as f64 + 0.5) * PIXEL_SIZE_M,
    }
}

/// Full planting activity configuration: one or more items run in order.
#[derive(Debug, Clone, Default)]
pub struct PlantingConfig {
    pub items: Vec<PlantingItem>,
}

impl PlantingConfig {
    pub fn run<S: Host>(&self, stand: StandId, host: &mut S, rng: &mut impl Rng) {
        for item in &self.items {
            item.run(stand, host, rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeHost;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn unknown_pattern_name_is_a_setup_error() {
        assert!(matches!(
            PlantingPattern::from_name("hexagon"),
            Err(SetupError::UnknownPlantingPattern(_))
        ));
    }

    #[test]
    fn rect_pattern_hits_every_cell() {
        let p = PlantingPattern::Rect2;
        assert!(p.hit(0, 0));
        assert!(p.hit(1, 1));
        assert!(!p.hit(2, 0));
    }

    #[test]
    fn circle_pattern_excludes_corners() {
        let p = PlantingPattern::Circle10;
        assert!(!p.hit(0, 0));
        assert!(p.hit(5, 5));
    }

    #[test]
    fn random_fraction_seeds_no_saplings_at_zero_fraction() {
        let mut host = FakeHost::new();
        let stand = StandId::new(1);
        host.set_bounding_box(
            stand,
            crate::host::BoundingBox {
                min: Point { x: 0.0, y: 0.0 },
                max: Point { x: 10.0, y: 10.0 },
            },
        );
        let item = PlantingItem::new("piab", 0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        item.run(stand, &mut host, &mut rng);
        assert!(host.saplings_added.is_empty());
    }

    #[test]
    fn random_fraction_one_seeds_every_pixel() {
        let mut host = FakeHost::new();
        let stand = StandId::new(1);
        host.set_bounding_box(
            stand,
            crate::host::BoundingBox {
                min: Point { x: 0.0, y: 0.0 },
                max: Point { x: 10.0, y: 10.0 },
            },
        );
        let item = PlantingItem::new("piab", 0, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        item.run(stand, &mut host, &mut rng);
        // 10m / 2m pixel size = 5x5 pixels.
        assert_eq!(host.saplings_added.len(), 25);
    }

    #[test]
    fn pattern_offsets_seed_only_matching_pixels() {
        let mut host = FakeHost::new();
        let stand = StandId::new(1);
        host.set_bounding_box(
            stand,
            crate::host::BoundingBox {
                min: Point { x: 0.0, y: 0.0 },
                max: Point { x: 4.0, y: 4.0 },
            },
        );
        let mut item = PlantingItem::new("piab", 0, 1.0);
        item.pattern = Some(PlantingPattern::Rect2);
        let mut rng = StdRng::seed_from_u64(1);
        item.run(stand, &mut host, &mut rng);
        // Rect2 hits every cell, 4m/2m = 2x2 pixels.
        assert_eq!(host.saplings_added.len(), 4);
    }
}
