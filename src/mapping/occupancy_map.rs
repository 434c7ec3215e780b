//! Occupancy grid with a world<->grid transform and clearance queries.
//!
//! Rows index world x and columns index world y, the layout of the
//! grayscale maps this crate loads. Dark cells are obstacles.

use std::path::Path;

use nalgebra::DMatrix;

use crate::common::{AreaBounds, GridIndex, NavigationError, NavigationResult, Point2D};

/// Cells with a grayscale value below this are occupied
pub const DEFAULT_OCCUPIED_THRESHOLD: u8 = 127;

/// Immutable occupancy map
#[derive(Debug, Clone)]
pub struct OccupancyMap {
    grid: DMatrix<u8>,
    resolution: f64,
    /// Grid coordinates (row, col) of the world origin
    origin: (f64, f64),
    bounds: AreaBounds,
    occupied_threshold: u8,
}

impl OccupancyMap {
    pub fn new(
        grid: DMatrix<u8>,
        resolution: f64,
        origin: (f64, f64),
        bounds: AreaBounds,
    ) -> NavigationResult<Self> {
        if resolution <= 0.0 {
            return Err(NavigationError::InvalidParameter(format!(
                "map resolution must be positive, got {}",
                resolution
            )));
        }
        if grid.nrows() == 0 || grid.ncols() == 0 {
            return Err(NavigationError::MapLoad("map grid is empty".to_string()));
        }
        if bounds.xmin > bounds.xmax || bounds.ymin > bounds.ymax {
            return Err(NavigationError::InvalidParameter(format!(
                "world bounds are inverted: {:?}",
                bounds
            )));
        }

        Ok(Self {
            grid,
            resolution,
            origin,
            bounds,
            occupied_threshold: DEFAULT_OCCUPIED_THRESHOLD,
        })
    }

    /// Map whose world origin sits at the centre of the grid
    pub fn centered(grid: DMatrix<u8>, resolution: f64, bounds: AreaBounds) -> NavigationResult<Self> {
        let origin = (
            grid.nrows() as f64 / 2.0 - 0.5,
            grid.ncols() as f64 / 2.0 - 0.5,
        );
        Self::new(grid, resolution, origin, bounds)
    }

    /// Load a grayscale image (PGM, PNG) as a centred map
    pub fn from_image<P: AsRef<Path>>(
        path: P,
        resolution: f64,
        bounds: AreaBounds,
    ) -> NavigationResult<Self> {
        let path = path.as_ref();
        let img = image::open(path)?.to_luma8();
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(NavigationError::MapLoad(format!("{} has no pixels", path.display())));
        }

        let grid = DMatrix::from_fn(height as usize, width as usize, |r, c| {
            img.get_pixel(c as u32, r as u32)[0]
        });
        tracing::info!(
            "Loaded map {} ({}x{} cells, {} m/cell)",
            path.display(),
            height,
            width,
            resolution
        );

        Self::centered(grid, resolution, bounds)
    }

    /// Synthetic centred map: everything outside `bounds` and inside any of
    /// the `obstacles` rectangles is a wall, the rest is free
    pub fn from_rectangles(
        resolution: f64,
        bounds: AreaBounds,
        obstacles: &[AreaBounds],
    ) -> NavigationResult<Self> {
        if resolution <= 0.0 {
            return Err(NavigationError::InvalidParameter(format!(
                "map resolution must be positive, got {}",
                resolution
            )));
        }
        let half_cells = |lo: f64, hi: f64| (lo.abs().max(hi.abs()) / resolution).ceil() as usize + 1;
        let rows = 2 * half_cells(bounds.xmin, bounds.xmax) + 1;
        let cols = 2 * half_cells(bounds.ymin, bounds.ymax) + 1;

        let mut map = Self::centered(DMatrix::from_element(rows, cols, 255), resolution, bounds)?;
        for row in 0..rows {
            for col in 0..cols {
                let p = map.grid_to_world(GridIndex::new(row as i64, col as i64));
                let blocked = !bounds.contains(p.x, p.y)
                    || obstacles.iter().any(|o| o.contains(p.x, p.y));
                if blocked {
                    map.grid[(row, col)] = 0;
                }
            }
        }
        Ok(map)
    }

    pub fn with_occupied_threshold(mut self, threshold: u8) -> Self {
        self.occupied_threshold = threshold;
        self
    }

    pub fn rows(&self) -> usize {
        self.grid.nrows()
    }

    pub fn cols(&self) -> usize {
        self.grid.ncols()
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn bounds(&self) -> &AreaBounds {
        &self.bounds
    }

    /// Nearest cell to a world point
    pub fn world_to_grid(&self, x: f64, y: f64) -> GridIndex {
        GridIndex::new(
            (x / self.resolution + self.origin.0).round() as i64,
            (y / self.resolution + self.origin.1).round() as i64,
        )
    }

    /// Centre of a cell in world coordinates
    pub fn grid_to_world(&self, index: GridIndex) -> Point2D {
        Point2D::new(
            (index.row as f64 - self.origin.0) * self.resolution,
            (index.col as f64 - self.origin.1) * self.resolution,
        )
    }

    pub fn in_grid(&self, index: GridIndex) -> bool {
        index.row >= 0
            && index.col >= 0
            && (index.row as usize) < self.grid.nrows()
            && (index.col as usize) < self.grid.ncols()
    }

    /// Off-grid cells count as occupied
    pub fn is_cell_occupied(&self, index: GridIndex) -> bool {
        if !self.in_grid(index) {
            return true;
        }
        self.grid[(index.row as usize, index.col as usize)] < self.occupied_threshold
    }

    /// True when the point is inside the world bounds and no cell within
    /// `margin` cells (square neighbourhood) of it is occupied
    pub fn is_free(&self, point: Point2D, margin: usize) -> bool {
        if !self.bounds.contains(point.x, point.y) {
            return false;
        }

        let center = self.world_to_grid(point.x, point.y);
        let m = margin as i64;
        for row in center.row - m..=center.row + m {
            for col in center.col - m..=center.col + m {
                if self.is_cell_occupied(GridIndex::new(row, col)) {
                    return false;
                }
            }
        }
        true
    }

    pub fn is_occupied(&self, point: Point2D, margin: usize) -> bool {
        !self.is_free(point, margin)
    }

    /// Check every half cell along the straight segment `from -> to`
    pub fn is_segment_free(&self, from: Point2D, to: Point2D, margin: usize) -> bool {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let distance = (dx * dx + dy * dy).sqrt();
        let steps = (distance / (self.resolution * 0.5)).ceil() as usize;

        for i in 0..=steps {
            let t = if steps > 0 { i as f64 / steps as f64 } else { 0.0 };
            let p = Point2D::new(from.x + t * dx, from.y + t * dy);
            if !self.is_free(p, margin) {
                return false;
            }
        }
        true
    }

    /// World coordinates of every occupied cell inside the world bounds
    pub fn obstacle_points(&self) -> Vec<Point2D> {
        let mut points = Vec::new();
        for row in 0..self.grid.nrows() {
            for col in 0..self.grid.ncols() {
                if self.grid[(row, col)] < self.occupied_threshold {
                    let p = self.grid_to_world(GridIndex::new(row as i64, col as i64));
                    if self.bounds.contains(p.x, p.y) {
                        points.push(p);
                    }
                }
            }
        }
        points
    }
}
