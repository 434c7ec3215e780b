//! Visualization utilities for rrt_navigation
//!
//! Collects plot layers (map obstacles, search trees, trajectories,
//! waypoints, the vehicle) and renders them into a single gnuplot axes.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::{AreaBounds, NavigationError, NavigationResult, Point2D, Pose2D, Trajectory, Waypoint};
use crate::mapping::OccupancyMap;
use crate::path_planning::RrtTree;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00FF00";
    pub const BLUE: &str = "#0000FF";
    pub const CYAN: &str = "#00FFFF";
    pub const ORANGE: &str = "#FFA500";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const OBSTACLE: &str = BLACK;
    pub const TREE: &str = GRAY;
    pub const PATH: &str = RED;
    pub const DRIVEN: &str = BLUE;
    pub const WAYPOINT: &str = GREEN;
    pub const HEADING: &str = ORANGE;
    pub const ROBOT: &str = CYAN;
}

/// Style for path rendering
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::new(colors::PATH, "Path")
    }
}

/// Style for point rendering
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: String,
}

impl PointStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            symbol: 'O',
            caption: caption.to_string(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

#[derive(Debug, Clone)]
enum Layer {
    Lines {
        x: Vec<f64>,
        y: Vec<f64>,
        style: PathStyle,
    },
    Points {
        x: Vec<f64>,
        y: Vec<f64>,
        style: PointStyle,
    },
    /// Disconnected segments drawn in one color, captioned once
    Segments {
        segments: Vec<(Point2D, Point2D)>,
        style: PathStyle,
    },
}

pub struct Visualizer {
    layers: Vec<Layer>,
    title: String,
    x_label: String,
    y_label: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
    aspect_ratio: Option<f64>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            title: String::new(),
            x_label: "X [m]".to_string(),
            y_label: "Y [m]".to_string(),
            x_range: None,
            y_range: None,
            aspect_ratio: Some(1.0),
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Fix both axis ranges to the world bounds
    pub fn set_bounds(&mut self, bounds: &AreaBounds) -> &mut Self {
        self.x_range = Some((bounds.xmin, bounds.xmax));
        self.y_range = Some((bounds.ymin, bounds.ymax));
        self
    }

    pub fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> &mut Self {
        self.aspect_ratio = ratio;
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn plot_map(&mut self, map: &OccupancyMap) -> &mut Self {
        let obstacles = map.obstacle_points();
        self.plot_points(
            &obstacles,
            &PointStyle::new(colors::OBSTACLE, "Obstacles")
                .with_symbol('S')
                .with_size(0.3),
        )
    }

    pub fn plot_tree(&mut self, tree: &RrtTree) -> &mut Self {
        let segments = tree.edges();
        if !segments.is_empty() {
            self.layers.push(Layer::Segments {
                segments,
                style: PathStyle::new(colors::TREE, "RRT").with_line_width(0.5),
            });
        }
        self
    }

    pub fn plot_trajectory(&mut self, trajectory: &Trajectory, style: &PathStyle) -> &mut Self {
        self.layers.push(Layer::Lines {
            x: trajectory.x_coords(),
            y: trajectory.y_coords(),
            style: style.clone(),
        });
        self
    }

    pub fn plot_points(&mut self, points: &[Point2D], style: &PointStyle) -> &mut Self {
        self.layers.push(Layer::Points {
            x: points.iter().map(|p| p.x).collect(),
            y: points.iter().map(|p| p.y).collect(),
            style: style.clone(),
        });
        self
    }

    /// Waypoints with a short stroke along every assigned heading
    pub fn plot_waypoints(&mut self, waypoints: &[Waypoint]) -> &mut Self {
        let points: Vec<Point2D> = waypoints.iter().map(|w| w.position()).collect();
        self.plot_points(
            &points,
            &PointStyle::new(colors::WAYPOINT, "Waypoints").with_size(1.5),
        );

        let arrow_len = 0.6;
        let headings: Vec<(Point2D, Point2D)> = waypoints
            .iter()
            .filter_map(|w| {
                w.heading.map(|h| {
                    let p = w.position();
                    (p, Point2D::new(p.x + arrow_len * h.cos(), p.y + arrow_len * h.sin()))
                })
            })
            .collect();
        if !headings.is_empty() {
            self.layers.push(Layer::Segments {
                segments: headings,
                style: PathStyle::new(colors::HEADING, "Headings"),
            });
        }
        self
    }

    /// Vehicle pose with direction indicator
    pub fn plot_robot(&mut self, pose: &Pose2D, size: f64) -> &mut Self {
        self.plot_points(
            &[pose.position()],
            &PointStyle::new(colors::ROBOT, "Vehicle").with_size(size),
        );

        let arrow_len = size * 0.5;
        let tip = Point2D::new(
            pose.x + arrow_len * pose.yaw.cos(),
            pose.y + arrow_len * pose.yaw.sin(),
        );
        self.layers.push(Layer::Lines {
            x: vec![pose.x, tip.x],
            y: vec![pose.y, tip.y],
            style: PathStyle::new(colors::ROBOT, ""),
        });
        self
    }

    pub fn show(&mut self) -> NavigationResult<()> {
        let mut figure = self.render();
        figure
            .show()
            .map(|_| ())
            .map_err(|e| NavigationError::Visualization(e.to_string()))
    }

    pub fn save_png(&mut self, path: &str, width: u32, height: u32) -> NavigationResult<()> {
        let mut figure = self.render();
        figure
            .save_to_png(path, width, height)
            .map_err(|e| NavigationError::Visualization(e.to_string()))
    }

    pub fn save_svg(&mut self, path: &str, width: u32, height: u32) -> NavigationResult<()> {
        let mut figure = self.render();
        figure
            .save_to_svg(path, width, height)
            .map_err(|e| NavigationError::Visualization(e.to_string()))
    }

    fn render(&self) -> Figure {
        let mut figure = Figure::new();
        {
            let axes = figure.axes2d();

            for layer in &self.layers {
                match layer {
                    Layer::Lines { x, y, style } => {
                        if style.caption.is_empty() {
                            axes.lines(x, y, &[Color(style.color.as_str()), LineWidth(style.line_width)]);
                        } else {
                            axes.lines(
                                x,
                                y,
                                &[
                                    Caption(style.caption.as_str()),
                                    Color(style.color.as_str()),
                                    LineWidth(style.line_width),
                                ],
                            );
                        }
                    }
                    Layer::Points { x, y, style } => {
                        axes.points(
                            x,
                            y,
                            &[
                                Caption(style.caption.as_str()),
                                Color(style.color.as_str()),
                                PointSymbol(style.symbol),
                                PointSize(style.size),
                            ],
                        );
                    }
                    Layer::Segments { segments, style } => {
                        for (i, (a, b)) in segments.iter().enumerate() {
                            if i == 0 {
                                axes.lines(
                                    &[a.x, b.x],
                                    &[a.y, b.y],
                                    &[
                                        Caption(style.caption.as_str()),
                                        Color(style.color.as_str()),
                                        LineWidth(style.line_width),
                                    ],
                                );
                            } else {
                                axes.lines(
                                    &[a.x, b.x],
                                    &[a.y, b.y],
                                    &[Color(style.color.as_str()), LineWidth(style.line_width)],
                                );
                            }
                        }
                    }
                }
            }

            if !self.title.is_empty() {
                axes.set_title(&self.title, &[]);
            }
            axes.set_x_label(&self.x_label, &[]);
            axes.set_y_label(&self.y_label, &[]);
            if let Some((min, max)) = self.x_range {
                axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
            }
            if let Some((min, max)) = self.y_range {
                axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
            }
            if let Some(ratio) = self.aspect_ratio {
                axes.set_aspect_ratio(AutoOption::Fix(ratio));
            }
        }
        figure
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_planning::TreeNode;

    #[test]
    fn test_visualizer_creation() {
        let vis = Visualizer::new();
        assert!(vis.aspect_ratio.is_some());
        assert_eq!(vis.layer_count(), 0);
    }

    #[test]
    fn test_path_style() {
        let style = PathStyle::new(colors::RED, "Test Path").with_line_width(3.0);
        assert_eq!(style.line_width, 3.0);
        assert_eq!(style.color, colors::RED);
    }

    #[test]
    fn test_waypoint_headings_become_a_layer() {
        let mut vis = Visualizer::new();
        vis.plot_waypoints(&[Waypoint::new(0.0, 0.0), Waypoint::with_heading(1.0, 0.0, 0.0)]);
        assert_eq!(vis.layer_count(), 2);

        let mut bare = Visualizer::new();
        bare.plot_waypoints(&[Waypoint::new(0.0, 0.0)]);
        assert_eq!(bare.layer_count(), 1);
    }

    #[test]
    fn test_tree_layer_skips_lone_root() {
        let mut vis = Visualizer::new();
        vis.plot_tree(&RrtTree::with_root(0.0, 0.0, None));
        assert_eq!(vis.layer_count(), 0);

        let mut tree = RrtTree::with_root(0.0, 0.0, None);
        let mut child = TreeNode::new(1.0, 0.0, Some(0.0));
        child.parent = Some(0);
        tree.add_node(child);
        vis.plot_tree(&tree);
        assert_eq!(vis.layer_count(), 1);
    }

    #[test]
    fn test_bounds_fix_ranges() {
        let mut vis = Visualizer::new();
        vis.set_bounds(&AreaBounds::new(-4.5, 4.5, -13.5, 13.5));
        assert_eq!(vis.x_range, Some((-4.5, 4.5)));
        assert_eq!(vis.y_range, Some((-13.5, 13.5)));
    }
}
