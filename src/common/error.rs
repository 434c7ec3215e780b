//! Error types for rrt_navigation

use thiserror::Error;

/// Main error type for planning and tracking
#[derive(Error, Debug)]
pub enum NavigationError {
    /// The occupancy map could not be built or read
    #[error("Map load error: {0}")]
    MapLoad(String),

    /// Map image decoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The global retry bound was exceeded while stitching segments
    #[error("Stitching exhausted after {retries} retries (last failing segment starts at waypoint {segment})")]
    StitchingExhausted { retries: usize, segment: usize },

    /// The tracking loop could not run to completion
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// Visualization error
    #[error("Visualization error: {0}")]
    Visualization(String),
}

impl From<toml::de::Error> for NavigationError {
    fn from(e: toml::de::Error) -> Self {
        NavigationError::Config(e.to_string())
    }
}

/// Result type alias for navigation operations
pub type NavigationResult<T> = Result<T, NavigationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NavigationError::InvalidParameter("resolution must be positive".to_string());
        assert_eq!(format!("{}", err), "Invalid parameter: resolution must be positive");
    }

    #[test]
    fn test_stitching_exhausted_display() {
        let err = NavigationError::StitchingExhausted { retries: 12, segment: 2 };
        assert_eq!(
            err.to_string(),
            "Stitching exhausted after 12 retries (last failing segment starts at waypoint 2)"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NavigationError = io_err.into();
        assert!(matches!(err, NavigationError::Io(_)));
    }

    #[test]
    fn test_error_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let err: NavigationError = toml_err.into();
        assert!(matches!(err, NavigationError::Config(_)));
    }
}
