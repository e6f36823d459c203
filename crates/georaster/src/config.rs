//! Configuration shared by the pyramid registry and the tile-driven statistics.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::DownsampleMethod;

pub const DEFAULT_TILE_SIZE: usize = 512;

/// Image layout and pyramid configuration.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageConfig {
    /// Tile width in pixels used when streaming a raster tile by tile.
    pub tile_width: usize,
    /// Tile height in pixels used when streaming a raster tile by tile.
    pub tile_height: usize,
    /// Reduction applied when deriving a coarser level from the previous one.
    pub downsample: DownsampleMethod,
    /// Optional cap on the number of pyramid levels, including level 0.
    pub max_levels: Option<usize>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            downsample: DownsampleMethod::Mean,
            max_levels: None,
        }
    }
}

impl ImageConfig {
    /// Creates a new [`ImageConfig`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tile size.
    pub fn with_tile_size(mut self, tile_width: usize, tile_height: usize) -> Self {
        self.tile_width = tile_width;
        self.tile_height = tile_height;
        self
    }

    /// Sets the downsampling method used for coarser levels.
    pub fn with_downsample(mut self, downsample: DownsampleMethod) -> Self {
        self.downsample = downsample;
        self
    }

    /// Caps the number of pyramid levels.
    pub fn with_max_levels(mut self, max_levels: usize) -> Self {
        self.max_levels = Some(max_levels);
        self
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(Error::InvalidConfig(
                "tile_width and tile_height must be > 0".into(),
            ));
        }
        if self.max_levels == Some(0) {
            return Err(Error::InvalidConfig("max_levels must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ImageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tile_width, DEFAULT_TILE_SIZE);
        assert_eq!(config.downsample, DownsampleMethod::Mean);
    }

    #[test]
    fn rejects_empty_tiles_and_zero_levels() {
        let err = ImageConfig::new().with_tile_size(0, 64).validate();
        assert!(matches!(err, Err(Error::InvalidConfig(_))));

        let err = ImageConfig::new().with_max_levels(0).validate();
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn builder_sets_fields() {
        let config = ImageConfig::new()
            .with_tile_size(64, 32)
            .with_downsample(DownsampleMethod::Nearest)
            .with_max_levels(3);
        assert_eq!((config.tile_width, config.tile_height), (64, 32));
        assert_eq!(config.downsample, DownsampleMethod::Nearest);
        assert_eq!(config.max_levels, Some(3));
    }
}
