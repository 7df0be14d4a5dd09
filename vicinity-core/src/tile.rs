//! Slippy-map tile addressing at the fixed heatmap zoom.
//!
//! Tiles use the Web Mercator scheme: `x` grows eastwards from the
//! antimeridian and `y` grows southwards from the northern clamp latitude.

use std::{f64::consts::PI, fmt, str::FromStr};

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::{Bounds, TileIndexError};

/// Zoom level at which scores are computed and cached, independent of the
/// map's visual zoom.
pub const Z_HEAT: u8 = 14;

/// Deepest zoom accepted by [`TileCoord::new`].
pub const MAX_ZOOM: u8 = 22;

/// Latitude at which Web Mercator is clamped.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Integer tile address `{z, x, y}`.
///
/// Tiles are immutable; their stable string key is `"z:x:y"`.
///
/// # Examples
///
/// ```
/// use vicinity_core::TileCoord;
///
/// # fn main() -> Result<(), vicinity_core::TileIndexError> {
/// let tile = TileCoord::new(14, 8802, 5373)?;
/// assert_eq!(tile.key(), "14:8802:5373");
/// assert_eq!("14:8802:5373".parse::<TileCoord>()?, tile);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawTileCoord")]
pub struct TileCoord {
    z: u8,
    x: u32,
    y: u32,
}

#[derive(Deserialize)]
struct RawTileCoord {
    z: u8,
    x: u32,
    y: u32,
}

impl TryFrom<RawTileCoord> for TileCoord {
    type Error = TileIndexError;

    fn try_from(raw: RawTileCoord) -> Result<Self, Self::Error> {
        Self::new(raw.z, raw.x, raw.y)
    }
}

/// Number of tiles along one axis at `zoom`.
pub const fn tiles_per_side(zoom: u8) -> u32 {
    1_u32 << zoom
}

/// Fractional tile column for a longitude.
pub(crate) fn lng_to_tile_x(lng: f64, zoom: u8) -> f64 {
    (lng + 180.0) / 360.0 * f64::from(tiles_per_side(zoom))
}

/// Fractional tile row for a latitude, clamped to the Mercator limits.
pub(crate) fn lat_to_tile_y(lat: f64, zoom: u8) -> f64 {
    let rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    (1.0 - rad.tan().asinh() / PI) / 2.0 * f64::from(tiles_per_side(zoom))
}

fn tile_x_to_lng(x: f64, zoom: u8) -> f64 {
    x / f64::from(tiles_per_side(zoom)) * 360.0 - 180.0
}

fn tile_y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = f64::from(tiles_per_side(zoom));
    (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
}

impl TileCoord {
    /// Construct a tile, rejecting addresses outside the world grid.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, TileIndexError> {
        if z > MAX_ZOOM {
            return Err(TileIndexError::ZoomOutOfRange { zoom: z });
        }
        let side = tiles_per_side(z);
        if x >= side || y >= side {
            return Err(TileIndexError::OutOfGrid { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Tile containing the given point. Points on the far edges of the grid
    /// are assigned to the last row or column.
    pub fn containing(lat: f64, lng: f64, zoom: u8) -> Result<Self, TileIndexError> {
        if zoom > MAX_ZOOM {
            return Err(TileIndexError::ZoomOutOfRange { zoom });
        }
        let x = grid_index(lng_to_tile_x(lng, zoom), zoom);
        let y = grid_index(lat_to_tile_y(lat, zoom), zoom);
        Self::new(zoom, x, y)
    }

    /// Zoom level.
    pub const fn z(&self) -> u8 {
        self.z
    }

    /// Column index.
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Row index.
    pub const fn y(&self) -> u32 {
        self.y
    }

    /// Stable `"z:x:y"` key.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Parse a `"z:x:y"` key.
    pub fn parse_key(key: &str) -> Result<Self, TileIndexError> {
        let invalid = || TileIndexError::InvalidKey {
            key: key.to_owned(),
        };
        let mut parts = key.split(':');
        let (Some(z), Some(x), Some(y), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let z = z.parse().map_err(|_| invalid())?;
        let x = x.parse().map_err(|_| invalid())?;
        let y = y.parse().map_err(|_| invalid())?;
        Self::new(z, x, y)
    }

    /// Geographic extent of the tile.
    pub fn bounds(&self) -> Bounds {
        let x = f64::from(self.x);
        let y = f64::from(self.y);
        Bounds {
            north: tile_y_to_lat(y, self.z),
            south: tile_y_to_lat(y + 1.0, self.z),
            east: tile_x_to_lng(x + 1.0, self.z),
            west: tile_x_to_lng(x, self.z),
        }
    }

    /// Centre of the tile in Mercator space, returned as `(lat, lng)`.
    pub fn center(&self) -> (f64, f64) {
        (
            tile_y_to_lat(f64::from(self.y) + 0.5, self.z),
            tile_x_to_lng(f64::from(self.x) + 0.5, self.z),
        )
    }

    /// Shorter of the tile's east-west and north-south extents in metres.
    pub fn min_extent_metres(&self) -> f64 {
        let bounds = self.bounds();
        let (lat, lng) = self.center();
        let width = Haversine.distance(
            Point::new(bounds.west, lat),
            Point::new(bounds.east, lat),
        );
        let height = Haversine.distance(
            Point::new(lng, bounds.south),
            Point::new(lng, bounds.north),
        );
        width.min(height)
    }
}

fn grid_index(fractional: f64, zoom: u8) -> u32 {
    let last = i64::from(tiles_per_side(zoom)) - 1;
    let index = (fractional.floor() as i64).clamp(0, last);
    u32::try_from(index).unwrap_or(0)
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.z, self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = TileIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_key(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("14:8802:5373", 14, 8802, 5373)]
    #[case("0:0:0", 0, 0, 0)]
    fn parses_valid_keys(#[case] key: &str, #[case] z: u8, #[case] x: u32, #[case] y: u32) {
        let tile = TileCoord::parse_key(key).expect("valid key");
        assert_eq!((tile.z(), tile.x(), tile.y()), (z, x, y));
        assert_eq!(tile.key(), key);
    }

    #[rstest]
    #[case("")]
    #[case("14:1")]
    #[case("14:1:2:3")]
    #[case("a:b:c")]
    #[case("14:-1:2")]
    fn rejects_malformed_keys(#[case] key: &str) {
        let err = TileCoord::parse_key(key).expect_err("malformed key");
        assert!(matches!(err, TileIndexError::InvalidKey { .. }));
    }

    #[rstest]
    fn rejects_out_of_grid_tiles() {
        let err = TileCoord::new(1, 2, 0).expect_err("x beyond grid");
        assert!(matches!(err, TileIndexError::OutOfGrid { .. }));
    }

    #[rstest]
    fn containing_tile_bounds_contain_point() {
        let (lat, lng) = (52.516, 13.377);
        let tile = TileCoord::containing(lat, lng, Z_HEAT).expect("valid tile");
        assert!(tile.bounds().contains(lat, lng));
        assert_eq!(tile.key(), "14:8800:5373");
    }

    #[rstest]
    fn containing_clamps_to_grid_edges() {
        let tile = TileCoord::containing(-89.0, 180.0, 2).expect("clamped tile");
        assert_eq!((tile.x(), tile.y()), (3, 3));
    }

    #[rstest]
    fn center_lies_inside_bounds() {
        let tile = TileCoord::new(Z_HEAT, 8802, 5373).expect("valid tile");
        let (lat, lng) = tile.center();
        assert!(tile.bounds().contains(lat, lng));
    }

    #[rstest]
    fn extent_is_about_one_and_a_half_kilometres_at_heat_zoom() {
        let tile = TileCoord::containing(52.5, 13.4, Z_HEAT).expect("valid tile");
        let extent = tile.min_extent_metres();
        assert!((1_400.0..1_600.0).contains(&extent), "extent was {extent}");
    }

    #[rstest]
    fn deserialisation_validates_grid() {
        let err = serde_json::from_str::<TileCoord>(r#"{"z":1,"x":5,"y":0}"#);
        assert!(err.is_err());
        let tile: TileCoord = serde_json::from_str(r#"{"z":1,"x":1,"y":0}"#).expect("valid");
        assert_eq!(tile.key(), "1:1:0");
    }
}
