//! Common bounding boxes, `[west, south, east, north]`.

/// Continental Africa, the extent most prevalence surfaces cover.
pub const AFRICA: [f64; 4] = [-20.0, -35.0, 55.0, 38.0];

/// Exactly global extent, as reported by tiling services without bounds.
pub const GLOBAL: [f64; 4] = [-180.0, -90.0, 180.0, 90.0];

/// A 10x10 degree box starting at the origin; convenient for index maths.
pub const UNIT_10: [f64; 4] = [0.0, 0.0, 10.0, 10.0];

/// Web Mercator world extent in meters.
pub const MERCATOR_WORLD: [f64; 4] = [
    -20037508.34,
    -20037508.34,
    20037508.34,
    20037508.34,
];
