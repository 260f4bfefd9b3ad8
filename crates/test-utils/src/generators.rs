//! Test data generators for synthetic prevalence surfaces.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite.

/// Creates a grid where each cell is `col * 1000 + row + 1`.
///
/// The `+ 1` keeps every cell strictly positive so none of them is treated
/// as the zero no-data sentinel.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[0], 1.0);    // col=0, row=0
/// assert_eq!(grid[1], 1001.0); // col=1, row=0
/// assert_eq!(grid[10], 2.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row + 1) as f32);
        }
    }
    data
}

/// Creates a prevalence surface in percent (roughly 1–60%) that peaks in
/// the centre and fades towards the edges.
pub fn create_prevalence_grid(width: usize, height: usize) -> Vec<f32> {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt().max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 + 0.5 - cx;
            let dy = row as f32 + 0.5 - cy;
            let dist = (dx * dx + dy * dy).sqrt() / max_dist;
            data.push(1.0 + 59.0 * (1.0 - dist).max(0.0));
        }
    }
    data
}

/// Like [`create_prevalence_grid`] but with a zero-valued border of
/// `margin` cells, mimicking the "outside study area" sentinel.
pub fn create_masked_prevalence_grid(width: usize, height: usize, margin: usize) -> Vec<f32> {
    let mut data = create_prevalence_grid(width, height);
    for row in 0..height {
        for col in 0..width {
            let inside = row >= margin
                && col >= margin
                && row + margin < height
                && col + margin < width;
            if !inside {
                data[row * width + col] = 0.0;
            }
        }
    }
    data
}

/// A grid with every cell set to `value`.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}
