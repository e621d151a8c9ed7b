/// Resolutions the image endpoint serves, in pixels
pub const DEFAULT_RESOLUTIONS: [u32; 3] = [300, 500, 2500];

/// Snap a requested resolution to the nearest supported bucket.
///
/// Ties go to the smaller bucket. An empty bucket list leaves the request as is.
pub fn snap_resolution(requested: u32, buckets: &[u32]) -> u32 {
    buckets
        .iter()
        .copied()
        .min_by_key(|b| (b.abs_diff(requested), *b))
        .unwrap_or(requested)
}
