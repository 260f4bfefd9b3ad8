//! Prometheus counters for the raster service.

use metrics::{counter, histogram};

/// Record the outcome of a layer load.
pub fn record_layer_load(success: bool, duration_ms: f64) {
    if success {
        counter!("raster_layer_loads_total").increment(1);
    } else {
        counter!("raster_layer_load_failures_total").increment(1);
    }
    histogram!("raster_layer_load_duration_ms").record(duration_ms);
}

/// Record a pixel query. `precise` distinguishes click from hover queries.
pub fn record_sample(precise: bool, hit: bool) {
    let kind = if precise { "precise" } else { "fast" };
    counter!("raster_sample_queries_total", "kind" => kind).increment(1);
    if !hit {
        counter!("raster_sample_nodata_total", "kind" => kind).increment(1);
    }
}

/// Record a confidence-interval lookup.
pub fn record_ci_query(available: bool) {
    counter!("raster_ci_queries_total").increment(1);
    if !available {
        counter!("raster_ci_unavailable_total").increment(1);
    }
}

pub fn record_rerender() {
    counter!("raster_rerenders_total").increment(1);
}
