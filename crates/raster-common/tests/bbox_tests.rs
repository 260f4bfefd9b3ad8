//! Tests for BoundingBox operations.

use raster_common::bbox::{BboxParseError, BoundingBox};

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_bbox_new() {
    let bbox = BoundingBox::new(-20.0, -35.0, 55.0, 38.0);
    assert_eq!(bbox.west(), -20.0);
    assert_eq!(bbox.south(), -35.0);
    assert_eq!(bbox.east(), 55.0);
    assert_eq!(bbox.north(), 38.0);
}

#[test]
fn test_bbox_array_order() {
    let bbox = BoundingBox::from_array([1.0, 2.0, 3.0, 4.0]);
    assert_eq!(bbox.to_array(), [1.0, 2.0, 3.0, 4.0]);
    assert_eq!(bbox.min_y, 2.0);
}

// ============================================================================
// parse tests
// ============================================================================

#[test]
fn test_parse_floating() {
    let bbox = BoundingBox::parse("-17.5, -34.8,51.4,37.3").unwrap();
    assert_eq!(bbox.min_x, -17.5);
    assert_eq!(bbox.max_y, 37.3);
}

#[test]
fn test_parse_wrong_count() {
    assert!(matches!(
        BoundingBox::parse("1,2,3"),
        Err(BboxParseError::InvalidFormat(_))
    ));
}

#[test]
fn test_parse_bad_number() {
    assert!(matches!(
        BoundingBox::parse("1,2,x,4"),
        Err(BboxParseError::InvalidNumber(_))
    ));
}

// ============================================================================
// Validity tests
// ============================================================================

#[test]
fn test_is_finite() {
    assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_finite());
    assert!(!BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_finite());
    assert!(!BoundingBox::new(0.0, 0.0, f64::INFINITY, 1.0).is_finite());
}

#[test]
fn test_is_valid_requires_positive_extent() {
    assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_valid());
    assert!(!BoundingBox::new(1.0, 0.0, 1.0, 1.0).is_valid());
    assert!(!BoundingBox::new(0.0, 1.0, 1.0, 0.0).is_valid());
}

#[test]
fn test_ordered_swaps_reversed_axes() {
    let bbox = BoundingBox::new(10.0, 5.0, -10.0, -5.0).ordered();
    assert_eq!(bbox.to_array(), [-10.0, -5.0, 10.0, 5.0]);
}

// ============================================================================
// Spatial predicates
// ============================================================================

#[test]
fn test_contains_point_edges_inclusive() {
    let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    assert!(bbox.contains_point(0.0, 0.0));
    assert!(bbox.contains_point(10.0, 10.0));
    assert!(!bbox.contains_point(10.1, 5.0));
}

#[test]
fn test_intersects() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
    let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
    assert!(a.intersects(&b));
    assert!(!a.intersects(&c));
}
