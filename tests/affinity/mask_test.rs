/*!
 * Affinity Mask Tests
 */

use ccd_affinity::{format_core_list, AffinityError, AffinityMask};
use pretty_assertions::assert_eq;

#[test]
fn test_build_from_ccd_layout() {
    let ccd0 = AffinityMask::build(0..8).unwrap();
    let ccd1 = AffinityMask::build(8..16).unwrap();

    assert_eq!(ccd0.bits(), 0xff);
    assert_eq!(ccd1.bits(), 0xff00);
    assert_eq!(ccd0.to_string(), "0-7");
    assert_eq!(ccd1.to_string(), "8-15");
}

#[test]
fn test_build_rejects_bad_input() {
    assert!(matches!(
        AffinityMask::build(Vec::<u8>::new()),
        Err(AffinityError::InvalidCore(_))
    ));
    assert!(matches!(
        AffinityMask::build([0, 64]),
        Err(AffinityError::InvalidCore(_))
    ));
    assert!(matches!(
        AffinityMask::build([-1]),
        Err(AffinityError::InvalidCore(_))
    ));
}

#[test]
fn test_highest_core() {
    let mask = AffinityMask::build([63]).unwrap();
    assert_eq!(mask.bits(), 1u64 << 63);
    assert_eq!(mask.to_human_readable(), "63");
}

#[test]
fn test_human_readable_ranges() {
    assert_eq!(AffinityMask::from_bits(0b1011).to_human_readable(), "0-1, 3");
    assert_eq!(AffinityMask::EMPTY.to_human_readable(), "No cores bound");
    assert_eq!(format_core_list(&[5, 1, 2, 3, 9, 2]), "1-3, 5, 9");
    assert_eq!(format_core_list(&[]), "No cores bound");
}

#[test]
fn test_full_mask() {
    assert_eq!(AffinityMask::full(16).unwrap().bits(), 0xffff);
    assert_eq!(AffinityMask::full(128).unwrap().bits(), u64::MAX);
    assert!(AffinityMask::full(0).is_err());
}
