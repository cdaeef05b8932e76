use pma::{Config, DensityBounds, Pma};
use test_log::test;

#[test]
fn overflowing_one_segment_doubles_capacity() -> pma::Result<()> {
    let mut pma = Pma::new(8)?;

    for key in 1..=8 {
        pma.insert(key, key)?;
    }
    assert_eq!(1, pma.num_segments());
    assert_eq!(8, pma.capacity());

    // the ninth element overflows the only segment
    pma.insert(9, 9)?;

    assert_eq!(2, pma.num_segments());
    assert_eq!(16, pma.capacity());
    assert_eq!(2, pma.height());
    assert_eq!(9, pma.len());
    pma.check_integrity();

    Ok(())
}

#[test]
fn ascending_inserts_grow_to_four_segments() -> pma::Result<()> {
    let mut pma = Pma::new(8)?;

    for key in 1..=17 {
        pma.insert(key, key)?;
        pma.check_integrity();
    }

    assert_eq!(4, pma.num_segments());
    assert_eq!(32, pma.capacity());
    assert_eq!(3, pma.height());

    for segment_id in 0..pma.num_segments() {
        let size = pma.segment_size(segment_id);
        assert!((2..=8).contains(&size), "segment {segment_id} holds {size}");
    }

    let keys: Vec<_> = pma.iter().map(|(k, _)| k).collect();
    assert_eq!((1..=17).collect::<Vec<_>>(), keys);

    Ok(())
}

#[test]
fn removing_every_other_key_keeps_order() -> pma::Result<()> {
    let mut pma = Pma::new(8)?;

    for key in 1..=64 {
        pma.insert(key, key)?;
    }

    for key in (2..=64).step_by(2) {
        assert_eq!(Some(key), pma.remove(key)?);
        pma.check_integrity();
    }

    assert_eq!(32, pma.len());
    let keys: Vec<_> = pma.iter().map(|(k, _)| k).collect();
    assert_eq!((1..=63).step_by(2).collect::<Vec<_>>(), keys);

    Ok(())
}

#[test]
fn descending_inserts_rebalance_towards_the_front() -> pma::Result<()> {
    let mut pma = Pma::new(8)?;

    for key in (1..=200).rev() {
        pma.insert(key, key)?;
        pma.check_integrity();
    }

    let keys: Vec<_> = pma.iter().map(|(k, _)| k).collect();
    assert_eq!((1..=200).collect::<Vec<_>>(), keys);

    Ok(())
}

#[test]
fn clustered_inserts_spread_within_windows() -> pma::Result<()> {
    let mut pma = Pma::new(8)?;

    // fill a wide array first, then hammer one spot so rebalances
    // repeatedly spread a hot window instead of resizing
    for key in (0..1_024).map(|k| k * 100) {
        pma.insert(key, key)?;
    }
    let capacity_before = pma.capacity();

    for key in 50_000..50_040 {
        pma.insert(key, key)?;
        pma.check_integrity();
    }

    assert_eq!(1_064, pma.len());
    assert!(pma.capacity() >= capacity_before);

    let keys: Vec<_> = pma.iter().map(|(k, _)| k).collect();
    let mut expected: Vec<_> = (0..1_024).map(|k| k * 100).collect();
    expected.extend(50_000..50_040);
    expected.sort_unstable();
    assert_eq!(expected, keys);

    Ok(())
}

#[test]
fn shrinking_halves_capacity() -> pma::Result<()> {
    let mut pma = Pma::new(8)?;

    for key in 1..=512 {
        pma.insert(key, key)?;
    }
    let capacity_full = pma.capacity();

    for key in 1..=480 {
        pma.remove(key)?;
        pma.check_integrity();
    }

    assert!(pma.capacity() < capacity_full, "array never shrank");
    assert_eq!(32, pma.len());

    Ok(())
}

#[test]
fn sparse_spread_can_leave_a_segment_empty() -> pma::Result<()> {
    // permissive lower thresholds keep a window spreadable even when it
    // holds fewer elements than segments, so the even split leaves the
    // tail segment of the window empty
    let bounds = DensityBounds::new(0.01, 0.02, 0.98, 1.0)?;
    let mut pma = Config::new(8).density_bounds(bounds).build()?;

    for key in 1..=16 {
        pma.insert(key, key * 10)?;
    }
    assert_eq!(4, pma.num_segments());

    for key in [9, 10, 11, 13, 14, 15, 16] {
        assert_eq!(Some(key * 10), pma.remove(key)?);
        pma.check_integrity();
    }
    assert_eq!(9, pma.len());
    assert!(
        (0..pma.num_segments()).any(|segment_id| pma.segment_size(segment_id) == 0),
        "expected the spread to leave an empty segment",
    );

    // lookups, inserts and scans must route around the empty segment
    assert_eq!(Some(120), pma.find(12));
    assert_eq!(Some((12, 120)), pma.last_key_value());

    pma.insert(100, 1_000)?;
    assert_eq!(Some(1_000), pma.find(100));
    assert_eq!(Some(1_000), pma.remove(100)?);
    pma.check_integrity();

    let keys: Vec<_> = pma.iter().map(|(k, _)| k).collect();
    assert_eq!(vec![1, 2, 3, 4, 5, 6, 7, 8, 12], keys);

    Ok(())
}
