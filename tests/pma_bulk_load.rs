use pma::Pma;
use test_log::test;

#[test]
fn load_thousand_elements() -> pma::Result<()> {
    let mut pma = Pma::new(16)?;

    let batch: Vec<_> = (1..=1_000).map(|i| (i, 10 * i)).collect();
    pma.load(&batch)?;

    assert_eq!(1_000, pma.len());
    assert_eq!(Some(5_000), pma.find(500));
    assert_eq!(500_500, pma.sum(1, 1_000).sum_keys);
    pma.check_integrity();

    Ok(())
}

#[test]
fn duplicate_then_remove_both() -> pma::Result<()> {
    let mut pma = Pma::new(16)?;

    let batch: Vec<_> = (1..=1_000).map(|i| (i, 10 * i)).collect();
    pma.load(&batch)?;

    pma.insert(500, 999)?;

    let first = pma.remove(500)?.expect("should find a duplicate of 500");
    let second = pma.remove(500)?.expect("should find the other duplicate");
    assert_eq!(None, pma.remove(500)?);

    let mut removed = [first, second];
    removed.sort_unstable();
    assert_eq!([999, 5_000], removed);

    Ok(())
}

#[test]
fn load_equals_pointwise_inserts() -> pma::Result<()> {
    let batch: Vec<_> = (0..700)
        .map(|i| ((i * 13) % 900, i))
        .collect::<std::collections::BTreeMap<_, _>>()
        .into_iter()
        .collect();

    let mut bulk = Pma::new(8)?;
    bulk.load(&batch)?;

    let mut pointwise = Pma::new(8)?;
    for &(key, value) in &batch {
        pointwise.insert(key, value)?;
    }

    let bulk_items: Vec<_> = bulk.iter().collect();
    let pointwise_items: Vec<_> = pointwise.iter().collect();
    assert_eq!(pointwise_items, bulk_items);

    bulk.check_integrity();
    pointwise.check_integrity();

    Ok(())
}

#[test]
fn load_interleaves_with_existing_keys() -> pma::Result<()> {
    let mut pma = Pma::new(8)?;

    for key in (1..=2_001).step_by(2) {
        pma.insert(key, key)?;
    }

    let evens: Vec<_> = (2..=2_000).step_by(2).map(|key| (key, key)).collect();
    pma.load(&evens)?;

    assert_eq!(2_001, pma.len());
    pma.check_integrity();

    let keys: Vec<_> = pma.iter().map(|(k, _)| k).collect();
    assert_eq!((1..=2_001).collect::<Vec<_>>(), keys);

    Ok(())
}

#[test]
fn load_clustered_batch_into_one_region() -> pma::Result<()> {
    let mut pma = Pma::new(8)?;

    for key in (0..1_000).map(|k| k * 1_000) {
        pma.insert(key, key)?;
    }

    // the whole batch lands between two existing keys
    let batch: Vec<_> = (500_001..500_400).map(|key| (key, key)).collect();
    pma.load(&batch)?;

    assert_eq!(1_399, pma.len());
    pma.check_integrity();

    assert_eq!(399, pma.range(500_001, 500_399).count());
    assert_eq!(Some(500_000), pma.find(500_000));
    assert_eq!(Some(501_000), pma.find(501_000));

    Ok(())
}

#[test]
fn repeated_loads_accumulate() -> pma::Result<()> {
    let mut pma = Pma::new(8)?;

    for round in 0..10 {
        let batch: Vec<_> = (0..200).map(|i| (i * 10 + round, round)).collect();
        pma.load(&batch)?;
        pma.check_integrity();
    }

    assert_eq!(2_000, pma.len());

    let keys: Vec<_> = pma.iter().map(|(k, _)| k).collect();
    let mut expected: Vec<_> = (0..10).flat_map(|round| (0..200).map(move |i| i * 10 + round)).collect();
    expected.sort_unstable();
    assert_eq!(expected, keys);

    Ok(())
}

#[test]
fn load_duplicates_of_one_key() -> pma::Result<()> {
    let mut pma = Pma::new(8)?;

    pma.insert(5, 0)?;
    let batch: Vec<_> = (1..=300).map(|value| (5, value)).collect();
    pma.load(&batch)?;

    assert_eq!(301, pma.len());
    assert_eq!(301, pma.range(5, 5).count());
    pma.check_integrity();

    Ok(())
}
