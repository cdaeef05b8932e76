use pma::{
    index::{BlockedIndex, FlatIndex, SeparatorIndex},
    Config, Pma,
};
use test_log::test;

fn exercise<I: SeparatorIndex>(pma: &mut Pma<I>) -> pma::Result<Vec<(i64, i64)>> {
    for key in 0..1_500 {
        pma.insert((key * 7_919) % 2_048, key)?;
    }

    let batch: Vec<_> = (5_000..5_500).map(|key| (key, key)).collect();
    pma.load(&batch)?;

    for key in (0..2_048).step_by(3) {
        pma.remove(key)?;
    }

    pma.check_integrity();
    Ok(pma.iter().collect())
}

#[test]
fn both_index_realizations_agree() -> pma::Result<()> {
    let mut blocked: Pma<BlockedIndex> = Config::new(8).build_with_index()?;
    let mut flat: Pma<FlatIndex> = Config::new(8).build_with_index()?;

    let blocked_items = exercise(&mut blocked)?;
    let flat_items = exercise(&mut flat)?;

    assert_eq!(blocked_items.len(), flat_items.len());

    // values of equal keys may be permuted between duplicates, but the key
    // sequences must match exactly
    let blocked_keys: Vec<_> = blocked_items.iter().map(|(k, _)| k).collect();
    let flat_keys: Vec<_> = flat_items.iter().map(|(k, _)| k).collect();
    assert_eq!(blocked_keys, flat_keys);

    Ok(())
}

#[test]
fn default_engine_uses_blocked_index() -> pma::Result<()> {
    // `Pma::new` and an explicit BlockedIndex build behave identically
    let mut default_engine = Pma::new(8)?;
    let mut explicit: Pma<BlockedIndex> = Config::new(8).build_with_index()?;

    for key in 0..100 {
        default_engine.insert(key, key)?;
        explicit.insert(key, key)?;
    }

    assert_eq!(
        default_engine.iter().collect::<Vec<_>>(),
        explicit.iter().collect::<Vec<_>>(),
    );

    Ok(())
}

#[test]
fn flat_index_survives_growth_and_shrink() -> pma::Result<()> {
    let mut pma: Pma<FlatIndex> = Config::new(8).build_with_index()?;

    for key in 0..2_000 {
        pma.insert(key, key)?;
    }
    for key in 0..1_900 {
        assert_eq!(Some(key), pma.remove(key)?);
    }

    pma.check_integrity();
    assert_eq!(100, pma.len());

    let keys: Vec<_> = pma.iter().map(|(k, _)| k).collect();
    assert_eq!((1_900..2_000).collect::<Vec<_>>(), keys);

    Ok(())
}
