use crate::*;
use std::time::{Duration, Instant};

#[test]
fn parallel_cap_bounds_concurrency() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "all:V: a b c d\na:V: ; sleep 1\nb:V: ; sleep 1\nc:V: ; sleep 1\nd:V: ; sleep 1\n",
    )?;
    let start = Instant::now();
    space.run_expect(&mut mk_command(vec!["-p", "2"]))?;
    let elapsed = start.elapsed();
    // Four one-second sleeps, two at a time: two rounds.
    assert!(elapsed >= Duration::from_secs(2), "finished in {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);
    Ok(())
}

#[test]
fn wide_cap_runs_recipes_together() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "all:V: a b c d\na:V: ; sleep 1\nb:V: ; sleep 1\nc:V: ; sleep 1\nd:V: ; sleep 1\n",
    )?;
    let start = Instant::now();
    space.run_expect(&mut mk_command(vec!["-p", "4"]))?;
    let elapsed = start.elapsed();
    assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
    Ok(())
}

#[test]
fn exclusive_recipes_serialize() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "all:V: a b\na:VX: ; sleep 1\nb:VX: ; sleep 1\n",
    )?;
    let start = Instant::now();
    space.run_expect(&mut mk_command(vec!["-p", "4"]))?;
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "finished in {:?}", elapsed);
    Ok(())
}

#[test]
fn prereqs_finish_before_dependents_start() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "all:V: out\nout:V: a b\n\tcp log snapshot\na:V: ; sleep 1; echo a >> log\nb:V: ; echo b >> log\n",
    )?;
    space.run_expect(&mut mk_command(vec!["-p", "4"]))?;
    // Both prereqs must have landed in the log before out's recipe copied it.
    let snapshot = String::from_utf8(space.read("snapshot")?)?;
    assert!(snapshot.contains('a'), "snapshot: {:?}", snapshot);
    assert!(snapshot.contains('b'), "snapshot: {:?}", snapshot);
    Ok(())
}
