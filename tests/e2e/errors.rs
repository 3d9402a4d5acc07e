use crate::*;

#[test]
fn dependency_cycle_is_fatal() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "a: b ; true\nb: a ; true\n")?;
    let out = space.run(&mut mk_command(vec!["a"]))?;
    assert!(!out.status.success());
    assert_stderr_contains(&out, "cycle");
    Ok(())
}

#[test]
fn unknown_target_is_fatal() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "all:V: ; echo hi\n")?;
    let out = space.run(&mut mk_command(vec!["no-such-target"]))?;
    assert!(!out.status.success());
    assert_stderr_contains(&out, "don't know how to make");
    Ok(())
}

#[test]
fn ambiguous_recipes_are_fatal() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "t: a ; echo one\nt: b ; echo two\n")?;
    let out = space.run(&mut mk_command(vec!["t"]))?;
    assert!(!out.status.success());
    assert_stderr_contains(&out, "ambiguous");
    Ok(())
}

#[test]
fn failing_recipe_exits_nonzero() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "all:V: ; exit 1\n")?;
    let out = space.run(&mut mk_command(vec![]))?;
    assert!(!out.status.success());
    assert_stderr_contains(&out, "failed");
    Ok(())
}

#[test]
fn failure_suppresses_dependents_but_not_siblings() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "all:V: top other\ntop:V: bad\n\techo top ran\nbad:V:\n\texit 1\nother:V:\n\techo other ran\n",
    )?;
    let out = space.run(&mut mk_command(vec![]))?;
    assert!(!out.status.success());
    assert_output_not_contains(&out, "top ran");
    assert_output_contains(&out, "other ran");
    Ok(())
}

#[test]
fn nonstop_attribute_keeps_building() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "all:V: bad\n\techo all ran\nbad:VE:\n\texit 1\n",
    )?;
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "all ran");
    assert_stderr_contains(&out, "continuing");
    Ok(())
}

#[test]
fn delete_on_failure_removes_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "out:D: in\n\techo partial > out\n\texit 1\n")?;
    space.write("in", "x")?;
    let out = space.run(&mut mk_command(vec!["out"]))?;
    assert!(!out.status.success());
    assert!(!space.exists("out"));
    Ok(())
}

#[test]
fn parse_error_reports_location() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "a b\n= c\n")?;
    let out = space.run(&mut mk_command(vec![]))?;
    assert!(!out.status.success());
    assert_stderr_contains(&out, "mkfile:");
    assert_stderr_contains(&out, "unexpected");
    Ok(())
}

#[test]
fn unknown_attribute_reports_error() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "a:Z: b\n\techo hi\n")?;
    let out = space.run(&mut mk_command(vec!["a"]))?;
    assert!(!out.status.success());
    assert_stderr_contains(&out, "attribute");
    Ok(())
}

#[test]
fn missing_include_reports_error() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "<nonexistent.mk\nall:V: ; echo hi\n")?;
    let out = space.run(&mut mk_command(vec![]))?;
    assert!(!out.status.success());
    assert_stderr_contains(&out, "nonexistent.mk");
    Ok(())
}

#[test]
fn missing_mkfile_reports_error() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.run(&mut mk_command(vec![]))?;
    assert!(!out.status.success());
    assert_stderr_contains(&out, "mkfile");
    Ok(())
}
