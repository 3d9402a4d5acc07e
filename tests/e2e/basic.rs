use crate::*;

#[test]
fn assignment_and_expansion() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "x = one two\nall:V: ; echo $x\n")?;
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "one two");
    Ok(())
}

#[test]
fn namelist_substitution() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "src = a.c b.c c.c\nobj = ${src:%.c=%.o}\nall:V: ; echo $obj\n",
    )?;
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "a.o b.o c.o");
    Ok(())
}

#[test]
fn default_target_is_first_non_meta_rule() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "%.o:%.c\n\tcc -c\nfirst:V: ; echo first ran\nsecond:V: ; echo second ran\n",
    )?;
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "first ran");
    assert_output_not_contains(&out, "second ran");
    Ok(())
}

#[test]
fn named_target_overrides_default() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "first:V: ; echo first\nsecond:V: ; echo second\n")?;
    let out = space.run_expect(&mut mk_command(vec!["second"]))?;
    assert_output_contains(&out, "second");
    assert_output_not_contains(&out, "first");
    Ok(())
}

#[test]
fn up_to_date_target_is_left_alone() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "out: in\n\tcp in out\n")?;
    space.write("in", "data")?;
    space.run_expect(&mut mk_command(vec![]))?;
    assert_eq!(space.read("out")?, b"data");

    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_not_contains(&out, "cp in out");
    Ok(())
}

#[test]
fn rebuild_all_flag_forces_the_recipe() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "out: in\n\tcp in out\n")?;
    space.write("in", "data")?;
    space.run_expect(&mut mk_command(vec![]))?;

    let out = space.run_expect(&mut mk_command(vec!["-a"]))?;
    assert_output_contains(&out, "cp in out");
    Ok(())
}

#[test]
fn rebuild_flag_forces_named_targets() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "out: in\n\tcp in out\n")?;
    space.write("in", "data")?;
    space.run_expect(&mut mk_command(vec![]))?;

    let out = space.run_expect(&mut mk_command(vec!["-r", "out"]))?;
    assert_output_contains(&out, "cp in out");
    Ok(())
}

#[test]
fn newer_prereq_triggers_rebuild() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "out: in\n\tcp in out\n")?;
    space.write("in", "v1")?;
    space.run_expect(&mut mk_command(vec![]))?;
    assert_eq!(space.read("out")?, b"v1");

    // Some filesystems keep timestamps in whole seconds.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    space.write("in", "v2")?;
    space.run_expect(&mut mk_command(vec![]))?;
    assert_eq!(space.read("out")?, b"v2");
    Ok(())
}

#[test]
fn dry_run_prints_but_does_not_execute() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "out:\n\techo made > out\n")?;
    let out = space.run_expect(&mut mk_command(vec!["-n", "out"]))?;
    assert_output_contains(&out, "echo made > out");
    assert!(!space.exists("out"));
    Ok(())
}

#[test]
fn quiet_flag_suppresses_echo() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "all:V: ; echo output-line\n")?;
    let out = space.run_expect(&mut mk_command(vec!["-q"]))?;
    assert_output_contains(&out, "output-line");
    assert_output_not_contains(&out, "echo output-line");
    Ok(())
}

#[test]
fn quiet_attribute_suppresses_echo() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "all:VQ: ; echo output-line\n")?;
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "output-line");
    assert_output_not_contains(&out, "echo output-line");
    Ok(())
}

#[test]
fn environment_variables_are_imported() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "all:V: ; echo var=$MK_E2E_PROBE\n")?;
    let mut cmd = mk_command(vec![]);
    cmd.env("MK_E2E_PROBE", "from-env");
    let out = space.run_expect(&mut cmd)?;
    assert_output_contains(&out, "var=from-env");
    Ok(())
}

#[test]
fn recipe_runs_once_per_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "all:V: a b\na:V: c\n\ttrue\nb:V: c\n\ttrue\nc:V:\n\techo ran >> count\n",
    )?;
    space.run_expect(&mut mk_command(vec![]))?;
    assert_eq!(space.read("count")?, b"ran\n");
    Ok(())
}

#[test]
fn semicolon_values_survive_assignment_and_expansion() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "x = a;b\nall:V: ; echo \"v=$x\"\n")?;
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "v=a;b");
    Ok(())
}

#[test]
fn semicolon_in_target_name_builds() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "foo;bar:V: ; echo semi ran\n")?;
    let out = space.run_expect(&mut mk_command(vec!["foo;bar"]))?;
    assert_output_contains(&out, "semi ran");
    Ok(())
}

#[test]
fn alternate_shell_attribute() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "all:VSsh -e: ; echo with-shell\n")?;
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "with-shell");
    Ok(())
}

#[test]
fn line_continuation_joins_prereq_lists() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "all:V: a \\\nb\na:V: ; echo A\nb:V: ; echo B\n")?;
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "A");
    assert_output_contains(&out, "B");
    Ok(())
}
