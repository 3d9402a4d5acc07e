use crate::*;

#[test]
fn suffix_rule_builds_matching_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "all:V: foo.o\n%.o:%.c ; cp $prereq $target\n")?;
    space.write("foo.c", "int main() {}\n")?;
    space.run_expect(&mut mk_command(vec![]))?;
    assert_eq!(space.read("foo.o")?, space.read("foo.c")?);
    Ok(())
}

#[test]
fn stem_is_available_in_recipes() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "all:V: foo.o\n%.o:%.c ; echo stem=$stem\n")?;
    space.write("foo.c", "")?;
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "stem=foo");
    Ok(())
}

#[test]
fn meta_rules_chain() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "all:V: foo.b\n%.b:%.a ; cp $prereq $target\n%.a:%.src ; cp $prereq $target\n",
    )?;
    space.write("foo.src", "chain\n")?;
    space.run_expect(&mut mk_command(vec![]))?;
    assert_eq!(space.read("foo.b")?, b"chain\n");
    Ok(())
}

#[test]
fn regex_rule_builds_with_capture_groups() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "all:V: foo.out\n(.*)\\.out:R: $stem1.src\n\tcp $stem1.src $stem0\n",
    )?;
    space.write("foo.src", "captured\n")?;
    space.run_expect(&mut mk_command(vec![]))?;
    assert_eq!(space.read("foo.out")?, b"captured\n");
    Ok(())
}

#[test]
fn concrete_rule_wins_over_meta() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "all:V: foo.o\nfoo.o: ; echo concrete > foo.o\n%.o:%.c ; echo meta > $target\n",
    )?;
    space.write("foo.c", "")?;
    space.run_expect(&mut mk_command(vec![]))?;
    assert_eq!(space.read("foo.o")?, b"concrete\n");
    Ok(())
}

#[test]
fn unmatched_meta_target_is_unknown() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "%.o:%.c ; cp $prereq $target\n")?;
    // No bar.c anywhere, so bar.o has no viable route.
    let out = space.run(&mut mk_command(vec!["bar.o"]))?;
    assert!(!out.status.success());
    assert_stderr_contains(&out, "don't know how to make");
    Ok(())
}

#[test]
fn prereq_lists_all_rule_prereqs() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("mkfile", "all:V: a b ; echo prereq=$prereq\na:V:\n\ttrue\nb:V:\n\ttrue\n")?;
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "prereq=a b");
    Ok(())
}

#[test]
fn update_attribute_marks_dependents_out_of_date() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "mkfile",
        "out: in\n\tcp in out\nin:U: ; true\n",
    )?;
    space.write("in", "data")?;
    space.run_expect(&mut mk_command(vec![]))?;
    // out exists and is newer, but in carries U, so out rebuilds anyway.
    let out = space.run_expect(&mut mk_command(vec![]))?;
    assert_output_contains(&out, "cp in out");
    Ok(())
}
