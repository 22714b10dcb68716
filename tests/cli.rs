use assert_cmd::Command;

fn bencher() -> Command {
    let mut cmd = Command::cargo_bin("matmul-bencher").unwrap();
    for key in [
        "MATBENCH_KERNEL",
        "MATBENCH_ADAPTER",
        "MATBENCH_ALLOW_CPU",
        "MATBENCH_PRINT",
        "MATBENCH_SEED",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn invalid_kernel_reports_and_exits_zero() {
    bencher()
        .env("MATBENCH_KERNEL", "conv")
        .assert()
        .success()
        .stdout("Error: Invalid value \"conv\" for MATBENCH_KERNEL (code -13)\n");
}

#[test]
fn invalid_seed_reports_and_exits_zero() {
    let out = bencher()
        .env("MATBENCH_SEED", "many")
        .assert()
        .code(0)
        .get_output()
        .stdout
        .clone();
    let s = String::from_utf8(out).unwrap();
    assert_eq!(s.lines().count(), 1);
    assert_eq!(
        s.trim_end(),
        "Error: Invalid value \"many\" for MATBENCH_SEED (code -13)"
    );
}
