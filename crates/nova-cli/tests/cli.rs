use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

const COLLECTING: &str = "import java.util.*;

class A {
    List<String> m(List<String> list) {
        List<String> r = new ArrayList<>();
        for (String s : list) { if (!s.isEmpty()) r.add(s); }
        return r;
    }
}
";

const PRINTING: &str = "class B {
    void m(String[] names) {
        for (String s : names) { System.out.println(s); }
    }
}
";

fn nova() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("nova"))
}

#[test]
fn help_mentions_core_commands() {
    nova().arg("--help").assert().success().stdout(
        predicate::str::contains("check").and(predicate::str::contains("fix")),
    );
}

#[test]
fn check_reports_migratable_loops() {
    let temp = TempDir::new().unwrap();
    temp.child("src/A.java").write_str(COLLECTING).unwrap();
    temp.child("src/B.java").write_str(PRINTING).unwrap();

    nova()
        .current_dir(temp.path())
        .arg("check")
        .arg("src")
        .assert()
        .code(1)
        .stdout(
            predicate::str::contains("A.java:6:9: warning[stream-api-migration] Can be replaced with 'collect' call")
                .and(predicate::str::contains("B.java").not())
                .and(predicate::str::contains("summary: 2 files, 1 findings")),
        );
}

#[test]
fn check_json_is_machine_readable() {
    let temp = TempDir::new().unwrap();
    temp.child("A.java").write_str(COLLECTING).unwrap();

    let output = nova()
        .current_dir(temp.path())
        .args(["check", "A.java", "--json"])
        .output()
        .expect("run nova");
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(value["summary"]["findings"], 1);
    assert_eq!(value["findings"][0]["code"], "stream-api-migration");
    assert_eq!(value["findings"][0]["severity"], "warning");
    assert_eq!(value["findings"][0]["fixes"][0], "Replace with collect");
}

#[test]
fn config_enables_informational_findings() {
    let temp = TempDir::new().unwrap();
    temp.child("B.java").write_str(PRINTING).unwrap();
    temp.child("nova.toml")
        .write_str("[stream_migration]\nreport_informational = true\n")
        .unwrap();

    nova()
        .current_dir(temp.path())
        .args(["check", "B.java"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "B.java:3:9: info[stream-api-migration] Can be replaced with 'forEach' call",
        ));
}

#[test]
fn invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    temp.child("A.java").write_str(COLLECTING).unwrap();
    temp.child("custom.toml").write_str("[stream_migration]\nunknown = 1\n").unwrap();

    nova()
        .current_dir(temp.path())
        .args(["check", "A.java", "--config", "custom.toml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown field"));
}

#[test]
fn fix_rewrites_files_in_place() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("A.java");
    file.write_str(COLLECTING).unwrap();

    nova()
        .current_dir(temp.path())
        .args(["fix", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Replace with collect"));

    file.assert(predicate::str::contains(
        "List<String> r = list.stream().filter(s -> !s.isEmpty()).collect(Collectors.toList());",
    ));
    file.assert(predicate::str::contains("import java.util.stream.Collectors;"));
    file.assert(predicate::str::contains("for (").not());
}

#[test]
fn dry_run_leaves_files_alone() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("A.java");
    file.write_str(COLLECTING).unwrap();

    nova()
        .current_dir(temp.path())
        .args(["fix", "A.java", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would fix"));
    file.assert(COLLECTING);
}
