//! CLI integration tests for keel.
//!
//! Process-spawning tests drive a fake compiler written in `sh`, configured
//! through the project's `.keel/config.toml`.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Fake compiler: writes `built` to the `-o` argument, fails on `#error`.
const FAKE_CC: &str = r#"prev=""
out=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
  if [ -f "$a" ] && grep -q '#error' "$a"; then
    echo "broken: $a" >&2
    exit 1
  fi
done
if [ -n "$out" ]; then echo built > "$out"; fi
"#;

/// Fake archiver: `rcs <lib> <objs..>`.
const FAKE_AR: &str = r#"echo archived > "$2"
"#;

const CONFIG: &str = r#"[toolchain]
backend = "gcc"
compiler = "g++"
archiver = "ar"
compile_program = "sh cc.sh"
link_program = "sh cc.sh"
archive_program = "sh ar.sh"
"#;

/// Get the keel binary command, isolated from the user's environment.
fn keel(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("keel").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("KEEL_LOG")
        .env_remove("CXX")
        .env_remove("CC")
        .env_remove("AR");
    cmd
}

/// A project with a fake toolchain and two sources.
fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    project_with_config(&tmp, CONFIG);
    fs::create_dir_all(tmp.path().join("src/net")).unwrap();
    fs::write(tmp.path().join("src/main.cpp"), "int main() {}\n").unwrap();
    fs::write(tmp.path().join("src/net/socket.cc"), "void open() {}\n").unwrap();
    fs::write(tmp.path().join("src/README.md"), "not a source\n").unwrap();
    tmp
}

fn project_with_config(tmp: &TempDir, config: &str) {
    fs::create_dir_all(tmp.path().join(".keel")).unwrap();
    fs::write(tmp.path().join(".keel/config.toml"), config).unwrap();
    fs::write(tmp.path().join("cc.sh"), FAKE_CC).unwrap();
    fs::write(tmp.path().join("ar.sh"), FAKE_AR).unwrap();
}

// ============================================================================
// CLI surface
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();
    keel(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("driver"))
        .stdout(predicate::str::contains("--no-rebuild"));
}

#[test]
fn test_completions() {
    let tmp = TempDir::new().unwrap();
    keel(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keel"));
}

#[test]
fn test_toolchain_shows_overrides() {
    let tmp = project();
    keel(tmp.path())
        .arg("toolchain")
        .assert()
        .success()
        .stdout(predicate::str::contains("custom(gcc)"))
        .stdout(predicate::str::contains("compile  sh cc.sh -c"))
        .stdout(predicate::str::contains("archive  sh ar.sh rcs"))
        .stdout(predicate::str::contains("object   .o"));
}

#[test]
fn test_invalid_backend_is_an_error() {
    let tmp = TempDir::new().unwrap();
    project_with_config(&tmp, "[toolchain]\nbackend = \"turbo-c\"\n");
    keel(tmp.path())
        .arg("toolchain")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("turbo-c"));
}

// ============================================================================
// keel build
// ============================================================================

#[cfg(unix)]
#[test]
fn test_build_compiles_and_links() {
    let tmp = project();

    keel(tmp.path())
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("Running"))
        .stderr(predicate::str::contains("Linking"))
        .stderr(predicate::str::contains("3 ran, 0 skipped, 0 failed"));

    assert!(tmp.path().join("bin/int/main.o").exists());
    assert!(tmp.path().join("bin/int/socket.o").exists());
    assert!(!tmp.path().join("bin/int/README.o").exists());
    assert_eq!(
        fs::read_to_string(tmp.path().join("bin/main")).unwrap(),
        "built\n"
    );
}

#[cfg(unix)]
#[test]
fn test_second_build_skips_up_to_date_work() {
    let tmp = project();
    keel(tmp.path()).arg("build").assert().success();

    keel(tmp.path())
        .args(["build", "--sequential"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Skipped"))
        .stderr(predicate::str::contains("0 ran, 3 skipped"));
}

#[cfg(unix)]
#[test]
fn test_clean_flag_rebuilds_everything() {
    let tmp = project();
    keel(tmp.path()).arg("build").assert().success();

    keel(tmp.path())
        .args(["--clean", "build"])
        .assert()
        .success()
        .stderr(predicate::str::contains("3 ran, 0 skipped"));
}

#[cfg(unix)]
#[test]
fn test_failed_compile_skips_link_and_propagates_status() {
    let tmp = project();
    fs::write(tmp.path().join("src/bad.cpp"), "#error nope\n").unwrap();

    keel(tmp.path())
        .args(["build", "-j", "2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("stderr | broken:"))
        .stderr(predicate::str::contains("not linking"));

    // Siblings of the failing file still compiled.
    assert!(tmp.path().join("bin/int/main.o").exists());
    assert!(tmp.path().join("bin/int/socket.o").exists());
    assert!(!tmp.path().join("bin/main").exists());
}

#[cfg(unix)]
#[test]
fn test_build_lib_archives_objects() {
    let tmp = project();

    keel(tmp.path())
        .args(["build", "--lib", "--out", "out/libnet.a"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Archiving"));

    assert_eq!(
        fs::read_to_string(tmp.path().join("out/libnet.a")).unwrap(),
        "archived\n"
    );
}

#[test]
fn test_build_without_source_dir_fails() {
    let tmp = TempDir::new().unwrap();
    project_with_config(&tmp, CONFIG);

    keel(tmp.path())
        .args(["build", "--src", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[cfg(unix)]
#[test]
fn test_silent_prints_no_status_lines() {
    let tmp = project();
    keel(tmp.path())
        .args(["--silent", "build"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Running").not());
}

// ============================================================================
// keel driver
// ============================================================================

#[cfg(unix)]
#[test]
fn test_driver_builds_next_to_source() {
    let tmp = project();
    fs::create_dir_all(tmp.path().join("tools")).unwrap();
    fs::write(tmp.path().join("tools/gen.cpp"), "int main() {}\n").unwrap();

    keel(tmp.path())
        .args(["driver", "tools/gen.cpp"])
        .assert()
        .success()
        .stderr(predicate::str::contains("-std=c++17"));

    assert!(tmp.path().join("tools/gen").exists());
}

#[test]
fn test_driver_requires_files() {
    let tmp = TempDir::new().unwrap();
    keel(tmp.path()).arg("driver").assert().failure();
}

// ============================================================================
// keel run
// ============================================================================

/// Fake compiler for driver programs: the `-o` target becomes a script that
/// echoes its arguments.
#[cfg(unix)]
const FAKE_DRIVER_CC: &str = r#"prev=""
out=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
printf '#!/bin/sh\necho "driver ran: $*"\n' > "$out"
chmod +x "$out"
"#;

#[cfg(unix)]
#[test]
fn test_run_rebuilds_driver_and_leaves_keel_alone() {
    let tmp = TempDir::new().unwrap();
    let config = format!("{}\n[driver]\nsource = \"drv.cpp\"\n", CONFIG);
    project_with_config(&tmp, &config);
    fs::write(tmp.path().join("cc.sh"), FAKE_DRIVER_CC).unwrap();
    fs::write(tmp.path().join("drv.cpp"), "int main() {}\n").unwrap();

    let keel_bin = assert_cmd::cargo::cargo_bin("keel");
    let keel_before = fs::read(&keel_bin).unwrap();

    keel(tmp.path())
        .args(["run", "drv.cpp", "hello", "--fast"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Rebuilding"))
        .stdout(predicate::str::contains("driver ran: --no-rebuild hello --fast"));

    assert!(tmp.path().join("drv").exists());
    assert!(!tmp.path().join("drv.old").exists());

    // Up to date now: started again without a rebuild.
    keel(tmp.path())
        .args(["--debug", "run"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Rebuilding").not())
        .stdout(predicate::str::contains("driver ran: --no-rebuild --debug"));

    assert_eq!(fs::read(&keel_bin).unwrap(), keel_before);
    assert!(!keel_bin.with_file_name("keel.old").exists());
}

#[test]
fn test_run_without_source_fails() {
    let tmp = TempDir::new().unwrap();
    keel(tmp.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("driver.source"));
}

#[test]
fn test_configured_driver_source_does_not_bootstrap_other_commands() {
    let tmp = TempDir::new().unwrap();
    let config = format!("{}\n[driver]\nsource = \"drv.cpp\"\n", CONFIG);
    project_with_config(&tmp, &config);
    fs::write(tmp.path().join("drv.cpp"), "int main() {}\n").unwrap();

    keel(tmp.path())
        .arg("toolchain")
        .assert()
        .success()
        .stdout(predicate::str::contains("custom(gcc)"));
    assert!(!tmp.path().join("drv").exists());
}

// ============================================================================
// init script
// ============================================================================

#[cfg(unix)]
fn executable_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

#[cfg(unix)]
#[test]
fn test_failing_init_script_stops_the_command() {
    let tmp = project();
    let config = format!("{}\n[driver]\ninit_script = \"init.sh\"\n", CONFIG);
    project_with_config(&tmp, &config);
    executable_script(&tmp.path().join("init.sh"), "touch init-ran\nexit 7\n");

    keel(tmp.path()).arg("build").assert().code(7);
    assert!(tmp.path().join("init-ran").exists());
    assert!(!tmp.path().join("bin/main").exists());

    fs::remove_file(tmp.path().join("init-ran")).unwrap();
    keel(tmp.path())
        .args(["--no-init-script", "build"])
        .assert()
        .success();
    assert!(!tmp.path().join("init-ran").exists());
}

// ============================================================================
// keel clean
// ============================================================================

#[cfg(unix)]
#[test]
fn test_clean_removes_outputs() {
    let tmp = project();
    keel(tmp.path()).arg("build").assert().success();

    keel(tmp.path())
        .args(["clean", "--out", "bin/main"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed"));

    assert!(!tmp.path().join("bin/int").exists());
    assert!(!tmp.path().join("bin/main").exists());
}
