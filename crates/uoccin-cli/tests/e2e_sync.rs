//! E2E CLI tests: several devices sharing one folder.
//!
//! Each test runs the `uoccin` binary as a subprocess against an isolated
//! temp folder, with the user config directory pointed at an empty dir.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

struct Folder {
    shared: TempDir,
    home: TempDir,
}

impl Folder {
    fn new() -> Self {
        Self {
            shared: TempDir::new().expect("shared dir"),
            home: TempDir::new().expect("home dir"),
        }
    }

    fn root(&self) -> &Path {
        self.shared.path()
    }

    /// Build a command for `device` rooted in the shared folder.
    fn uoccin(&self, device: &str) -> Command {
        let mut cmd = self.bare();
        cmd.args(["--device", device]);
        cmd
    }

    /// A command without `--device`.
    fn bare(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("uoccin"));
        cmd.arg("--root").arg(self.root());
        cmd.env_remove("UOCCIN_DEVICE");
        cmd.env_remove("UOCCIN_ROOT");
        cmd.env("XDG_CONFIG_HOME", self.home.path());
        cmd.env("HOME", self.home.path());
        // Suppress tracing output that goes to stderr
        cmd.env("UOCCIN_LOG", "error");
        cmd
    }

    fn json(&self, device: &str, args: &[&str]) -> Value {
        let output = self
            .uoccin(device)
            .arg("--json")
            .args(args)
            .output()
            .expect("uoccin should not crash");
        assert!(
            output.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("valid JSON")
    }

    fn show(&self, kind: &str, id: &str) -> Value {
        let output = self
            .bare()
            .args(["--json", "show", kind, id])
            .output()
            .expect("show should not crash");
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).expect("valid JSON")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn init_creates_inbox_and_lists_siblings() {
    let f = Folder::new();
    f.uoccin("tv").arg("init").assert().success();
    assert!(f.root().join("device.tv").is_dir());

    let json = f.json("laptop", &["init"]);
    assert_eq!(json["device"], "laptop");
    assert_eq!(json["siblings"], serde_json::json!(["tv"]));

    f.uoccin("laptop")
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Device 'laptop' is ready"));
}

#[test]
fn mark_then_show_reflects_flags_and_tags() {
    let f = Folder::new();
    f.uoccin("laptop")
        .args(["mark", "watchlist", "movie", "tt0111161", "--tags", "drama,classic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 command(s) recorded on laptop"));

    let movie = f.show("movie", "tt0111161");
    assert_eq!(movie["kind"], "movie");
    assert_eq!(movie["watchlist"], true);
    assert_eq!(movie["collected"], false);
    assert_eq!(movie["tags"], serde_json::json!(["classic", "drama"]));

    f.uoccin("laptop")
        .args(["unmark", "watchlist", "movie", "tt0111161"])
        .assert()
        .success();
    let movie = f.show("movie", "tt0111161");
    assert_eq!(movie["watchlist"], false);
    assert_eq!(movie["tags"], serde_json::json!([]));
}

#[test]
fn logs_travel_to_other_devices_and_are_consumed() {
    let f = Folder::new();
    f.uoccin("tv").arg("init").assert().success();

    let run = f.json(
        "laptop",
        &["mark", "collected", "series", "81189.5.16", "--subtitles", "eng,ita"],
    );
    assert_eq!(run["finish"]["delivered"], serde_json::json!(["tv"]));
    assert_eq!(run["finish"]["removed"], true);

    let sync = f.json("tv", &["sync"]);
    assert_eq!(sync["inbox"]["consumed"].as_array().map(Vec::len), Some(1));
    assert_eq!(sync["inbox"]["commands"], 2);

    let tv_inbox: Vec<_> = fs::read_dir(f.root().join("device.tv"))
        .expect("list inbox")
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".diff"))
        .collect();
    assert!(tv_inbox.is_empty());

    let episode = f
        .bare()
        .args(["--json", "show", "series", "81189", "--season", "5", "--episode", "16"])
        .output()
        .expect("show");
    let episode: Value = serde_json::from_slice(&episode.stdout).expect("valid JSON");
    assert_eq!(episode["collected"], true);
    assert_eq!(episode["subtitles"], serde_json::json!(["eng", "ita"]));
}

#[test]
fn record_stdin_batch_is_one_run() {
    let f = Folder::new();
    let output = f
        .uoccin("nas")
        .args(["--json", "record", "--stdin"])
        .write_stdin(
            "# imported\nmovie|tt1|watchlist|true\nmovie|tt1|rating|8\nseries|500|collected|true\n",
        )
        .output()
        .expect("record");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["commands"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["finish"]["rejected"], 1);

    let movie = f.show("movie", "tt1");
    assert_eq!(movie["rating"], 8);
    assert_eq!(f.show("series", "500")["collected"], false);
}

#[test]
fn watchlist_filters_by_tag() {
    let f = Folder::new();
    f.uoccin("a")
        .args(["mark", "watchlist", "movie", "tt1", "--tags", "drama"])
        .assert()
        .success();
    f.uoccin("a")
        .args(["mark", "watchlist", "movie", "tt2", "--tags", "comedy"])
        .assert()
        .success();
    f.uoccin("a")
        .args(["mark", "watchlist", "movie", "tt3"])
        .assert()
        .success();

    let all = f.json("a", &["watchlist", "movie"]);
    assert_eq!(all.as_array().map(Vec::len), Some(3));

    let drama = f.json("a", &["watchlist", "movie", "--tag", "drama"]);
    assert_eq!(drama[0]["id"], "tt1");
    assert_eq!(drama.as_array().map(Vec::len), Some(1));

    let not_drama = f.json("a", &["watchlist", "movie", "--tag", "drama", "--check", "none"]);
    let ids: Vec<&str> = not_drama
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|e| e["id"].as_str())
        .collect();
    assert_eq!(ids, ["tt2", "tt3"]);
}

#[test]
fn missing_device_is_reported_with_code() {
    let f = Folder::new();
    f.bare()
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1001]"));

    let output = f.bare().args(["--json", "sync"]).output().expect("sync");
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stderr).expect("JSON error");
    assert_eq!(json["error"]["error_code"], "E1001");
    assert!(json["error"]["suggestion"].is_string());
}

#[test]
fn invalid_device_id_is_rejected() {
    let f = Folder::new();
    f.uoccin("bad id")
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1003"));
    assert!(!f.root().join("device.bad id").exists());
}

#[test]
fn corrupt_store_fails_and_is_left_alone() {
    let f = Folder::new();
    f.uoccin("me").arg("init").assert().success();
    fs::write(f.root().join("device.me/100.other.diff"), "100|movie|tt1|watched|true\n")
        .expect("write log");
    fs::write(f.root().join("uoccin.json"), "not json").expect("write store");

    f.uoccin("me")
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3003"));
    assert_eq!(
        fs::read_to_string(f.root().join("uoccin.json")).expect("read"),
        "not json"
    );
    assert!(f.root().join("device.me/100.other.diff").exists());

    f.bare()
        .args(["show", "movie", "tt1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3003"));
}

#[test]
fn show_rejects_episode_flags_for_movies() {
    let f = Folder::new();
    f.bare()
        .args(["show", "movie", "tt1", "--season", "1", "--episode", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only apply to series"));
}
