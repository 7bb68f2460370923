#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use accel_hook::Dispatcher;
use accel_hook::config::AccelConfig;
use accel_hook::env::MapEnv;
use accel_hook::runner::SystemRunner;

fn have_bin(name: &str) -> bool {
    Command::new(name)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

struct Fixture {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    cfg: AccelConfig,
    env: Arc<MapEnv>,
}

impl Fixture {
    // Fake checkpoint binary and object-store CLI that append their argv to calls.log.
    fn new(dump_exit: i32, store_exit: i32) -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().to_path_buf();
        let log = root.join("calls.log");

        let srctl = root.join("srctl");
        write_script(
            &srctl,
            &format!(
                "echo \"srctl $*\" >> '{}'\necho dumping state\nexit {dump_exit}",
                log.display()
            ),
        );
        let ossutil = root.join("ossutil64");
        write_script(
            &ossutil,
            &format!(
                "echo \"ossutil $*\" >> '{}'\necho 'ossutil output' 1>&2\nexit {store_exit}",
                log.display()
            ),
        );

        let work = root.join("work");
        fs::create_dir_all(work.join("snap")).expect("work dir");
        fs::write(work.join("snap").join("image.bin"), "state").expect("work file");

        let mut cfg = AccelConfig::default();
        cfg.paths.checkpoint_bin = srctl;
        cfg.paths.ossutil_install = ossutil;
        cfg.paths.ossutil_scratch = root.join("scratch-ossutil64");

        let env = Arc::new(MapEnv::new([
            ("PYCDSMODE", "1".to_string()),
            ("PYCDSLIST", "list".to_string()),
            ("SRPATH", work.display().to_string()),
        ]));

        Self {
            _tmp: tmp,
            root,
            cfg,
            env,
        }
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(&self.cfg, Arc::new(SystemRunner), self.env.clone())
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.root.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(ToOwned::to_owned)
            .collect()
    }
}

#[test]
fn dump_archive_and_upload_with_real_processes() {
    if !have_bin("tar") {
        eprintln!("skipping: tar not available");
        return;
    }
    let fx = Fixture::new(0, 0);
    let archive = fx.root.join("out.tgz");
    let body = format!(
        "type=dump;file={};bucket=snaps;accessKeyId=AK;accessKeySecret=SK;endpoint=oss.example",
        archive.display()
    );

    let out = fx.dispatcher().handle(&body, || unreachable!());
    assert_eq!(out, "success");

    assert!(archive.is_file(), "archive missing");
    let listing = Command::new("tar")
        .arg("-tzf")
        .arg(&archive)
        .output()
        .expect("list archive");
    let listing = String::from_utf8_lossy(&listing.stdout);
    assert!(listing.contains("snap/image.bin"), "listing: {listing}");

    let scratch = &fx.cfg.paths.ossutil_scratch;
    let mode = fs::metadata(scratch).expect("staged cli").permissions().mode();
    assert!(mode & 0o100 != 0, "staged cli not executable");

    let common = "-e oss.example -i AK -k SK";
    assert_eq!(
        fx.calls(),
        vec![
            "srctl dump".to_string(),
            format!("ossutil mb oss://snaps/ {common}"),
            format!(
                "ossutil cp {} oss://snaps/out.tgz -f {common}",
                archive.display()
            ),
            format!("ossutil stat oss://snaps/out.tgz {common}"),
        ]
    );
}

#[test]
fn dump_failure_is_returned_as_text() {
    let fx = Fixture::new(3, 0);
    let out = fx
        .dispatcher()
        .handle("type=dump;file=/nonexistent/x.tgz", || unreachable!());
    assert_eq!(out, "dump error: return code 3");
    assert_eq!(fx.calls(), vec!["srctl dump"]);
}

#[test]
fn archive_into_missing_dir_fails_via_tar() {
    if !have_bin("tar") {
        eprintln!("skipping: tar not available");
        return;
    }
    let fx = Fixture::new(0, 0);
    let out = fx
        .dispatcher()
        .handle("type=dump;file=/nonexistent/dir/x.tgz", || unreachable!());
    assert!(out.starts_with("command [tar -czf /nonexistent/dir/x.tgz .]"), "unexpected: {out}");
    assert!(out.contains("return code is"), "unexpected: {out}");
}

#[test]
fn object_store_failure_stops_after_make_bucket() {
    let fx = Fixture::new(0, 1);
    let out = fx.dispatcher().handle(
        "type=dump;file=;bucket=snaps;accessKeyId=AK;accessKeySecret=SK;endpoint=ep",
        || unreachable!(),
    );
    assert!(out.contains(" mb oss://snaps/"), "unexpected: {out}");
    assert!(out.ends_with("return code is 1"), "unexpected: {out}");
    assert_eq!(fx.calls().len(), 2);
}

#[test]
fn missing_object_store_cli_fails_at_staging() {
    let mut fx = Fixture::new(0, 0);
    fx.cfg.paths.ossutil_install = fx.root.join("not-installed");
    let out = fx.dispatcher().handle(
        "type=dump;file=;bucket=snaps;accessKeyId=AK;accessKeySecret=SK;endpoint=ep",
        || unreachable!(),
    );
    assert!(out.starts_with("command [cp "), "unexpected: {out}");
    assert_eq!(fx.calls(), vec!["srctl dump"]);
}
