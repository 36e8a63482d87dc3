#![cfg(all(unix, feature = "kernel-build"))]

// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

use std::fs;
use std::time::Duration;

use mind_rnn::build::{BuildDir, BuildError, KernelCompiler, BUILD_LOG};

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

#[test]
fn build_dir_is_removed_on_drop() {
    let dir = BuildDir::new("rnn-test").expect("create build dir");
    let path = dir.path().to_path_buf();
    assert!(path.is_dir());
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("mind-rnn-test-"));
    drop(dir);
    assert!(!path.exists());
}

#[test]
fn build_dir_is_removed_after_failed_command() {
    let dir = BuildDir::new("rnn-fail").expect("create build dir");
    let path = dir.path().to_path_buf();
    let err = dir
        .execute("sh", &sh("echo boom >&2; exit 3"))
        .unwrap_err();
    match err {
        BuildError::Subprocess { tool, status, stderr } => {
            assert_eq!(tool, "sh");
            assert_eq!(status.code(), Some(3));
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected Subprocess, got {other:?}"),
    }
    let log = fs::read_to_string(path.join(BUILD_LOG)).expect("build log written");
    assert!(log.contains("boom"));
    drop(dir);
    assert!(!path.exists());
}

#[test]
fn execute_runs_inside_the_directory() {
    let dir = BuildDir::new("rnn-cwd").expect("create build dir");
    let log = dir.execute("sh", &sh("pwd; echo hi > out.txt")).unwrap();
    let canonical = fs::canonicalize(dir.path()).unwrap();
    assert_eq!(
        fs::canonicalize(&log.stdout).unwrap(),
        canonical,
        "command ran in {}",
        log.stdout
    );
    assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hi\n");
}

#[test]
fn kept_directory_survives_drop() {
    let dir = BuildDir::new("rnn-keep").expect("create build dir");
    let path = dir.keep();
    assert!(path.is_dir());
    fs::remove_dir_all(&path).unwrap();
}

#[test]
fn missing_tool_is_reported() {
    let dir = BuildDir::new("rnn-missing").expect("create build dir");
    let err = dir
        .execute("mind-no-such-compiler-xyz", &[])
        .unwrap_err();
    assert!(matches!(err, BuildError::ToolMissing(ref tool) if tool == "mind-no-such-compiler-xyz"));
}

#[test]
fn slow_command_times_out() {
    let dir = BuildDir::new("rnn-timeout")
        .expect("create build dir")
        .with_timeout(Duration::from_millis(500));
    let err = dir
        .execute("sh", &sh("echo started; sleep 5"))
        .unwrap_err();
    assert!(matches!(err, BuildError::Timeout(_)));
    let log = fs::read_to_string(dir.path().join(BUILD_LOG)).expect("partial log written");
    assert!(log.contains("sleep 5"), "{log}");
    assert!(log.contains("started"), "{log}");
}

#[test]
fn large_output_does_not_stall_the_command() {
    // Far more than a pipe buffer on both streams.
    let dir = BuildDir::new("rnn-chatty")
        .expect("create build dir")
        .with_timeout(Duration::from_secs(20));
    let script = "head -c 200000 /dev/zero | tr '\\0' a; \
                  head -c 100000 /dev/zero | tr '\\0' b >&2";
    let log = dir.execute("sh", &sh(script)).expect("command finishes");
    assert_eq!(log.stdout.len(), 200_000);
    assert!(log.stdout.bytes().all(|b| b == b'a'));
    assert_eq!(log.stderr.len(), 100_000);
    let written = fs::read_to_string(dir.path().join(BUILD_LOG)).expect("build log written");
    assert!(written.len() > 300_000);
}

#[test]
fn compiler_output_is_collected() {
    // `sh -c 'cp "$1" "$3"' sh <src> -o <out>` stands in for a kernel compiler.
    let compiler = KernelCompiler::with_program("sh");
    let mut flags = sh("cp \"$1\" \"$3\"");
    flags.push("sh".into());
    let kernel = compiler
        .compile("rnn_fwd.cl", "__kernel void rnn_fwd() {}", &flags)
        .expect("compile");
    assert_eq!(kernel.name, "rnn_fwd");
    assert_eq!(kernel.binary, b"__kernel void rnn_fwd() {}");
}
