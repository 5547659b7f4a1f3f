//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// A command for the ssv binary with a clean environment
fn ssv() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ssv"));
    cmd.env_remove("SSV_SECRET_KEY")
        .env_remove("SSV_MAX_FILE_SIZE")
        .env_remove("RUST_LOG");
    cmd
}

/// Run ssv with the secret piped on stdin
fn run_ssv_with_secret(args: &[&str], secret: &str) -> Result<Output, std::io::Error> {
    let mut child = ssv()
        .arg("--secret-stdin")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g., file not found)
        let _ = stdin.write_all(secret.as_bytes());
    }

    child.wait_with_output()
}

/// Get path to testdata directory
fn testdata_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("testdata");
    path.push(filename);
    path
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Open a reference envelope sealed with the secret "test".
#[test]
fn test_open_known_envelope() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("hello-opened.txt");

    let result = run_ssv_with_secret(
        &[
            "open",
            "-i",
            path_str(&testdata_path("hello.txt.ssv")),
            "-o",
            path_str(&output),
        ],
        "test",
    )
    .unwrap();

    assert_success(&result, "open");
    assert_eq!(String::from_utf8_lossy(&result.stdout), "hello.txt\n");

    let opened = fs::read_to_string(&output).unwrap();
    let expected = fs::read_to_string(testdata_path("hello.txt")).unwrap();
    assert_eq!(opened, expected);
}

#[test]
fn test_seal_open_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext_path = testdata_path("hello.txt");
    let envelope_path = temp_dir.path().join("hello.txt.ssv");
    let opened_path = temp_dir.path().join("hello-opened.txt");

    let result = run_ssv_with_secret(
        &[
            "seal",
            "-i",
            path_str(&plaintext_path),
            "-o",
            path_str(&envelope_path),
        ],
        "test",
    )
    .unwrap();
    assert_success(&result, "seal");

    let result = run_ssv_with_secret(
        &[
            "open",
            "-i",
            path_str(&envelope_path),
            "-o",
            path_str(&opened_path),
        ],
        "test",
    )
    .unwrap();
    assert_success(&result, "open");

    let original = fs::read(&plaintext_path).unwrap();
    let opened = fs::read(&opened_path).unwrap();
    assert_eq!(original, opened);
}

#[test]
fn test_open_into_directory() {
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();

    let result = run_ssv_with_secret(
        &[
            "open",
            "-i",
            path_str(&testdata_path("hello.txt.ssv")),
            "-d",
            path_str(&out_dir),
        ],
        "test",
    )
    .unwrap();
    assert_success(&result, "open");

    let opened = fs::read_to_string(out_dir.join("hello.txt")).unwrap();
    assert_eq!(opened, "Hello, world!\n");
}

#[test]
fn test_secret_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("hello-opened.txt");

    let result = ssv()
        .env("SSV_SECRET_KEY", "test")
        .args([
            "open",
            "-i",
            path_str(&testdata_path("hello.txt.ssv")),
            "-o",
            path_str(&output),
        ])
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert_success(&result, "open");
    assert_eq!(fs::read_to_string(&output).unwrap(), "Hello, world!\n");
}

#[test]
fn test_verbose_logging_goes_to_stderr() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("hello-opened.txt");
    let envelope = testdata_path("hello.txt.ssv");

    let quiet = run_ssv_with_secret(
        &["open", "-i", path_str(&envelope), "-o", path_str(&output)],
        "test",
    )
    .unwrap();
    assert_success(&quiet, "quiet open");
    assert!(quiet.stderr.is_empty());

    let verbose = run_ssv_with_secret(
        &["-vv", "open", "-i", path_str(&envelope), "-o", path_str(&output)],
        "test",
    )
    .unwrap();
    assert_success(&verbose, "verbose open");

    let stderr = String::from_utf8_lossy(&verbose.stderr);
    assert!(stderr.contains("parsed envelope header"), "got: {}", stderr);
    assert!(stderr.contains("opened envelope"), "got: {}", stderr);
    assert_eq!(String::from_utf8_lossy(&verbose.stdout), "hello.txt\n");
}

#[test]
fn test_missing_secret_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("hello-opened.txt");

    // No --secret-stdin, no SSV_SECRET_KEY, and stdin is not a terminal.
    let result = ssv()
        .args([
            "open",
            "-i",
            path_str(&testdata_path("hello.txt.ssv")),
            "-o",
            path_str(&output),
        ])
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("SSV_SECRET_KEY"), "got: {}", stderr);
    assert!(!output.exists());
}

#[test]
fn test_empty_secret_fails() {
    let temp_dir = TempDir::new().unwrap();
    let envelope = temp_dir.path().join("hello.txt.ssv");

    let result = run_ssv_with_secret(
        &[
            "seal",
            "-i",
            path_str(&testdata_path("hello.txt")),
            "-o",
            path_str(&envelope),
        ],
        "\n",
    )
    .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("empty"), "got: {}", stderr);
    assert!(!envelope.exists());
}

#[test]
fn test_open_with_wrong_secret_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("hello-opened.txt");

    let result = run_ssv_with_secret(
        &[
            "open",
            "-i",
            path_str(&testdata_path("hello.txt.ssv")),
            "-o",
            path_str(&output),
        ],
        "wrong",
    )
    .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("wrong secret or corrupt input"),
        "got: {}",
        stderr
    );
    assert!(!output.exists());
}

#[test]
fn test_update_operation() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext1 = temp_dir.path().join("plaintext1.txt");
    let plaintext2 = temp_dir.path().join("plaintext2.txt");
    let envelope = temp_dir.path().join("doc.ssv");
    let opened = temp_dir.path().join("opened.txt");

    fs::write(&plaintext1, "Original content").unwrap();

    let result = run_ssv_with_secret(
        &[
            "seal",
            "-i",
            path_str(&plaintext1),
            "-o",
            path_str(&envelope),
        ],
        "test",
    )
    .unwrap();
    assert_success(&result, "seal");

    fs::write(&plaintext2, "Updated content").unwrap();

    let result = run_ssv_with_secret(
        &[
            "update",
            "-i",
            path_str(&plaintext2),
            "-o",
            path_str(&envelope),
        ],
        "test",
    )
    .unwrap();
    assert_success(&result, "update");

    let result = run_ssv_with_secret(
        &["open", "-i", path_str(&envelope), "-o", path_str(&opened)],
        "test",
    )
    .unwrap();
    assert_success(&result, "open");
    assert_eq!(String::from_utf8_lossy(&result.stdout), "plaintext2.txt\n");

    let opened_content = fs::read_to_string(&opened).unwrap();
    assert_eq!(opened_content, "Updated content");
}

#[test]
fn test_update_with_wrong_secret_fails() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("plaintext.txt");
    let envelope = temp_dir.path().join("hello.txt.ssv");

    fs::copy(testdata_path("hello.txt.ssv"), &envelope).unwrap();
    fs::write(&plaintext, "Updated").unwrap();

    let result = run_ssv_with_secret(
        &[
            "update",
            "-i",
            path_str(&plaintext),
            "-o",
            path_str(&envelope),
        ],
        "wrong_secret",
    )
    .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("decrypt") || stderr.contains("secret"),
        "Expected error message about decryption/secret, got: {}",
        stderr
    );
    assert_eq!(
        fs::read(&envelope).unwrap(),
        fs::read(testdata_path("hello.txt.ssv")).unwrap()
    );
}

#[test]
fn test_inspect() {
    let result = ssv()
        .args(["inspect", "-i", path_str(&testdata_path("hello.txt.ssv"))])
        .output()
        .unwrap();

    assert_success(&result, "inspect");
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("version: 1"), "got: {}", stdout);
    assert!(
        stdout.contains("payload salt: 42424242424242424242424242424242"),
        "got: {}",
        stdout
    );
    assert!(stdout.contains("filename ciphertext: 16 bytes"), "got: {}", stdout);
}

#[test]
fn test_open_truncated_envelope_fails() {
    let temp_dir = TempDir::new().unwrap();
    let envelope = temp_dir.path().join("short.ssv");
    let output = temp_dir.path().join("output.txt");

    let full = fs::read(testdata_path("hello.txt.ssv")).unwrap();
    fs::write(&envelope, &full[..40]).unwrap();

    let result = run_ssv_with_secret(
        &["open", "-i", path_str(&envelope), "-o", path_str(&output)],
        "test",
    )
    .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("truncated"), "got: {}", stderr);
    assert!(!output.exists());
}

#[test]
fn test_open_future_version_fails() {
    let temp_dir = TempDir::new().unwrap();
    let envelope = temp_dir.path().join("future.ssv");
    let output = temp_dir.path().join("output.txt");

    let mut bytes = fs::read(testdata_path("hello.txt.ssv")).unwrap();
    bytes[..4].copy_from_slice(&2u32.to_be_bytes());
    fs::write(&envelope, &bytes).unwrap();

    let result = run_ssv_with_secret(
        &["open", "-i", path_str(&envelope), "-o", path_str(&output)],
        "test",
    )
    .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("unsupported envelope version 2"),
        "got: {}",
        stderr
    );
}

#[test]
fn test_open_nonexistent_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let nonexistent = temp_dir.path().join("nonexistent.ssv");
    let output = temp_dir.path().join("output.txt");

    let result = run_ssv_with_secret(
        &[
            "open",
            "-i",
            path_str(&nonexistent),
            "-o",
            path_str(&output),
        ],
        "test",
    )
    .unwrap();

    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn test_size_cap_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("big.bin");
    let envelope = temp_dir.path().join("big.bin.ssv");
    fs::write(&plaintext, vec![0u8; 2048]).unwrap();

    let result = ssv()
        .env("SSV_SECRET_KEY", "test")
        .env("SSV_MAX_FILE_SIZE", "1024")
        .args([
            "seal",
            "-i",
            path_str(&plaintext),
            "-o",
            path_str(&envelope),
        ])
        .output()
        .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("maximum input size"), "got: {}", stderr);
    assert!(!envelope.exists());
}

#[test]
fn test_envelope_size_cap_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("big.bin");
    let envelope = temp_dir.path().join("big.bin.ssv");
    let opened = temp_dir.path().join("big-opened.bin");
    fs::write(&plaintext, vec![0u8; 64 * 1024]).unwrap();

    let result = run_ssv_with_secret(
        &[
            "seal",
            "-i",
            path_str(&plaintext),
            "-o",
            path_str(&envelope),
        ],
        "test",
    )
    .unwrap();
    assert_success(&result, "seal");

    let result = ssv()
        .env("SSV_SECRET_KEY", "test")
        .env("SSV_MAX_FILE_SIZE", "1024")
        .args(["open", "-i", path_str(&envelope), "-o", path_str(&opened)])
        .output()
        .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("maximum input size"), "got: {}", stderr);
    assert!(!opened.exists());

    let result = ssv()
        .env("SSV_MAX_FILE_SIZE", "1024")
        .args(["inspect", "-i", path_str(&envelope)])
        .output()
        .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("maximum input size"), "got: {}", stderr);
}

#[test]
fn test_open_requires_destination() {
    let result = ssv()
        .env("SSV_SECRET_KEY", "test")
        .args(["open", "-i", path_str(&testdata_path("hello.txt.ssv"))])
        .output()
        .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("--output"), "got: {}", stderr);
}

#[test]
fn test_invalid_size_cap_fails() {
    let result = ssv()
        .env("SSV_MAX_FILE_SIZE", "lots")
        .args(["inspect", "-i", path_str(&testdata_path("hello.txt.ssv"))])
        .output()
        .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("SSV_MAX_FILE_SIZE"), "got: {}", stderr);
}

#[test]
fn test_empty_file_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("empty.txt");
    let envelope = temp_dir.path().join("empty.txt.ssv");
    let opened = temp_dir.path().join("empty-opened.txt");

    fs::write(&plaintext, b"").unwrap();

    let result = run_ssv_with_secret(
        &[
            "seal",
            "-i",
            path_str(&plaintext),
            "-o",
            path_str(&envelope),
        ],
        "test",
    )
    .unwrap();
    assert_success(&result, "seal");
    assert_eq!(fs::metadata(&envelope).unwrap().len(), 72 + 16 + 16);

    let result = run_ssv_with_secret(
        &["open", "-i", path_str(&envelope), "-o", path_str(&opened)],
        "test",
    )
    .unwrap();

    assert_success(&result, "open");
    let content = fs::read(&opened).unwrap();
    assert_eq!(content, b"");
}

#[test]
fn test_large_file_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("large.txt");
    let envelope = temp_dir.path().join("large.txt.ssv");
    let opened = temp_dir.path().join("large-opened.txt");

    let large_content = vec![0x42u8; 1024 * 1024];
    fs::write(&plaintext, &large_content).unwrap();

    let result = run_ssv_with_secret(
        &[
            "seal",
            "-i",
            path_str(&plaintext),
            "-o",
            path_str(&envelope),
        ],
        "test",
    )
    .unwrap();
    assert_success(&result, "seal");

    let result = run_ssv_with_secret(
        &["open", "-i", path_str(&envelope), "-o", path_str(&opened)],
        "test",
    )
    .unwrap();

    assert_success(&result, "open");
    let opened_content = fs::read(&opened).unwrap();
    assert_eq!(opened_content, large_content);
}
