use std::process::Command;

fn weft() -> Command {
    Command::new(env!("CARGO_BIN_EXE_weft"))
}

fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("weft-test-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).expect("failed to write temp file");
    path
}

// --- Inline templates against the demonstration context ---

#[test]
fn inline_plain_text() {
    let out = weft()
        .arg("Hello, World!")
        .output()
        .expect("failed to run weft");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "Hello, World!\n");
}

#[test]
fn inline_demo_variable() {
    let out = weft()
        .arg("Hello, {{ .name }}!")
        .output()
        .expect("failed to run weft");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "Hello, World!\n");
}

#[test]
fn inline_demo_range() {
    let out = weft()
        .arg("{{range .items}}{{.}},{{end}}")
        .output()
        .expect("failed to run weft");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        String::from_utf8_lossy(&out.stdout),
        "apple,banana,cherry,\n"
    );
}

#[test]
fn inline_function_call() {
    let out = weft()
        .arg("{{upper(.name)}}")
        .output()
        .expect("failed to run weft");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "WORLD\n");
}

// --- File mode ---

#[test]
fn template_file_is_read_from_disk() {
    let path = temp_file("greeting.tmpl", "File says: {{ .name }}");
    let out = weft().arg(&path).output().expect("failed to run weft");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "File says: World\n");
    let _ = std::fs::remove_file(path);
}

#[test]
fn json_context_file_overrides_demo_context() {
    let ctx = temp_file("ctx.json", r#"{"name": "Weft", "items": ["x"]}"#);
    let out = weft()
        .arg("{{ .name }}: {{range .items}}{{.}}{{end}}")
        .arg(&ctx)
        .output()
        .expect("failed to run weft");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "Weft: x\n");
    let _ = std::fs::remove_file(ctx);
}

#[test]
fn invalid_json_context_errors() {
    let ctx = temp_file("bad.json", "{not json");
    let out = weft()
        .arg("{{ .name }}")
        .arg(&ctx)
        .output()
        .expect("failed to run weft");
    assert!(!out.status.success());
    let _ = std::fs::remove_file(ctx);
}

// --- Errors ---

#[test]
fn no_args_shows_usage() {
    let out = weft().output().expect("failed to run weft");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Usage"), "expected usage, got: {stderr}");
}

#[test]
fn empty_template_errors() {
    let out = weft().arg("").output().expect("failed to run weft");
    assert!(!out.status.success());
}

#[test]
fn lex_error_reports_diagnostic() {
    let out = weft()
        .args(["--text", "{{ @ }}"])
        .output()
        .expect("failed to run weft");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("error[WEFT-L001]"), "got: {stderr}");
    assert!(stderr.contains("{{ @ }}"), "expected source snippet, got: {stderr}");
}

#[test]
fn json_error_mode_emits_parseable_object() {
    let out = weft()
        .args(["--json", "{{range .missing}}{{.}}{{end}}"])
        .output()
        .expect("failed to run weft");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    let line = stderr.lines().next().expect("expected a diagnostic line");
    let v: serde_json::Value = serde_json::from_str(line).expect("diagnostic should be JSON");
    assert_eq!(v["severity"], "error");
    assert_eq!(v["code"], "WEFT-R001");
}

#[test]
fn conflicting_format_flags_error() {
    let out = weft()
        .args(["--json", "--text", "x"])
        .output()
        .expect("failed to run weft");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("mutually exclusive"), "got: {stderr}");
}

// --- Misc ---

#[test]
fn version_flag() {
    let out = weft().arg("--version").output().expect("failed to run weft");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("weft "), "got: {stdout}");
}

#[test]
fn help_flag() {
    let out = weft().arg("--help").output().expect("failed to run weft");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Usage"), "got: {stdout}");
}
