//! E2E tests for the jnitramp binary
//!
//! Each test runs in its own temp directory with HOME pointed at it, so no
//! user or project config leaks in.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn jnitramp(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jnitramp"))
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env_remove("JNITRAMP_OUTPUT")
        .env_remove("JNITRAMP_SCOPE")
        .env_remove("JNITRAMP_FORMAT")
        .env_remove("JNITRAMP_LOG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute jnitramp")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

const VENDOR: &str = r#"
[[variant]]
family = "nativeForkSystemServer"
version = "vendor_t"
priority = "prepend"
args = [
    { name = "uid", type = "I" },
    { name = "gid", type = "I" },
    { name = "gids", type = "[I" },
    { name = "runtime_flags", type = "I" },
    { type = "Z" },
    { name = "rlimits", type = "[[I" },
    { name = "permitted_capabilities", type = "J" },
    { name = "effective_capabilities", type = "J" },
]
"#;

// ========== generate ==========

#[test]
fn e2e_generate_writes_default_header() {
    let dir = TempDir::new().unwrap();
    let output = jnitramp(dir.path(), &["generate"]);
    assert!(output.status.success(), "{:?}", output);

    let header = fs::read_to_string(dir.path().join("jni_hooks.h")).unwrap();
    assert!(header.contains("#ifndef JNI_HOOKS_H"));
    assert!(header.contains("static const int nativeForkAndSpecialize_methods_count = 12;"));
    assert!(header.contains("static void do_hook_zygote(JNIEnv *env) {"));
}

#[test]
fn e2e_generate_json_to_stdout() {
    let dir = TempDir::new().unwrap();
    let output = jnitramp(dir.path(), &["generate", "-o", "-", "--format", "json"]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["families"].as_array().unwrap().len(), 3);
    assert_eq!(value["digest"].as_str().unwrap().len(), 64);
}

#[test]
fn e2e_generate_with_catalog_flag() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("vendor.toml"), VENDOR).unwrap();

    let output = jnitramp(
        dir.path(),
        &["generate", "-o", "out/hooks.h", "--catalog", "vendor.toml"],
    );
    assert!(output.status.success(), "{:?}", output);

    let header = fs::read_to_string(dir.path().join("out/hooks.h")).unwrap();
    assert!(header.contains("(void *) &nativeForkSystemServer_vendor_t"));
    assert!(header.contains("static JNINativeMethod nativeForkSystemServer_methods[3] = {"));
}

#[test]
fn e2e_generate_rejects_bad_catalog() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bad.toml"), "[[variant]]\nfamily = \"nope\"\n").unwrap();

    let output = jnitramp(dir.path(), &["generate", "--catalog", "bad.toml"]);
    assert!(!output.status.success());
    assert!(!dir.path().join("jni_hooks.h").exists());
}

#[test]
fn e2e_project_config_disables_family() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".jnitramp")).unwrap();
    fs::write(
        dir.path().join(".jnitramp/config.toml"),
        "[catalog]\ndisabled_families = [\"nativeSpecializeAppProcess\"]\n\n[output]\nheader_guard = \"ZYGOTE_HOOKS_H\"\n",
    )
    .unwrap();

    let output = jnitramp(dir.path(), &["generate", "-o", "-"]);
    assert!(output.status.success());
    let header = stdout(&output);
    assert!(header.contains("#define ZYGOTE_HOOKS_H"));
    assert!(!header.contains("nativeSpecializeAppProcess"));
    assert!(header.contains("JNINativeMethod hooks[2];"));
}

// ========== list ==========

#[test]
fn e2e_list_family() {
    let dir = TempDir::new().unwrap();
    let output = jnitramp(dir.path(), &["list", "--family", "nativeForkSystemServer"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("nativeForkSystemServer_l"));
    assert!(text.contains("(II[IIII[[IJJ)I"));
    assert!(!text.contains("nativeForkAndSpecialize"));
}

#[test]
fn e2e_list_unknown_family_fails() {
    let dir = TempDir::new().unwrap();
    let output = jnitramp(dir.path(), &["list", "--family", "nativeForkEverything"]);
    assert!(!output.status.success());
}

// ========== check ==========

#[test]
fn e2e_check_fresh_header_passes() {
    let dir = TempDir::new().unwrap();
    assert!(jnitramp(dir.path(), &["generate"]).status.success());

    let output = jnitramp(dir.path(), &["check", "jni_hooks.h"]);
    assert!(output.status.success(), "{:?}", output);
}

#[test]
fn e2e_check_detects_stale_header() {
    let dir = TempDir::new().unwrap();
    assert!(jnitramp(dir.path(), &["generate"]).status.success());
    fs::write(dir.path().join("vendor.toml"), VENDOR).unwrap();

    let output = jnitramp(dir.path(), &["check", "jni_hooks.h", "--catalog", "vendor.toml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("stale"));
}

#[test]
fn e2e_check_detects_output_config_change() {
    let dir = TempDir::new().unwrap();
    assert!(jnitramp(dir.path(), &["generate"]).status.success());
    fs::create_dir_all(dir.path().join(".jnitramp")).unwrap();
    fs::write(
        dir.path().join(".jnitramp/config.toml"),
        "[output]\nheader_guard = \"ZYGOTE_HOOKS_H\"\n",
    )
    .unwrap();

    let output = jnitramp(dir.path(), &["check", "jni_hooks.h"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("content differs"));
}

#[test]
fn e2e_check_detects_runtime_config_change() {
    let dir = TempDir::new().unwrap();
    assert!(jnitramp(dir.path(), &["generate"]).status.success());
    fs::create_dir_all(dir.path().join(".jnitramp")).unwrap();
    fs::write(
        dir.path().join(".jnitramp/config.toml"),
        "[runtime]\nhook_prefix = \"zz_\"\n",
    )
    .unwrap();

    let output = jnitramp(dir.path(), &["check", "jni_hooks.h"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("is stale"));
}

#[test]
fn e2e_generate_rejects_reserved_argument_name() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("vendor.toml"),
        VENDOR.replace("{ type = \"Z\" }", "{ name = \"ctx\", type = \"Z\" }"),
    )
    .unwrap();

    let output = jnitramp(dir.path(), &["generate", "--catalog", "vendor.toml"]);
    assert!(!output.status.success());
    assert!(!dir.path().join("jni_hooks.h").exists());
}

#[test]
fn e2e_check_missing_header_fails() {
    let dir = TempDir::new().unwrap();
    let output = jnitramp(dir.path(), &["check", "nowhere.h"]);
    assert!(!output.status.success());
}

// ========== simulate ==========

#[test]
fn e2e_simulate_selects_live_variant() {
    let dir = TempDir::new().unwrap();
    let output = jnitramp(
        dir.path(),
        &[
            "simulate",
            "--json",
            "--live",
            "nativeForkSystemServer:(II[IIII[[IJJ)I",
        ],
    );
    assert!(output.status.success(), "{:?}", output);

    let hooks: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(hooks["scope"], "com/android/internal/os/Zygote");
    assert_eq!(hooks["hooks"].as_array().unwrap().len(), 1);
    assert_eq!(
        hooks["hooks"][0]["entry_point"],
        "nativeForkSystemServer_samsung_q"
    );
}

#[test]
fn e2e_simulate_unknown_build_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let output = jnitramp(dir.path(), &["simulate", "--live", "nativeForkSystemServer:(I)I"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("0 hook(s) registered"));
}

// ========== config ==========

#[test]
fn e2e_config_show_returns_valid_toml() {
    let dir = TempDir::new().unwrap();
    let output = jnitramp(dir.path(), &["config", "show"]);
    assert!(output.status.success());

    let parsed: jnitramp_config::Config = toml::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed, jnitramp_config::Config::default());
}

#[test]
fn e2e_config_path_lists_both_locations() {
    let dir = TempDir::new().unwrap();
    let output = jnitramp(dir.path(), &["config", "path"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains(".jnitramp/config.toml"));
    assert!(text.contains("global:"));
    assert!(text.contains("project:"));
}
