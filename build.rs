//! Purpose: Link the prebuilt StateDB native parser when the `native` feature is enabled.
//! Role: Cargo build-script; resolves the library directory and emits link directives.
//! Invariants: Without the `native` feature nothing is linked and the script is a no-op.
//! Invariants: `STATEDB_PARSER_LIB_DIR` overrides the default `release/statedb-<arch>-<os>` layout.
//! Invariants: Uses only Cargo-provided env vars plus the documented override.
use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=STATEDB_PARSER_LIB_DIR");

    if env::var_os("CARGO_FEATURE_NATIVE").is_none() {
        return;
    }

    let lib_dir = match env::var_os("STATEDB_PARSER_LIB_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => default_release_dir(),
    };

    if !lib_dir.is_dir() {
        panic!(
            "StateDB native parser directory `{}` does not exist.\n\
             Fix: build the native release first, or set STATEDB_PARSER_LIB_DIR to the directory \
             containing the statedb_parser shared library.",
            lib_dir.display()
        );
    }

    println!("cargo:rerun-if-changed={}", lib_dir.display());
    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-lib=dylib=statedb_parser");
}

fn default_release_dir() -> PathBuf {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    let arch = match target_arch.as_str() {
        "x86_64" => "x86_64",
        "aarch64" => "aarch64",
        other => panic!("unsupported architecture for the StateDB native parser: `{other}`"),
    };
    let (os, lib_subdir) = match target_os.as_str() {
        "linux" => ("linux", "lib"),
        "macos" => ("macos", "lib"),
        "windows" => ("windows", "bin"),
        other => panic!("unsupported operating system for the StateDB native parser: `{other}`"),
    };

    manifest_dir
        .join("release")
        .join(format!("statedb-{arch}-{os}"))
        .join(lib_subdir)
}
