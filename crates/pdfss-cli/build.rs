use std::env;
use std::path::PathBuf;

fn main() {
    let manifest_dir = env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    // outside of a git checkout (e.g. a packaged crate) keep the manifest version
    let version = pdfss_version::describe_repo(&manifest_dir)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| env::var("CARGO_PKG_VERSION").unwrap_or_default());

    println!("cargo:rustc-env=PDFSS_VERSION={version}");
    for path in pdfss_version::version_inputs(&manifest_dir.join("../../.git")) {
        println!("cargo:rerun-if-changed={}", path.display());
    }
}
