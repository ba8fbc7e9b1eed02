#![forbid(unsafe_code)]

// Capture git and compiler details for the startup banner and /version.
// Builds from a source tarball have no git metadata, so every value falls
// back to "unknown" instead of failing the build.
fn main() {
    let unknown = |_| "unknown".to_string();

    set_env("GIT_BRANCH", build_data::get_git_branch().unwrap_or_else(unknown));
    set_env("GIT_COMMIT_SHORT", build_data::get_git_commit_short().unwrap_or_else(unknown));
    set_env("GIT_DIRTY", build_data::get_git_dirty()
        .map(|d| d.to_string())
        .unwrap_or_else(unknown));
    // BUILD_TIMESTAMP would make builds unreproducible.
    set_env("SOURCE_TIMESTAMP", build_data::get_source_time()
        .map(build_data::format_timestamp)
        .unwrap_or_else(unknown));
    set_env("RUSTC_VERSION", build_data::get_rustc_version().unwrap_or_else(unknown));
}

fn set_env(key: &str, value: String) {
    println!("cargo:rustc-env={}={}", key, value);
}
