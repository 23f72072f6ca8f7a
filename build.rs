use std::process::Command;

fn main() {
    let git = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .and_then(|o| {
            if o.status.success() {
                String::from_utf8(o.stdout).ok()
            } else {
                None
            }
        })
        .unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=SUBHUB_GIT_COMMIT={}", git.trim());

    let build_time = chrono::Utc::now().to_rfc3339();
    println!("cargo:rustc-env=SUBHUB_BUILD_TIME={build_time}");
    println!("cargo:rerun-if-changed=build.rs");
}
