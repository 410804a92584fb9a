//! Build script: embeds the git hash and checks GPU toolkits.
//!
//! The GPU checks run before whisper-rs-sys compiles so a missing toolkit
//! fails with a readable message instead of a cmake error.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        require_tool("nvcc", &["--version"], "CUDA toolkit", "cuda");
    }
    if cfg!(feature = "vulkan") {
        require_tool("vulkaninfo", &["--summary"], "Vulkan SDK", "vulkan");
    }
}

fn require_tool(program: &str, args: &[&str], toolkit: &str, feature: &str) {
    let found = Command::new(program).args(args).output().is_ok();
    if !found {
        panic!(
            "\n\n`{program}` not found: the {toolkit} is not installed.\n\
             Install it, or build without the `{feature}` feature: cargo build --release\n"
        );
    }
    println!("cargo::warning={toolkit} detected");
}
