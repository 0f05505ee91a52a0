use std::process::Command;

/// Short commit id for `--version`; builds outside a checkout say "unknown".
fn commit() -> Option<String> {
    let out = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    let id = String::from_utf8(out.stdout).ok()?;
    (out.status.success() && !id.trim().is_empty()).then(|| id.trim().to_owned())
}

fn main() {
    let id = commit().unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=RUPEEBEAN_BUILD_SHA={id}");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
