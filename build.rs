//! Build script for synth-fs that emits git metadata via vergen.

/// Emit compile-time git metadata so the startup log can name the exact build.
///
/// `GIT_SHA` takes precedence when set, for builds made outside a checkout.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-env-changed=GIT_SHA");
    if let Ok(sha) = std::env::var("GIT_SHA") {
        println!("cargo:rustc-env=VERGEN_GIT_SHA={sha}");
    } else {
        use vergen_gitcl::{Emitter, GitclBuilder};
        let gitcl = GitclBuilder::default().sha(true).build()?;
        Emitter::default().add_instructions(&gitcl)?.emit()?;
    }

    Ok(())
}
