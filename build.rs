use anyhow::*;
use fs_extra::copy_items;
use fs_extra::dir::CopyOptions;
use std::env;
use std::path::PathBuf;

/// Stages `assets/` (scene configuration, video) next to the build output and,
/// for wasm builds, the page hosting the canvas and the `<video>` element.
fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=assets");
    println!("cargo:rerun-if-changed=web");

    let out_dir = env::var("OUT_DIR")?;
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let mut copy_options = CopyOptions::new();
    copy_options.overwrite = true;

    let mut staged = Vec::new();
    if manifest_dir.join("assets").exists() {
        staged.push(manifest_dir.join("assets"));
    }
    if env::var("CARGO_CFG_TARGET_ARCH").is_ok_and(|arch| arch == "wasm32") {
        let page = manifest_dir.join("web").join("index.html");
        if page.exists() {
            staged.push(page);
        }
    }
    if !staged.is_empty() {
        copy_items(&staged, &out_dir, &copy_options)
            .with_context(|| format!("staging {} item(s) into {out_dir}", staged.len()))?;
    }

    Ok(())
}
