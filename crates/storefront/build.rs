//! Build script for the storefront crate.
//!
//! Fingerprints the grid stylesheet so the layout can reference it with a
//! cache-busting version parameter.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    fingerprint_css();
}

/// Hash `static/css/catalog.css` and expose the first 8 hex chars as
/// `CATALOG_CSS_HASH` for `env!` in the templates module.
fn fingerprint_css() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let css_path = Path::new(&manifest_dir).join("static/css/catalog.css");

    println!("cargo:rerun-if-changed={}", css_path.display());

    let content = match fs::read(&css_path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read catalog.css: {e}");
            println!("cargo:rustc-env=CATALOG_CSS_HASH=dev");
            return;
        }
    };

    let hash = format!("{:x}", Sha256::digest(&content));
    let short_hash = hash.get(..8).unwrap_or("dev");

    println!("cargo:rustc-env=CATALOG_CSS_HASH={short_hash}");
}
