// build.rs
//
// Stamps the binary with its build time. main.rs pulls the constant in
// with include!(concat!(env!("OUT_DIR"), "/build_info.rs")).

use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("build_info.rs");

    let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    fs::write(
        &dest_path,
        format!("pub const BUILD_DATE: &str = \"{}\";", stamp),
    )
    .unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
