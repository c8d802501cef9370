use std::env;
use std::fs;
use std::path::PathBuf;

use debugwire_schema::{compile_to_dir, CodegenConfig, ProtocolDescription};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));
    let input = manifest_dir.join("protocol").join("fixture.json");
    println!("cargo:rerun-if-changed={}", input.display());

    let description = ProtocolDescription::from_file(&input).expect("fixture protocol should parse");
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let dir = out_dir.join("protocol");

    let (report, _) = compile_to_dir(&description, &CodegenConfig::default(), &dir)
        .expect("fixture bindings should be written");
    assert!(
        report.is_clean(),
        "fixture protocol left items out: {:?}",
        report.skipped
    );

    let module = format!(
        "#[path = {:?}]\npub mod protocol;\n",
        dir.join("mod.rs").display().to_string()
    );
    fs::write(out_dir.join("protocol.rs"), module).expect("module stub should be written");
}
