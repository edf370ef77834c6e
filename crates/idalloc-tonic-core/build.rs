/// Generates the gRPC client and server bindings for `proto/idalloc.proto`.
///
/// A file descriptor set is written next to the generated code so the server
/// can expose gRPC reflection. Generated code is reachable through
/// `idalloc_tonic_core::proto`.
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("idalloc_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/idalloc.proto");
    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/idalloc.proto"], &["proto"])
        .unwrap();
}
