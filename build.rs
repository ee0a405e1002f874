//! Compiles the RPC contract into tonic client and server stubs.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = prost_build::Config::new();
    config.protoc_executable(protoc_bin_vendored::protoc_bin_path()?);

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos_with_config(config, &["proto/kvstore.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/kvstore.proto");
    Ok(())
}
