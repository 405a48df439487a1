// The custom build script, needed as we use tonic/prost.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/ensembl_metadata.proto");
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile_protos(&["proto/ensembl_metadata.proto"], &["proto"])?;
    Ok(())
}
