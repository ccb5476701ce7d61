fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var("PROTOC", protobuf_src::protoc());
    tonic_build::configure().compile_protos(
        &[
            "proto/account.proto",
            "proto/ingestion.proto",
            "proto/query.proto",
        ],
        &["proto"],
    )?;
    Ok(())
}
