//! # CLI
//!
//! Command-line configuration of the gateway, parsed with `clap`.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "porta", version, about = "Dynamic gRPC exploration gateway")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 8081)]
    pub port: u16,

    /// Directory where uploaded .proto files are staged
    #[arg(long, default_value = "./uploaded_protos")]
    pub staging_dir: PathBuf,

    /// Path of the compiled descriptor set emitted by protoc
    #[arg(long, default_value = "./compiled.protoset")]
    pub descriptor_out: PathBuf,

    /// Schema import root; may be repeated, order is preserved
    #[arg(long = "import-root")]
    pub import_root: Vec<PathBuf>,
}
