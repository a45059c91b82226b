use clap::Parser;
use leafscan_gateway::gateway_state::DEFAULT_BACKEND_URL;
use leafscan_gateway::{GatewayConfig, server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "0.0.0.0", help = "Host address to bind the server to")]
    host: String,

    #[arg(long, default_value_t = 5000, help = "Port number to listen on")]
    port: u16,

    #[arg(
        long,
        default_value = DEFAULT_BACKEND_URL,
        help = "Prediction endpoint of the inference server"
    )]
    backend_url: String,

    #[arg(
        long,
        default_value = "crop_name_to_index.txt",
        help = "File of 'name:index' lines mapping crop types to model indices"
    )]
    category_index_path: PathBuf,

    #[arg(
        long,
        default_value = "disease_labels.txt",
        help = "File of disease labels, one per line, in model output order"
    )]
    labels_path: PathBuf,

    #[arg(long, default_value_t = 30, help = "Timeout in seconds for a backend call")]
    request_timeout_secs: u64,

    #[arg(long, default_value_t = 5, help = "Timeout in seconds for connecting to the backend")]
    connect_timeout_secs: u64,

    #[arg(long, default_value_t = 32 * 1024 * 1024, help = "Maximum request body size in bytes")]
    max_payload_size: usize,

    #[arg(long, default_value = "info", help = "Log level: error, warn, info, debug or trace")]
    log_level: log::LevelFilter,
}

impl From<Args> for GatewayConfig {
    fn from(args: Args) -> Self {
        GatewayConfig {
            host: args.host,
            port: args.port,
            backend_url: args.backend_url,
            category_index_path: args.category_index_path,
            labels_path: args.labels_path,
            request_timeout_secs: args.request_timeout_secs,
            connect_timeout_secs: args.connect_timeout_secs,
            max_payload_size: args.max_payload_size,
            log_level: args.log_level,
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from(Args::parse());
    server::init_logging(config.log_level);
    leafscan_gateway::run(config).await
}
