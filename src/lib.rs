pub mod category;
pub mod error;
pub mod gateway_state;
pub mod image_tensor;
pub mod io_struct;
pub mod server;

pub use category::ModelTables;
pub use error::{GatewayError, PipelineStage};
pub use gateway_state::{GatewayConfig, GatewayState};

/// Load the lookup tables and serve until the server stops.
///
/// Missing or malformed table files fail here, before anything is bound.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let tables = ModelTables::load(&config.category_index_path, &config.labels_path)
        .inspect_err(|e| log::error!("Error loading mapping files: {:#}", e))?;
    let gateway_state = GatewayState::new(&config, tables)?;
    server::startup(config, gateway_state).await?;
    Ok(())
}
