use equipviz::app;
use equipviz::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = AppConfig::from_env();

    // Start the web application
    app::run(config).await?;

    Ok(())
}
