use fitgate::{ConfigBuilder, RestDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigBuilder::new().from_env().build();
    fitgate::init_tracing_with_config(&config);

    config.platform.validate()?;

    let directory = RestDirectory::new(&config.platform)?;
    fitgate::serve(config, directory).await?;

    Ok(())
}
