use anyhow::Result;

pub async fn start(
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<String>,
) -> Result<()> {
    let mut config = super::config_from_env();
    if let Some(host) = host {
        config.bind_host = host;
    }
    if let Some(port) = port {
        config.rest_port = port;
    }
    if let Some(data_dir) = data_dir {
        config.engine_config.data_dir = data_dir;
    }

    println!("starting Cadence server...");
    println!("  REST: http://{}:{}", config.bind_host, config.rest_port);
    println!("  data: {}", config.engine_config.data_dir);

    cadence_server::start_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(())
}
