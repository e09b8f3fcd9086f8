//! Web service commands — `tuinbeheer serve` and `tuinbeheer init-db`.

use anyhow::Result;
use console::style;

use tuinbeheer::config::TuinConfig;
use tuinbeheer::ui::icons::{CHECK, PLANT};
use tuinbeheer::web::{ServerConfig, open_database, start_server};

pub async fn cmd_serve(
    config: &TuinConfig,
    host: Option<String>,
    port: Option<u16>,
    dev: bool,
) -> Result<()> {
    let mut server = ServerConfig::from_config(config);
    if let Some(host) = host {
        server.host = host;
    }
    if let Some(port) = port {
        server.port = port;
    }
    server.dev_mode |= dev;

    for warning in config.toml.validate() {
        tracing::warn!("{}", warning);
    }
    println!("{}{}", PLANT, style("Tuinbeheer").bold().green());
    start_server(config, server).await
}

pub fn cmd_init_db(config: &TuinConfig) -> Result<()> {
    let path = config.db_path();
    open_database(&path)?;
    println!("{}Database initialized at {}", CHECK, path.display());
    Ok(())
}
