//! Demo runner behind the `ctxlog` binary: fan out concurrent writers into one
//! session, then drain it.

use anyhow::Context;
use clap::Parser;
use futures::future::join_all;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::session::{Fields, SessionRegistry};

#[derive(Debug, Parser)]
#[command(name = "ctxlog", version, about = "Accumulate fields from concurrent writers and drain them")]
pub struct Args {
    /// Number of concurrent writer tasks
    #[arg(long, default_value_t = 20)]
    pub writers: usize,

    /// Path to a TOML registry config
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Per-session queue capacity (overrides the config file)
    #[arg(long)]
    pub queue_capacity: Option<usize>,
}

impl Args {
    /// Resolve the registry config from the file and flag overrides
    pub fn registry_config(&self) -> anyhow::Result<RegistryConfig> {
        let mut config = match &self.config {
            Some(path) => RegistryConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => RegistryConfig::default(),
        };
        if let Some(queue_capacity) = self.queue_capacity {
            config = config.with_queue_capacity(queue_capacity)?;
        }
        Ok(config)
    }
}

/// Open a session, write `field<i> = i` from `args.writers` tasks, and drain it
pub async fn run(args: Args) -> anyhow::Result<Fields> {
    let registry = Arc::new(SessionRegistry::with_config(args.registry_config()?));
    let id = registry.open();
    info!("Spawning {} writers into session {}", args.writers, id);

    let writers = (0..args.writers).map(|i| {
        let registry = Arc::clone(&registry);
        let id = id.clone();
        tokio::spawn(async move { registry.write(&id, format!("field{}", i), i).await })
    });
    for result in join_all(writers).await {
        result??;
    }

    Ok(registry.drain(&id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from(["ctxlog", "--writers", "5", "--queue-capacity", "2"]).unwrap();
        assert_eq!(args.writers, 5);
        assert_eq!(args.registry_config().unwrap().queue_capacity, 2);

        let defaults = Args::try_parse_from(["ctxlog"]).unwrap();
        assert_eq!(defaults.writers, 20);
        assert_eq!(defaults.registry_config().unwrap(), RegistryConfig::default());
    }

    #[test]
    fn test_flag_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "queue_capacity = 9").unwrap();
        let path = file.path().to_str().unwrap();

        let args = Args::try_parse_from(["ctxlog", "--config", path]).unwrap();
        assert_eq!(args.registry_config().unwrap().queue_capacity, 9);

        let args =
            Args::try_parse_from(["ctxlog", "--config", path, "--queue-capacity", "4"]).unwrap();
        assert_eq!(args.registry_config().unwrap().queue_capacity, 4);
    }

    #[test]
    fn test_zero_capacity_flag_rejected() {
        let args = Args::try_parse_from(["ctxlog", "--queue-capacity", "0"]).unwrap();
        assert!(args.registry_config().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_collects_every_writer() {
        let args = Args::try_parse_from(["ctxlog", "--writers", "12", "--queue-capacity", "1"]).unwrap();
        let fields = run(args).await.unwrap();

        assert_eq!(fields.len(), 12);
        for i in 0..12 {
            assert_eq!(fields[&format!("field{}", i)], json!(i));
        }
    }
}
