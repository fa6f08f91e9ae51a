use clap::Parser;

/// Entry point for the `ctxlog` demo
///
/// Thin wrapper that delegates to the library crate.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let fields = ctxlog_lib::cli::run(ctxlog_lib::cli::Args::parse()).await?;
    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}
