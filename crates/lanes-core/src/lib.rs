pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod drag;
pub mod editor;
pub mod gateway;
pub mod projector;
pub mod render;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting lanes CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.lanesrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let api_url = cli
    .api_url
    .clone()
    .unwrap_or_else(|| cfg.api_url());
  let sort = cfg.sort_order()?;
  let renderer =
    render::Renderer::new(&cfg);

  let gateway =
    gateway::HttpGateway::new(&api_url)
      .with_context(|| {
        format!(
          "failed to build HTTP client \
           for {api_url}"
        )
      })?;
  info!(api_url = %gateway.base_url(), %sort, "using backend");

  let store =
    store::TaskStore::new(gateway);
  let mut board =
    board::Board::new(store, sort);

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(commands::dispatch(
    &mut board,
    &renderer,
    cli.command.unwrap_or_default()
  ))?;

  info!("done");
  Ok(())
}
