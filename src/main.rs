use std::{
    fs,
    io::{self, BufWriter},
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cache_sim::{
    runner::{Options, Runner},
    trace::Trace,
    Config, IsCache,
};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut args = pico_args::Arguments::from_env();
    let opts = Options {
        warmup: args
            .opt_value_from_str("-w")
            .context("-w should be an integer")?
            .unwrap_or(0),
        heartbeat: args
            .opt_value_from_str("-h")
            .context("-h should be an integer")?
            .unwrap_or(0),
        verbose: args.contains("--verbose"),
    };
    let flush = args.contains("--flush");

    let config = if let Some(config_str) = args.opt_value_from_str::<_, String>("--config")? {
        Config::from_json(&config_str).context("bad --config json")?
    } else if let Some(config_path) = args.opt_value_from_str::<_, String>("-p")? {
        let config_str = fs::read_to_string(&config_path)
            .with_context(|| format!("could not read config file {config_path}"))?;
        Config::from_json(&config_str)
            .with_context(|| format!("bad config file {config_path}"))?
    } else {
        Config::default()
    };
    let mut cache = config.to_cache()?;

    let stats_path: Option<String> = args.opt_value_from_str("--json")?;
    let trace_path: String = args
        .opt_value_from_str("-t")?
        .context("must provide a trace with -t")?;
    let records_per_block: usize = args
        .opt_value_from_str("--buffer-size")
        .context("--buffer-size must be an integer")?
        .unwrap_or(1024 * 16);
    let blocks_per_queue: usize = args
        .opt_value_from_str("--queue-size")
        .context("--queue-size must be an integer")?
        .unwrap_or(32);

    let rest = args.finish();
    if !rest.is_empty() {
        bail!("unexpected arguments: {rest:?}");
    }

    let trace = Trace::read(trace_path.clone().into(), records_per_block, blocks_per_queue)
        .with_context(|| format!("could not open trace {trace_path}"))?;
    info!(cache = cache.name(), geometry = ?cache.geometry(), trace = %trace_path, "replaying");

    let mut runner = Runner::new(BufWriter::new(io::stdout().lock()), opts);
    let summary = runner.run(cache.as_mut(), trace.rec.iter())?;
    info!(?summary, "replay finished");

    if flush {
        let flushed = cache.flush()?;
        info!(flushed, "flushed dirty lines");
    }

    if let Some(stats_path) = stats_path {
        let stats_file = fs::File::create(&stats_path)
            .with_context(|| format!("cannot open output file {stats_path}"))?;
        serde_json::to_writer_pretty(stats_file, &cache.make_stats())?;
    }
    Ok(())
}
