use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use polars::prelude::*;

use taqpick::report::{csv_writer, write_csv_rows, DesignResponse, Envelope, HEALTHY};
use taqpick::{DesignError, DesignResult, Designer, PipelineConfig};

/// taqpick CLI
#[derive(Parser)]
#[command(name = "taqpick")]
#[command(version)]
#[command(about = "PCR primer pair and TaqMan probe design with GC profiling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Design primers and probes for one or more FASTA/raw sequence files
    Design {
        /// Input files (FASTA or raw sequence text)
        files: Vec<PathBuf>,
        /// Also read one request from stdin
        #[arg(long)]
        stdin: bool,
        /// Emit JSON envelopes instead of a table
        #[arg(long, conflicts_with = "csv")]
        json: bool,
        /// Emit CSV to stdout
        #[arg(long)]
        csv: bool,
        /// Write GC plots into this directory instead of inlining them
        #[arg(long)]
        plot_dir: Option<PathBuf>,
        /// Do not submit primers to NCBI BLAST
        #[arg(long)]
        no_blast: bool,
        /// Threads (0/None = all)
        #[arg(long)]
        threads: Option<usize>,
        /// GC sliding-window length
        #[arg(long)]
        window: Option<usize>,
        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Answer newline-delimited JSON requests on stdin
    Serve {
        /// Write GC plots into this directory instead of inlining them
        #[arg(long)]
        plot_dir: Option<PathBuf>,
        /// Do not submit primers to NCBI BLAST
        #[arg(long)]
        no_blast: bool,
        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the health status
    Health,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Design { files, stdin, json, csv, plot_dir, no_blast, threads, window, config } => {
            if files.is_empty() && !stdin {
                bail!("no input: pass one or more files or --stdin");
            }
            let mut cfg = load_config(config, plot_dir, no_blast)?;
            if let Some(w) = window {
                cfg.window = w;
            }
            let designer = Designer::new(cfg)?;

            let mut inputs: Vec<(String, String)> = Vec::new();
            for f in &files {
                let text = std::fs::read_to_string(f).with_context(|| format!("reading {}", f.display()))?;
                inputs.push((f.display().to_string(), text));
            }
            if stdin {
                let mut text = String::new();
                std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
                inputs.push(("<stdin>".to_string(), text));
            }

            let results = design_batch(&designer, inputs, threads)?;
            if json {
                print_json(&results)?;
            } else if csv {
                print_csv(&results)?;
            } else {
                print_tables(&results)?;
            }
            if results.iter().any(|(_, r)| r.is_err()) {
                std::process::exit(1);
            }
        }

        Commands::Serve { plot_dir, no_blast, config } => {
            let cfg = load_config(config, plot_dir, no_blast)?;
            let designer = Designer::new(cfg)?;
            log::info!("taqpick {} serving on stdin", taqpick::VERSION);
            taqpick::serve::run_stdio_server(&designer).context("serve loop")?;
        }

        Commands::Health => {
            println!("{}", serde_json::to_string(&HEALTHY)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>, plot_dir: Option<PathBuf>, no_blast: bool) -> anyhow::Result<PipelineConfig> {
    let mut cfg = match path {
        Some(p) => PipelineConfig::from_json_file(p)?,
        None => PipelineConfig::default(),
    };
    if plot_dir.is_some() {
        cfg.plot_dir = plot_dir;
    }
    if no_blast {
        cfg.blast_enabled = false;
    }
    Ok(cfg)
}

type Outcome = (String, Result<DesignResult, DesignError>);

/// Each input is an independent request; run them in a local rayon pool.
fn design_batch(designer: &Designer, inputs: Vec<(String, String)>, threads: Option<usize>) -> anyhow::Result<Vec<Outcome>> {
    use rayon::prelude::*;

    let n = threads.filter(|&t| t > 0).unwrap_or_else(num_cpus::get);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
    Ok(pool.install(|| {
        inputs
            .into_par_iter()
            .map(|(source, text)| {
                let r = designer.design(&text);
                if let Err(e) = &r {
                    log::error!("{source}: {e}");
                }
                (source, r)
            })
            .collect()
    }))
}

fn print_json(results: &[Outcome]) -> anyhow::Result<()> {
    for (source, r) in results {
        let envelope = match r {
            Ok(result) => serde_json::to_value(Envelope::ok(DesignResponse::from(result)))?,
            Err(e) => serde_json::to_value(Envelope::<()>::from(e))?,
        };
        println!("{}", serde_json::json!({ "source": source, "response": envelope }));
    }
    Ok(())
}

fn print_csv(results: &[Outcome]) -> anyhow::Result<()> {
    let mut w = csv_writer(std::io::stdout())?;
    for (source, r) in results {
        if let Ok(result) = r {
            write_csv_rows(&mut w, source, result)?;
        }
    }
    w.flush()?;
    Ok(())
}

fn print_tables(results: &[Outcome]) -> anyhow::Result<()> {
    // Show all columns and full cell width.
    std::env::set_var("POLARS_FMT_TABLE_FORMATTING", "UTF8_FULL");
    std::env::set_var("POLARS_FMT_MAX_COLS", "100000");
    std::env::set_var("POLARS_FMT_MAX_ROWS", "1000000");
    std::env::set_var("POLARS_FMT_STR_LEN", "100000");
    std::env::set_var("POLARS_TABLE_WIDTH", "65535");

    for (source, r) in results {
        match r {
            Ok(result) => {
                println!("{source}: {} bp, {} of {} pair(s) with a probe", result.sequence_length, result.pairs.len(), result.candidates);
                if let (Some(lo), Some(hi), Some(mean)) = (result.gc_series.min(), result.gc_series.max(), result.gc_series.mean()) {
                    println!("GC ({}-base window): min {lo:.1}% / mean {mean:.1}% / max {hi:.1}%", result.gc_series.window());
                }
                for w in &result.warnings {
                    println!("warning: {w}");
                }
                if !result.pairs.is_empty() {
                    println!("{}", pairs_frame(result)?);
                }
                if let taqpick::plot::PlotArtifact::File { path } = &result.gc_plot {
                    println!("plot: {}", path.display());
                }
            }
            Err(e) => eprintln!("{source}: {e}"),
        }
    }
    Ok(())
}

fn pairs_frame(result: &DesignResult) -> PolarsResult<DataFrame> {
    let p = &result.pairs;
    df!(
        "forward"     => p.iter().map(|r| r.forward.clone()).collect::<Vec<_>>(),
        "reverse"     => p.iter().map(|r| r.reverse.clone()).collect::<Vec<_>>(),
        "fwd_tm"      => p.iter().map(|r| round1(r.forward_tm)).collect::<Vec<_>>(),
        "rev_tm"      => p.iter().map(|r| round1(r.reverse_tm)).collect::<Vec<_>>(),
        "fwd_gc"      => p.iter().map(|r| round1(r.forward_gc)).collect::<Vec<_>>(),
        "rev_gc"      => p.iter().map(|r| round1(r.reverse_gc)).collect::<Vec<_>>(),
        "penalty"     => p.iter().map(|r| (r.penalty * 1000.0).round() / 1000.0).collect::<Vec<_>>(),
        "product"     => p.iter().map(|r| r.product_size).collect::<Vec<_>>(),
        "probe"       => p.iter().map(|r| r.probe.sequence.clone()).collect::<Vec<_>>(),
        "probe_tm"    => p.iter().map(|r| round1(r.probe.tm)).collect::<Vec<_>>(),
        "blast_fwd"   => p.iter().map(|r| r.blast_forward.clone()).collect::<Vec<_>>(),
        "blast_rev"   => p.iter().map(|r| r.blast_reverse.clone()).collect::<Vec<_>>(),
    )
}

fn round1(x: f64) -> f64 { (x * 10.0).round() / 10.0 }
