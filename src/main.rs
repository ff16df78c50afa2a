use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use futures::StreamExt;
use std::fs::File;
use std::io::BufWriter;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use netpath::{
    config::DiagConfig,
    map::{DeferredMap, JsonLinesRenderer},
    output::{self, OutputFormat},
    Diagnostics, TraceReport,
};

fn build_cli() -> Command {
    Command::new("netpath")
        .version(env!("CARGO_PKG_VERSION"))
        .about("ICMP reachability sweeps and path tracing with hop geolocation")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file (defaults to ~/.netpath.toml)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print results as JSON")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("no-geo")
                .long("no-geo")
                .help("Do not look up hop locations")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("ping")
                .about("Send a single echo request")
                .arg(Arg::new("target").value_name("TARGET").required(true)),
        )
        .subcommand(
            Command::new("scan")
                .about("Sweep PREFIX.START through PREFIX.END")
                .arg(Arg::new("prefix").value_name("PREFIX").help("e.g. 192.168.1").required(true))
                .arg(Arg::new("start").value_name("START").required(true))
                .arg(Arg::new("end").value_name("END").required(true))
                .arg(
                    Arg::new("parallel")
                        .long("parallel")
                        .value_name("N")
                        .help("Maximum probes in flight")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("trace")
                .about("Trace the route to a host")
                .arg(Arg::new("target").value_name("TARGET").required(true))
                .arg(
                    Arg::new("max-hops")
                        .long("max-hops")
                        .short('m')
                        .value_name("N")
                        .value_parser(clap::value_parser!(u8).range(1..)),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .short('t')
                        .value_name("MS")
                        .help("Per-hop timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("map-out")
                        .long("map-out")
                        .value_name("FILE")
                        .help("Write map commands as JSON lines"),
                ),
        )
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches.get_one::<String>(name).map(String::as_str).unwrap_or_default()
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<DiagConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => DiagConfig::from_toml_file(path)?,
        None => DiagConfig::load_default_config(),
    };
    if matches.get_flag("no-geo") {
        config = config.with_geo(false);
    }
    Ok(config)
}

async fn run_ping(diagnostics: &Diagnostics, matches: &ArgMatches, format: OutputFormat) -> anyhow::Result<()> {
    let target = arg(matches, "target");
    if format == OutputFormat::Text {
        println!("{} Pinging {}...", "[~]".bright_blue(), target);
    }

    let report = diagnostics.ping(target).await?;
    match format {
        OutputFormat::Json => println!("{}", output::to_json("ping", &report)?),
        OutputFormat::Text => println!("{}", output::format_ping(&report)),
    }
    Ok(())
}

async fn run_scan(diagnostics: &Diagnostics, matches: &ArgMatches, format: OutputFormat) -> anyhow::Result<()> {
    let (prefix, start, end) = (arg(matches, "prefix"), arg(matches, "start"), arg(matches, "end"));

    let request = netpath::ScanRequest::parse(prefix, start, end)?;
    if format == OutputFormat::Text {
        println!("{}", output::format_scan_header(&request.prefix.to_string(), start.trim(), end.trim()));
    }

    let report = diagnostics.scan(&request).await;
    match format {
        OutputFormat::Json => println!("{}", output::to_json("scan", &report)?),
        OutputFormat::Text => println!("{}", output::format_scan(&report)),
    }
    Ok(())
}

async fn run_trace(diagnostics: Diagnostics, matches: &ArgMatches, format: OutputFormat) -> anyhow::Result<()> {
    let target = arg(matches, "target");

    let mut options = diagnostics.trace_options();
    if let Some(&max_hops) = matches.get_one::<u8>("max-hops") {
        options = options.with_max_hops(max_hops);
    }
    if let Some(&timeout) = matches.get_one::<u64>("timeout") {
        options = options.with_hop_timeout(Duration::from_millis(timeout));
    }

    let diagnostics = match matches.get_one::<String>("map-out") {
        Some(path) => {
            let file = File::create(path)?;
            let map = Arc::new(DeferredMap::new(JsonLinesRenderer::new(BufWriter::new(file))));
            map.mark_ready();
            diagnostics.with_map(map)
        }
        None => diagnostics,
    };

    let mut hops = diagnostics.start_trace(target, options)?;

    if format == OutputFormat::Text {
        println!("{}", output::format_trace_header(target.trim(), options.max_hops));
    }

    let mut collected = Vec::new();
    while let Some(hop) = hops.next().await {
        if format == OutputFormat::Text {
            println!("{}", output::format_hop(&hop));
        }
        collected.push(hop);
    }

    let report = TraceReport::new(target.trim(), collected);
    match format {
        OutputFormat::Json => println!("{}", output::to_json("trace", &report)?),
        OutputFormat::Text => println!("{}", output::format_trace_footer(report.termination)),
    }
    Ok(())
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let mut config = load_config(&matches)?;
    let format = if matches.get_flag("json") {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    if let Some(("scan", sub)) = matches.subcommand() {
        if let Some(&limit) = sub.get_one::<usize>("parallel") {
            config = config.with_scan_parallel_limit(limit);
        }
    }

    let diagnostics = Diagnostics::from_config(config)?;

    match matches.subcommand() {
        Some(("ping", sub)) => run_ping(&diagnostics, sub, format).await,
        Some(("scan", sub)) => run_scan(&diagnostics, sub, format).await,
        Some(("trace", sub)) => run_trace(diagnostics, sub, format).await,
        _ => unreachable!("subcommand_required"),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let matches = build_cli().get_matches();
    if let Err(e) = run(matches).await {
        eprintln!("{} {}", "[!] Error:".bright_red(), e);
        process::exit(1);
    }
}
