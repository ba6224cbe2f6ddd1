//! Run searches through the full gateway stack from the command line.
//!
//! Prints each response as JSON on stdout, followed by cache statistics.
//! `--repeat` issues the same request several times so the cache and the
//! rate governor can be observed.

use std::path::PathBuf;

use anyhow::{Context, bail};
use cse_gateway::{GatewayConfig, SearchService};
use cse_search::{
    ImageSearchRequest, NewsSearchRequest, SearchKind, SearchRequest, WebSearchRequest,
};

struct ProbeArgs {
    kind: SearchKind,
    query: String,
    num: Option<u32>,
    start: Option<u32>,
    repeat: u32,
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cse_gateway::logging::init("info");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(probe) = parse_args(&args)? else {
        print_usage();
        return Ok(());
    };

    let config = GatewayConfig::load(probe.config.as_deref()).context("loading config")?;
    let service = SearchService::start(&config).context("starting search service")?;
    let request = build_request(&probe);

    let mut failed = false;
    for attempt in 1..=probe.repeat {
        match service.search(&request).await {
            Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
            Err(e) => {
                failed = true;
                eprintln!("attempt {attempt}: [{}] {e}", e.code());
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&service.stats())?);
    service.shutdown().await;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<ProbeArgs>> {
    let Some(first) = args.first() else {
        return Ok(None);
    };
    if matches!(first.as_str(), "help" | "--help" | "-h") {
        return Ok(None);
    }
    let kind: SearchKind = first.parse().map_err(anyhow::Error::msg)?;

    let mut words = Vec::new();
    let mut num = None;
    let mut start = None;
    let mut repeat = 1;
    let mut config = None;

    let mut rest = args[1..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--num" => num = Some(flag_value(&mut rest, "--num")?),
            "--start" => start = Some(flag_value(&mut rest, "--start")?),
            "--repeat" => repeat = flag_value(&mut rest, "--repeat")?,
            "--config" => {
                let path = rest.next().context("--config requires a path")?;
                config = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => bail!("unknown flag `{flag}`"),
            word => words.push(word.to_owned()),
        }
    }

    if words.is_empty() {
        bail!("a query is required");
    }
    if repeat == 0 {
        bail!("--repeat must be at least 1");
    }

    Ok(Some(ProbeArgs {
        kind,
        query: words.join(" "),
        num,
        start,
        repeat,
        config,
    }))
}

fn flag_value<'a>(rest: &mut impl Iterator<Item = &'a String>, flag: &str) -> anyhow::Result<u32> {
    let raw = rest
        .next()
        .with_context(|| format!("{flag} requires a value"))?;
    raw.parse()
        .with_context(|| format!("{flag} expects a non-negative integer, got `{raw}`"))
}

fn build_request(probe: &ProbeArgs) -> SearchRequest {
    macro_rules! paged {
        ($request:expr) => {{
            let mut request = $request;
            if let Some(num) = probe.num {
                request = request.with_num_results(num);
            }
            if let Some(start) = probe.start {
                request = request.with_start_index(start);
            }
            SearchRequest::from(request)
        }};
    }

    match probe.kind {
        SearchKind::Web => paged!(WebSearchRequest::new(probe.query.clone())),
        SearchKind::Image => paged!(ImageSearchRequest::new(probe.query.clone())),
        SearchKind::News => paged!(NewsSearchRequest::new(probe.query.clone())),
    }
}

fn print_usage() {
    println!(
        "usage: cse-probe <web|image|news> <query...> [--num N] [--start N] [--repeat N] [--config PATH]"
    );
}
