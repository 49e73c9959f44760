// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use maxims_app::{Catalog, ExplorerState, MaximContent};
use maxims_llm::{ApiKey, Client, ContentFetcher};
use runtime::ThreadedRuntime;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `maxims --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    let catalog = config.catalog()?;

    if options.list {
        for maxim in catalog.maxims() {
            println!("{maxim}");
        }
        return Ok(());
    }

    let log_path = config.log_path()?;
    logging::init(&log_path, config.log_level())?;
    info!(
        config = %options.config_path.display(),
        log = %log_path.display(),
        maxims = catalog.len(),
        "starting"
    );

    let client = build_client(&config, &options.config_path, |name| env::var(name).ok())?;

    if options.check_only {
        client
            .ping()
            .with_context(|| format!("check model {} at {}", client.model(), client.base_url()))?;
        println!("ok: {} reachable at {}", client.model(), client.base_url());
        return Ok(());
    }

    if let Some(maxim) = &options.explain {
        let content = explain_once(&client, &catalog, maxim)?;
        print!("{}", render_plain(&content));
        return Ok(());
    }

    let mut state = ExplorerState::default();
    let mut runtime = ThreadedRuntime::new(Arc::new(client));
    maxims_tui::run_app(&mut state, &catalog, &mut runtime)
}

/// Resolves the API key and builds the Gemini client. Runs before the terminal
/// is touched so a missing key is reported on plain stderr.
fn build_client<F>(config: &Config, config_path: &Path, lookup: F) -> Result<Client>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = ApiKey::from_lookup(config.llm_api_key_env(), lookup).inspect_err(|error| {
        error!(%error, "no API key available");
    })?;
    Client::new(
        config.llm_base_url(),
        config.llm_model(),
        api_key,
        config.llm_timeout()?,
    )
    .with_context(|| {
        format!(
            "invalid [llm] config in {}; fix base_url/model/timeout values",
            config_path.display()
        )
    })
}

fn explain_once(
    fetcher: &dyn ContentFetcher,
    catalog: &Catalog,
    maxim: &str,
) -> Result<MaximContent> {
    let maxim = maxim.trim();
    if maxim.is_empty() {
        return Err(anyhow!("--explain needs a non-empty maxim"));
    }
    if !catalog.maxims().iter().any(|entry| entry.as_str() == maxim) {
        info!(maxim, "explaining a maxim outside the catalog");
    }
    fetcher
        .fetch(maxim)
        .with_context(|| format!("explain {maxim:?}"))
}

fn render_plain(content: &MaximContent) -> String {
    let mut out = format!("{}\n\nWhat It Means\n{}\n", content.maxim, content.meaning);
    if !content.stories.is_empty() {
        out.push_str("\nStories from the Code\n");
    }
    for story in &content.stories {
        out.push_str(&format!(
            "\n{}\n{}\n  \"{}\"\n",
            story.title, story.narrative, story.quote
        ));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    list: bool,
    explain: Option<String>,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        list: false,
        explain: None,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--list" => {
                options.list = true;
            }
            "--explain" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow!("--explain requires a maxim, for example --explain \"Pick up trash\"")
                })?;
                options.explain = Some(value.as_ref().to_owned());
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("maxims: explore the maxims of \"{}\"", maxims_app::BOOK_TITLE);
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --list                   Print the maxims in the catalog");
    println!("  --explain <maxim>        Explain one maxim on stdout without the TUI");
    println!("  --check                  Validate config + API key + model reachability");
    println!("  --help                   Show this help");
}
