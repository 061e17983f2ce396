use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser, Subcommand};
use console::{style, StyledObject};
use deslop_core::{
    annotations::parse_string_list, protect, restore, Action, CitationMap, Config,
    DiffKind, Engine, Kind, PayloadAnnotator, Resolution, Review, Segment, WordDiff,
};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Deslop CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "deslop",
    about = "Place annotated quotes back onto text, review them and diff the result."
)]
struct Args {
    /// Path to config file (YAML). Defaults to deslop.yml if present.
    #[arg(long, global = true, default_value = "deslop.yml")]
    config: PathBuf,

    /// Set config overrides (repeatable as key=value). Example: --set diff.max_token_pairs=50000
    #[arg(long = "set", global = true, value_name = "KEY=VALUE", action = ArgAction::Append)]
    sets: Vec<String>,

    /// Emit JSON output for automation.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    json: bool,

    /// Only print the summary lines.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Place the quotes of an annotation payload onto a text.
    Locate {
        /// Text file, or `-` for stdin.
        #[arg(value_name = "TEXT")]
        text: PathBuf,
        /// Raw annotator reply containing a JSON array of annotations.
        #[arg(long, value_name = "JSON")]
        annotations: PathBuf,
    },
    /// Flag configured phrases and place them.
    Annotate {
        #[arg(value_name = "TEXT")]
        text: PathBuf,
    },
    /// Word-level diff between two texts.
    Diff {
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,
        #[arg(value_name = "REVISED")]
        revised: PathBuf,
    },
    /// Replace citations with placeholder tokens.
    Protect {
        #[arg(value_name = "TEXT")]
        text: PathBuf,
        /// JSON array of citation strings.
        #[arg(long, value_name = "JSON")]
        citations: PathBuf,
    },
    /// Put citations back using a map printed by `protect`.
    Restore {
        #[arg(value_name = "TEXT")]
        text: PathBuf,
        #[arg(long, value_name = "JSON")]
        map: PathBuf,
    },
    /// Resolve every flag at once and print the revised text.
    Review {
        #[arg(value_name = "TEXT")]
        text: PathBuf,
        #[arg(long, value_name = "JSON")]
        annotations: PathBuf,
        /// Accept every proposed rewrite.
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "dismiss_all")]
        accept_all: bool,
        /// Keep every flagged span as written.
        #[arg(long, action = ArgAction::SetTrue)]
        dismiss_all: bool,
        /// Print the diff against the input instead of the revised text.
        #[arg(long, action = ArgAction::SetTrue)]
        show_diff: bool,
    },
}

#[derive(Debug, Serialize)]
struct LocateReport<'a> {
    located: usize,
    #[serde(flatten)]
    resolution: &'a Resolution,
}

#[derive(Debug, Serialize)]
struct DiffReport<'a> {
    inserted_words: usize,
    deleted_words: usize,
    #[serde(flatten)]
    diff: &'a WordDiff,
}

#[derive(Debug, Serialize)]
struct ReviewReport<'a> {
    text: &'a str,
    resolved: usize,
    diff: Option<DiffReport<'a>>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let mut cfg = load_config(&args.config)?;
    apply_overrides(&mut cfg, &args.sets)?;
    let engine = Engine::new(cfg);

    match &args.command {
        Command::Locate { text, annotations } => {
            let text = read_input(text)?;
            let payload = read_input(annotations)?;
            let resolution = engine.annotate(&text, &PayloadAnnotator::new(payload))?;
            print_resolution(&args, &resolution)
        }
        Command::Annotate { text } => {
            let text = read_input(text)?;
            let resolution = engine.annotate(&text, engine.phrase_annotator())?;
            print_resolution(&args, &resolution)
        }
        Command::Diff { original, revised } => {
            let original = read_input(original)?;
            let revised = read_input(revised)?;
            let diff = engine.diff(&original, &revised);
            print_diff(&args, &diff)
        }
        Command::Protect { text, citations } => {
            let content = read_input(text)?;
            let citations = parse_string_list(&read_input(citations)?);
            let protected = protect(&content, &citations)
                .with_context(|| format!("Cannot protect citations in {}", display(text)))?;
            println!("{}", serde_json::to_string_pretty(&protected)?);
            Ok(())
        }
        Command::Restore { text, map } => {
            let content = read_input(text)?;
            let citation_map = parse_map(&read_input(map)?)
                .with_context(|| format!("Invalid citation map {}", display(map)))?;
            let restored = restore(&content, &citation_map);
            if args.json {
                let report = serde_json::json!({ "text": restored });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{restored}");
            }
            Ok(())
        }
        Command::Review {
            text,
            annotations,
            accept_all,
            dismiss_all,
            show_diff,
        } => {
            let action = match (accept_all, dismiss_all) {
                (true, _) => Action::Accept,
                (_, true) => Action::Dismiss,
                _ => return Err(anyhow!("review needs --accept-all or --dismiss-all")),
            };
            let text = read_input(text)?;
            let payload = read_input(annotations)?;
            let resolution = engine.annotate(&text, &PayloadAnnotator::new(payload))?;
            let mut review = Review::from(resolution);
            let resolved = review.pending_count();
            review.resolve_all(&action);
            let revised = review.text();
            let diff = show_diff.then(|| engine.diff(&text, &revised));
            if args.json {
                let report = ReviewReport {
                    text: &revised,
                    resolved,
                    diff: diff.as_ref().map(diff_report),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            match &diff {
                Some(diff) => print_diff(&args, diff)?,
                None => print!("{revised}"),
            }
            if !args.quiet {
                eprintln!("{} {} flags", style("Resolved").bold(), resolved);
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    Config::from_yaml_str(&text)
        .with_context(|| format!("Invalid config structure in {}", path.display()))
}

fn apply_overrides(cfg: &mut Config, sets: &[String]) -> anyhow::Result<()> {
    for kv in sets {
        let mut parts = kv.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let val = parts.next().unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        match key {
            "locator.min_stripped_len" => cfg.locator.min_stripped_len = parse_value(key, val)?,
            "locator.window_factor" => cfg.locator.window_factor = parse_value(key, val)?,
            "locator.window_padding" => cfg.locator.window_padding = parse_value(key, val)?,
            "locator.anchor_padding" => cfg.locator.anchor_padding = parse_value(key, val)?,
            "locator.retry_from_start" => cfg.locator.retry_from_start = parse_flag(key, val)?,
            "diff.max_token_pairs" => cfg.diff.max_token_pairs = parse_value(key, val)?,
            other => tracing::warn!(key = other, "ignoring unknown config override"),
        }
    }
    Ok(())
}

fn parse_value<T>(key: &str, val: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    val.parse::<T>()
        .with_context(|| format!("Invalid value {val:?} for {key}"))
}

fn parse_flag(key: &str, val: &str) -> anyhow::Result<bool> {
    match val.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("Invalid value {val:?} for {key}: expected true or false")),
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn parse_map(raw: &str) -> anyhow::Result<CitationMap> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    // Accept either the bare map or the whole `protect` output.
    let map = match value.get("map") {
        Some(inner) => serde_json::from_value(inner.clone())?,
        None => serde_json::from_value(value)?,
    };
    Ok(map)
}

fn display(path: &Path) -> String {
    if path.as_os_str() == "-" {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}

fn kind_style(kind: Kind, text: &str) -> StyledObject<&str> {
    let styled = style(text).underlined();
    match kind {
        Kind::Robotic => styled.red(),
        Kind::Repetition => styled.magenta(),
        Kind::OverFormal => styled.yellow(),
        Kind::AiRhythm => styled.cyan(),
        Kind::Cohesion => styled.blue(),
        Kind::Natural => styled.green(),
        Kind::Flagged => styled.yellow().bold(),
    }
}

fn print_resolution(args: &Args, resolution: &Resolution) -> anyhow::Result<()> {
    if args.json {
        let report = LocateReport {
            located: resolution.located_count(),
            resolution,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !args.quiet {
        for segment in &resolution.segments {
            match segment {
                Segment::Text { text, .. } => print!("{text}"),
                Segment::Flagged(span) => {
                    print!("{}", kind_style(span.query.kind, &span.matched_text))
                }
            }
        }
        println!();
        println!();
        for span in resolution.flagged() {
            println!(
                "  [{}] {}..{} {} ({})",
                style(span.query.kind).yellow(),
                span.offset,
                span.offset + span.length,
                span.matched_text,
                span.strategy
            );
            if !span.query.rationale.is_empty() {
                println!("      → {}", span.query.rationale);
            }
            if !span.query.proposed_rewrite.is_empty() {
                println!("      suggestion: {}", span.query.proposed_rewrite);
            }
        }
        for overlap in &resolution.overlapping {
            println!(
                "  {} {}..{} {}",
                style("overlapping").dim(),
                overlap.offset,
                overlap.offset + overlap.length,
                overlap.matched_text
            );
        }
        for query in &resolution.unlocated {
            println!("  {} {:?}", style("not found").red(), query.text);
        }
    }

    println!(
        "{} {} of {} flags",
        style("Matched").bold(),
        resolution.located_count(),
        resolution.total
    );
    Ok(())
}

fn diff_report(diff: &WordDiff) -> DiffReport<'_> {
    DiffReport {
        inserted_words: diff.inserted_words(),
        deleted_words: diff.deleted_words(),
        diff,
    }
}

fn print_diff(args: &Args, diff: &WordDiff) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&diff_report(diff))?);
        return Ok(());
    }
    if diff.degraded {
        eprintln!(
            "{} texts too large for a full diff; showing insertions only",
            style("warning:").yellow().bold()
        );
    }
    if !args.quiet {
        for op in &diff.ops {
            match op.kind {
                DiffKind::Equal => print!("{}", op.token),
                DiffKind::Insert => print!("{}", style(&op.token).green()),
                DiffKind::Delete => print!("{}", style(&op.token).red().strikethrough()),
            }
        }
        println!();
    }
    if diff.is_unchanged() {
        println!("{}", style("unchanged").green());
    } else {
        println!(
            "{} +{} -{} words",
            style("Changed").bold(),
            diff.inserted_words(),
            diff.deleted_words()
        );
    }
    Ok(())
}
