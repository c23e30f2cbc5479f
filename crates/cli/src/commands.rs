//! Dispatch of parsed subcommands onto a [`Catalog`]. Every command yields a
//! JSON value; `main` decides how to print it.

use crate::args::{ClipCommands, Cli, Commands};
use anyhow::{bail, Context, Result};
use gallery_core::clips::ClipEntry;
use gallery_core::config;
use gallery_core::operations::BatchTarget;
use gallery_core::render::{ClipPlan, ClipRenderer, FfmpegRenderer};
use gallery_core::Catalog;
use serde_json::{json, Value};
use tracing::debug;

/// Opens the catalog under `cli.root`, runs the command and flushes state.
pub fn run(cli: Cli) -> Result<Value> {
    let settings = config::load(&cli.root);
    debug!("media root {}", settings.media_path.display());
    let mut catalog = Catalog::open(settings).context("opening catalog")?;
    let out = execute(&mut catalog, cli.command)?;
    catalog.close()?;
    Ok(out)
}

fn target(tags: bool) -> BatchTarget {
    if tags {
        BatchTarget::Tags
    } else {
        BatchTarget::Media
    }
}

pub fn execute(catalog: &mut Catalog, command: Commands) -> Result<Value> {
    let out = match command {
        Commands::Browse { subpath } => serde_json::to_value(catalog.browse(&subpath)?)?,
        Commands::AllMedia { limit } => serde_json::to_value(catalog.all_media_page(limit))?,
        Commands::AllVideos { limit } => serde_json::to_value(catalog.all_videos_page(limit))?,
        Commands::Search { keywords } => serde_json::to_value(catalog.search(&keywords))?,
        Commands::Tags => serde_json::to_value(catalog.sorted_tags())?,
        Commands::Tag { tags, media } => {
            let changed = catalog.tag_media(&media, &tags)?;
            json!({ "success": true, "changed": changed })
        }
        Commands::TagsOf { media } => {
            let states: Vec<Value> = catalog
                .tag_states(&media)
                .into_iter()
                .map(|(name, tagged)| json!({ "name": name, "tagged": tagged }))
                .collect();
            Value::Array(states)
        }
        Commands::Filter { op, tags } => serde_json::to_value(catalog.filter_by_tags(op.into(), &tags))?,
        Commands::Hide { tags } => {
            catalog.toggle_hidden(&tags)?;
            json!({ "success": true, "hidden": catalog.tags().hidden() })
        }
        Commands::Rename { url, new_name } => serde_json::to_value(catalog.rename(&url, &new_name)?)?,
        Commands::RenameMultiple { tags, name, items } => {
            serde_json::to_value(catalog.rename_multiple(target(tags), &items, &name))?
        }
        Commands::Delete { url } => {
            let outcome = catalog.delete(&url)?;
            json!({ "success": true, "outcome": outcome })
        }
        Commands::DeleteMultiple { tags, items } => {
            serde_json::to_value(catalog.delete_multiple(target(tags), &items))?
        }
        Commands::Move { to, items } => serde_json::to_value(catalog.move_items(&items, &to))?,
        Commands::Clips(cmd) => clips(catalog, cmd)?,
    };
    Ok(out)
}

fn clips(catalog: &mut Catalog, command: ClipCommands) -> Result<Value> {
    let out = match command {
        ClipCommands::Get { url } => serde_json::to_value(catalog.clips_for(&url))?,
        ClipCommands::Set { url, ranges } => {
            let entries = ranges
                .iter()
                .map(|r| parse_range(r))
                .collect::<Result<Vec<_>>>()?;
            let count = entries.len();
            catalog.set_clips(&url, entries)?;
            json!({ "success": true, "clips": count })
        }
        ClipCommands::List => {
            let map: serde_json::Map<String, Value> = catalog
                .clips()
                .iter()
                .map(|(k, v)| -> Result<(String, Value)> { Ok((k.clone(), serde_json::to_value(v)?)) })
                .collect::<Result<_>>()?;
            Value::Object(map)
        }
        ClipCommands::Render { url, resolution, preview } => {
            let source = catalog.mapper().resolve(&url)?;
            if !source.is_file() {
                bail!("no such video: {}", url);
            }
            let plan = ClipPlan::new(&source, catalog.clips_for(&url), resolution, preview);
            if plan.segments.is_empty() {
                bail!("no clips marked on {}", url);
            }
            FfmpegRenderer.render(&plan)?;
            let outputs: Vec<String> = plan
                .segments
                .iter()
                .map(|s| catalog.mapper().to_url(&s.output))
                .collect();
            catalog.invalidate_media();
            json!({
                "success": true,
                "clips": outputs,
                "preview": plan.preview.as_ref().map(|p| catalog.mapper().to_url(p)),
            })
        }
    };
    Ok(out)
}

/// Parses `START-STOP` (seconds) into a clip.
pub fn parse_range(range: &str) -> Result<ClipEntry> {
    let (start, stop) = range
        .split_once('-')
        .with_context(|| format!("clip range must be START-STOP: {}", range))?;
    let start: f64 = start.trim().parse().with_context(|| format!("bad start in {}", range))?;
    let stop: f64 = stop.trim().parse().with_context(|| format!("bad stop in {}", range))?;
    if stop < start {
        bail!("clip ends before it starts: {}", range);
    }
    Ok(ClipEntry::new(start, stop))
}

/// Plain-text rendering: one line per listed item, pretty JSON otherwise.
pub fn render_text(value: &Value) -> Result<String> {
    let Value::Array(items) = value else {
        return Ok(serde_json::to_string_pretty(value)?);
    };
    let lines: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            Value::Object(o) => o
                .get("url")
                .or_else(|| o.get("name"))
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| item.to_string()),
            other => other.to_string(),
        })
        .collect();
    Ok(lines.join("\n"))
}
