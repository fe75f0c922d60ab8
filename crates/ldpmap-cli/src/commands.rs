use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use ldpmap_core::{
    Base, ContentSource, CoreError, File, FileOptions, FileType, ModelSchema, Repository,
    RepositoryConfig, ResourceUri, SaveOutcome,
};
use serde_json::json;
use tracing::debug;

use crate::cli::*;

/// Model name written for objects created from the command line.
const OBJECT_MODEL: &str = "Object";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Config(args) => cmd_config(&config, args, cli.format),
        command => {
            let repo = Repository::connect(config)?;
            dispatch(&repo, command, cli.format)
        }
    }
}

pub fn dispatch(repo: &Repository, command: Command, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        Command::Head(args) => cmd_head(repo, args, format),
        Command::Get(args) => cmd_get(repo, args),
        Command::Put(args) => cmd_put(repo, args),
        Command::Upload(args) => cmd_upload(repo, args),
        Command::List(args) => cmd_list(repo, args, format),
        Command::Delete(args) => cmd_delete(repo, args),
        Command::Config(args) => cmd_config(repo.config(), args, format),
    }
}

/// Config file first, then flags and `LDPMAP_*` variables on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<RepositoryConfig> {
    let mut config = match &cli.config {
        Some(path) => RepositoryConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RepositoryConfig::default(),
    };
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(base_path) = &cli.base_path {
        config.base_path = base_path.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout_secs = timeout;
    }
    Ok(config)
}

fn resolve_target(repo: &Repository, target: &str) -> anyhow::Result<ResourceUri> {
    if target.contains("://") {
        return Ok(ResourceUri::parse(target)?);
    }
    let path = target.trim_matches('/');
    if path.is_empty() {
        bail!("empty target");
    }
    Ok(repo.uri_for_id(path))
}

fn object_schema() -> Arc<ModelSchema> {
    Arc::new(ModelSchema::new(OBJECT_MODEL))
}

fn plain_file() -> Arc<FileType> {
    Arc::new(FileType::default())
}

fn local_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

fn open_content(path: &Path) -> anyhow::Result<ContentSource> {
    ContentSource::open(path).with_context(|| format!("opening {}", path.display()))
}

fn format_size(size: Option<u64>) -> String {
    size.map(|n| n.to_string()).unwrap_or_else(|| "-".into())
}

fn cmd_head(repo: &Repository, args: TargetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let uri = resolve_target(repo, &args.target)?;
    let mut file = File::load(repo, plain_file(), &uri)?;
    let size = file.size()?;
    match format {
        OutputFormat::Text => {
            println!("{}", file.inspect().bold());
            println!("  Size: {}", format_size(size).cyan());
            println!("  Type: {}", file.mime_type().unwrap_or("-"));
            println!("  Name: {}", file.original_name().unwrap_or("-"));
        }
        OutputFormat::Json => {
            let doc = json!({
                "uri": uri.as_str(),
                "size": size,
                "mime_type": file.mime_type(),
                "original_name": file.original_name(),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}

fn cmd_get(repo: &Repository, args: GetArgs) -> anyhow::Result<()> {
    let uri = resolve_target(repo, &args.target)?;
    let file = File::load(repo, plain_file(), &uri)?;
    let Some(body) = file.remote_content()? else {
        bail!("{uri} has no content");
    };
    match &args.output {
        Some(path) => {
            std::fs::write(path, &body).with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "{} Wrote {} bytes to {}",
                "✓".green().bold(),
                body.len(),
                path.display()
            );
        }
        None => std::io::stdout().lock().write_all(&body)?,
    }
    Ok(())
}

fn cmd_put(repo: &Repository, args: PutArgs) -> anyhow::Result<()> {
    let uri = resolve_target(repo, &args.object)?;
    if !repo.base_uri().is_direct_child(&uri) {
        bail!("objects live directly below {}", repo.base_uri());
    }
    let base = match Base::load(repo, object_schema(), &uri) {
        Ok(base) => base,
        Err(CoreError::NotFound(_)) => {
            debug!(uri = %uri, "object not found, creating it");
            Base::with_id(repo, object_schema(), uri.id())?
        }
        Err(e) => return Err(e.into()),
    };

    let options = FileOptions {
        dsid: args.dsid,
        prefix: args.prefix,
        mime_type: args.describe.mime,
        original_name: args.describe.name.or_else(|| local_name(&args.path)),
    };
    let handle = base.add_file(open_content(&args.path)?, options)?;
    base.save()?;

    let mut file = handle.write();
    println!("{} Stored {}", "✓".green().bold(), file.inspect());
    println!("  Size: {}", format_size(file.size()?).cyan());
    Ok(())
}

fn cmd_upload(repo: &Repository, args: UploadArgs) -> anyhow::Result<()> {
    let mut file = File::new(repo, plain_file());
    file.set_content(open_content(&args.path)?);
    if let Some(mime) = args.describe.mime {
        file.set_mime_type(mime);
    }
    if let Some(name) = args.describe.name.or_else(|| local_name(&args.path)) {
        file.set_original_name(name);
    }

    match file.save()? {
        SaveOutcome::Saved => {
            println!("{} Uploaded {}", "✓".green().bold(), file.uri()?.to_string().yellow());
        }
        SaveOutcome::Skipped(reason) => {
            println!("{} Nothing uploaded: {}", "!".yellow().bold(), reason);
        }
    }
    Ok(())
}

fn cmd_list(repo: &Repository, args: TargetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let uri = resolve_target(repo, &args.target)?;
    let base = Base::load(repo, object_schema(), &uri)?;

    let mut rows = Vec::new();
    for (key, handle) in base.attached_files() {
        let mut file = handle.write();
        let size = file.size()?;
        rows.push((
            key,
            size,
            file.mime_type().map(str::to_string),
            file.original_name().map(str::to_string),
        ));
    }

    match format {
        OutputFormat::Text => {
            println!("{} ({} files)", format!("{base:?}").bold(), rows.len());
            for (key, size, mime, name) in &rows {
                println!(
                    "  {:<12} {:>10}  {:<24} {}",
                    key.yellow(),
                    format_size(*size),
                    mime.as_deref().unwrap_or("-"),
                    name.as_deref().unwrap_or("-"),
                );
            }
        }
        OutputFormat::Json => {
            let files: Vec<_> = rows
                .iter()
                .map(|(key, size, mime, name)| {
                    json!({ "dsid": key, "size": size, "mime_type": mime, "original_name": name })
                })
                .collect();
            let doc = json!({ "uri": uri.as_str(), "files": files });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}

fn cmd_delete(repo: &Repository, args: DeleteArgs) -> anyhow::Result<()> {
    let uri = resolve_target(repo, &args.target)?;
    if args.object {
        Base::load(repo, object_schema(), &uri)?.destroy()?;
    } else {
        File::load(repo, plain_file(), &uri)?.delete()?;
    }
    println!("{} Deleted {}", "✓".green().bold(), uri.as_str().yellow());
    Ok(())
}

fn cmd_config(config: &RepositoryConfig, args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let default;
    let config = if args.default {
        default = RepositoryConfig::default();
        &default
    } else {
        config
    };
    match format {
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}
