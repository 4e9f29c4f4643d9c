use std::io::{Read, Write};
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use revstore_backend::Storage;
use revstore_generator::{Generator, GeneratorInfo};
use revstore_types::WaitScope;
use serde_json::json;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let info = GeneratorInfo::load(&cli.config)
        .with_context(|| format!("loading mounts from {}", cli.config.display()))?;
    let generator = Generator::new(info);
    let scope = scope_for(cli.timeout_ms);
    let mut stdout = std::io::stdout();
    execute(&generator, &scope, cli.command, cli.format, &mut stdout).await
}

fn scope_for(timeout_ms: u64) -> WaitScope {
    if timeout_ms == 0 {
        WaitScope::unbounded()
    } else {
        WaitScope::with_timeout(Duration::from_millis(timeout_ms))
    }
}

async fn execute(
    generator: &Generator,
    scope: &WaitScope,
    command: Command,
    format: OutputFormat,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    match command {
        Command::Mounts => cmd_mounts(generator, format, out),
        Command::Exists(args) => cmd_exists(generator, scope, args, format, out).await,
        Command::Get(args) => cmd_get(generator, scope, args, out).await,
        Command::Put(args) => cmd_put(generator, scope, args, format, out).await,
    }
}

async fn open(
    generator: &Generator,
    scope: &WaitScope,
    target: &KeyArgs,
) -> anyhow::Result<Box<dyn Storage>> {
    generator
        .create(scope, &target.mount, &target.path)
        .await
        .with_context(|| format!("opening mount {}", target.mount))
}

fn cmd_mounts(
    generator: &Generator,
    format: OutputFormat,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let info = generator.info();
    if format == OutputFormat::Json {
        writeln!(out, "{}", serde_json::to_string_pretty(info)?)?;
        return Ok(());
    }
    if info.mounts.is_empty() {
        writeln!(out, "No mounts configured.")?;
        return Ok(());
    }
    for (name, mount) in &info.mounts {
        let home = if mount.home_path.is_empty() {
            "-".dimmed().to_string()
        } else {
            mount.home_path.clone()
        };
        writeln!(out, "{}  {}  {}", name.bold(), mount.provider.to_string().cyan(), home)?;
    }
    Ok(())
}

async fn cmd_exists(
    generator: &Generator,
    scope: &WaitScope,
    args: KeyArgs,
    format: OutputFormat,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let storage = open(generator, scope, &args).await?;
    let exists = storage
        .exists(scope, &args.key)
        .await
        .with_context(|| format!("checking {}", args.key))?;
    match format {
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({ "mount": args.mount, "path": args.path, "key": args.key, "exists": exists })
        )?,
        OutputFormat::Text if exists => writeln!(out, "{} {}", "✓".green(), args.key)?,
        OutputFormat::Text => writeln!(out, "{} {} not found", "✗".red(), args.key)?,
    }
    Ok(())
}

async fn cmd_get(
    generator: &Generator,
    scope: &WaitScope,
    args: GetArgs,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let storage = open(generator, scope, &args.target).await?;
    let data = storage
        .get(scope, &args.target.key)
        .await
        .with_context(|| format!("reading {}", args.target.key))?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, &data)
                .with_context(|| format!("writing {}", path.display()))?;
            writeln!(
                out,
                "{} Wrote {} bytes to {}",
                "✓".green(),
                data.len(),
                path.display()
            )?;
        }
        None => out.write_all(&data)?,
    }
    Ok(())
}

async fn cmd_put(
    generator: &Generator,
    scope: &WaitScope,
    args: PutArgs,
    format: OutputFormat,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let data = match (&args.value, &args.file) {
        (Some(value), _) => value.clone().into_bytes(),
        (None, Some(path)) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?
        }
        (None, None) => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading value from stdin")?;
            buf
        }
    };

    let target = &args.target;
    let storage = open(generator, scope, target).await?;
    storage
        .save(scope, &target.key, &data)
        .await
        .with_context(|| format!("writing {}", target.key))?;

    match format {
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({ "mount": target.mount, "path": target.path, "key": target.key, "bytes": data.len() })
        )?,
        OutputFormat::Text => writeln!(
            out,
            "{} Stored {} bytes under {}",
            "✓".green().bold(),
            data.len(),
            target.key.yellow()
        )?,
    }
    Ok(())
}
