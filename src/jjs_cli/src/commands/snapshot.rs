use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use jjs_parser::{parse, ParseOptions};
use jjs_snapshot::{exec_snapshot, generate_snapshot, merge_snapshots, ExecFlags, GlobalFlags, SaveFlags};

#[derive(clap::Subcommand)]
pub enum SnapshotCommand {
    /// Parse a script and save its compiled-code tree to a snapshot file
    Save(SaveArgs),
    /// Load a function out of a snapshot file and print a summary
    Exec(ExecArgs),
    /// Merge several snapshot files into one
    Merge(MergeArgs),
}

#[derive(clap::Args)]
pub struct SaveArgs {
    #[arg(short, long, value_name = "INPUT")]
    pub input: PathBuf,
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: PathBuf,
    #[arg(long, default_value_t = false)]
    pub strict: bool,
    /// Save a static snapshot (no regexp literals, no class constructors)
    #[arg(long, default_value_t = false)]
    pub save_static: bool,
}

#[derive(clap::Args)]
pub struct ExecArgs {
    #[arg(short, long, value_name = "SNAPSHOT")]
    pub input: PathBuf,
    #[arg(long, default_value_t = 0)]
    pub func_index: u32,
    #[arg(long, default_value_t = false)]
    pub allow_static: bool,
}

#[derive(clap::Args)]
pub struct MergeArgs {
    #[arg(required = true, num_args = 1.., value_name = "INPUTS")]
    pub inputs: Vec<PathBuf>,
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: PathBuf,
}

pub fn execute(command: SnapshotCommand) -> Result<()> {
    match command {
        SnapshotCommand::Save(args) => save(args),
        SnapshotCommand::Exec(args) => exec(args),
        SnapshotCommand::Merge(args) => merge(args),
    }
}

fn save(args: SaveArgs) -> Result<()> {
    let source =
        fs::read_to_string(&args.input).with_context(|| format!("failed to read file: {}", args.input.display()))?;
    let options = ParseOptions {
        source_name: args.input.display().to_string(),
        strict: args.strict,
        is_module: false,
        line_info: false,
    };
    let parsed = parse(&source, options).map_err(|e| anyhow::anyhow!("{}", e.kind))?;

    let mut flags = SaveFlags::empty();
    if args.save_static {
        flags |= SaveFlags::SAVE_STATIC;
    }
    let bytes = generate_snapshot(&parsed.script.functions, &parsed.storage, parsed.script.entry, flags)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    fs::write(&args.output, &bytes).with_context(|| format!("failed to write file: {}", args.output.display()))?;
    log::info!("wrote {} bytes to {}", bytes.len(), args.output.display());
    Ok(())
}

fn exec(args: ExecArgs) -> Result<()> {
    let bytes =
        fs::read(&args.input).with_context(|| format!("failed to read file: {}", args.input.display()))?;

    let mut exec_flags = ExecFlags::empty();
    if args.allow_static {
        exec_flags |= ExecFlags::ALLOW_STATIC;
    }
    let loaded = exec_snapshot(&bytes, args.func_index, exec_flags, GlobalFlags::all()).map_err(|e| anyhow::anyhow!("{e}"))?;

    let entry = &loaded.script.functions[loaded.script.entry.0 as usize];
    println!(
        "loaded function {} ({} bytecode bytes, {} functions total in the image)",
        args.func_index,
        entry.bytecode.len(),
        loaded.script.functions.len()
    );
    Ok(())
}

fn merge(args: MergeArgs) -> Result<()> {
    let buffers: Vec<Vec<u8>> = args
        .inputs
        .iter()
        .map(|path| fs::read(path).with_context(|| format!("failed to read file: {}", path.display())))
        .collect::<Result<_>>()?;
    let refs: Vec<&[u8]> = buffers.iter().map(Vec::as_slice).collect();

    let merged = merge_snapshots(&refs, GlobalFlags::all()).map_err(|e| anyhow::anyhow!("{e}"))?;
    fs::write(&args.output, &merged).with_context(|| format!("failed to write file: {}", args.output.display()))?;
    log::info!("merged {} snapshots into {} bytes", args.inputs.len(), merged.len());
    Ok(())
}
