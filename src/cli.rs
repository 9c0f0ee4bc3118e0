//! CLI: contract files → (examples | resolved schema | verdicts)
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use strategize::schema::{Loader, to_json};
use strategize::{Config, Drawer, InputContract, Partial, PassOrder};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// draw constraint-satisfying examples from self-referential contract schemas
#[derive(Parser, Debug)]
#[command(name = "strategize", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// draw concrete examples from each contract
    Example(ExampleOut),
    /// resolve each contract's state schema as far as it goes without drawing
    Resolve(ResolveOut),
    /// validate a state (and event) document against each contract
    Check(CheckIn),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JQ post-process filter for each output document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more contract files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct EngineSettings {
    /// resolution passes / draw rounds before giving up
    #[arg(long, default_value_t = 8)]
    rounds: usize,

    /// longest list drawn for a list schema
    #[arg(long, default_value_t = 8)]
    max_list_len: usize,

    /// field order within a resolution pass: declared | topological
    #[arg(long, default_value = "declared")]
    order: PassOrder,

    /// seed for reproducible draws (example i uses seed + i)
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(clap::Parser, Debug)]
struct ExampleOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    engine: EngineSettings,

    /// examples per contract
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// one compact document per line instead of pretty JSON
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ResolveOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    engine: EngineSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckIn {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    engine: EngineSettings,

    /// state document to validate
    #[arg(long)]
    state: PathBuf,

    /// event document, for transition contracts
    #[arg(long)]
    event: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn documents(&self) -> Result<Vec<(PathBuf, Value)>> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        source_paths
            .into_iter()
            .map(|source_path| {
                let document = read_json(&source_path)?;
                Ok((source_path, document))
            })
            .collect()
    }

    fn post_process(&self, outputs: Vec<Value>) -> Result<Vec<Value>> {
        let Some(jq_expr) = self.jq_expr.as_ref() else {
            return Ok(outputs);
        };
        let mut processed = Vec::with_capacity(outputs.len());
        for output in &outputs {
            processed.extend(crate::jq_exec::run_jaq(jq_expr, output).context("failed to apply jq expression")?);
        }
        Ok(processed)
    }
}

impl EngineSettings {
    fn config(&self) -> Config {
        Config { max_rounds: self.rounds, max_list_len: self.max_list_len, order: self.order }
    }

    fn drawer(&self, index: usize) -> Drawer {
        match self.seed {
            Some(seed) => Drawer::seeded(seed.wrapping_add(index as u64)),
            None => Drawer::new(),
        }
    }

    fn contract(&self, document: &Value, drawer: &mut Drawer) -> Result<InputContract> {
        let config = self.config();
        Ok(Loader::new(drawer, &config).contract(document.clone())?)
    }

    /// The contract's state schema, resolved as far as passes alone take it.
    fn resolve(&self, document: &Value) -> Result<Partial> {
        let contract = self.contract(document, &mut self.drawer(0))?;
        Ok(strategize::resolve_partial(&contract.state, &self.config())?)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Example(target) => {
                let config = target.engine.config();
                let mut outputs = Vec::new();
                for (source_path, document) in target.input_settings.documents()? {
                    tracing::info!(path = %source_path.display(), count = target.count, "drawing examples");
                    // each example reloads the contract so `$frozen` lists are drawn per example
                    let drawn = (0..target.count)
                        .into_par_iter()
                        .map(|index| -> Result<Value> {
                            let mut drawer = target.engine.drawer(index);
                            let contract = target.engine.contract(&document, &mut drawer)?;
                            let example = contract.example(&mut drawer, &config)?;
                            Ok(serde_json::to_value(example)?)
                        })
                        .collect::<Result<Vec<_>>>()
                        .with_context(|| format!("failed to draw from {}", source_path.display()))?;
                    outputs.extend(drawn);
                }
                let outputs = target.input_settings.post_process(outputs)?;
                emit(&outputs, target.ndjson, target.out.as_deref())
            }
            Command::Resolve(target) => {
                let mut outputs = Vec::new();
                for (source_path, document) in target.input_settings.documents()? {
                    let partial = target
                        .engine
                        .resolve(&document)
                        .with_context(|| format!("failed to resolve {}", source_path.display()))?;
                    if let Some(stopped) = &partial.stopped {
                        eprintln!("{} {}: {stopped}", "⚠️ partially resolved".yellow(), source_path.display());
                    }
                    outputs.push(to_json(&partial.node));
                }
                let outputs = target.input_settings.post_process(outputs)?;
                emit(&outputs, false, target.out.as_deref())
            }
            Command::Check(target) => {
                let state = read_json(&target.state)?;
                let event = target.event.as_deref().map(read_json).transpose()?;
                let mut rejected = 0;
                for (source_path, document) in target.input_settings.documents()? {
                    let contract = target.engine.contract(&document, &mut target.engine.drawer(0))?;
                    match contract.check(&state, event.as_ref()) {
                        Ok(()) => println!("{} {}", "✅ valid".green(), source_path.display()),
                        Err(error) => {
                            rejected += 1;
                            println!("{} {}: {error}", "❌ invalid".red(), source_path.display());
                        }
                    }
                }
                if rejected > 0 {
                    bail!("{rejected} contract(s) rejected the input");
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_json(path: &Path) -> Result<Value> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("failed to parse JSON source file ({})", path.display()))
}

fn emit(outputs: &[Value], ndjson: bool, out: Option<&Path>) -> Result<()> {
    let mut text = String::new();
    for output in outputs {
        if ndjson {
            text.push_str(&serde_json::to_string(output)?);
        } else {
            text.push_str(&serde_json::to_string_pretty(output)?);
        }
        text.push('\n');
    }
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, &text).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                matched_any = true;
                out.push(entry?);
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
