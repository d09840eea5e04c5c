//! Rulegraph CLI
//!
//! Offline tooling around the editing engine:
//! - `check`: load a stored diagram against a catalog and report what
//!   re-validation had to repair,
//! - `emit`: compile a diagram to its automation script,
//! - `diagram`: rewrite a diagram in its re-validated form,
//! - `palette`: list the blocks an authoring context offers.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use rulegraph_catalog::{AutomationTarget, Catalog, MasterBlockType, RuleEntity, RuleTrigger};
use rulegraph_engine::{EditorConfig, EditorSession, PropagationReport};

#[derive(Parser)]
#[command(name = "rulegraph")]
#[command(author, version, about = "Rulegraph: visual automation rule compiler")]
struct Cli {
    /// Log propagation and loading details to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a diagram and report what re-validation changed.
    Check {
        #[command(flatten)]
        context: ContextArgs,
        /// Stored diagram (XML)
        diagram: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compile a diagram to its script.
    Emit {
        #[command(flatten)]
        context: ContextArgs,
        diagram: PathBuf,
        /// Write the script here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Rewrite a diagram after re-validation.
    Diagram {
        #[command(flatten)]
        context: ContextArgs,
        diagram: PathBuf,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List the block types offered for an authoring context.
    Palette {
        #[command(flatten)]
        context: ContextArgs,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ContextArgs {
    /// Catalog JSON (collections, link types, views, variables)
    #[arg(long)]
    catalog: PathBuf,
    /// Editor config JSON; every key is optional
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = MasterArg::Rule)]
    master: MasterArg,
    /// Collection the graph is authored for
    #[arg(long, conflicts_with = "link_type")]
    collection: Option<String>,
    /// Link type the graph is authored for
    #[arg(long)]
    link_type: Option<String>,
    /// Rule trigger (rule and link masters only)
    #[arg(long, value_enum)]
    trigger: Option<TriggerArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum MasterArg {
    Rule,
    Function,
    Link,
    Value,
}

impl From<MasterArg> for MasterBlockType {
    fn from(arg: MasterArg) -> Self {
        match arg {
            MasterArg::Rule => MasterBlockType::Rule,
            MasterArg::Function => MasterBlockType::Function,
            MasterArg::Link => MasterBlockType::Link,
            MasterArg::Value => MasterBlockType::Value,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TriggerArg {
    Create,
    Update,
    Delete,
    Cron,
}

impl From<TriggerArg> for RuleTrigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::Create => RuleTrigger::Create,
            TriggerArg::Update => RuleTrigger::Update,
            TriggerArg::Delete => RuleTrigger::Delete,
            TriggerArg::Cron => RuleTrigger::Cron,
        }
    }
}

impl ContextArgs {
    fn target(&self) -> Result<Option<AutomationTarget>> {
        let entity = match (&self.collection, &self.link_type) {
            (Some(c), None) => RuleEntity::Collection(c.clone()),
            (None, Some(l)) => RuleEntity::LinkType(l.clone()),
            (None, None) => return Ok(None),
            (Some(_), Some(_)) => bail!("--collection and --link-type are exclusive"),
        };
        let master = MasterBlockType::from(self.master);
        let trigger = match (master, self.trigger) {
            (MasterBlockType::Rule | MasterBlockType::Link, None) => Some(RuleTrigger::Update),
            (_, trigger) => trigger.map(RuleTrigger::from),
        };
        Ok(Some(AutomationTarget {
            master,
            entity,
            trigger,
        }))
    }

    fn open(&self) -> Result<EditorSession> {
        let catalog_text = read(&self.catalog)?;
        let catalog = Catalog::from_json(&catalog_text)
            .with_context(|| format!("parsing catalog {}", self.catalog.display()))?;
        let config = match &self.config {
            Some(path) => EditorConfig::from_json(&read(path)?)
                .with_context(|| format!("parsing config {}", path.display()))?,
            None => EditorConfig::default(),
        };
        let session = match self.target()? {
            Some(target) => EditorSession::for_target(catalog, &target, config)?,
            None => EditorSession::new(catalog, self.master.into(), config),
        };
        Ok(session)
    }

    fn open_with(&self, diagram: &Path) -> Result<(EditorSession, PropagationReport)> {
        let mut session = self.open()?;
        let report = session
            .load_diagram(&read(diagram)?)
            .with_context(|| format!("loading diagram {}", diagram.display()))?;
        Ok((session, report))
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn write_or_print(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => print!("{text}"),
    }
    Ok(())
}

#[derive(Serialize)]
struct PaletteEntry<'a> {
    type_name: &'a str,
    statement: bool,
    fields: Vec<&'static str>,
    inputs: Vec<&'static str>,
}

fn cmd_check(context: &ContextArgs, diagram: &Path, json: bool) -> Result<()> {
    let (session, report) = context.open_with(diagram)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if report.capped {
        eprintln!(
            "{} propagation stopped after {} rounds without settling",
            "warning".yellow().bold(),
            report.rounds
        );
    }
    if report.changed_anything() {
        println!(
            "{} {} retyped, {} dropdowns reset, {} variables retyped, {} severed, {} removed",
            "repaired".yellow().bold(),
            report.retyped,
            report.pickers,
            report.variables,
            report.severed.len(),
            report.removed.len()
        );
    }
    let status = if session.script().is_empty() {
        "empty".yellow().bold()
    } else {
        "ok".green().bold()
    };
    println!(
        "{} {} blocks, {} variables",
        status,
        session.graph().len(),
        session.variables().count()
    );
    Ok(())
}

fn cmd_emit(context: &ContextArgs, diagram: &Path, out: Option<&Path>) -> Result<()> {
    let (session, _) = context.open_with(diagram)?;
    let script = session.compile()?;
    write_or_print(out, &script)
}

fn cmd_diagram(context: &ContextArgs, diagram: &Path, out: Option<&Path>) -> Result<()> {
    let (session, _) = context.open_with(diagram)?;
    write_or_print(out, session.diagram())
}

fn cmd_palette(context: &ContextArgs, json: bool) -> Result<()> {
    let session = context.open()?;
    let entries: Vec<PaletteEntry<'_>> = session
        .registry()
        .palette()
        .map(|d| PaletteEntry {
            type_name: &d.type_name,
            statement: d.is_statement(),
            fields: d.shape.fields.iter().map(|f| f.name).collect(),
            inputs: d.shape.inputs.iter().map(|i| i.socket.name()).collect(),
        })
        .collect();
    if entries.is_empty() {
        return Err(anyhow!("no blocks offered for {}", session.master()));
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for entry in entries {
        let name = if entry.statement {
            entry.type_name.cyan()
        } else {
            entry.type_name.normal()
        };
        println!("{:<32} {}", name, entry.inputs.join(" "));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Check {
            context,
            diagram,
            json,
        } => cmd_check(context, diagram, *json),
        Commands::Emit { context, diagram, out } => cmd_emit(context, diagram, out.as_deref()),
        Commands::Diagram { context, diagram, out } => cmd_diagram(context, diagram, out.as_deref()),
        Commands::Palette { context, json } => cmd_palette(context, *json),
    }
}
