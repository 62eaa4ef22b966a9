//! docpulse: a documentation-health control plane.
//!
//! docpulse tracks registered systems, the dependency edges between them,
//! and Architecture Decision Records in a local SQLite registry, keeps a
//! generated knowledge-graph artifact in sync, and runs a validator suite
//! that catches documentation drift before it rots.
//!
//! # Architecture
//!
//! - **Registry**: `.pulse/data/context.db` - systems, dependencies,
//!   ADRs, links, tags. All writes are transactional.
//! - **Graph analyzer**: cycles, topological order, impact queries, and
//!   the serialized `.pulse/graph.json` artifact.
//! - **Validator suite**: snapshot, adr, debt, freshness - four
//!   read-only checks run concurrently over one registry snapshot.
//! - **Fixer suite**: keyed, idempotent remediation for fixable findings.
//!
//! # Examples
//!
//! ```bash
//! # Initialize a project
//! docpulse init
//!
//! # Register systems and wire dependencies
//! docpulse system add --path src/systems/audio --name Audio
//! docpulse dep add --system src/systems/audio --on src/systems/events
//!
//! # Health check (exit 1 on FAIL)
//! docpulse check --deep
//!
//! # Remediate fixable findings
//! docpulse fix
//! ```

pub mod core;
pub mod fixers;
pub mod validators;

use crate::core::config::ValidationConfig;
use crate::core::db::Session;
use crate::core::error::DocPulseError;
use crate::core::store::Store;
use crate::core::{adr, db, graph, registry};
use crate::fixers::FixCatalogue;
use crate::validators::runner::{Report, RunStatus, ValidationRunner, ValidatorKind};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "docpulse",
    version = env!("CARGO_PKG_VERSION"),
    about = "Documentation-health control plane: knowledge graph, validators, fixers."
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the registry and root .pulse directory
    Init {
        /// Directory to initialize (defaults to current working directory)
        #[clap(short, long)]
        dir: Option<PathBuf>,
    },

    /// Manage registered systems
    System(SystemCli),

    /// Manage dependency edges
    Dep(DepCli),

    /// Manage Architecture Decision Records
    Adr(AdrCli),

    /// Graph analysis and artifact generation
    Graph(GraphCli),

    /// Run the validator suite
    Check {
        /// Also run structural graph checks (cycles, dangling edges)
        #[clap(long)]
        deep: bool,
        /// Fast subset for hooks: snapshot + adr only
        #[clap(long)]
        pre_commit: bool,
        /// Comma-separated validator subset (snapshot,adr,debt,freshness)
        #[clap(long)]
        only: Option<String>,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },

    /// Apply automatic fixes for fixable findings
    Fix {
        /// Preview the plan without writing anything
        #[clap(long)]
        dry_run: bool,
    },
}

#[derive(Parser, Debug)]
pub struct SystemCli {
    #[clap(subcommand)]
    command: SystemCommand,
}

#[derive(Subcommand, Debug)]
enum SystemCommand {
    /// Register a system and scaffold its documentation bundle
    Add {
        #[clap(long)]
        path: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        description: Option<String>,
    },
    /// List all registered systems
    List,
    /// Show one system
    Get {
        #[clap(long)]
        path: String,
    },
    /// Update name and/or description
    Update {
        #[clap(long)]
        path: String,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        description: Option<String>,
    },
    /// Delete a system (cascades edges and ADR links)
    Rm {
        #[clap(long)]
        path: String,
    },
}

#[derive(Parser, Debug)]
pub struct DepCli {
    #[clap(subcommand)]
    command: DepCommand,
}

#[derive(Subcommand, Debug)]
enum DepCommand {
    /// Record that a system depends on another
    Add {
        #[clap(long)]
        system: String,
        #[clap(long = "on")]
        depends_on: String,
    },
    /// Remove a dependency edge
    Rm {
        #[clap(long)]
        system: String,
        #[clap(long = "on")]
        depends_on: String,
    },
    /// Direct dependencies of a system
    Of {
        #[clap(long)]
        system: String,
    },
    /// Direct dependents of a system
    On {
        #[clap(long)]
        system: String,
    },
}

#[derive(Parser, Debug)]
pub struct AdrCli {
    #[clap(subcommand)]
    command: AdrCommand,
}

#[derive(Subcommand, Debug)]
enum AdrCommand {
    /// Create an ADR (registry row + rendered file)
    New {
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "proposed")]
        status: String,
        /// Systems to link; the first hosts the ADR file
        #[clap(long = "link")]
        links: Vec<String>,
        #[clap(long = "tag")]
        tags: Vec<String>,
        #[clap(long)]
        context: Option<String>,
        #[clap(long)]
        decision: Option<String>,
        #[clap(long)]
        consequences: Option<String>,
    },
    /// List ADRs, optionally by status
    List {
        #[clap(long)]
        status: Option<String>,
    },
    /// Show one ADR with its tags
    Get {
        #[clap(long)]
        id: String,
    },
    /// Delete an ADR (cascades links and tags)
    Rm {
        #[clap(long)]
        id: String,
    },
    /// Link an ADR to a system
    Link {
        #[clap(long)]
        id: String,
        #[clap(long)]
        system: String,
    },
    /// Remove an ADR-system link
    Unlink {
        #[clap(long)]
        id: String,
        #[clap(long)]
        system: String,
    },
    /// Mark an ADR superseded by another, wiring both references
    Supersede {
        #[clap(long)]
        old: String,
        #[clap(long)]
        new: String,
    },
    /// Add a tag
    Tag {
        #[clap(long)]
        id: String,
        #[clap(long)]
        tag: String,
    },
    /// Remove a tag
    Untag {
        #[clap(long)]
        id: String,
        #[clap(long)]
        tag: String,
    },
}

#[derive(Parser, Debug)]
pub struct GraphCli {
    #[clap(subcommand)]
    command: GraphCommand,
}

#[derive(Subcommand, Debug)]
enum GraphCommand {
    /// Regenerate .pulse/graph.json from the registry
    Generate,
    /// Print the current artifact
    Show,
    /// List all dependency cycles
    Cycles,
    /// Topological order, dependencies first
    Order,
    /// Transitive impact: what reaches or is reached from a system
    Impact {
        #[clap(long)]
        system: String,
        /// 'dependents' (what breaks) or 'dependencies' (what it needs)
        #[clap(long, default_value = "dependents")]
        direction: String,
    },
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

fn open_project() -> Result<(Store, Session), DocPulseError> {
    let current_dir = std::env::current_dir().map_err(DocPulseError::IoError)?;
    let store = Store::discover(&current_dir)?;
    let session = Session::open_existing(&store)?;
    Ok((store, session))
}

fn run_init(dir: Option<PathBuf>) -> Result<(), DocPulseError> {
    let target = match dir {
        Some(d) => d,
        None => std::env::current_dir().map_err(DocPulseError::IoError)?,
    };
    let store = Store::new(std::fs::canonicalize(&target).map_err(DocPulseError::IoError)?);

    if store.db_path().exists() {
        println!(
            "{} registry already present at {}",
            "✓".bright_green(),
            store.db_path().display()
        );
        return Ok(());
    }

    db::initialize_context_db(&store)?;
    println!(
        "{} initialized docpulse registry at {}",
        "●".bright_green(),
        store.db_path().display()
    );
    Ok(())
}

fn run_check(
    deep: bool,
    pre_commit: bool,
    only: Option<String>,
    format: &str,
) -> Result<(), DocPulseError> {
    let (store, session) = open_project()?;
    let config = ValidationConfig::load(&store)?;

    let selection: Vec<ValidatorKind> = if let Some(only) = only {
        let mut kinds = Vec::new();
        for name in only.split(',') {
            let name = name.trim();
            match ValidatorKind::parse(name) {
                Some(kind) => kinds.push(kind),
                None => {
                    return Err(DocPulseError::ValidationError(format!(
                        "unknown validator '{}'. Valid: snapshot, adr, debt, freshness",
                        name
                    )));
                }
            }
        }
        kinds
    } else if pre_commit {
        ValidatorKind::PRE_COMMIT.to_vec()
    } else {
        ValidatorKind::ALL.to_vec()
    };

    let runner = ValidationRunner::new(&session, &store, config)?;
    let report = runner.run(&selection, deep);

    if format == "json" {
        print_json(&report);
    } else {
        print_report(&report);
    }

    if report.status == RunStatus::Fail {
        return Err(DocPulseError::ValidationError(format!(
            "validation failed: {} error(s)",
            report.errors.len()
        )));
    }
    Ok(())
}

fn print_report(report: &Report) {
    for finding in &report.errors {
        println!(
            "  {} [{}] {}: {}",
            "✗".bright_red(),
            finding.code,
            finding.system,
            finding.message
        );
        println!("      {} {}", "↪".bright_black(), finding.hint.bright_black());
    }
    for finding in &report.warnings {
        println!(
            "  {} [{}] {}: {}",
            "⚠".bright_yellow(),
            finding.code,
            finding.system,
            finding.message
        );
    }

    let status = match report.status {
        RunStatus::Pass => "PASS".bright_green().bold(),
        RunStatus::PassWithWarnings => "PASS (with warnings)".bright_yellow().bold(),
        RunStatus::Fail => "FAIL".bright_red().bold(),
    };
    println!(
        "\n{}: {} error(s), {} warning(s)",
        status,
        report.errors.len(),
        report.warnings.len()
    );
}

fn run_fix(dry_run: bool) -> Result<(), DocPulseError> {
    let (store, mut session) = open_project()?;
    let config = ValidationConfig::load(&store)?;

    let runner = ValidationRunner::new(&session, &store, config)?;
    let report = runner.run(&ValidatorKind::ALL, false);

    let catalogue = FixCatalogue::with_defaults();
    let plan = catalogue.plan(&report);

    if plan.is_empty() {
        println!("Nothing to fix.");
        return Ok(());
    }

    if dry_run {
        println!("Planned fixes (dry run):");
        print_json(&plan);
        return Ok(());
    }

    let results = catalogue.apply(&mut session, &store, &plan);
    print_json(&results);

    let failures = results
        .iter()
        .filter(|r| matches!(r.status, fixers::FixStatus::Failed))
        .count();
    if failures > 0 {
        return Err(DocPulseError::ValidationError(format!(
            "{} fix(es) failed; see results above",
            failures
        )));
    }
    Ok(())
}

pub fn run() -> Result<(), DocPulseError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init { dir } => run_init(dir),

        Command::System(system_cli) => {
            let (store, mut session) = open_project()?;
            match system_cli.command {
                SystemCommand::Add {
                    path,
                    name,
                    description,
                } => {
                    let record = registry::create_system(
                        &mut session,
                        &store,
                        &path,
                        &name,
                        description.as_deref(),
                    )?;
                    print_json(&record);
                }
                SystemCommand::List => print_json(&registry::list_systems(&session)?),
                SystemCommand::Get { path } => {
                    let record = registry::get_system(&session, &path)?
                        .ok_or_else(|| DocPulseError::NotFound(format!("system '{}' not found", path)))?;
                    print_json(&record);
                }
                SystemCommand::Update {
                    path,
                    name,
                    description,
                } => {
                    let updated = registry::update_system(
                        &mut session,
                        &path,
                        name.as_deref(),
                        description.as_deref(),
                    )?;
                    if !updated {
                        return Err(DocPulseError::NotFound(format!("system '{}' not found", path)));
                    }
                    println!("Updated: {}", path);
                }
                SystemCommand::Rm { path } => {
                    if !registry::delete_system(&mut session, &path)? {
                        return Err(DocPulseError::NotFound(format!("system '{}' not found", path)));
                    }
                    println!("Deleted: {}", path);
                }
            }
            Ok(())
        }

        Command::Dep(dep_cli) => {
            let (_store, mut session) = open_project()?;
            match dep_cli.command {
                DepCommand::Add { system, depends_on } => {
                    registry::add_dependency(&mut session, &system, &depends_on)?;
                    println!("{} now depends on {}", system, depends_on);
                }
                DepCommand::Rm { system, depends_on } => {
                    if !registry::remove_dependency(&mut session, &system, &depends_on)? {
                        return Err(DocPulseError::NotFound(format!(
                            "no edge {} -> {}",
                            system, depends_on
                        )));
                    }
                    println!("Removed edge {} -> {}", system, depends_on);
                }
                DepCommand::Of { system } => {
                    print_json(&registry::get_dependencies(&session, &system)?)
                }
                DepCommand::On { system } => {
                    print_json(&registry::get_dependents(&session, &system)?)
                }
            }
            Ok(())
        }

        Command::Adr(adr_cli) => {
            let (store, mut session) = open_project()?;
            match adr_cli.command {
                AdrCommand::New {
                    title,
                    status,
                    links,
                    tags,
                    context,
                    decision,
                    consequences,
                } => {
                    let record = adr::create_adr(
                        &mut session,
                        &store,
                        adr::NewAdr {
                            title: &title,
                            status: &status,
                            links: links.iter().map(|s| s.as_str()).collect(),
                            tags: tags.iter().map(|s| s.as_str()).collect(),
                            context: context.as_deref(),
                            decision: decision.as_deref(),
                            consequences: consequences.as_deref(),
                        },
                    )?;
                    print_json(&record);
                }
                AdrCommand::List { status } => {
                    print_json(&adr::list_adrs(&session, status.as_deref())?)
                }
                AdrCommand::Get { id } => {
                    let record = adr::get_adr(&session, &id)?
                        .ok_or_else(|| DocPulseError::NotFound(format!("ADR '{}' not found", id)))?;
                    let tags = adr::get_tags(&session, &id)?;
                    print_json(&serde_json::json!({ "adr": record, "tags": tags }));
                }
                AdrCommand::Rm { id } => {
                    if !adr::delete_adr(&mut session, &id)? {
                        return Err(DocPulseError::NotFound(format!("ADR '{}' not found", id)));
                    }
                    println!("Deleted: {}", id);
                }
                AdrCommand::Link { id, system } => {
                    adr::link_adr_to_system(&mut session, &id, &system)?;
                    println!("Linked {} to {}", id, system);
                }
                AdrCommand::Unlink { id, system } => {
                    if !adr::unlink_adr_from_system(&mut session, &id, &system)? {
                        return Err(DocPulseError::NotFound(format!(
                            "no link between {} and {}",
                            id, system
                        )));
                    }
                    println!("Unlinked {} from {}", id, system);
                }
                AdrCommand::Supersede { old, new } => {
                    adr::supersede_adr(&mut session, &old, &new)?;
                    println!("{} superseded by {}", old, new);
                }
                AdrCommand::Tag { id, tag } => {
                    adr::add_tag(&mut session, &id, &tag)?;
                    println!("Tagged {} with '{}'", id, tag.to_lowercase());
                }
                AdrCommand::Untag { id, tag } => {
                    if !adr::remove_tag(&mut session, &id, &tag)? {
                        return Err(DocPulseError::NotFound(format!(
                            "ADR '{}' has no tag '{}'",
                            id, tag
                        )));
                    }
                    println!("Untagged '{}' from {}", tag.to_lowercase(), id);
                }
            }
            Ok(())
        }

        Command::Graph(graph_cli) => {
            let (store, session) = open_project()?;
            match graph_cli.command {
                GraphCommand::Generate => {
                    let artifact = graph::generate_artifact(&session)?;
                    graph::save_artifact(&artifact, &store.graph_path())?;
                    println!(
                        "Wrote {} ({} systems, {} edges)",
                        store.graph_path().display(),
                        artifact.systems.len(),
                        artifact.edges.len()
                    );
                }
                GraphCommand::Show => {
                    let artifact = graph::load_artifact(&store.graph_path())?;
                    print_json(&artifact);
                }
                GraphCommand::Cycles => {
                    let g = graph::DependencyGraph::from_session(&session)?;
                    print_json(&g.detect_cycles());
                }
                GraphCommand::Order => {
                    let g = graph::DependencyGraph::from_session(&session)?;
                    print_json(&g.topological_sort()?);
                }
                GraphCommand::Impact { system, direction } => {
                    let g = graph::DependencyGraph::from_session(&session)?;
                    let dir = match direction.as_str() {
                        "dependents" => graph::Direction::Dependents,
                        "dependencies" => graph::Direction::Dependencies,
                        other => {
                            return Err(DocPulseError::ValidationError(format!(
                                "invalid direction '{}'. Valid: dependents, dependencies",
                                other
                            )));
                        }
                    };
                    print_json(&g.bfs(&system, dir)?);
                }
            }
            Ok(())
        }

        Command::Check {
            deep,
            pre_commit,
            only,
            format,
        } => run_check(deep, pre_commit, only, &format),

        Command::Fix { dry_run } => run_fix(dry_run),
    }
}
