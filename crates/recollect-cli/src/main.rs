//! Recollect CLI
//!
//! Command-line interface and conversation hook for the transcript memory.

mod hook;

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use recollect_core::config::CONFIG_KEYS;
use recollect_core::{
    ArchiveProgress, ArchiveReport, ArchiveTarget, AutomationAction, AutomationReport,
    AutomationRequest, Config, Fragment, LocalEmbedder, MemoryContext, RestorationContext, Scope,
    SessionRecord,
};
use tracing_subscriber::EnvFilter;

use crate::hook::HookPayload;

type CliContext = MemoryContext<LocalEmbedder>;

/// Recollect - transcript memory CLI
#[derive(Parser)]
#[command(name = "recollect")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Archive conversation transcripts and recall them later")]
#[command(long_about = "Recollect cuts conversation transcripts into deduplicated fragments,\nembeds them locally and recalls them with hybrid keyword + semantic search.")]
struct Cli {
    /// Data directory (overrides config and RECOLLECT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive a transcript file into memory
    Archive {
        /// Transcript file (JSONL or JSON array)
        transcript: PathBuf,
        /// Project to file fragments under
        #[arg(long)]
        project: Option<String>,
        /// Session id to attribute fragments to
        #[arg(long)]
        session: Option<String>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search archived fragments
    Search {
        /// Query text
        query: String,
        /// Restrict to a project ("global" for project-less fragments)
        #[arg(long)]
        project: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value = "10")]
        limit: usize,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the most recent fragments
    Recent {
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show one fragment in full
    Show {
        id: String,
    },

    /// Replace a fragment's content
    Edit {
        id: String,
        content: String,
    },

    /// Delete one fragment
    Delete {
        id: String,
    },

    /// Delete every fragment of a project
    Forget {
        /// Project to forget ("global" for project-less fragments)
        #[arg(long)]
        project: String,
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show memory statistics
    Stats {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Run one auto-save / auto-clear step
    Auto {
        /// Transcript of the running conversation
        #[arg(long)]
        transcript: PathBuf,
        /// Context utilization (0-100); estimated from the transcript when omitted
        #[arg(long)]
        context_percent: Option<f64>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Conversation hook: reads the hook payload JSON from stdin
    Hook {
        /// Project override (defaults to the working directory name)
        #[arg(long)]
        project: Option<String>,
    },

    /// Build a restoration context from recent work
    Restore {
        #[arg(long)]
        project: Option<String>,
        /// Maximum number of fragments
        #[arg(long)]
        messages: Option<usize>,
        /// Token budget
        #[arg(long)]
        budget: Option<usize>,
        #[arg(long)]
        json: bool,
    },

    /// Session analytics
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Inspect or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Start a session, ending the active one
    Start {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        project: Option<String>,
    },
    /// End the active session
    End,
    /// Show the active session and recent history
    Status {
        #[arg(long, default_value = "5")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Set one field and save
    Set { key: String, value: String },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let data_dir = cli.data_dir.as_deref();

    let command = match cli.command {
        Commands::Config { command } => return run_config(config_path, data_dir, command),
        command => command,
    };

    let ctx = MemoryContext::open_default(load_config(config_path, data_dir)?)?;

    match command {
        Commands::Archive {
            transcript,
            project,
            session,
            json,
        } => run_archive(&ctx, &transcript, project, session, json)?,
        Commands::Search {
            query,
            project,
            limit,
            json,
        } => run_search(&ctx, &query, project.as_deref(), limit, json)?,
        Commands::Recent { project, limit } => run_recent(&ctx, project.as_deref(), limit)?,
        Commands::Show { id } => run_show(&ctx, &id)?,
        Commands::Edit { id, content } => run_edit(&ctx, &id, &content)?,
        Commands::Delete { id } => run_delete(&ctx, &id)?,
        Commands::Forget { project, yes } => run_forget(&ctx, &project, yes)?,
        Commands::Stats { project, json } => run_stats(&ctx, project.as_deref(), json)?,
        Commands::Auto {
            transcript,
            context_percent,
            project,
            session,
            json,
        } => {
            let request = AutomationRequest {
                transcript_path: transcript,
                context_percent,
                project,
                session_id: session,
            };
            let report = ctx.automate(&request)?;
            print_automation(&report, json)?;
        }
        Commands::Hook { project } => run_hook(&ctx, project.as_deref())?,
        Commands::Restore {
            project,
            messages,
            budget,
            json,
        } => run_restore(&ctx, project.as_deref(), messages, budget, json)?,
        Commands::Session { command } => run_session(&ctx, command)?,
        Commands::Config { .. } => {}
    }

    ctx.close()?;
    Ok(())
}

fn load_config(config_path: Option<&Path>, data_dir: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::load(config_path)?;
    if let Some(dir) = data_dir {
        config.data_dir = Some(dir.to_path_buf());
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run archive command
fn run_archive(
    ctx: &CliContext,
    transcript: &Path,
    project: Option<String>,
    session: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let target = ArchiveTarget {
        project,
        session_id: session,
    };

    let mut progress = |event: ArchiveProgress| {
        if json {
            return;
        }
        let (stage, done, total) = match event {
            ArchiveProgress::Embedding { done, total } => ("Embedding", done, total),
            ArchiveProgress::Storing { done, total } => ("Storing", done, total),
        };
        eprint!("\r{} {}/{}", stage.dimmed(), done, total);
        if done == total {
            eprintln!();
        }
    };
    let report = ctx.archive(transcript, &target, &mut progress)?;

    if json {
        return print_json(&report);
    }

    println!("{}", "=== Recollect Archive ===".cyan().bold());
    println!();
    print_archive_report(&report);
    Ok(())
}

fn print_archive_report(report: &ArchiveReport) {
    println!("{}: {}", "Archived".white().bold(), report.archived.to_string().green());
    println!("{}: {}", "Duplicates".white().bold(), report.duplicates);
    println!(
        "{}: {} (too short {}, low information {}, not valuable {})",
        "Skipped".white().bold(),
        report.skipped,
        report.discarded.too_short,
        report.discarded.low_information,
        report.discarded.not_valuable
    );
    if report.malformed_records > 0 {
        println!(
            "{}: {}",
            "Malformed Records".yellow().bold(),
            report.malformed_records
        );
    }
    if let Some(session) = &report.session_id {
        println!("{}: {}", "Session".white().bold(), session);
    }
}

/// Run search command
fn run_search(
    ctx: &CliContext,
    query: &str,
    project: Option<&str>,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let scope = Scope::from_project(project);
    let results = ctx.search(query, &scope, limit)?;

    if json {
        return print_json(&results);
    }

    if results.is_empty() {
        println!("{}", format!("No fragments match in {}.", scope).dimmed());
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{} {} {} {}",
            format!("[{}]", i + 1).cyan().bold(),
            format!("{:.4}", result.score).white().bold(),
            result.provenance.to_string().dimmed(),
            fragment_header(&result.fragment).dimmed()
        );
        println!("    {}", truncate(&result.fragment.content, 200));
    }
    Ok(())
}

/// Run recent command
fn run_recent(ctx: &CliContext, project: Option<&str>, limit: usize) -> anyhow::Result<()> {
    let fragments = ctx.storage().list_recent(&Scope::from_project(project), limit)?;
    if fragments.is_empty() {
        println!("{}", "No fragments found.".dimmed());
        return Ok(());
    }

    for fragment in &fragments {
        println!("{}", fragment_header(fragment).cyan());
        println!("    {}", truncate(&fragment.content, 200));
    }
    Ok(())
}

fn run_show(ctx: &CliContext, id: &str) -> anyhow::Result<()> {
    let Some(fragment) = ctx.storage().fetch(id)? else {
        anyhow::bail!("Fragment not found: {}", id);
    };

    println!("{}: {}", "Id".white().bold(), fragment.id);
    println!("{}: {}", "Project".white().bold(), fragment.project_label());
    println!("{}: {}", "Timestamp".white().bold(), fragment.timestamp.format("%Y-%m-%d %H:%M:%S"));
    println!("{}: {}", "Created".white().bold(), fragment.created_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(session) = &fragment.source_session {
        println!("{}: {}", "Session".white().bold(), session);
    }
    println!("{}: {}", "Fingerprint".white().bold(), fragment.fingerprint);
    println!();
    println!("{}", fragment.content);
    Ok(())
}

fn run_edit(ctx: &CliContext, id: &str, content: &str) -> anyhow::Result<()> {
    if !ctx.update_fragment(id, content)? {
        anyhow::bail!("Fragment not found: {}", id);
    }
    println!("{} {}", "Updated".green(), id);
    Ok(())
}

fn run_delete(ctx: &CliContext, id: &str) -> anyhow::Result<()> {
    if !ctx.storage().delete(id)? {
        anyhow::bail!("Fragment not found: {}", id);
    }
    println!("{} {}", "Deleted".green(), id);
    Ok(())
}

/// Run forget command - deletes a whole project
fn run_forget(ctx: &CliContext, project: &str, yes: bool) -> anyhow::Result<()> {
    let scope = Scope::from_project(Some(project));
    if scope == Scope::All {
        anyhow::bail!("A project name is required");
    }

    let count = ctx.storage().stats(&scope)?.fragment_count;
    if count == 0 {
        println!("{}", format!("No fragments in {}.", scope).dimmed());
        return Ok(());
    }

    // Confirmation prompt (unless --yes)
    if !yes {
        print!(
            "{} Delete {} fragments from {}? This cannot be undone. [y/N] ",
            "WARNING:".red().bold(),
            count,
            scope
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input != "y" && input != "yes" {
            println!("{}", "Aborted.".yellow());
            return Ok(());
        }
    }

    let deleted = ctx.storage().delete_by_project(scope.write_project().as_deref())?;
    println!(
        "{}",
        format!("Deleted {} fragments from {}", deleted, scope).green().bold()
    );
    Ok(())
}

/// Run stats command
fn run_stats(ctx: &CliContext, project: Option<&str>, json: bool) -> anyhow::Result<()> {
    let scope = Scope::from_project(project);
    let stats = ctx.storage().stats(&scope)?;

    if json {
        return print_json(&stats);
    }

    println!("{}", "=== Recollect Memory Statistics ===".cyan().bold());
    println!();
    println!("{}: {}", "Scope".white().bold(), scope);
    println!("{}: {}", "Fragments".white().bold(), stats.fragment_count);
    println!("{}: {}", "Sessions".white().bold(), stats.session_count);
    if let Some(oldest) = stats.oldest {
        println!("{}: {}", "Oldest Fragment".white().bold(), oldest.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(newest) = stats.newest {
        println!("{}: {}", "Newest Fragment".white().bold(), newest.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("{}: {}", "Size".white().bold(), format_size(stats.size_bytes));
    println!("{}: {}", "Database".white().bold(), ctx.storage().path().display());
    Ok(())
}

/// Run hook command
///
/// `SessionStart` resets the per-session auto-save flag and starts an
/// analytics session; every other event runs one automation step.
fn run_hook(ctx: &CliContext, project: Option<&str>) -> anyhow::Result<()> {
    let mut raw = String::new();
    io::stdin().read_to_string(&mut raw)?;
    let payload = HookPayload::parse(&raw)?;
    let project = payload.project(project);

    if payload.is_session_start() {
        ctx.reset_session();
        let session = ctx.storage().start_session(
            payload.session_id.as_deref(),
            project.as_deref(),
            Utc::now(),
        )?;
        println!(
            "{}",
            serde_json::json!({ "action": "session_start", "sessionId": session.session_id })
        );
        return Ok(());
    }

    let Some(transcript_path) = payload.transcript_path.clone() else {
        tracing::debug!("Hook payload without transcript path, nothing to do");
        return Ok(());
    };

    let request = AutomationRequest {
        transcript_path,
        context_percent: payload.context_percent,
        project,
        session_id: payload.session_id.clone(),
    };
    let report = ctx.automate(&request)?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn print_automation(report: &AutomationReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }

    let action = match report.action {
        AutomationAction::None => "none".dimmed(),
        AutomationAction::AutoSave => "auto-save".green().bold(),
        AutomationAction::AutoClear => "auto-clear".magenta().bold(),
    };
    println!("{}: {}", "Action".white().bold(), action);
    println!("{}: {:.1}%", "Context".white().bold(), report.context_percent);
    println!("{}: {}", "Session".white().bold(), report.session_id);

    if let Some(archive) = &report.archive {
        println!();
        print_archive_report(archive);
    }
    if let Some(restoration) = &report.restoration {
        println!();
        print_restoration(restoration);
    }
    if report.recommend_clear {
        println!();
        println!(
            "{}",
            "Context archived. Clear the conversation to continue with the restored summary."
                .yellow()
        );
    }
    Ok(())
}

/// Run restore command
fn run_restore(
    ctx: &CliContext,
    project: Option<&str>,
    messages: Option<usize>,
    budget: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let config = ctx.config();
    let restoration = ctx.restore(
        &Scope::from_project(project),
        messages.unwrap_or(config.restoration_message_count),
        budget.unwrap_or(config.restoration_token_budget),
    )?;

    if json {
        return print_json(&restoration);
    }
    print_restoration(&restoration);
    Ok(())
}

fn print_restoration(restoration: &RestorationContext) {
    println!("{}", "=== Restored Context ===".cyan().bold());
    println!("{}", restoration.render());
}

fn run_session(ctx: &CliContext, command: SessionCommands) -> anyhow::Result<()> {
    let storage = ctx.storage();
    match command {
        SessionCommands::Start { id, project } => {
            ctx.reset_session();
            let session = storage.start_session(id.as_deref(), project.as_deref(), Utc::now())?;
            println!("{} {}", "Started session".green(), session.session_id);
        }
        SessionCommands::End => match storage.end_session(Utc::now())? {
            Some(session) => {
                println!("{} {}", "Ended session".green(), session.session_id);
                print_session(&session);
            }
            None => println!("{}", "No active session.".dimmed()),
        },
        SessionCommands::Status { limit } => {
            println!("{}", "=== Recollect Sessions ===".cyan().bold());
            println!();
            match storage.active_session()? {
                Some(session) => print_session(&session),
                None => println!("{}", "No active session.".dimmed()),
            }

            let state = ctx.auto_save_state();
            println!();
            println!(
                "{}: {}",
                "Saved This Session".white().bold(),
                if state.has_saved_this_session { "yes".green() } else { "no".dimmed() }
            );
            if let Some(at) = state.last_auto_save_timestamp {
                println!(
                    "{}: {} at {:.1}%",
                    "Last Auto-Save".white().bold(),
                    at.format("%Y-%m-%d %H:%M:%S"),
                    state.last_auto_save_context_percent.unwrap_or_default()
                );
            }

            let recent = storage.recent_sessions(limit)?;
            if !recent.is_empty() {
                println!();
                println!("{}", "Recent:".white().bold());
                for session in &recent {
                    let status = if session.is_active() { "active".green() } else { "ended".dimmed() };
                    println!(
                        "  {} {} peak {:.1}% fragments {} clears {} [{}]",
                        session.started_at.format("%Y-%m-%d %H:%M"),
                        session.session_id,
                        session.peak_context_percent,
                        session.fragments_created,
                        session.clear_count,
                        status
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_session(session: &SessionRecord) {
    println!("{}: {}", "Session".white().bold(), session.session_id);
    if let Some(project) = &session.project {
        println!("{}: {}", "Project".white().bold(), project);
    }
    println!("{}: {}", "Started".white().bold(), session.started_at.format("%Y-%m-%d %H:%M:%S"));
    println!("{}: {:.1}%", "Peak Context".white().bold(), session.peak_context_percent);
    println!("{}: {}", "Fragments Created".white().bold(), session.fragments_created);
    println!("{}: {}", "Clears".white().bold(), session.clear_count);
    for point in &session.save_points {
        println!(
            "  {} {} at {:.1}% ({} fragments)",
            ">".cyan(),
            point.timestamp.format("%H:%M:%S"),
            point.context_percent,
            point.fragments_saved
        );
    }
}

/// Run config subcommands (no store needed)
fn run_config(
    config_path: Option<&Path>,
    data_dir: Option<&Path>,
    command: ConfigCommands,
) -> anyhow::Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };

    match command {
        ConfigCommands::Show => {
            let config = load_config(config_path, data_dir)?;
            print_json(&config)?;
        }
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load(Some(&path))?;
            if let Err(e) = config.set(&key, &value) {
                eprintln!("{} {}", "Known keys:".dimmed(), CONFIG_KEYS.join(", "));
                return Err(e.into());
            }
            config.save(&path)?;
            println!("{} {} = {}", "Set".green(), key, value);
        }
    }
    Ok(())
}

fn fragment_header(fragment: &Fragment) -> String {
    format!(
        "{} {} {}",
        short_id(&fragment.id),
        fragment.timestamp.format("%Y-%m-%d %H:%M"),
        fragment.project_label()
    )
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_size(bytes: i64) -> String {
    let bytes = bytes.max(0) as f64;
    if bytes >= 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else if bytes >= 1024.0 {
        format!("{:.1} KB", bytes / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Truncate a string for display (UTF-8 safe)
fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_chars {
        s
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "ééé...");
        assert_eq!(truncate("a\nb", 10), "a b");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "recollect",
            "search",
            "migration plan",
            "--limit",
            "3",
            "--data-dir",
            "/tmp/rc",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/rc")));
        assert!(matches!(cli.command, Commands::Search { limit: 3, .. }));
    }

    #[test]
    fn test_config_set_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        run_config(
            Some(&path),
            None,
            ConfigCommands::Set {
                key: "autoSaveThreshold".to_string(),
                value: "65".to_string(),
            },
        )
        .unwrap();

        let saved = Config::load(Some(&path)).unwrap();
        assert_eq!(saved.auto_save_threshold, 65.0);
        assert_eq!(saved.auto_clear_threshold, Config::default().auto_clear_threshold);
    }

    #[test]
    fn test_config_set_unknown_key_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let result = run_config(
            Some(&path),
            None,
            ConfigCommands::Set {
                key: "noSuchKey".to_string(),
                value: "1".to_string(),
            },
        );

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_data_dir_flag_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"dataDir": "/from/file", "restorationTokenBudget": 400}"#)
            .unwrap();

        let flag_dir = dir.path().join("flag");
        let config = load_config(Some(&path), Some(&flag_dir)).unwrap();
        assert_eq!(config.data_dir, Some(flag_dir));
        assert_eq!(config.restoration_token_budget, 400);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
