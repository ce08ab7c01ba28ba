//! ctree CLI - a persistent dependency graph of code elements.

use clap::Parser;
use colored::*;
use ctree::tools::{self, ToolCall};
use ctree::{Client, Config, Daemon, DependencyList, Store, is_daemon_running, mcp};
use eyre::{Context, Result};
use log::info;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ctree")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("ctree.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn get_config(cli: &Cli) -> Config {
    let dir = cli
        .working_dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    Config::new(dir)
}

/// Run a tool through the daemon when one is up, else against the store directly.
fn execute(config: &Config, call: ToolCall) -> Result<Value> {
    if is_daemon_running(config) {
        let mut client = Client::connect(config).context("Failed to connect to daemon")?;
        return client.call(call);
    }

    let mut store = Store::open(config)?;
    Ok(tools::dispatch(&mut store, call))
}

fn tool_call(command: Command) -> Result<Option<ToolCall>> {
    let call = match command {
        Command::Add {
            id,
            kind,
            code,
            code_file,
            description,
            deps,
            source_file,
            line_range,
        } => {
            let code = match code_file {
                Some(path) => {
                    fs::read_to_string(&path).wrap_err_with(|| format!("Failed to read {}", path.display()))?
                }
                None => code,
            };
            ToolCall::AddCodeElement {
                element_id: id,
                element_type: kind,
                code,
                description,
                dependencies: DependencyList(deps),
                source_file,
                line_range,
            }
        }

        Command::Update {
            id,
            code,
            description,
            deps,
            clear_deps,
            source_file,
            line_range,
        } => ToolCall::UpdateCodeElement {
            element_id: id,
            code,
            description,
            dependencies: if clear_deps {
                Some(DependencyList::default())
            } else {
                deps.map(DependencyList)
            },
            source_file,
            line_range,
        },

        Command::Deps { id, deps, op } => ToolCall::EditDependencies {
            element_id: id,
            dependencies: DependencyList(deps),
            operation: op,
        },

        Command::Get { id } => ToolCall::GetElement { element_id: id },
        Command::List => ToolCall::ListAllElements {},
        Command::Remove { id } => ToolCall::RemoveElement { element_id: id },
        Command::Missing { id } => ToolCall::FindMissingDependencies { element_id: id },
        Command::Tree { root, max_depth } => ToolCall::GetKnowledgeTreeView {
            root_element_id: root,
            max_depth,
        },
        Command::Stats => ToolCall::GetKnowledgeTreeStats {},
        Command::Info => ToolCall::GetWorkingDirectoryInfo {},
        Command::Import {
            file,
            only,
            no_auto_extract,
        } => ToolCall::ImportFromAnalysisFile {
            // The daemon resolves paths against its own cwd
            file_path: std::path::absolute(&file)
                .wrap_err_with(|| format!("Invalid path {}", file.display()))?
                .display()
                .to_string(),
            element_id: only,
            auto_extract: !no_auto_extract,
        },

        _ => return Ok(None),
    };
    Ok(Some(call))
}

fn str_list(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn print_missing_note(analysis: &Value) {
    let missing = str_list(&analysis["missing_dependencies"]);
    if !missing.is_empty() {
        println!("  {} Missing dependencies: {}", "!".yellow(), missing.join(", ").yellow());
    }
}

/// Human-readable rendering of a successful tool result.
fn report(tool: &str, result: &Value) {
    let message = text(result, "message");

    match tool {
        "add_code_element" => {
            println!("{} {}", "✓".green(), message);
            print_missing_note(&result["dependency_analysis"]);
        }

        "edit_dependencies" => {
            let changes = &result["dependency_changes"];
            println!("{} {}", "✓".green(), message);
            println!(
                "  {} → {}",
                str_list(&changes["original_dependencies"]).join(", ").dimmed(),
                str_list(&changes["new_dependencies"]).join(", ").cyan()
            );
            print_missing_note(changes);
        }

        "update_code_element" => {
            println!("{} {}", "✓".green(), message);
            println!("  Fields: {}", str_list(&result["updated_fields"]).join(", "));
            if let Some(analysis) = result.get("dependency_analysis") {
                print_missing_note(analysis);
            }
        }

        "get_element" => {
            let element = &result["element"];
            println!("{}: {}", "ID".bold(), text(element, "id").cyan());
            println!("{}: {}", "Type".bold(), text(element, "type"));
            println!("{}: {}", "Description".bold(), text(element, "description"));
            println!("{}: {}", "Dependencies".bold(), str_list(&element["dependencies"]).join(", "));
            println!("{}: {}", "Dependents".bold(), str_list(&element["dependents"]).join(", "));
            if let Some(source_file) = element["source_file"].as_str() {
                let lines = element["line_range"]
                    .as_str()
                    .map(|r| format!(":{}", r))
                    .unwrap_or_default();
                println!("{}: {}{}", "Source".bold(), source_file, lines);
            }
            if let Some(created_at) = element["created_at"].as_str() {
                println!("{}: {}", "Created".bold(), created_at);
            }
            if let Some(updated_at) = element["updated_at"].as_str() {
                println!("{}: {}", "Updated".bold(), updated_at);
            }
            let code = text(element, "code");
            if !code.is_empty() {
                println!("{}:\n{}", "Code".bold(), code);
            }
        }

        "list_all_elements" => {
            let elements = result["elements"].as_array().cloned().unwrap_or_default();
            if elements.is_empty() {
                println!("{}", "Knowledge tree is empty".dimmed());
            }
            for element in &elements {
                println!(
                    "{} [{}] {} {}",
                    text(element, "id").cyan(),
                    text(element, "type"),
                    text(element, "description"),
                    format!(
                        "({} deps, {} dependents)",
                        element["dependencies_count"], element["dependents_count"]
                    )
                    .dimmed()
                );
            }
        }

        "remove_element" => {
            println!("{} {}", "✓".green(), message);
            for reference in str_list(&result["cleaned_references"]) {
                println!("  {} {}", "-".dimmed(), reference);
            }
            for failure in result["failed_updates"].as_array().into_iter().flatten() {
                println!(
                    "  {} {}: {}",
                    "✗".red(),
                    text(failure, "element_id"),
                    text(failure, "error")
                );
            }
        }

        "find_missing_dependencies" => {
            let missing = result["missing_dependencies"].as_object().cloned().unwrap_or_default();
            if missing.is_empty() {
                println!(
                    "{} No missing dependencies ({} elements checked)",
                    "✓".green(),
                    result["checked_elements"]
                );
            }
            for (dep_id, references) in &missing {
                println!("{} {}", "?".yellow(), dep_id.yellow());
                for reference in references.as_array().into_iter().flatten() {
                    println!(
                        "  ← {} [{}] {}",
                        text(reference, "referencing_element").cyan(),
                        text(reference, "element_type"),
                        text(reference, "description").dimmed()
                    );
                }
            }
        }

        "get_knowledge_tree_view" => {
            if !message.is_empty() {
                println!("{}", message.dimmed());
                return;
            }
            println!("{}", text(result, "tree"));
            let statistics = &result["statistics"];
            println!(
                "{}",
                format!(
                    "{} elements, avg {} deps, max {}, {} orphaned",
                    statistics["total_elements"],
                    statistics["avg_dependencies"],
                    statistics["max_dependencies"],
                    statistics["orphaned_elements"]
                )
                .dimmed()
            );
        }

        "get_knowledge_tree_stats" => {
            let stats = &result["stats"];
            if !message.is_empty() {
                println!("{}", message.dimmed());
            }
            println!("{}: {}", "Elements".bold(), stats["total_elements"]);
            for (kind, count) in stats["element_types"].as_object().into_iter().flatten() {
                println!("  {}: {}", kind, count);
            }
            let deps = &stats["dependency_stats"];
            println!(
                "{}: {} total, avg {}, max {}",
                "Dependencies".bold(),
                deps["total_dependencies"],
                deps["avg_dependencies_per_element"],
                deps["max_dependencies"]
            );
            let health = &stats["health_metrics"];
            println!("{}: {}", "Health score".bold(), health["overall_health_score"]);
            println!("  Orphaned: {}", health["orphaned_elements"]);
            println!("  Missing: {}", health["missing_dependencies"]);
            println!("  Cycles: {}", health["circular_dependencies"]);
        }

        "import_from_analysis_file" => {
            println!("{} {}", "✓".green(), message);
            let extracted = &result["extracted_info"];
            println!(
                "  Found {} functions, imported {}",
                extracted["functions_found"],
                str_list(&result["imported_elements"]).len()
            );
            for failure in str_list(&result["failed_imports"]) {
                println!("  {} {}", "✗".red(), failure);
            }
            let modules = str_list(&extracted["modules_referenced"]);
            if !modules.is_empty() {
                println!("  Modules referenced: {}", modules.join(", "));
            }
        }

        "get_working_directory_info" => {
            let info = &result["working_directory"];
            println!("{}: {}", "Working directory".bold(), text(info, "base_working_dir"));
            println!("{}: {}", "Knowledge tree".bold(), text(info, "knowledge_tree_dir"));
            println!("{}: {}", "Elements".bold(), text(info, "elements_dir"));
            println!("{}: {}", "Metadata".bold(), text(info, "metadata_file"));
            println!("{}: {}", "Exists".bold(), info["knowledge_tree_exists"]);
        }

        _ => println!("{}", serde_json::to_string_pretty(result).unwrap_or_default()),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = get_config(&cli);
    let json = cli.json;

    match cli.command {
        Command::Init => {
            Store::init(&config).context("Failed to initialize knowledge tree")?;
            println!(
                "{} Initialized knowledge tree in {}",
                "✓".green(),
                config.knowledge_dir().display()
            );
        }

        Command::Serve => {
            let store = Store::init(&config).context("Failed to initialize knowledge tree")?;
            mcp::Server::new(store).run().context("MCP server error")?;
        }

        Command::Daemon => {
            println!("{} Starting daemon for {}", "→".blue(), config.working_dir().display());

            let mut daemon = Daemon::new(&config).context("Failed to create daemon")?;

            let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
            rt.block_on(async { daemon.run().await }).context("Daemon error")?;
        }

        Command::DaemonStop => {
            if !is_daemon_running(&config) {
                println!("{} Daemon is not running", "✗".red());
                std::process::exit(1);
            }

            let mut client = Client::connect(&config).context("Failed to connect to daemon")?;
            client.shutdown().context("Failed to shutdown daemon")?;
            println!("{} Daemon stopped", "✓".green());
        }

        Command::DaemonStatus => {
            if is_daemon_running(&config) {
                println!("{} Daemon is running", "✓".green());

                if let Ok(mut client) = Client::connect(&config)
                    && client.ping().is_ok()
                {
                    println!("  {} Responding to requests", "✓".green());
                }
            } else {
                println!("{} Daemon is not running", "✗".red());
            }
        }

        command => {
            let Some(call) = tool_call(command)? else {
                return Ok(());
            };
            let tool = call.name();
            let result = execute(&config, call)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result["success"] == true {
                report(tool, &result);
            } else {
                eprintln!("{} {}", "✗".red(), text(&result, "message"));
            }

            if result["success"] != true {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
