//! Command-line driver for the Cryo toolchain (spec §6, "CLI surface"):
//! `new`/`build`/`clean`/`run`/`help`. Out of the core's scope by spec §1,
//! specified only for boundary clarity — this is that boundary's
//! implementation, wiring `cryo-asm`/`cryo-link`/`cryo-vm` together.
//!
//! Workspace discovery walks up from the current directory for the nearest
//! `cryo.toml`; `build` assembles every `.crya` under `bin/int/` in
//! parallel via `std::thread::scope` (spec §5), then links the result.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use cryo_core::{Diagnostic, ErrorQueue};

use config::CryoToml;

#[derive(Parser)]
#[command(name = "cryo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Assembler, linker and interpreter for the Cryo bytecode runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold an empty workspace
    New {
        /// Target folder; must not exist or must be empty
        folder: PathBuf,
    },
    /// Assemble every .crya under bin/int/ and link the result
    Build {
        /// Build configuration name (default: "debug")
        config: Option<String>,
    },
    /// Remove generated artifacts
    Clean,
    /// Build, then execute bin/<config>/main.crye
    Run {
        /// Build configuration name (default: "debug")
        config: Option<String>,
        /// Arguments forwarded to the program, after `--`
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Print the action list, or a detailed description of one action
    Help { action: Option<String> },
}

const DEFAULT_CONFIG: &str = "debug";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("cryo=info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::New { folder } => action_new(&folder),
        Commands::Build { config } => action_build(&config.unwrap_or_else(|| DEFAULT_CONFIG.to_string())),
        Commands::Clean => action_clean(),
        Commands::Run { config, args } => action_run(&config.unwrap_or_else(|| DEFAULT_CONFIG.to_string()), &args),
        Commands::Help { action } => action_help(action.as_deref()),
    };
    ExitCode::from(code.rem_euclid(256) as u8)
}

/// Spec §6: "scaffold an empty workspace with a `src/` subdirectory; fail
/// if the target exists and is non-empty."
fn action_new(folder: &Path) -> i32 {
    if folder.exists() {
        if !folder.is_dir() {
            tracing::error!(path = %folder.display(), "already exists and is not a directory");
            return -1;
        }
        if folder.read_dir().map(|mut entries| entries.next().is_some()).unwrap_or(true) {
            tracing::error!(path = %folder.display(), "directory exists and is not empty");
            return -1;
        }
    } else if let Err(error) = std::fs::create_dir_all(folder) {
        tracing::error!(path = %folder.display(), %error, "could not create workspace folder");
        return -1;
    }

    if let Err(error) = std::fs::create_dir_all(folder.join("src")) {
        tracing::error!(%error, "could not create src/");
        return -1;
    }

    if let Err(error) = std::fs::create_dir_all(folder.join("bin/int")) {
        tracing::error!(%error, "could not create bin/int/");
        return -1;
    }

    let name = folder.file_name().and_then(|n| n.to_str()).unwrap_or("cryo-project");
    if let Err(error) = std::fs::write(folder.join("cryo.toml"), CryoToml::new(name).to_toml_string()) {
        tracing::error!(%error, "could not write cryo.toml");
        return -1;
    }

    tracing::info!(path = %folder.display(), "created workspace");
    0
}

/// Spec §6: "locate the nearest ancestor containing `cryo.toml`, assemble
/// every `.crya` under `bin/int/`, link into `bin/<config>/main.crye`."
fn action_build(config: &str) -> i32 {
    let Some(workspace) = current_workspace() else {
        return -1;
    };
    let project = match config::read(&workspace) {
        Ok(project) => project,
        Err(error) => {
            tracing::error!(path = %workspace.join("cryo.toml").display(), %error, "could not read cryo.toml");
            return -1;
        }
    };

    let int_dir = workspace.join("bin/int");
    if let Err(error) = std::fs::create_dir_all(&int_dir) {
        tracing::error!(%error, "could not create bin/int/");
        return -1;
    }

    tracing::info!(project = %project.project.name, "building...");
    let sources = find_crya_files(&int_dir);
    let (object_paths, errors) = assemble_all(&sources);
    print_diagnostics(&errors);
    if errors.has_errors() {
        return -2;
    }

    let out_dir = workspace.join("bin").join(config);
    if let Err(error) = std::fs::create_dir_all(&out_dir) {
        tracing::error!(%error, "could not create bin/{config}/");
        return -1;
    }

    tracing::info!("linking...");
    let out_path = out_dir.join("main.crye");
    let link_errors = cryo_link::link(&object_paths, &out_path);
    print_diagnostics(&link_errors);
    if link_errors.has_errors() {
        return -2;
    }

    tracing::info!(path = %out_path.display(), "build finished");
    0
}

/// Spec §6: "remove generated artifacts."
fn action_clean() -> i32 {
    let Some(workspace) = current_workspace() else {
        return -1;
    };
    let bin_dir = workspace.join("bin");
    if bin_dir.exists() {
        if let Err(error) = std::fs::remove_dir_all(&bin_dir) {
            tracing::error!(%error, "could not remove bin/");
            return -1;
        }
    }
    0
}

/// Spec §6: "`build` then execute `main.crye`, forwarding `args`."
fn action_run(config: &str, args: &[String]) -> i32 {
    let build_code = action_build(config);
    if build_code != 0 {
        return build_code;
    }

    let Some(workspace) = current_workspace() else {
        return -1;
    };
    let executable_path = workspace.join("bin").join(config).join("main.crye");
    cryo_vm::run(&executable_path, args)
}

const ACTIONS: &[(&str, &str)] = &[
    ("new", "new <folder> | scaffold an empty workspace at <folder>."),
    ("build", "build [config] | assemble and link the workspace at the current folder; default configuration is 'debug'."),
    ("clean", "clean | remove generated artifacts."),
    ("run", "run [config] [-- args...] | build, then run the workspace's executable, forwarding args."),
    ("help", "help [action] | print this list, or describe one action."),
];

fn print_action_list() {
    println!("===============");
    println!("==Action list==");
    println!("===============");
    for (name, _) in ACTIONS {
        println!("-{name}");
    }
    println!("===============");
}

fn describe_action(name: &str) {
    match ACTIONS.iter().find(|(n, _)| *n == name) {
        Some((_, text)) => println!("{text}"),
        None => println!("Unknown action: {name}"),
    }
}

/// Spec §6: "print the action list and accept action names for detailed
/// descriptions until `quit` is typed." With an action given up front that
/// action's description prints immediately; either way the prompt then
/// keeps reading names from stdin until `quit` or end of input.
fn action_help(action: Option<&str>) -> i32 {
    match action {
        None => print_action_list(),
        Some(name) => describe_action(name),
    }

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break; // EOF
        }
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        if name == "quit" {
            break;
        }
        describe_action(name);
    }
    0
}

fn current_workspace() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    match config::find_workspace(&cwd) {
        Some(workspace) => Some(workspace),
        None => {
            tracing::error!("current directory is not inside of a Cryo workspace");
            None
        }
    }
}

fn find_crya_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(find_crya_files(&path));
        } else if path.extension().is_some_and(|ext| ext == "crya") {
            out.push(path);
        }
    }
    out
}

/// Assembles every source in `sources` concurrently, one thread per file
/// (spec §5: "the outer driver MAY run one assembler per input file in
/// parallel"), joining each scoped thread's `(object_path, ErrorQueue)`.
fn assemble_all(sources: &[PathBuf]) -> (Vec<PathBuf>, ErrorQueue) {
    tracing::info!(count = sources.len(), "starting compilation");

    let results: Vec<(PathBuf, ErrorQueue)> = std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                scope.spawn(move || {
                    tracing::info!(path = %source.display(), "assembling");
                    cryo_asm::assemble(source)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("assembler thread should not panic")).collect()
    });

    let mut errors = ErrorQueue::new();
    let mut object_paths = Vec::with_capacity(results.len());
    for (object_path, queue) in results {
        object_paths.push(object_path);
        errors.extend(queue);
    }
    (object_paths, errors)
}

fn print_diagnostics(errors: &ErrorQueue) {
    for diagnostic in errors.iter() {
        print_diagnostic(diagnostic);
    }
}

/// Spec §7: "the driver prints each diagnostic as `code path at line N: …
/// <offending>` … then a second line with the message" — `Diagnostic`'s own
/// `Display` already renders exactly that.
fn print_diagnostic(diagnostic: &Diagnostic) {
    eprintln!("{diagnostic}");
}
