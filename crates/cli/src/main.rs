//! dumpcs: look up methods and classes in IL2CPP dump.cs files

mod logging;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use dumpcs_core::{ClassInfo, ClassMatch, Config, MethodRecord};
use dumpcs_il2cpp::output::{self, ClassListing, ScriptJson};
use dumpcs_il2cpp::DumpFile;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dumpcs")]
#[command(version)]
#[command(about = "Look up methods and classes in IL2CPP dump.cs files by name or RVA")]
struct Cli {
    /// dump.cs file to scan
    #[arg(short, long, value_name = "PATH")]
    dump: PathBuf,

    /// JSON configuration file; recent dumps are recorded in it
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the first method with the given name
    #[command(alias = "m")]
    Method { name: String },
    /// Find methods by RVA (e.g. 0x1A2B3C4)
    #[command(alias = "o")]
    Offset {
        #[arg(required = true)]
        offsets: Vec<String>,
        /// Print the full method text
        #[arg(long)]
        full: bool,
    },
    /// Name the class containing the method at an RVA
    #[command(name = "class-of")]
    ClassOf { offset: String },
    /// Show a class with its fields and methods
    #[command(alias = "c")]
    Class {
        name: String,
        /// Match the class name exactly instead of by substring
        #[arg(long)]
        exact: bool,
    },
    /// List classes and members with obfuscated names
    Obfuscated,
    /// Write scan results to a file
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Script)]
        format: ExportFormat,
        /// Output file (defaults to the configured export directory)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Report structural problems in the dump
    Check,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    /// IDA/Ghidra script JSON
    Script,
    /// Plain-text class listing
    Listing,
    /// Scan statistics
    Report,
}

impl ExportFormat {
    fn default_file_name(self) -> &'static str {
        match self {
            ExportFormat::Script => "script.json",
            ExportFormat::Listing => "classes.txt",
            ExportFormat::Report => "report.json",
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    logging::initialize_logging(&logging::level_for(cli.verbose, &config.log_level));

    if let Commands::Class { exact: true, .. } = cli.command {
        config.class_match = ClassMatch::Exact;
    }

    let dump = DumpFile::load_with_config(&cli.dump, config.clone())
        .with_context(|| format!("reading dump {}", cli.dump.display()))?;

    if let Some(path) = &cli.config {
        config.add_recent_dump(cli.dump.clone());
        if let Err(e) = config.save(path) {
            warn!("Could not update {}: {}", path.display(), e);
        }
    }

    run(&cli, &dump, &config)
}

fn run(cli: &Cli, dump: &DumpFile, config: &Config) -> Result<ExitCode> {
    match &cli.command {
        Commands::Method { name } => {
            let method = dump.find_method_by_name(name);
            print_found(cli.json, method.as_ref(), |m| describe_method(m, false), || {
                format!("Method {name} not found")
            })
        }
        Commands::Offset { offsets, full } => {
            let mut missing = false;
            let found = dump.find_methods_by_offsets(offsets.as_slice());
            for (offset, method) in offsets.iter().zip(found) {
                missing |= method.is_none();
                print_found(cli.json, method.as_ref(), |m| describe_method(m, *full), || {
                    format!("No method at offset {offset}")
                })?;
            }
            Ok(exit_code(!missing))
        }
        Commands::ClassOf { offset } => {
            let class = dump.find_class_of_method(offset);
            print_found(cli.json, class.as_ref(), |c| c.clone(), || {
                format!("No class found for offset {offset}")
            })
        }
        Commands::Class { name, .. } => {
            let info = dump.class_info(name);
            print_found(cli.json, info.as_ref(), describe_class, || {
                format!("Class {name} not found")
            })
        }
        Commands::Obfuscated => {
            let flagged = dump.obfuscated_members();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&flagged)?);
            } else {
                for member in &flagged {
                    let owner = member.class_name.as_deref().unwrap_or("-");
                    let offset = member.offset.map(|o| o.to_string()).unwrap_or_default();
                    println!("{:?}\t{}\t{}\t{}", member.kind, owner, member.name, offset);
                }
            }
            info!("{} obfuscated names", flagged.len());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Export { format, output } => {
            let path = export_path(output.as_deref(), config, *format);
            match format {
                ExportFormat::Script => ScriptJson::from_dump(dump).write_to_file(&path)?,
                ExportFormat::Listing => ClassListing::write_to_file(dump, &path)?,
                ExportFormat::Report => output::write_report(&dump.report(), &path)?,
            }
            info!("Wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            let diagnostics = dump.diagnostics();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&diagnostics)?);
            } else {
                for event in &diagnostics {
                    println!("{event}");
                }
                println!("{} problem(s)", diagnostics.len());
            }
            Ok(exit_code(diagnostics.is_empty()))
        }
    }
}

fn print_found<T: Serialize>(
    json: bool,
    found: Option<&T>,
    describe: impl FnOnce(&T) -> String,
    not_found: impl FnOnce() -> String,
) -> Result<ExitCode> {
    match found {
        Some(value) if json => println!("{}", serde_json::to_string_pretty(value)?),
        Some(value) => println!("{}", describe(value).trim_end()),
        None => {
            eprintln!("{}", not_found());
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn describe_method(method: &MethodRecord, full: bool) -> String {
    if full {
        return method.full_text.clone();
    }

    let modifiers = method.modifiers_text();
    if modifiers.is_empty() {
        format!("{}  {}", method.offset, method.signature())
    } else {
        format!("{}  {} {}", method.offset, modifiers, method.signature())
    }
}

fn describe_class(info: &ClassInfo) -> String {
    let mut text = format!("{}\n", info.class.declaration_text);
    for field in &info.fields {
        text.push_str(&format!("    {}\n", field.declaration()));
    }
    for method in &info.methods {
        text.push_str(&format!("    {}\n", describe_method(method, false)));
    }
    text
}

fn export_path(output: Option<&Path>, config: &Config, format: ExportFormat) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => config
            .export_dir
            .clone()
            .unwrap_or_default()
            .join(format.default_file_name()),
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
