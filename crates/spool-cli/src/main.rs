//! `spool` : CLI du compilateur Spool
//!
//! Ici on fait uniquement : parsing d'arguments, initialisation (logger,
//! couleur), et délégation à `spool_cli` (lib).

#![forbid(unsafe_code)]

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use spool_cli as cli;

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "spool", version, about = "Spool : compiler et désassembler du bytecode Spool", long_about = None)]
struct Opt {
    /// Augmente la verbosité (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux (casse la verbosité)
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    quiet: bool,

    /// Force la couleur (si la feature `color` est compilée)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,

    /// Sous-commandes
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitKind {
    /// `<stem>.spb`
    Bytecode,
    /// Listing lisible
    Disasm,
    /// Déclarations en JSON
    Ast,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compiler des sources ; tous les fichiers partagent leurs déclarations
    Compile {
        /// Fichiers source
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Dossier de sortie (à côté des sources si omis)
        #[arg(short, long = "out-dir")]
        out_dir: Option<PathBuf>,
        /// Sortie produite
        #[arg(long, value_enum, default_value_t = EmitKind::Bytecode)]
        emit: EmitKind,
        /// Toute erreur syntaxique rejette le fichier
        #[arg(long)]
        strict: bool,
        /// Afficher le temps par fichier
        #[arg(long)]
        time: bool,
    },

    /// Désassembler un bytecode vers du texte
    Disasm {
        /// Bytecode (.spb)
        input: PathBuf,
        /// Sortie texte (stdout si omis)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ──────────────────────────── Logger / Verbosité ────────────────────────────

fn init_telemetry(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    cli::init_logger(level);
}

fn init_color(choice: ColorChoice) {
    #[cfg(feature = "color")]
    match choice {
        ColorChoice::Auto => {}
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
    }
    #[cfg(not(feature = "color"))]
    let _ = choice;
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    match real_main() {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn real_main() -> Result<i32> {
    let opt = Opt::parse();

    init_color(opt.color);
    init_telemetry(opt.verbose, opt.quiet);

    let command = match opt.cmd {
        Command::Compile { inputs, out_dir, emit, strict, time } => {
            let emit = match emit {
                EmitKind::Bytecode => cli::Emit::Bytecode,
                EmitKind::Disasm => cli::Emit::Disasm,
                EmitKind::Ast => cli::Emit::Ast,
            };
            cli::Command::Compile(cli::CompileTask { inputs, out_dir, emit, strict, time })
        }
        Command::Disasm { input, output } => {
            let output = output.map_or(cli::Output::Stdout, cli::Output::Path);
            cli::Command::Disasm(cli::DisasmTask { input, output })
        }
    };

    cli::execute(command).context("échec d'exécution de la commande")
}
