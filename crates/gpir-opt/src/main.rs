//! gpir-opt - parse a textual GPIR module, run passes, print the result.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gpir::transform::{
    AlgebraSimplification, CfgCanonicalization, CfgSimplification,
    CommonSubexpressionElimination, DeadCodeElimination, PassKind,
};
use gpir::{IntrinsicRegistry, Module, Stage};
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gpir-opt")]
#[command(about = "Run optimization passes over a textual GPIR module")]
struct Cli {
    /// Path to a textual module
    input: PathBuf,

    /// Comma-separated pass names or abbreviations
    /// (AS, CFGCan, CFGSimp, CSE, DCE, LBP, SP, VP)
    #[arg(long, value_delimiter = ',')]
    passes: Vec<String>,

    /// Skip post-pass verification
    #[arg(long)]
    no_verify: bool,

    /// Write the transformed module here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn run_passes(
    module: &mut Module,
    passes: &[PassKind],
    intrinsics: &IntrinsicRegistry,
    verify: bool,
) -> Result<(), String> {
    for pass in passes {
        let changed = match pass {
            PassKind::AlgebraSimplification => {
                module.map_transform(&AlgebraSimplification, intrinsics, verify)
            }
            PassKind::CfgCanonicalization => {
                let result = module.map_transform(&CfgCanonicalization, intrinsics, verify);
                if result.is_ok() {
                    module.stage = Stage::Canonical;
                }
                result
            }
            PassKind::CfgSimplification => {
                module.map_transform(&CfgSimplification, intrinsics, verify)
            }
            PassKind::CommonSubexpressionElimination => {
                module.map_transform(&CommonSubexpressionElimination, intrinsics, verify)
            }
            PassKind::DeadCodeElimination => {
                module.map_transform(&DeadCodeElimination, intrinsics, verify)
            }
            unimplemented => {
                return Err(format!(
                    "pass {} is not implemented",
                    unimplemented.full_name()
                ));
            }
        };
        match changed {
            Ok(changed) => debug!(pass = pass.full_name(), changed, "pass finished"),
            Err(e) => return Err(format!("verification failed after {}: {}", pass.full_name(), e)),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gpir_opt=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut passes = Vec::new();
    for name in &cli.passes {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        match PassKind::parse(name) {
            Some(pass) => passes.push(pass),
            None => {
                error!("unknown pass '{}'", name);
                return ExitCode::from(2);
            }
        }
    }

    let text = match std::fs::read_to_string(&cli.input) {
        Ok(text) => text,
        Err(e) => {
            error!("cannot read {}: {}", cli.input.display(), e);
            return ExitCode::from(1);
        }
    };

    let intrinsics = IntrinsicRegistry::standard();
    let mut module = match gpir::parse_module(&text, &intrinsics) {
        Ok(module) => module,
        Err(e) => {
            error!("{}: {}", cli.input.display(), e);
            return ExitCode::from(1);
        }
    };

    if !cli.no_verify {
        if let Err(e) = gpir::verify_module(&module, &intrinsics) {
            error!("{}: {}", cli.input.display(), e);
            return ExitCode::from(1);
        }
    }

    if let Err(message) = run_passes(&mut module, &passes, &intrinsics, !cli.no_verify) {
        error!("{}", message);
        return ExitCode::from(1);
    }

    let printed = gpir::print_module(&module);
    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, printed) {
                error!("cannot write {}: {}", path.display(), e);
                return ExitCode::from(1);
            }
        }
        None => print!("{}", printed),
    }
    ExitCode::SUCCESS
}
