//! Subcommand execution

use std::io::Write;
use std::path::{Path, PathBuf};

use debugwire_protocol::MethodKind;
use debugwire_schema::{
    compile_to_dir, CodegenConfig, GenerationReport, Generator, ProtocolDescription,
};
use debugwire_utils::{config::load_section, DebugwireError, Result};

use crate::cli::Command;

/// Exit code when generation finished but left items out
pub const EXIT_INCOMPLETE: i32 = 2;

/// Run a subcommand, writing human-readable output to `out`. Returns the
/// process exit code.
pub fn execute(command: Command, config_path: Option<&Path>, out: &mut dyn Write) -> Result<i32> {
    let config = load_config(config_path)?;

    match command {
        Command::Generate {
            inputs,
            out: out_dir,
            flat,
            no_docs,
        } => {
            let mut config = config;
            if no_docs {
                config.doc_comments = false;
            }
            generate(&inputs, out_dir, flat, &config, out)
        }
        Command::Check { inputs } => check(&inputs, &config, out),
        Command::Methods {
            inputs,
            events,
            commands,
        } => {
            let filter = match (events, commands) {
                (true, _) => Some(MethodKind::Event),
                (_, true) => Some(MethodKind::Command),
                _ => None,
            };
            methods(&inputs, filter, &config, out)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CodegenConfig> {
    match path {
        Some(path) => load_section(path, "codegen"),
        None => Ok(CodegenConfig::load()),
    }
}

/// Read and merge every input, earlier files winning on duplicate domains
pub fn load_inputs(inputs: &[PathBuf]) -> Result<ProtocolDescription> {
    let mut paths = inputs.iter();
    let first = paths
        .next()
        .ok_or_else(|| DebugwireError::config("no protocol description given"))?;

    let mut description = ProtocolDescription::from_file(first)?;
    for path in paths {
        let skipped = description.merge(ProtocolDescription::from_file(path)?);
        for domain in skipped {
            tracing::debug!(
                "Domain {} in {} already loaded, ignoring",
                domain,
                path.display()
            );
        }
    }

    tracing::debug!(
        "Loaded {} domains ({} items) from {} files",
        description.domains.len(),
        description.item_count(),
        inputs.len()
    );
    Ok(description)
}

fn generate(
    inputs: &[PathBuf],
    out_dir: Option<PathBuf>,
    flat: bool,
    config: &CodegenConfig,
    out: &mut dyn Write,
) -> Result<i32> {
    let description = load_inputs(inputs)?;
    let base = out_dir.unwrap_or_else(|| config.output_dir.clone());
    let dir = if flat {
        base
    } else {
        base.join(description.version.module_name())
    };

    tracing::info!(
        "Generating protocol {} bindings into {}",
        description.version,
        dir.display()
    );
    let (report, summary) = compile_to_dir(&description, config, &dir)?;

    print_report(&report, out)?;
    writeln!(
        out,
        "Wrote {} files to {} ({} stale removed)",
        summary.written.len(),
        dir.display(),
        summary.removed.len()
    )?;
    Ok(0)
}

fn check(inputs: &[PathBuf], config: &CodegenConfig, out: &mut dyn Write) -> Result<i32> {
    let description = load_inputs(inputs)?;
    let bindings = Generator::new(config.clone()).generate(&description);
    print_report(&bindings.report, out)?;

    Ok(if bindings.report.is_clean() {
        0
    } else {
        EXIT_INCOMPLETE
    })
}

fn methods(
    inputs: &[PathBuf],
    filter: Option<MethodKind>,
    config: &CodegenConfig,
    out: &mut dyn Write,
) -> Result<i32> {
    let description = load_inputs(inputs)?;
    let bindings = Generator::new(config.clone()).generate(&description);

    for method in bindings.methods() {
        if filter.map_or(true, |kind| kind == method.kind) {
            let kind = match method.kind {
                MethodKind::Command => "command",
                MethodKind::Event => "event",
            };
            writeln!(out, "{:<8} {}", kind, method.method)?;
        }
    }
    Ok(0)
}

fn print_report(report: &GenerationReport, out: &mut dyn Write) -> Result<()> {
    writeln!(
        out,
        "Generated {} bindings, skipped {} items",
        report.generated,
        report.skipped.len()
    )?;
    for skipped in &report.skipped {
        writeln!(
            out,
            "  skipped {} {}.{}: {}",
            skipped.kind, skipped.domain, skipped.item, skipped.error
        )?;
    }
    Ok(())
}
