//! Submit command - hand sequences to a session

use anyhow::{Context, Result};
use std::io::Read;
use std::path::PathBuf;
use variantis_core::{PsaProgram, Submission, SubmissionInput};

use crate::commands::{open_service, print_json};
use crate::config::Config;
use crate::error::CliError;
use crate::ProgramArg;

pub struct SubmitArgs {
    pub session: String,
    pub file: Option<PathBuf>,
    pub text: Option<String>,
    pub program: Option<ProgramArg>,
    pub gap_open: Option<f64>,
    pub gap_extend: Option<f64>,
}

fn read_input(file: Option<PathBuf>, text: Option<String>) -> Result<SubmissionInput> {
    match (file, text) {
        (Some(path), _) if path.as_os_str() == "-" => {
            let mut pasted = String::new();
            std::io::stdin()
                .read_to_string(&mut pasted)
                .context("Failed to read sequences from stdin")?;
            Ok(SubmissionInput::Pasted(pasted))
        }
        (Some(path), _) => {
            if !path.is_file() {
                return Err(CliError::file_not_found(path).into());
            }
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(SubmissionInput::File { name, bytes })
        }
        (None, Some(text)) => Ok(SubmissionInput::Pasted(text)),
        (None, None) => Ok(SubmissionInput::Pasted(String::new())),
    }
}

pub fn execute(config: &Config, args: SubmitArgs, json: bool) -> Result<()> {
    let program = match args.program {
        Some(program) => PsaProgram::from(program),
        None => config
            .alignment
            .default_program
            .parse::<PsaProgram>()
            .map_err(|e| CliError::config(e.public_message()))?,
    };
    let submission = Submission {
        input: read_input(args.file, args.text)?,
        program,
        gap_open: args.gap_open.unwrap_or(config.alignment.default_gap_open),
        gap_extend: args.gap_extend.unwrap_or(config.alignment.default_gap_extend),
    };

    let service = open_service(config)?;
    let receipt = service.submit(&args.session, submission).map_err(CliError::from)?;

    if json {
        return print_json(&receipt);
    }
    if receipt.program != program {
        log::warn!(
            "Sequences longer than {} bases: switched to {} with gap open {} and gap extend {}",
            config.alignment.needle_max_length,
            receipt.program,
            receipt.gap_open,
            receipt.gap_extend
        );
    }
    println!(
        "Accepted {} sequences from {} for {} (gap open {}, gap extend {})",
        receipt.num_sequences, receipt.file_name, receipt.program, receipt.gap_open, receipt.gap_extend
    );
    Ok(())
}
