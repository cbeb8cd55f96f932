//! Result commands: run the pipeline, inspect a pair, fetch artifacts

use anyhow::{Context, Result};
use std::path::PathBuf;
use variantis_core::ColumnClass;

use crate::commands::{open_service, print_json};
use crate::config::Config;
use crate::error::CliError;

pub fn run(config: &Config, session: &str, json: bool) -> Result<()> {
    let service = open_service(config)?;
    log::info!("Aligning sequences for session {}", session);
    let results = service.run_results(session).map_err(CliError::from)?;

    if json {
        return print_json(&results);
    }
    println!("{} sequences, {} pairs", results.num_sequences, results.pairs.len());
    for (query_id, description) in &results.id_mapping {
        println!("  {:<10} {}", query_id, description);
    }
    println!();
    println!(
        "{:<24} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10}",
        "Pair", "Ident", "Ts", "Tv", "Gaps", "Ambig", "Ts/Tv"
    );
    for pair in &results.pairs {
        println!(
            "{:<24} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10}",
            pair.pair, pair.identical, pair.transitions, pair.transversions, pair.gaps, pair.ambiguous, pair.ratio
        );
    }
    Ok(())
}

fn marker(class: ColumnClass) -> char {
    match class {
        ColumnClass::Identical => '|',
        ColumnClass::Transition => ':',
        ColumnClass::Transversion => '.',
        ColumnClass::Ambiguous => '?',
        ColumnClass::Gap => ' ',
    }
}

pub fn pair(config: &Config, session: &str, query: &str, subject: &str, width: usize, json: bool) -> Result<()> {
    let service = open_service(config)?;
    let view = service.extract_pair(session, query, subject).map_err(CliError::from)?;

    if json {
        return print_json(&view);
    }
    let label = view.pair.query.len().max(view.pair.subject.len());
    for line in view.lines(width) {
        let markers: String = line.classes.iter().map(|&c| marker(c)).collect();
        println!("{:<label$}  {}", view.pair.query, line.query, label = label);
        println!("{:<label$}  {}", "", markers, label = label);
        println!("{:<label$}  {}", view.pair.subject, line.subject, label = label);
        println!();
    }
    let counts = &view.counts;
    println!("Length        {}", counts.total_length);
    println!("Identical     {} ({}%)", counts.identical, counts.identical_percent);
    println!("Transitions   {} ({}%)", counts.transitions, counts.transitions_percent);
    println!("Transversions {} ({}%)", counts.transversions, counts.transversions_percent);
    println!("Gaps          {} ({}%)", counts.gaps, counts.gaps_percent);
    println!("Unknown       {} ({}%)", counts.unknown, counts.unknown_percent);
    Ok(())
}

pub fn details(config: &Config, session: &str, json: bool) -> Result<()> {
    let service = open_service(config)?;
    let details = service.run_details(session).map_err(CliError::from)?;

    if json {
        return print_json(&details);
    }
    println!("Program        {}", details.program);
    println!("Gap open       {}", details.gap_open);
    println!("Gap extend     {}", details.gap_extend);
    println!("Matrix         {}", details.matrix);
    println!("Sequence type  {}", details.sequence_type);
    println!("Output format  {}", details.output_format);
    println!("Sequences      {}", details.num_sequences);
    if details.downloads.is_empty() {
        println!("Downloads      none yet");
    } else {
        println!("Downloads      {}", details.downloads.join(", "));
    }
    Ok(())
}

pub fn mapping(config: &Config, session: &str, json: bool) -> Result<()> {
    let service = open_service(config)?;
    let mapping = service.id_mapping(session).map_err(CliError::from)?;

    if json {
        return print_json(&mapping);
    }
    for (query_id, description) in &mapping {
        println!("{}\t{}", query_id, description);
    }
    Ok(())
}

/// Copy an artifact to `out`, or print where it lives.
pub fn download(config: &Config, session: &str, name: &str, out: Option<PathBuf>) -> Result<()> {
    let service = open_service(config)?;
    let path = service.download(session, name).map_err(CliError::from)?;

    match out {
        Some(out) => {
            let target = if out.is_dir() { out.join(name) } else { out };
            std::fs::copy(&path, &target)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            log::info!("Wrote {}", target.display());
            println!("{}", target.display());
        }
        None => println!("{}", path.display()),
    }
    Ok(())
}
