use clap::Parser;
use kaitei::prelude::*;
use std::fs;
use std::time::Instant;

/// A schema-migration CLI for versioned, node-based workflow documents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the persisted workflow JSON file
    workflow_path: String,

    /// Only report whether a migration would change the document
    #[arg(short, long)]
    check: bool,

    /// Fail on unresolved connection endpoints instead of synthesizing
    /// placeholder endpoints
    #[arg(short, long)]
    strict: bool,

    /// Write the migrated document back to the input file instead of stdout
    #[arg(short = 'i', long)]
    in_place: bool,
}

fn main() {
    let cli = Cli::parse();

    let raw = fs::read_to_string(&cli.workflow_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read workflow file '{}': {}",
            &cli.workflow_path, e
        ))
    });

    let policy = if cli.strict {
        RepairPolicy::Strict
    } else {
        RepairPolicy::SynthesizeMissingEndpoint
    };
    let migrator = WorkflowMigrator::builder()
        .with_repair_policy(policy)
        .build();

    if cli.check {
        let silent = migrator
            .needs_migration(&raw, false)
            .unwrap_or_else(|e| exit_with_error(&format!("Version check failed: {}", e)));
        let interactive = migrator
            .needs_migration(&raw, true)
            .unwrap_or_else(|e| exit_with_error(&format!("Version check failed: {}", e)));
        println!("Silent migration needed:      {}", silent);
        println!("Interactive migration needed: {}", interactive);
        return;
    }

    let migrate_start = Instant::now();
    let migrated = migrator
        .migrate(&raw)
        .unwrap_or_else(|e| exit_with_error(&format!("Migration failed: {}", e)));
    let migrate_duration = migrate_start.elapsed();

    if cli.in_place {
        fs::write(&cli.workflow_path, &migrated).unwrap_or_else(|e| {
            exit_with_error(&format!(
                "Failed to write '{}': {}",
                &cli.workflow_path, e
            ))
        });
        eprintln!(
            "Migrated '{}' in {:?}",
            &cli.workflow_path, migrate_duration
        );
    } else {
        println!("{}", migrated);
        eprintln!("Migration finished in {:?}", migrate_duration);
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
