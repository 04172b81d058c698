//! Verify command implementation.

use std::path::Path;
use vellum_core::{verify_dump, VerifyReport};

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying store at {:?}", path);
    println!();

    let (dump, _repo) = super::open(path)?;
    let report = verify_dump(&dump);
    print_report(&report);

    println!();
    if report.is_clean() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err("Verification failed".into())
    }
}

fn print_report(report: &VerifyReport) {
    println!("  Objects checked:  {}", report.objects);
    println!("  Versions checked: {}", report.versions);
    println!("  Issues:           {}", report.issues.len());
    for issue in &report.issues {
        println!("    - {}", issue);
    }
}
