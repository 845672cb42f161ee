//! refmatch CLI — command-line interface for recall evaluation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use refmatch::{evaluate, EvalConfig, EvalError, Tier, Verdict};

#[derive(Parser)]
#[command(name = "refmatch")]
#[command(about = "Evaluate extraction recall against a reference image set (tiered thresholds, optimal 1:1 assignment)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full evaluation and write the JSON report.
    Evaluate {
        /// Directory containing reference (truth) images.
        #[arg(long)]
        reference_dir: PathBuf,

        /// Directory containing extracted candidate images.
        #[arg(long)]
        extracted_dir: PathBuf,

        /// Path to the extraction manifest (JSON).
        #[arg(long)]
        manifest: PathBuf,

        /// Path to write the evaluation report (JSON).
        #[arg(long)]
        out: PathBuf,

        /// Directory to write the per-miss evidence packet.
        #[arg(long)]
        miss_packet: Option<PathBuf>,

        /// Score pairs on a single thread.
        #[arg(long)]
        serial: bool,
    },

    /// Print the tier threshold table.
    Thresholds,

    /// Compute and print the signatures of a single image.
    Inspect {
        /// Path to the image.
        #[arg(long)]
        image: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Evaluate {
            reference_dir,
            extracted_dir,
            manifest,
            out,
            miss_packet,
            serial,
        } => run_evaluate(reference_dir, extracted_dir, manifest, out, miss_packet, serial),

        Commands::Thresholds => {
            run_thresholds();
            Ok(())
        }

        Commands::Inspect { image } => run_inspect(&image),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(banner) => {
            eprintln!("{banner}");
            ExitCode::FAILURE
        }
    }
}

// ── evaluate ───────────────────────────────────────────────────────────────

fn run_evaluate(
    reference_dir: PathBuf,
    extracted_dir: PathBuf,
    manifest: PathBuf,
    out: PathBuf,
    miss_packet: Option<PathBuf>,
    serial: bool,
) -> Result<(), String> {
    let cfg = EvalConfig {
        reference_dir,
        extracted_dir,
        manifest_path: manifest,
        parallel: !serial,
    };

    let evaluation = evaluate(&cfg).map_err(|e| error_banner(&e))?;
    let report = &evaluation.report;

    print_summary(report);

    refmatch::write_report(&out, report)
        .map_err(|e| format!("[ERROR report-io] {e}"))?;
    println!("Report written to {}", out.display());

    if let Some(packet_dir) = miss_packet {
        refmatch::write_miss_packet(&packet_dir, &evaluation)
            .map_err(|e| format!("[ERROR report-io] {e}"))?;
        println!("Miss packet written to {}", packet_dir.display());
    }

    // Any reached verdict, PASS or FAIL, is a successful run.
    Ok(())
}

fn error_banner(err: &EvalError) -> String {
    format!("[ERROR {}] {err}", err.code())
}

fn print_summary(report: &refmatch::EvalReport) {
    println!("=== Recall Evaluation (1:1 optimal assignment, tiered thresholds) ===");
    println!("Reference images:     {}", report.recall_denominator);
    for (tier, stats) in &report.per_tier {
        let t = tier.thresholds();
        println!(
            "  {:<5} {:>3} refs, {:>3} matched (phash<={}, dhash<={}, features>={}, fallback>={})",
            tier, stats.references, stats.matches, t.phash_max, t.dhash_max, t.feature_min, t.fallback_min,
        );
    }
    println!("Matches:              {}", report.matches.len());
    println!("Misses:               {}", report.misses.len());
    println!("False positives:      {}", report.false_positive_count);
    println!(
        "Recall:               {:.1}% ({}/{})",
        report.recall * 100.0,
        report.recall_numerator,
        report.recall_denominator,
    );

    if let Some(notice) = &report.ceiling_notice {
        println!();
        println!("CANDIDATE POOL CEILING:");
        println!("  extracted pool:     {}", notice.extracted_count);
        println!("  reference set:      {}", notice.reference_count);
        println!(
            "  max possible recall: {:.1}% ({}/{})",
            notice.max_possible_recall * 100.0,
            notice.extracted_count,
            notice.reference_count,
        );
    }

    if !report.misses.is_empty() {
        println!();
        println!("Unmatched references:");
        for miss in &report.misses {
            println!("  [{}] {} -> {}", miss.tier, miss.ref_id, miss.audit);
        }
    }

    if !report.false_positives.is_empty() {
        println!();
        println!("False positive candidates:");
        for fp in report.false_positives.iter().take(10) {
            println!("  - {fp}");
        }
        if report.false_positives.len() > 10 {
            println!("  ... and {} more", report.false_positives.len() - 10);
        }
    }

    if !report.invariant_violations.is_empty() {
        println!();
        println!("INVARIANT VIOLATIONS (verdict forced to FAIL):");
        for violation in &report.invariant_violations {
            println!("  ! {violation}");
        }
    }

    println!();
    let acc = &report.acceptance_criteria;
    let recall_status = if report.recall >= acc.recall_target { "[PASS]" } else { "[FAIL]" };
    let fp_status = if report.false_positive_count <= acc.false_positive_target {
        "[PASS]"
    } else {
        "[FAIL]"
    };
    println!("ACCEPTANCE CRITERIA:");
    println!(
        "  recall >= {:.0}%:          {} ({:.1}%)",
        acc.recall_target * 100.0,
        recall_status,
        report.recall * 100.0,
    );
    println!(
        "  false positives <= {}:   {} ({})",
        acc.false_positive_target, fp_status, report.false_positive_count,
    );
    println!();
    match report.verdict {
        Verdict::Pass => println!("[OVERALL: PASS]"),
        Verdict::Fail => println!("[OVERALL: FAIL]"),
    }
}

// ── thresholds ─────────────────────────────────────────────────────────────

fn run_thresholds() {
    println!("refmatch tier thresholds");
    println!("  {:<6} {:>8} {:>8} {:>10} {:>10}", "tier", "phash<=", "dhash<=", "features>=", "fallback>=");
    for tier in Tier::ALL {
        let t = tier.thresholds();
        println!(
            "  {:<6} {:>8} {:>8} {:>10.2} {:>10.2}",
            tier.name(),
            t.phash_max,
            t.dhash_max,
            t.feature_min,
            t.fallback_min,
        );
    }
    println!();
    println!("Tier assignment (first matching rule):");
    println!("  BOARD  area >= 250000 or min_dim >= 600");
    println!("  ICON   min_dim < 140 or area < 25000");
    println!("  MID    otherwise");
}

// ── inspect ────────────────────────────────────────────────────────────────

fn run_inspect(image_path: &std::path::Path) -> Result<(), String> {
    let image = refmatch::load_image(image_path)
        .map_err(|e| format!("[ERROR decode-failure] {e}"))?;
    let (w, h) = (image.width(), image.height());
    let tier = Tier::classify(w, h);
    let sigs = refmatch::signature::extract(&image);

    println!("Image:       {}", image_path.display());
    println!("Dimensions:  {w}x{h}");
    println!("Tier:        {tier}");
    println!("phash:       {}", sigs.phash);
    println!("dhash:       {}", sigs.dhash);
    println!("descriptors: {}", sigs.features.len());
    Ok(())
}
