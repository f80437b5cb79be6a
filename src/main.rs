use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use qalign::assign::ResolutionStrategy;
use qalign::evaluate::calculate_accuracy;
use qalign::export::{Exporter, JsonExporter, TextExporter};
use qalign::pipeline::{
    analyze_page, load_assignment, load_ground_truth, load_page_input, AnalysisConfig,
};

#[derive(Parser, Debug)]
#[command(name = "qalign")]
#[command(version, about = "Worksheet question-assignment validation using spatial conflict resolution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate and resolve one page of question assignments
    Analyze {
        /// Page input JSON (detections plus initial assignment)
        input: PathBuf,

        /// Output directory (default: ./<input_name>_output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Conflict resolution strategy
        #[arg(long, value_enum, default_value_t = Strategy::IouFirst)]
        strategy: Strategy,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Score a final assignment against annotated ground truth
    Evaluate {
        /// Ground truth JSON file
        ground_truth: PathBuf,

        /// Assignment JSON file (as written by `analyze`)
        assignment: PathBuf,

        /// Directory to write metrics.json into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show information about a page input file
    Info {
        /// Page input JSON file
        input: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Strategy {
    IouFirst,
    NearestCenter,
}

impl From<Strategy> for ResolutionStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::IouFirst => ResolutionStrategy::IouFirst,
            Strategy::NearestCenter => ResolutionStrategy::NearestCenter,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            output,
            strategy,
            quiet,
        } => run_analyze(input, output, strategy, quiet),
        Commands::Evaluate {
            ground_truth,
            assignment,
            output,
        } => run_evaluate(ground_truth, assignment, output),
        Commands::Info { input } => show_info(input),
    }
}

fn run_analyze(
    input: PathBuf,
    output: Option<PathBuf>,
    strategy: Strategy,
    quiet: bool,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }
    if !input.is_file() {
        anyhow::bail!("Input is not a file: {}", input.display());
    }

    let output_dir = output.unwrap_or_else(|| {
        let stem = input.file_stem().unwrap().to_string_lossy();
        PathBuf::from(format!("{}_output", stem))
    });

    if !quiet {
        println!("[*] Processing: {}", input.display());
        println!("[*] Output: {}", output_dir.display());
    }

    let page = load_page_input(&input)
        .with_context(|| format!("Failed to load page input: {}", input.display()))?;

    let config = AnalysisConfig {
        strategy: strategy.into(),
        ..AnalysisConfig::default()
    };
    let report = analyze_page(&page, &config);

    if !quiet {
        println!(
            "[+] {} elements across {} questions, {:.1}% valid geometry",
            report.stats.total,
            report.assignment.question_count(),
            report.stats.valid_percentage()
        );
        println!(
            "[+] {} conflict(s) found, {} resolved, {} element(s) moved",
            report.validation.range_conflicts.len(),
            report.reassignment.conflicts_resolved,
            report.reassignment.moves.len()
        );
    }

    let json_exporter = JsonExporter::new(output_dir.clone());
    json_exporter
        .export(&report)
        .with_context(|| format!("Failed to export to: {}", output_dir.display()))?;

    let text_exporter = TextExporter::new(output_dir.clone());
    text_exporter.export(&report)?;

    if !quiet {
        println!("[✓] Done! Results saved to: {}", output_dir.display());
    }

    Ok(())
}

fn run_evaluate(
    ground_truth: PathBuf,
    assignment: PathBuf,
    output: Option<PathBuf>,
) -> Result<()> {
    let truth = load_ground_truth(&ground_truth)?;
    let assignment = load_assignment(&assignment)?;
    let actual = assignment.element_questions();

    let report = calculate_accuracy(&truth, &actual);

    println!("Accuracy for {}", truth.image_id);
    println!("================");
    println!("overall:   {:.3}", report.overall_accuracy);
    println!("precision: {:.3}", report.precision);
    println!("recall:    {:.3}", report.recall);
    println!("f1:        {:.3}", report.f1_score);
    println!(
        "correct: {}  incorrect: {}  missing: {}  expected: {}",
        report.correct, report.incorrect, report.missing, report.total_expected
    );
    for (question, accuracy) in &report.per_question {
        println!("  q{}: {:.3}", question, accuracy);
    }
    for (kind, accuracy) in &report.per_kind {
        println!("  {}: {:.3}", kind.as_str(), accuracy);
    }

    if let Some(output_dir) = output {
        fs::create_dir_all(&output_dir)?;
        let path = output_dir.join("metrics.json");
        fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("[✓] Metrics saved to: {}", path.display());
    }

    Ok(())
}

fn show_info(input: PathBuf) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let page = load_page_input(&input)?;

    let mut kind_counts: std::collections::BTreeMap<&str, usize> = Default::default();
    let mut confidence_sum = 0.0_f64;
    for (_, elements) in page.questions.iter() {
        for element in elements {
            *kind_counts.entry(element.kind.as_str()).or_default() += 1;
            confidence_sum += element.confidence as f64;
        }
    }
    let element_count = page.questions.element_count();

    println!("Page Information");
    println!("================");
    println!("Image: {}", page.image_id);
    println!("Size: {}x{}", page.width, page.height);
    println!("Scale: {:.3} x {:.3}", page.scale_x, page.scale_y);
    println!("Questions: {}", page.questions.question_count());
    println!("Elements: {}", element_count);
    for (kind, count) in &kind_counts {
        println!("  {}: {}", kind, count);
    }
    if element_count > 0 {
        println!(
            "Mean confidence: {:.2}",
            confidence_sum / element_count as f64
        );
    }

    Ok(())
}
