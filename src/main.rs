use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use dotenv::dotenv;
use once_cell::sync::OnceCell;
use tailor_rs::adk::analyst::{Analyst, ModelAnalyst};
use tailor_rs::adk::model::anthropic::AnthropicModel;
use tailor_rs::tailor::config::PipelineConfig;
use tailor_rs::tailor::documents;
use tailor_rs::tailor::ui::{self, TerminalSelector};
use tailor_rs::tailor::workflow::checkpoint::{
    normalize_selection, ApprovalPolicy, SelectionPrompt, Selector,
};
use tailor_rs::tailor::workflow::graph::GraphRun;
use tailor_rs::tailor::workflow::pipeline::{Pipeline, PipelineInputs, RunOptions, StageSet};
use tailor_rs::tailor::workflow::state::PipelineState;
use tailor_rs::tailor::workflow::types::Severity;

use std::path::{Path, PathBuf};
use std::sync::Arc;

static ANALYST: OnceCell<Arc<dyn Analyst>> = OnceCell::new();

#[derive(Parser, Debug)]
#[command(author, version, about = "Tailor a LaTeX resume to a job description", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug)]
struct InputArgs {
    /// Path to the LaTeX resume
    #[arg(short, long)]
    resume: PathBuf,

    /// Path to the job description
    #[arg(short, long)]
    job: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze, select, and apply edits in one session
    Optimize {
        #[command(flatten)]
        inputs: InputArgs,

        /// Where to write the edited resume (default: <resume>_optimized.tex)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Never prompt; apply by --auto-priority (or everything)
        #[arg(long)]
        auto: bool,

        /// Apply recommendations up to this priority (1 = highest)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        auto_priority: Option<u8>,

        /// Skip the gap checkpoint and address every gap
        #[arg(long)]
        no_gap_selection: bool,

        /// Select gaps at this severity or above without prompting
        #[arg(long)]
        auto_gap_severity: Option<Severity>,

        /// Do not print a diff of the edited resume
        #[arg(long = "no-diff", action = ArgAction::SetFalse)]
        show_diff: bool,

        /// Save the final state as a JSON snapshot
        #[arg(long)]
        save_state: Option<PathBuf>,

        /// Replace the output file if it exists
        #[arg(long)]
        overwrite: bool,

        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Analyze only; recommendations are left for a later `apply`
    Analyze {
        #[command(flatten)]
        inputs: InputArgs,

        /// Select gaps at this severity or above
        #[arg(long)]
        auto_gap_severity: Option<Severity>,

        /// Save the state so `apply` can resume from it
        #[arg(long)]
        save_state: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Apply accepted recommendations from a saved state
    Apply {
        /// Snapshot written by `analyze --save-state`
        #[arg(short, long)]
        state: PathBuf,

        /// Recommendation ids to apply, comma separated
        #[arg(short, long, value_delimiter = ',')]
        accept: Vec<String>,

        /// Inputs used if the snapshot cannot be resumed
        #[arg(short, long, requires = "job")]
        resume: Option<PathBuf>,

        #[arg(short, long, requires = "resume")]
        job: Option<PathBuf>,

        /// Do not print a diff of the edited resume
        #[arg(long = "no-diff", action = ArgAction::SetFalse)]
        show_diff: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        overwrite: bool,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Build the analyst once per process
fn analyst(config: &PipelineConfig) -> Result<Arc<dyn Analyst>> {
    ANALYST
        .get_or_try_init(|| {
            let model =
                AnthropicModel::with_base_url(config.model.name.clone(), config.model.base_url.clone())?;
            log::info!("Using model: {}", model.model_name());
            let analyst = ModelAnalyst::new(Arc::new(model)).with_temperature(config.model.temperature);
            Ok::<Arc<dyn Analyst>, tailor_rs::adk::error::TailorError>(Arc::new(analyst))
        })
        .cloned()
        .context("failed to initialize the analysis model")
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::load(path).context("failed to load configuration")
}

fn read_inputs(inputs: &InputArgs) -> Result<PipelineInputs> {
    println!("Reading resume from: {}", inputs.resume.display());
    let document = documents::read_text(&inputs.resume)?;
    println!("Reading job description from: {}", inputs.job.display());
    let requirements = documents::read_text(&inputs.job)?;

    Ok(PipelineInputs {
        document,
        requirements,
        document_path: Some(inputs.resume.display().to_string()),
        requirements_path: Some(inputs.job.display().to_string()),
    })
}

fn report(run: &GraphRun) {
    let state = &run.state;
    if !state.errors.is_empty() {
        println!("\nWorkflow completed with errors:");
        for error in state.error_messages() {
            println!("  - {}", error);
        }
    }
    if !state.applied_changes.is_empty() {
        println!("\nApplied changes:\n{}", ui::changes_table(&state.applied_changes));
    }
    println!("\nFinal results:\n{}", ui::summary_table(state));
    log::debug!("Run took {} ms", run.elapsed().num_milliseconds());
}

fn print_diff(state: &PipelineState) {
    let Some(modified) = &state.modified_document else {
        return;
    };
    match ui::unified_diff(&state.source_document, modified) {
        Some(diff) => println!("\nResume diff:\n{}", diff),
        None => println!("\nNo changes detected between the original and optimized resume."),
    }
}

fn write_outputs(
    state: &PipelineState,
    output: Option<PathBuf>,
    fallback_input: Option<&Path>,
    overwrite: bool,
) -> Result<()> {
    let modified = match &state.modified_document {
        Some(modified) if *modified != state.source_document => modified,
        _ => {
            println!("\nNo modifications were made to the resume.");
            return Ok(());
        }
    };
    let path = match (output, fallback_input) {
        (Some(path), _) => path,
        (None, Some(input)) => documents::output_path(input, documents::OUTPUT_SUFFIX),
        (None, None) => bail!("no output path given and the saved state has no resume path"),
    };
    documents::write_text(&path, modified, overwrite)?;
    println!("\nOptimized resume saved to: {}", path.display());
    Ok(())
}

fn save_state(path: Option<&Path>, state: &PipelineState) -> Result<()> {
    if let Some(path) = path {
        documents::save_snapshot(path, state)
            .with_context(|| format!("failed to save state to {}", path.display()))?;
        println!("State saved to: {}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Optimize {
            inputs,
            output,
            auto,
            auto_priority,
            no_gap_selection,
            auto_gap_severity,
            show_diff,
            save_state: snapshot,
            overwrite,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let analyst = analyst(&config)?;
            let pipeline_inputs = read_inputs(&inputs)?;

            let terminal: Arc<dyn Selector> = Arc::new(TerminalSelector::stdin());
            let interactive = !auto;
            let approval = match (interactive, auto_priority) {
                (true, _) => ApprovalPolicy::Deferred,
                (false, Some(priority)) => ApprovalPolicy::AutoPriority(priority),
                (false, None) => ApprovalPolicy::ApplyAll,
            };
            let gap_selector = interactive.then(|| terminal.clone());
            let options = RunOptions {
                interactive_gap_selection: (interactive && !no_gap_selection)
                    || auto_gap_severity.is_some(),
                auto_gap_severity,
            };

            let pipeline = Pipeline::new(StageSet::new(analyst, &config, gap_selector, approval))?;

            println!("\nRunning optimization workflow...\n");
            let mut run = pipeline.run(&pipeline_inputs, &options).await?;

            if run.state.awaiting_selection {
                let prompt = SelectionPrompt::for_recommendations(&run.state.recommendations);
                let mut raw = terminal.select(&prompt).await?;
                if let Some(priority) = auto_priority {
                    // Threshold picks are always included
                    raw.extend(prompt.ids_up_to_rank(priority));
                }
                let accepted = normalize_selection(&prompt, raw);

                if accepted.is_empty() {
                    println!("\nNo recommendations selected.");
                } else {
                    println!("\nApplying {} selected recommendations...\n", accepted.len());
                }
                run = pipeline
                    .resume_deferred(run, &pipeline_inputs, accepted)
                    .await?;
            }

            if show_diff {
                print_diff(&run.state);
            }
            report(&run);
            write_outputs(&run.state, output, Some(&inputs.resume), overwrite)?;
            save_state(snapshot.as_deref(), &run.state)?;
        }
        Commands::Analyze {
            inputs,
            auto_gap_severity,
            save_state: snapshot,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let analyst = analyst(&config)?;
            let pipeline_inputs = read_inputs(&inputs)?;

            let options = RunOptions {
                interactive_gap_selection: auto_gap_severity.is_some(),
                auto_gap_severity,
            };
            let pipeline =
                Pipeline::new(StageSet::new(analyst, &config, None, ApprovalPolicy::Deferred))?;
            let run = pipeline.run(&pipeline_inputs, &options).await?;

            let prompt = SelectionPrompt::for_recommendations(&run.state.recommendations);
            if !prompt.is_empty() {
                println!("\n{}:\n{}", prompt.title, ui::selection_table(&prompt));
            }
            report(&run);
            save_state(snapshot.as_deref(), &run.state)?;
        }
        Commands::Apply {
            state,
            accept,
            resume,
            job,
            show_diff,
            output,
            overwrite,
            config,
        } => {
            if accept.is_empty() {
                println!("No recommendations accepted; nothing to apply.");
                return Ok(());
            }
            let config = load_config(config.as_deref())?;
            let analyst = analyst(&config)?;

            let previous = match documents::load_snapshot(&state) {
                Ok(previous) => Some(previous),
                Err(e) => {
                    log::warn!("Could not load {}: {}", state.display(), e);
                    None
                }
            };

            let pipeline_inputs = match (&resume, &job) {
                (Some(resume), Some(job)) => read_inputs(&InputArgs {
                    resume: resume.clone(),
                    job: job.clone(),
                })?,
                _ => match &previous {
                    Some(previous) => PipelineInputs {
                        document: previous.source_document.clone(),
                        requirements: previous.requirements_text.clone(),
                        document_path: previous.document_path.clone(),
                        requirements_path: previous.requirements_path.clone(),
                    },
                    None => bail!(
                        "{} could not be loaded; pass --resume and --job to start over",
                        state.display()
                    ),
                },
            };

            let pipeline =
                Pipeline::new(StageSet::new(analyst, &config, None, ApprovalPolicy::ApplyAll))?;
            let run = pipeline
                .apply_selection(previous, &pipeline_inputs, accept)
                .await?;

            if show_diff {
                print_diff(&run.state);
            }
            report(&run);
            let fallback = pipeline_inputs.document_path.as_deref().map(Path::new);
            write_outputs(&run.state, output, fallback, overwrite)?;
        }
    }

    Ok(())
}
