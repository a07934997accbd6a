use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_metagenome_workflow::app::{
    App, CheckResult, PlanResult, ProgressSinkKind, RunRequest, RunResult, default_config_path,
};
use kira_metagenome_workflow::config::ConfigLoader;
use kira_metagenome_workflow::error::KiraError;
use kira_metagenome_workflow::executor::JobStatus;
use kira_metagenome_workflow::output::{JsonOutput, OutputMode, StderrProgress};

#[derive(Parser)]
#[command(name = "kira-mg")]
#[command(about = "Metagenomics workflow: read QC, host removal, taxonomic profiling, assembly and binning")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show the jobs a run would execute and why")]
    Plan(PlanArgs),
    #[command(about = "Run every outdated job")]
    Run(RunArgs),
    #[command(about = "List the final outputs of the enabled stages")]
    Targets(ConfigArgs),
    #[command(about = "List the samples found in the input directory")]
    Samples(ConfigArgs),
    #[command(about = "Print the citations for the enabled stages")]
    Citations(ConfigArgs),
    #[command(about = "Check required programs and read files")]
    Check(CheckArgs),
    #[command(about = "Write a default kira-mg.json")]
    Init(InitArgs),
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args, Clone)]
struct PlanArgs {
    #[command(flatten)]
    config: ConfigArgs,

    #[arg(long)]
    force_all: bool,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Core budget shared by all running jobs (default: all available)
    #[arg(long)]
    cores: Option<usize>,

    #[arg(long)]
    keep_going: bool,

    #[arg(long)]
    use_conda: bool,

    #[arg(long)]
    force_all: bool,

    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Clone)]
struct CheckArgs {
    #[command(flatten)]
    config: ConfigArgs,

    #[arg(long)]
    use_conda: bool,
}

#[derive(Args, Clone)]
struct InitArgs {
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    #[arg(long)]
    force: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::MissingConfig
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::InvalidConfig(_)
        | KiraError::MissingDatabase { .. }
        | KiraError::InvalidPattern(_)
        | KiraError::InvalidSampleName(_)
        | KiraError::InputDir(_)
        | KiraError::NoSamples { .. }
        | KiraError::InvalidLevel(_)
        | KiraError::UnresolvedWildcard { .. }
        | KiraError::DuplicateOutput { .. }
        | KiraError::MissingInput { .. }
        | KiraError::Cycle(_) => 2,
        KiraError::JobFailed { .. }
        | KiraError::MissingOutput { .. }
        | KiraError::MissingTool(_)
        | KiraError::RunFailed { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Init(args) => run_init(args, output_mode),
        Commands::Plan(args) => {
            let app = load_app(&args.config)?;
            run_plan(args, app, output_mode)
        }
        Commands::Run(args) => {
            let app = load_app(&args.config)?;
            run_workflow(args, app, output_mode)
        }
        Commands::Targets(args) => {
            let app = load_app(&args)?;
            let sink = StderrProgress::new(ProgressSinkKind::Plan);
            match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.targets(&JsonOutput)?;
                    JsonOutput::print_targets(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.targets(&sink)?;
                    for target in &result.targets {
                        println!("{target}");
                    }
                    Ok(())
                }
            }
        }
        Commands::Samples(args) => {
            let app = load_app(&args)?;
            let sink = StderrProgress::new(ProgressSinkKind::Plan);
            match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.samples(&JsonOutput)?;
                    JsonOutput::print_samples(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.samples(&sink)?;
                    for sample in &result.samples {
                        println!("{sample}");
                    }
                    Ok(())
                }
            }
        }
        Commands::Citations(args) => {
            let app = load_app(&args)?;
            let sink = StderrProgress::new(ProgressSinkKind::Plan);
            match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.citations(&JsonOutput)?;
                    JsonOutput::print_citations(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.citations(&sink)?;
                    print!("{}", result.rendered);
                    Ok(())
                }
            }
        }
        Commands::Check(args) => {
            let app = load_app(&args.config)?;
            let result = match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.check(args.use_conda, &JsonOutput)?;
                    JsonOutput::print_check(&result).into_diagnostic()?;
                    result
                }
                OutputMode::Interactive => {
                    let result =
                        app.check(args.use_conda, &StderrProgress::new(ProgressSinkKind::Check))?;
                    print_check_summary(&result);
                    result
                }
            };
            if result.is_ok() {
                Ok(())
            } else {
                Err(miette::Report::msg("check found missing tools or unreadable reads"))
            }
        }
    }
}

fn load_app(args: &ConfigArgs) -> miette::Result<App> {
    let resolved = ConfigLoader::resolve(args.config.as_deref())?;
    Ok(App::new(resolved))
}

fn run_init(args: InitArgs, output_mode: OutputMode) -> miette::Result<()> {
    let path = args.config.unwrap_or_else(default_config_path);
    match output_mode {
        OutputMode::NonInteractive => {
            let result = App::init_config(&path, args.force, &JsonOutput)?;
            JsonOutput::print_init(&result).into_diagnostic()
        }
        OutputMode::Interactive => {
            let result =
                App::init_config(&path, args.force, &StderrProgress::new(ProgressSinkKind::Plan))?;
            if result.written {
                println!("wrote {}", result.path);
            } else {
                println!("{} already exists (use --force to overwrite)", result.path);
            }
            Ok(())
        }
    }
}

fn run_plan(args: PlanArgs, app: App, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.plan(args.force_all, &JsonOutput)?;
            JsonOutput::print_plan(&result).into_diagnostic()
        }
        OutputMode::Interactive => {
            let result = app.plan(args.force_all, &StderrProgress::new(ProgressSinkKind::Plan))?;
            print_plan_summary(&result);
            Ok(())
        }
    }
}

fn run_workflow(args: RunArgs, app: App, output_mode: OutputMode) -> miette::Result<()> {
    let cores = args.cores.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1)
    });
    let request = RunRequest {
        cores,
        keep_going: args.keep_going,
        use_conda: args.use_conda,
        force_all: args.force_all,
        dry_run: args.dry_run,
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| KiraError::Runtime(err.to_string()))?;

    let result = match output_mode {
        OutputMode::NonInteractive => {
            let result = runtime.block_on(app.run(request, &JsonOutput))?;
            JsonOutput::print_run(&result).into_diagnostic()?;
            result
        }
        OutputMode::Interactive => {
            let sink = StderrProgress::new(ProgressSinkKind::Run);
            let result = runtime.block_on(app.run(request, &sink))?;
            print_run_summary(&result);
            result
        }
    };

    let failed = result.summary.failed();
    if failed > 0 {
        return Err(KiraError::RunFailed {
            failed,
            logdir: app.config().logdir.to_string(),
        }
        .into());
    }
    Ok(())
}

fn print_plan_summary(result: &PlanResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}KIRA-MG plan{reset}");
    println!("stages: {}", result.stages.join(", "));
    println!("samples: {}", result.samples.join(", "));
    for job in &result.jobs {
        match &job.reason {
            Some(reason) => {
                println!("{yellow}run        {} ({reason}){reset}", job.job);
                println!("           {}", job.command);
            }
            None => println!("{green}up-to-date {}{reset}", job.job),
        }
    }
    println!(
        "{cyan}{} of {} jobs would run{reset}",
        result.to_run(),
        result.jobs.len()
    );
}

fn print_run_summary(result: &RunResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    let summary = &result.summary;
    println!("{cyan}KIRA-MG run summary{reset}");
    for job in &summary.jobs {
        let color = match job.status {
            JobStatus::Completed | JobStatus::UpToDate => green,
            JobStatus::Failed(_) => red,
            JobStatus::Skipped | JobStatus::Planned(_) => yellow,
        };
        println!("{color}{:<12} {}{reset}", short_status(&job.status), job.job);
        if matches!(job.status, JobStatus::Failed(_)) {
            println!("{red}             log: {}{reset}", job.log);
        }
    }
    println!(
        "{green}completed: {}{reset}  {green}up-to-date: {}{reset}  {red}failed: {}{reset}  {yellow}skipped: {}{reset}",
        summary.count(|status| *status == JobStatus::Completed),
        summary.count(|status| *status == JobStatus::UpToDate),
        summary.failed(),
        summary.count(|status| *status == JobStatus::Skipped),
    );
    if let Some(path) = &result.citations_path {
        println!("{cyan}citations: {path}{reset}");
    }
    if let Some(path) = &result.summary_path {
        println!("{cyan}summary: {path}{reset}");
    }
}

fn short_status(status: &JobStatus) -> &'static str {
    match status {
        JobStatus::Completed => "completed",
        JobStatus::Failed(_) => "failed",
        JobStatus::Skipped => "skipped",
        JobStatus::UpToDate => "up-to-date",
        JobStatus::Planned(_) => "would run",
    }
}

fn print_check_summary(result: &CheckResult) {
    let green = "\x1b[32m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    for tool in &result.tools {
        match &tool.path {
            Some(path) => println!(
                "{green}found   {} {path} {}{reset}",
                tool.program,
                tool.version.as_deref().unwrap_or("")
            ),
            None => println!("{red}missing {}{reset}", tool.program),
        }
    }
    for read in &result.reads {
        match &read.message {
            None => println!("{green}ok      {}{reset}", read.path),
            Some(message) => println!("{red}bad     {message}{reset}"),
        }
    }
}
