use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};

use kira_metagenome_workflow::config::{Config, ConfigLoader};
use kira_metagenome_workflow::dag::Dag;
use kira_metagenome_workflow::error::KiraError;
use kira_metagenome_workflow::executor::{Executor, JobStatus, RunOptions, RunSummary};
use kira_metagenome_workflow::rule::{CommandPipeline, CommandSpec, Rule, RuleIo, Shadow, Tool};

/// Runs `sh -c` with a script built from the job's concrete paths.
#[derive(Debug)]
struct Sh(fn(&RuleIo) -> String);

impl Tool for Sh {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        Ok(CommandPipeline::single(
            CommandSpec::new("sh").arg("-c").arg((self.0)(io)),
        ))
    }
}

/// `sh -c FIRST | sh -c SECOND > output 0`.
#[derive(Debug)]
struct Piped(&'static str, &'static str);

impl Tool for Piped {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        Ok(
            CommandPipeline::single(CommandSpec::new("sh").arg("-c").arg(self.0))
                .pipe(CommandSpec::new("sh").arg("-c").arg(self.1))
                .stdout_to(io.output(0)?),
        )
    }
}

/// Writes output 0 only when `required` exists from the job's working directory.
#[derive(Debug)]
struct RequireFile(Utf8PathBuf);

impl Tool for RequireFile {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let script = format!("test -e {} && echo found > {}", self.0, io.output(0)?);
        Ok(CommandPipeline::single(
            CommandSpec::new("sh").arg("-c").arg(script),
        ))
    }
}

fn exclusive(io: &RuleIo) -> String {
    let marker = io.outputs[0].parent().unwrap().join("running");
    format!(
        "test ! -e {marker} || exit 9; touch {marker}; sleep 0.2; rm {marker}; echo done > {}",
        io.outputs[0]
    )
}

fn copy_input(io: &RuleIo) -> String {
    format!("cat {} > {}", io.inputs[0], io.outputs[0])
}

fn write_output(io: &RuleIo) -> String {
    format!("echo made > {}", io.outputs[0])
}

fn fail_after_partial_output(io: &RuleIo) -> String {
    format!("echo partial > {}; echo boom >&2; exit 1", io.outputs[0])
}

fn do_nothing(_io: &RuleIo) -> String {
    "true".to_string()
}

struct Workspace {
    _dir: tempfile::TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        Self { _dir: dir, root }
    }

    fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    fn rule(&self, name: &str, tool: impl Tool + 'static) -> Rule {
        Rule::new(name, "test", tool).log(self.path(&format!("logs/{name}.log")))
    }

    fn options(&self) -> RunOptions {
        RunOptions::new(2, self.path("out/.shadow"))
    }

    async fn run(&self, rules: Vec<Rule>, options: RunOptions) -> RunSummary {
        let dag = Dag::build(rules).unwrap();
        let targets: Vec<Utf8PathBuf> = dag
            .rules()
            .iter()
            .flat_map(|rule| rule.output_paths().map(Utf8Path::to_path_buf).collect::<Vec<_>>())
            .collect();
        let jobs = dag.required_jobs(&targets).unwrap();
        Executor::new(Arc::new(dag), options).run(&jobs).await.unwrap()
    }
}

fn status_of<'a>(summary: &'a RunSummary, job: &str) -> &'a JobStatus {
    &summary
        .jobs
        .iter()
        .find(|report| report.job == job)
        .unwrap()
        .status
}

#[tokio::test]
async fn chain_runs_in_dependency_order() {
    let ws = Workspace::new();
    fs::write(ws.path("raw.txt"), "hello\n").unwrap();
    let rules = vec![
        ws.rule("second", Sh(copy_input))
            .input(ws.path("out/mid.txt"))
            .output(ws.path("out/final/final.txt")),
        ws.rule("first", Sh(copy_input))
            .input(ws.path("raw.txt"))
            .output(ws.path("out/mid.txt")),
    ];

    let summary = ws.run(rules, ws.options()).await;
    assert!(summary.is_success());
    assert_eq!(summary.jobs[0].job, "first");
    assert_eq!(
        fs::read_to_string(ws.path("out/final/final.txt")).unwrap(),
        "hello\n"
    );
    let log = fs::read_to_string(ws.path("logs/first.log")).unwrap();
    assert!(log.contains("# "));
    assert!(log.contains("sh -c"));
}

#[tokio::test]
async fn second_run_is_up_to_date() {
    let ws = Workspace::new();
    let rules = || vec![ws.rule("make", Sh(write_output)).output(ws.path("out/a.txt"))];

    let first = ws.run(rules(), ws.options()).await;
    assert_eq!(status_of(&first, "make"), &JobStatus::Completed);

    let second = ws.run(rules(), ws.options()).await;
    assert_eq!(status_of(&second, "make"), &JobStatus::UpToDate);

    let mut forced = ws.options();
    forced.force_all = true;
    let third = ws.run(rules(), forced).await;
    assert_eq!(status_of(&third, "make"), &JobStatus::Completed);
}

#[tokio::test]
async fn failure_removes_outputs_and_skips_downstream() {
    let ws = Workspace::new();
    let rules = vec![
        ws.rule("broken", Sh(fail_after_partial_output))
            .output(ws.path("out/broken.txt")),
        ws.rule("after", Sh(copy_input))
            .input(ws.path("out/broken.txt"))
            .output(ws.path("out/after.txt")),
    ];

    let summary = ws.run(rules, ws.options()).await;
    assert_eq!(summary.failed(), 1);
    assert!(matches!(status_of(&summary, "broken"), JobStatus::Failed(message) if message.contains("exited")));
    assert_eq!(status_of(&summary, "after"), &JobStatus::Skipped);
    assert!(!ws.path("out/broken.txt").exists());
    assert!(!ws.path("out/after.txt").exists());
    let log = fs::read_to_string(ws.path("logs/broken.log")).unwrap();
    assert!(log.contains("boom"));
}

#[tokio::test]
async fn keep_going_finishes_independent_branches() {
    let ws = Workspace::new();
    let rules = || {
        vec![
            ws.rule("broken", Sh(fail_after_partial_output))
                .output(ws.path("out/broken.txt")),
            ws.rule("fine", Sh(write_output)).output(ws.path("out/fine.txt")),
        ]
    };

    let mut options = RunOptions::new(1, ws.path("out/.shadow"));
    options.keep_going = true;
    let summary = ws.run(rules(), options).await;
    assert!(matches!(status_of(&summary, "broken"), JobStatus::Failed(_)));
    assert_eq!(status_of(&summary, "fine"), &JobStatus::Completed);

    fs::remove_file(ws.path("out/fine.txt")).unwrap();
    let summary = ws.run(rules(), RunOptions::new(1, ws.path("out/.shadow"))).await;
    assert_eq!(status_of(&summary, "fine"), &JobStatus::Skipped);
    assert!(!ws.path("out/fine.txt").exists());
}

#[tokio::test]
async fn missing_declared_output_fails_the_job() {
    let ws = Workspace::new();
    let rules = vec![ws.rule("lazy", Sh(do_nothing)).output(ws.path("out/never.txt"))];
    let summary = ws.run(rules, ws.options()).await;
    assert!(
        matches!(status_of(&summary, "lazy"), JobStatus::Failed(message) if message.contains("did not produce"))
    );
}

#[tokio::test]
async fn tolerate_empty_creates_missing_outputs() {
    let ws = Workspace::new();
    let rules = vec![
        ws.rule("empty", Sh(do_nothing))
            .output(ws.path("out/empty.krona"))
            .tolerate_empty(),
    ];
    let summary = ws.run(rules, ws.options()).await;
    assert!(summary.is_success());
    assert_eq!(fs::read(ws.path("out/empty.krona")).unwrap(), b"");
}

#[tokio::test]
async fn pipefail_decides_which_exit_codes_count() {
    let ws = Workspace::new();
    let strict = vec![
        ws.rule("strict", Piped("echo data; exit 3", "cat"))
            .output(ws.path("out/strict.txt")),
    ];
    let summary = ws.run(strict, ws.options()).await;
    assert_eq!(summary.failed(), 1);

    let lenient = vec![
        ws.rule("lenient", Piped("echo data; exit 3", "cat"))
            .output(ws.path("out/lenient.txt"))
            .tolerate_empty(),
    ];
    let summary = ws.run(lenient, ws.options()).await;
    assert!(summary.is_success());
    assert_eq!(
        fs::read_to_string(ws.path("out/lenient.txt")).unwrap(),
        "data\n"
    );
}

#[tokio::test]
async fn shadowed_outputs_are_moved_into_place() {
    let ws = Workspace::new();
    let rules = vec![
        ws.rule("shadowed", Sh(write_output))
            .output(ws.path("out/shadowed/result.txt"))
            .shadow(Shadow::Shallow),
    ];
    let summary = ws.run(rules, ws.options()).await;
    assert!(summary.is_success());
    assert_eq!(
        fs::read_to_string(ws.path("out/shadowed/result.txt")).unwrap(),
        "made\n"
    );
    let leftovers = fs::read_dir(ws.path("out/.shadow")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let ws = Workspace::new();
    let rules = vec![ws.rule("make", Sh(write_output)).output(ws.path("out/a.txt"))];
    let mut options = ws.options();
    options.dry_run = true;
    let summary = ws.run(rules, options).await;
    assert!(matches!(status_of(&summary, "make"), JobStatus::Planned(reason) if reason.contains("missing output")));
    assert!(!ws.path("out").exists());
    assert!(!ws.path("logs").exists());
}

#[tokio::test]
async fn jobs_wider_than_the_budget_run_one_at_a_time() {
    let ws = Workspace::new();
    let rules = (0..4)
        .map(|index| {
            ws.rule(&format!("job{index}"), Sh(exclusive))
                .output(ws.path(&format!("out/{index}.txt")))
                .threads(8)
        })
        .collect();
    let mut options = ws.options();
    options.keep_going = true;
    let summary = ws.run(rules, options).await;
    assert_eq!(summary.count(|status| *status == JobStatus::Completed), 4);
    assert!(!ws.path("out/running").exists());
}

#[tokio::test]
async fn shadowed_job_sees_database_paths_from_the_config() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.path("databases/metaphlan2")).unwrap();
    fs::write(ws.path("databases/metaphlan2/mpa_v20_m200.pkl"), b"").unwrap();
    let config = Config {
        dbdir: Some(ws.path("databases").to_string()),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config).unwrap();

    let rules = vec![
        ws.rule("metaphlan2", RequireFile(resolved.metaphlan2.mpa_pkl.clone()))
            .output(ws.path("out/metaphlan2/s1.txt"))
            .shadow(Shadow::Shallow),
    ];
    let summary = ws.run(rules, ws.options()).await;
    assert_eq!(status_of(&summary, "metaphlan2"), &JobStatus::Completed);
    assert_eq!(
        fs::read_to_string(ws.path("out/metaphlan2/s1.txt")).unwrap(),
        "found\n"
    );
}

#[tokio::test]
async fn shadowed_job_fails_on_relative_parameter_paths() {
    let ws = Workspace::new();
    let rules = vec![
        ws.rule("relative", RequireFile(Utf8PathBuf::from("Cargo.toml")))
            .output(ws.path("out/relative.txt"))
            .shadow(Shadow::Shallow),
    ];
    let summary = ws.run(rules, ws.options()).await;
    assert!(matches!(status_of(&summary, "relative"), JobStatus::Failed(_)));
}

#[tokio::test]
async fn rerun_without_output_does_not_keep_the_stale_file() {
    let ws = Workspace::new();
    let output = ws.path("out/stale.txt");
    fs::create_dir_all(ws.path("out")).unwrap();
    fs::write(&output, "old").unwrap();
    let hour_ago = SystemTime::now() - Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(&output)
        .unwrap()
        .set_modified(hour_ago)
        .unwrap();
    fs::write(ws.path("newer.txt"), "new").unwrap();

    let rules = vec![
        ws.rule("lazy", Sh(do_nothing))
            .input(ws.path("newer.txt"))
            .output(output.clone()),
    ];
    let summary = ws.run(rules, ws.options()).await;
    assert!(
        matches!(status_of(&summary, "lazy"), JobStatus::Failed(message) if message.contains("did not produce"))
    );
    assert!(!output.exists());
}
