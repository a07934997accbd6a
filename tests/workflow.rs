mod common;

use std::collections::BTreeSet;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_metagenome_workflow::citations;
use kira_metagenome_workflow::dag::Dag;
use kira_metagenome_workflow::error::KiraError;
use kira_metagenome_workflow::workflow::{Workflow, WorkflowPlan};

use common::{Project, samples};

fn rule_ids(plan: &WorkflowPlan) -> Vec<String> {
    plan.rules.iter().map(|rule| rule.id()).collect()
}

#[test]
fn qc_and_metaphlan2_scenario() {
    let project = Project::new(&["s1", "s2"]);
    let config = project.config(|_| {});
    let plan = Workflow::assemble(&config, &samples(&["s1", "s2"])).unwrap();

    assert_eq!(plan.enabled_stages, vec!["read_qc", "metaphlan2"]);

    let targets: BTreeSet<Utf8PathBuf> = plan.targets.iter().cloned().collect();
    for sample in ["s1", "s2"] {
        for pair in [1, 2] {
            for ext in ["zip", "html"] {
                assert!(targets.contains(
                    &project.out(&format!("fastqc/{sample}_R{pair}_fastqc.{ext}"))
                ));
                assert!(targets.contains(&project.out(&format!(
                    "fastqc_trimmed/{sample}_R{pair}.trimmed_fastqc.{ext}"
                ))));
            }
        }
    }
    assert!(targets.contains(&project.out("metaphlan2/all_samples.metaphlan2.txt")));
    assert!(targets.contains(&project.out("metaphlan2/all_samples.metaphlan2.species.top50.pdf")));
    assert!(targets.contains(&project.out("metaphlan2/all_samples.metaphlan2.krona.html")));

    let all_outputs: Vec<String> = plan
        .rules
        .iter()
        .flat_map(|rule| rule.output_paths().map(ToString::to_string).collect::<Vec<_>>())
        .chain(plan.targets.iter().map(ToString::to_string))
        .collect();
    assert!(all_outputs.iter().all(|path| !path.contains("filtered_human")));
    assert!(all_outputs.iter().all(|path| !path.contains("/kaiju/")));
    assert!(
        plan.rules
            .iter()
            .all(|rule| rule.stage == "read_qc" || rule.stage == "metaphlan2")
    );
}

#[test]
fn full_graph_has_single_producers_and_no_dangling_inputs() {
    let project = Project::new(&["s1", "s2", "s3"]);
    let config = project.config(|config| {
        config.remove_human = Some(true);
        config.taxonomic_profile.kaiju = true;
        config.assembly = Some(true);
    });
    let plan = Workflow::assemble(&config, &samples(&["s1", "s2", "s3"])).unwrap();
    assert_eq!(
        plan.enabled_stages,
        vec!["read_qc", "host_removal", "kaiju", "metaphlan2", "metawrap"]
    );

    let dag = Dag::build(plan.rules.clone()).unwrap();
    let jobs = dag.required_jobs(&plan.targets).unwrap();
    assert_eq!(jobs.len(), plan.rules.len());

    let position = |name: &str| {
        jobs.iter()
            .position(|id| dag.rule(*id).id() == name)
            .unwrap()
    };
    assert!(position("bbduk_trim[sample=s1]") < position("remove_human[sample=s1]"));
    assert!(position("remove_human[sample=s1]") < position("kaiju[sample=s1]"));
    assert!(position("metawrap_binning[sample=s2]") < position("metawrap_bin_refinement[sample=s2]"));
}

#[test]
fn disabling_a_stage_removes_its_rules_and_outputs() {
    let project = Project::new(&["s1"]);
    let with = Workflow::assemble(&project.config(|_| {}), &samples(&["s1"])).unwrap();
    let without = Workflow::assemble(
        &project.config(|config| config.taxonomic_profile.metaphlan2 = false),
        &samples(&["s1"]),
    )
    .unwrap();

    assert!(with.rules_of("metaphlan2").count() > 0);
    assert_eq!(without.rules_of("metaphlan2").count(), 0);
    assert!(
        without
            .targets
            .iter()
            .all(|target| !target.as_str().contains("metaphlan2"))
    );
    assert!(!without.citations.contains(&citations::metaphlan2()));
    assert_eq!(with.rules_of("read_qc").count(), without.rules_of("read_qc").count());
}

#[test]
fn host_removal_feeds_profilers() {
    let project = Project::new(&["s1"]);
    let config = project.config(|config| config.remove_human = Some(true));
    let plan = Workflow::assemble(&config, &samples(&["s1"])).unwrap();
    let profile = plan
        .rules
        .iter()
        .find(|rule| rule.name == "metaphlan2")
        .unwrap();
    assert_eq!(
        profile.inputs,
        vec![
            project.out("filtered_human/s1_R1.filtered_human.fq.gz"),
            project.out("filtered_human/s1_R2.filtered_human.fq.gz"),
        ]
    );
}

#[test]
fn without_qc_profilers_read_raw_input() {
    let project = Project::new(&["s1"]);
    let config = project.config(|config| config.qc_reads = Some(false));
    let plan = Workflow::assemble(&config, &samples(&["s1"])).unwrap();
    assert_eq!(plan.enabled_stages, vec!["metaphlan2"]);
    let profile = plan
        .rules
        .iter()
        .find(|rule| rule.name == "metaphlan2")
        .unwrap();
    assert_eq!(profile.inputs[0], project.path("input/s1_R1.fastq.gz"));
    Dag::build(plan.rules.clone()).unwrap();
}

#[test]
fn planning_is_deterministic() {
    let project = Project::new(&["b", "a", "c"]);
    let config = project.config(|config| {
        config.taxonomic_profile.kaiju = true;
        config.assembly = Some(true);
    });
    let names = samples(&["c", "a", "b"]);
    let first = Workflow::assemble(&config, &names).unwrap();
    let second = Workflow::assemble(&config, &names).unwrap();

    assert_eq!(rule_ids(&first), rule_ids(&second));
    assert_eq!(first.targets, second.targets);
    assert_eq!(first.citations, second.citations);
    let commands = |plan: &WorkflowPlan| {
        plan.rules
            .iter()
            .map(|rule| rule.pipeline().unwrap().render())
            .collect::<Vec<_>>()
    };
    assert_eq!(commands(&first), commands(&second));
    assert_eq!(first.rules[0].id(), "fastqc[readpair=1,sample=a]");
}

#[test]
fn shared_citations_appear_once() {
    let project = Project::new(&["s1"]);
    let config = project.config(|config| config.taxonomic_profile.kaiju = true);
    let plan = Workflow::assemble(&config, &samples(&["s1"])).unwrap();
    assert_eq!(plan.citations.len(), 5);
    assert_eq!(plan.citations.render().matches("- Ondov").count(), 1);
}

#[test]
fn missing_database_fails_before_planning() {
    let project = Project::new(&["s1"]);
    project.remove("databases/kaiju/names.dmp");
    let config = project.config(|config| config.taxonomic_profile.kaiju = true);
    assert_matches!(
        Workflow::assemble(&config, &samples(&["s1"])),
        Err(KiraError::MissingDatabase { stage, .. }) if stage == "kaiju"
    );
}

#[test]
fn missing_hg19_only_matters_when_host_removal_is_on() {
    let project = Project::new(&["s1"]);
    project.remove("databases/hg19");
    Workflow::assemble(&project.config(|_| {}), &samples(&["s1"])).unwrap();
    assert_matches!(
        Workflow::assemble(
            &project.config(|config| config.remove_human = Some(true)),
            &samples(&["s1"])
        ),
        Err(KiraError::MissingDatabase { .. })
    );
}

#[test]
fn heatmaps_follow_configured_levels() {
    let project = Project::new(&["s1"]);
    let config = project.config(|config| {
        config.metaphlan2.heatmap.levels = vec!["genus".to_string(), "species".to_string()];
        config.metaphlan2.heatmap.top = 20;
    });
    let plan = Workflow::assemble(&config, &samples(&["s1"])).unwrap();
    let heatmaps: Vec<String> = plan
        .rules_of("metaphlan2")
        .filter(|rule| rule.name == "metaphlan2_heatmap")
        .map(|rule| rule.id())
        .collect();
    assert_eq!(
        heatmaps,
        vec![
            "metaphlan2_heatmap[level=genus,top=20]",
            "metaphlan2_heatmap[level=species,top=20]"
        ]
    );
}
