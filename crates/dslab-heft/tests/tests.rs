use rand::prelude::*;
use rand_pcg::Pcg64;

use dslab_heft::catalog::*;
use dslab_heft::config::{HeftConfig, SchedulerParams};
use dslab_heft::error::HeftError;
use dslab_heft::graph::TaskGraph;
use dslab_heft::schedule::ScheduleResult;
use dslab_heft::scheduler::HeftScheduler;
use dslab_heft::task::{Task, TaskId, Transformation};

const EPSILON: f64 = 1e-9;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn transformation(name: &str) -> Transformation {
    Transformation::new("test", name, "1.0")
}

fn site_list(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn gen_sites(rng: &mut Pcg64, num_sites: usize) -> (SiteStore, Vec<String>) {
    let mut store = SiteStore::new();
    let mut names = Vec::new();
    for i in 0..num_sites {
        let name = format!("site{}", i);
        let gateway = match rng.gen_range(0..4) {
            0 => None,
            1 => Some(GridGateway::unknown()),
            2 => Some(GridGateway::new(UNKNOWN_NODES, rng.gen_range(1..8))),
            _ => Some(GridGateway::new(rng.gen_range(1..4), 8)),
        };
        store.add_site(&name, gateway);
        names.push(name);
    }
    (store, names)
}

fn gen_workflow(
    rng: &mut Pcg64,
    sites: &[String],
    num_tasks: usize,
    num_edges: usize,
) -> (TaskGraph, TransformationStore) {
    let mut transformations = TransformationStore::new();
    let num_transformations = rng.gen_range(1..6);
    for i in 0..num_transformations {
        let t = transformation(&format!("tr{}", i));
        let mut installed = false;
        for site in sites.iter() {
            if rng.gen_range(0..3) != 0 {
                let runtime = rng.gen_range(1..100).to_string();
                transformations.add_entry(&t, site, &[("runtime", runtime.as_str())]);
                installed = true;
            }
        }
        if !installed {
            transformations.add_entry(&t, &sites[0], &[("runtime", "10")]);
        }
    }

    let mut graph = TaskGraph::new();
    let mut ids = Vec::new();
    for i in 0..num_tasks {
        let t = transformation(&format!("tr{}", rng.gen_range(0..num_transformations)));
        ids.push(graph.add_task(Task::new(&format!("task{}", i), t)));
    }
    ids.shuffle(rng);

    // edges always go from an earlier task to a later one in the shuffled order
    for _ in 0..num_edges {
        let from = rng.gen_range(0..num_tasks - 1);
        let to = rng.gen_range(from + 1..num_tasks);
        graph.add_edge(ids[from], ids[to]).unwrap();
    }
    (graph, transformations)
}

fn edges(graph: &TaskGraph) -> Vec<(TaskId, TaskId)> {
    graph
        .task_ids()
        .flat_map(|parent| graph.children(parent).map(move |child| (parent, child)))
        .collect()
}

fn check_schedule(graph: &TaskGraph, schedule: &ScheduleResult, communication_cost: f64) {
    assert_eq!(schedule.decisions().len(), graph.task_count());
    assert_eq!(graph.synthetic_root(), None);

    for (parent, child) in edges(graph) {
        let p = schedule.decision(parent).unwrap();
        let c = schedule.decision(child).unwrap();
        let ranks = schedule.ranks();

        // rank monotonicity
        assert!(
            ranks.downward_rank(child).unwrap()
                >= ranks.downward_rank(parent).unwrap() + ranks.avg_compute_time(parent).unwrap()
        );

        // parents are scheduled first and their outputs are available before the child starts
        let order = schedule.decisions();
        assert!(order.get_index_of(&parent).unwrap() < order.get_index_of(&child).unwrap());
        let penalty = if p.site == c.site { 0. } else { communication_cost };
        assert!(c.start_time + EPSILON >= p.finish_time + penalty);
    }

    // busy intervals do not overlap
    for (site, pool) in schedule.pools() {
        assert!(pool.processors().len() as u32 <= pool.capacity(), "site {} is overloaded", site);
        for processor in pool.processors() {
            let intervals = processor.schedule().collect::<Vec<_>>();
            for pair in intervals.windows(2) {
                assert!(pair[0].end_time <= pair[1].start_time);
            }
        }
    }

    let makespan = schedule.makespan().unwrap();
    let leaves_max = graph
        .leaves()
        .into_iter()
        .map(|leaf| schedule.decision(leaf).unwrap().finish_time)
        .fold(0., f64::max);
    assert_eq!(makespan, leaves_max);
    for decision in schedule.decisions().values() {
        assert!(decision.finish_time <= makespan);
        assert!(decision.start_time >= 0.);
    }
}

#[test]
fn single_task() {
    init_logger();
    let mut site_store = SiteStore::new();
    site_store.add_site("A", Some(GridGateway::new(1, 1)));
    let mut transformations = TransformationStore::new();
    transformations.add_entry(&transformation("t"), "A", &[("runtime", "10")]);
    let mut graph = TaskGraph::new();
    let task = graph.add_task(Task::new("task", transformation("t")));

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let schedule = scheduler.schedule(&mut graph, &site_list(&["A"]), "single").unwrap();

    let decision = schedule.decision(task).unwrap();
    assert_eq!(decision.site, "A");
    assert_eq!(decision.start_time, 0.);
    assert_eq!(decision.finish_time, 10.);
    assert_eq!(schedule.makespan().unwrap(), 10.);
    assert_eq!(schedule.label(), "single");
    assert_eq!(graph.task_count(), 1);
}

fn two_independent_tasks(processors: i32) -> f64 {
    let mut site_store = SiteStore::new();
    site_store.add_site("A", Some(GridGateway::new(processors, processors)));
    let mut transformations = TransformationStore::new();
    transformations.add_entry(&transformation("short"), "A", &[("runtime", "5")]);
    transformations.add_entry(&transformation("long"), "A", &[("runtime", "7")]);
    let mut graph = TaskGraph::new();
    graph.add_task(Task::new("short", transformation("short")));
    graph.add_task(Task::new("long", transformation("long")));

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let schedule = scheduler.schedule(&mut graph, &site_list(&["A"]), "two").unwrap();
    check_schedule(&graph, &schedule, scheduler.config().communication_cost());
    schedule.makespan().unwrap()
}

#[test]
fn two_independent_tasks_on_one_processor() {
    assert_eq!(two_independent_tasks(1), 12.);
}

#[test]
fn two_independent_tasks_on_two_processors() {
    assert_eq!(two_independent_tasks(2), 7.);
}

#[test]
fn cross_site_communication_penalty() {
    init_logger();
    let mut site_store = SiteStore::new();
    site_store.add_site("A", Some(GridGateway::new(4, 4)));
    site_store.add_site("B", Some(GridGateway::new(4, 4)));
    let mut transformations = TransformationStore::new();
    transformations.add_entry(&transformation("producer"), "A", &[("runtime", "10")]);
    transformations.add_entry(&transformation("consumer"), "A", &[("runtime", "20")]);
    transformations.add_entry(&transformation("consumer"), "B", &[("runtime", "1")]);

    let mut graph = TaskGraph::new();
    let parent = graph.add_task(Task::new("parent", transformation("producer")));
    let child = graph.add_task(Task::new("child", transformation("consumer")));
    graph.add_edge(parent, child).unwrap();

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let communication_cost = scheduler.config().communication_cost();
    assert_eq!(communication_cost, 2.5);
    let schedule = scheduler.schedule(&mut graph, &site_list(&["A", "B"]), "penalty").unwrap();

    let p = schedule.decision(parent).unwrap();
    assert_eq!((p.site.as_str(), p.finish_time), ("A", 10.));
    let c = schedule.decision(child).unwrap();
    assert_eq!(c.site, "B");
    assert_eq!(c.start_time, 10. + communication_cost);
    assert_eq!(c.finish_time, 13.5);
    assert_eq!(schedule.makespan().unwrap(), 13.5);
}

#[test]
fn child_stays_on_parent_site_without_penalty() {
    let mut site_store = SiteStore::new();
    site_store.add_site("A", Some(GridGateway::new(4, 4)));
    site_store.add_site("B", Some(GridGateway::new(4, 4)));
    let mut transformations = TransformationStore::new();
    transformations.add_entry(&transformation("producer"), "A", &[("runtime", "10")]);
    transformations.add_entry(&transformation("consumer"), "A", &[("runtime", "2")]);
    transformations.add_entry(&transformation("consumer"), "B", &[("runtime", "1")]);

    let mut graph = TaskGraph::new();
    let parent = graph.add_task(Task::new("parent", transformation("producer")));
    let child = graph.add_task(Task::new("child", transformation("consumer")));
    graph.add_edge(parent, child).unwrap();

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let schedule = scheduler.schedule(&mut graph, &site_list(&["A", "B"]), "local").unwrap();
    let c = schedule.decision(child).unwrap();
    assert_eq!(c.site, "A");
    assert_eq!(c.start_time, 10.);
    assert_eq!(c.finish_time, 12.);
}

#[test]
fn equal_finish_times_pick_smallest_site() {
    let mut site_store = SiteStore::new();
    site_store.add_site("a", Some(GridGateway::new(1, 1)));
    site_store.add_site("b", Some(GridGateway::new(1, 1)));
    let mut transformations = TransformationStore::new();
    for site in ["b", "a"] {
        transformations.add_entry(&transformation("t"), site, &[("runtime", "5")]);
    }
    let mut graph = TaskGraph::new();
    let first = graph.add_task(Task::new("first", transformation("t")));
    let second = graph.add_task(Task::new("second", transformation("t")));

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let schedule = scheduler.schedule(&mut graph, &site_list(&["b", "a"]), "ties").unwrap();
    assert_eq!(schedule.site_of(first), Some("a"));
    assert_eq!(schedule.site_of(second), Some("b"));
    assert_eq!(schedule.makespan().unwrap(), 5.);
}

#[test]
fn tasks_are_scheduled_by_ascending_rank() {
    // a -> b -> c, d is independent
    let mut site_store = SiteStore::new();
    site_store.add_site("A", Some(GridGateway::new(1, 1)));
    let mut transformations = TransformationStore::new();
    transformations.add_entry(&transformation("t"), "A", &[("runtime", "3")]);
    let mut graph = TaskGraph::new();
    let a = graph.add_task(Task::new("a", transformation("t")));
    let b = graph.add_task(Task::new("b", transformation("t")));
    let c = graph.add_task(Task::new("c", transformation("t")));
    let d = graph.add_task(Task::new("d", transformation("t")));
    graph.add_edge(a, b).unwrap();
    graph.add_edge(b, c).unwrap();

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let schedule = scheduler.schedule(&mut graph, &site_list(&["A"]), "rank").unwrap();
    assert_eq!(schedule.decisions().keys().copied().collect::<Vec<_>>(), vec![a, d, b, c]);
    assert_eq!(schedule.decision(d).unwrap().start_time, 3.);
    assert_eq!(schedule.decision(b).unwrap().start_time, 6.);
    assert_eq!(schedule.makespan().unwrap(), 12.);
    check_schedule(&graph, &schedule, scheduler.config().communication_cost());
}

#[test]
fn task_without_candidate_site_fails() {
    let mut site_store = SiteStore::new();
    site_store.add_site("A", None);
    let mut transformations = TransformationStore::new();
    transformations.add_entry(&transformation("t"), "A", &[("runtime", "3")]);
    transformations.add_entry(&transformation("remote"), "B", &[("runtime", "3")]);
    let mut graph = TaskGraph::new();
    let a = graph.add_task(Task::new("a", transformation("t")));
    let b = graph.add_task(Task::new("b", transformation("remote")));
    graph.add_edge(a, b).unwrap();

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let result = scheduler.schedule(&mut graph, &site_list(&["A"]), "fail");
    assert!(matches!(result, Err(HeftError::NoCandidateSite(name)) if name == "b"));
    assert_eq!(graph.task_count(), 2);
    assert_eq!(graph.synthetic_root(), None);
}

#[test]
fn task_without_runtime_fails() {
    let site_store = SiteStore::new();
    let mut transformations = TransformationStore::new();
    transformations.add_entry(&transformation("t"), "A", &[]);
    let mut graph = TaskGraph::new();
    graph.add_task(Task::new("a", transformation("t")));

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let result = scheduler.schedule(&mut graph, &site_list(&["A"]), "fail");
    assert!(matches!(result, Err(HeftError::NoRuntimeEstimate { .. })));
}

#[test]
fn workflow_runtime_profile_is_used() {
    let site_store = SiteStore::new();
    let mut transformations = TransformationStore::new();
    transformations.add_entry(&transformation("t"), "A", &[]);
    let mut graph = TaskGraph::new();
    let a = graph.add_task(Task::new("a", transformation("t")).with_profile("runtime", "8"));

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let schedule = scheduler.schedule(&mut graph, &site_list(&["A"]), "profile").unwrap();
    assert_eq!(schedule.decision(a).unwrap().finish_time, 8.);
}

#[test]
fn graph_with_synthetic_root_is_rejected() {
    let site_store = SiteStore::new();
    let transformations = TransformationStore::new();
    let mut graph = TaskGraph::new();
    graph.add_task(Task::new("a", transformation("t")));
    graph.insert_synthetic_root().unwrap();

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let result = scheduler.schedule(&mut graph, &site_list(&["A"]), "root");
    assert!(matches!(result, Err(HeftError::InvalidGraph(_))));
}

#[test]
fn empty_workflow() {
    let site_store = SiteStore::new();
    let transformations = TransformationStore::new();
    let mut graph = TaskGraph::new();

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let schedule = scheduler.schedule(&mut graph, &site_list(&["A"]), "empty").unwrap();
    assert!(schedule.decisions().is_empty());
    assert_eq!(schedule.makespan().unwrap(), 0.);
    assert_eq!(graph.task_count(), 0);
}

#[test]
fn custom_estimator_and_config() {
    struct HalfMinute;

    impl RuntimeEstimator for HalfMinute {
        fn estimate(&self, _task: &Task, _entry: &TransformationEntry) -> Option<f64> {
            Some(30.)
        }
    }

    let mut site_store = SiteStore::new();
    site_store.add_site("A", Some(GridGateway::new(1, 1)));
    site_store.add_site("B", Some(GridGateway::new(1, 1)));
    let mut transformations = TransformationStore::new();
    transformations.add_entry(&transformation("t"), "A", &[("walltime", "5")]);
    transformations.add_entry(&transformation("u"), "B", &[("walltime", "5")]);
    let mut graph = TaskGraph::new();
    let a = graph.add_task(Task::new("a", transformation("t")));
    let b = graph.add_task(Task::new("b", transformation("u")));
    graph.add_edge(a, b).unwrap();

    let params = SchedulerParams::from_str("Heft[average_bandwidth=20,average_data_size=2]").unwrap();
    let scheduler = HeftScheduler::from_scheduler_params(&params, &site_store, &transformations)
        .unwrap()
        .with_runtime_estimator(Box::new(HalfMinute));
    assert_eq!(scheduler.description(), "Heft based Site Selector");
    let schedule = scheduler.schedule(&mut graph, &site_list(&["A", "B"]), "estimator").unwrap();
    assert_eq!(schedule.decision(b).unwrap().start_time, 40.);
    assert_eq!(schedule.makespan().unwrap(), 70.);

    let config = HeftConfig {
        runtime_profile_key: "walltime".to_string(),
        ..HeftConfig::default()
    };
    let scheduler = HeftScheduler::new(&site_store, &transformations).with_config(config);
    let schedule = scheduler.schedule(&mut graph, &site_list(&["A", "B"]), "walltime").unwrap();
    assert_eq!(schedule.makespan().unwrap(), 12.5);
}

#[test]
fn schedule_is_serialized_to_json() {
    let mut site_store = SiteStore::new();
    site_store.add_site("A", Some(GridGateway::new(1, 1)));
    let mut transformations = TransformationStore::new();
    transformations.add_entry(&transformation("t"), "A", &[("runtime", "10")]);
    let mut graph = TaskGraph::new();
    graph.add_task(Task::new("only", transformation("t")));

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let schedule = scheduler.schedule(&mut graph, &site_list(&["A"]), "json").unwrap();
    let json: serde_json::Value = serde_json::from_str(&schedule.to_json().unwrap()).unwrap();
    assert_eq!(json["label"], "json");
    assert_eq!(json["decisions"]["0"]["site"], "A");
    assert_eq!(json["decisions"]["0"]["finish_time"], 10.);
}

#[test]
fn random_workflows() {
    init_logger();
    let mut rng = Pcg64::seed_from_u64(123);
    for _ in 0..50 {
        let num_sites = rng.gen_range(1..5);
        let (site_store, sites) = gen_sites(&mut rng, num_sites);
        let num_tasks = rng.gen_range(2..60);
        let num_edges = rng.gen_range(0..num_tasks * 2);
        let (mut graph, transformations) = gen_workflow(&mut rng, &sites, num_tasks, num_edges);

        let scheduler = HeftScheduler::new(&site_store, &transformations);
        let schedule = scheduler.schedule(&mut graph, &sites, "random").unwrap();
        assert_eq!(graph.task_count(), num_tasks);
        check_schedule(&graph, &schedule, scheduler.config().communication_cost());
    }
}

#[test]
fn rescheduling_gives_same_result() {
    let mut rng = Pcg64::seed_from_u64(7);
    let (site_store, sites) = gen_sites(&mut rng, 3);
    let (mut graph, transformations) = gen_workflow(&mut rng, &sites, 40, 80);

    let scheduler = HeftScheduler::new(&site_store, &transformations);
    let first = scheduler.schedule(&mut graph, &sites, "first").unwrap();
    let second = scheduler.schedule(&mut graph, &sites, "second").unwrap();
    assert_eq!(first.decisions(), second.decisions());
    assert_eq!(first.makespan().unwrap(), second.makespan().unwrap());
}
