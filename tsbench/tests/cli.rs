use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::thread;

use assert_cmd::cargo::CommandCargoExt;
use pretty_assertions::assert_eq;
use tsbench_planner::HighLevelQuery;

const DATASET: &[&str] = &[
    "--scale",
    "10",
    "--seed",
    "7",
    "--timestamp-start",
    "2016-01-01T00:00:00Z",
    "--timestamp-end",
    "2016-01-02T00:00:00Z",
];

fn tsbench() -> Command {
    let mut command = Command::cargo_bin("tsbench").unwrap();
    command.env("LOG_FILTER", "warn");
    command
}

fn run(args: &[&str]) -> Output {
    tsbench()
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .unwrap()
}

fn run_with_stdin(args: &[&str], stdin: String) -> Output {
    let mut child = tsbench()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut pipe = child.stdin.take().expect("failed to open stdin");
    thread::spawn(move || {
        pipe.write_all(stdin.as_bytes())
            .expect("cannot write queries to stdin");
    });
    child.wait_with_output().unwrap()
}

fn generate_queries(query_type: &str, count: usize) -> String {
    let count = count.to_string();
    let mut args = vec![
        "generate-queries",
        "--query-type",
        query_type,
        "--queries",
        count.as_str(),
    ];
    args.extend_from_slice(DATASET);
    let output = run(&args);
    assert!(output.status.success(), "{output:?}");
    String::from_utf8(output.stdout).unwrap()
}

fn plan(queries: String, extra: &[&str]) -> Output {
    let mut args = vec!["plan"];
    args.extend_from_slice(DATASET);
    args.extend_from_slice(extra);
    run_with_stdin(&args, queries)
}

#[test]
fn lists_query_types() {
    let output = run(&["generate-queries", "--list-query-types"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let types: Vec<_> = stdout.lines().collect();
    assert_eq!(types.len(), 16);
    assert!(types.contains(&"lastpoint"));
    assert!(types.contains(&"single-groupby-1-1-1"));
}

#[test]
fn generates_json_lines() {
    let stdout = generate_queries("single-groupby-1-8-1", 3);
    let queries: Vec<HighLevelQuery> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(
        queries.iter().map(|q| q.id).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert!(queries.iter().all(|q| q.tag_sets.len() == 8));
}

#[test]
fn unknown_query_type_fails() {
    let output = run(&["generate-queries", "--query-type", "cpu-max-all-3"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid query type for use case 'devops': 'cpu-max-all-3'"),
        "{stderr}"
    );
}

#[test]
fn plans_generated_queries() {
    let output = plan(generate_queries("single-groupby-1-1-1", 5), &[]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout
            .matches("QueryPlanWithServerAggregation: aggregation max, ")
            .count(),
        5
    );
    assert!(stdout.contains("SELECT max(value) FROM series_double"), "{stdout}");
}

#[test]
fn multi_field_queries_plan_either_way() {
    let queries = generate_queries("cpu-max-all-1", 2);

    let output = plan(queries.clone(), &[]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout
            .matches("QueryPlanWithServerAggregation: aggregation max, ")
            .count(),
        2
    );
    // one host, every cpu metric
    assert!(stdout.contains("(field: usage_user)"), "{stdout}");
    assert!(stdout.contains("(field: usage_guest_nice)"), "{stdout}");

    let output = plan(queries, &["--aggregation-plan", "client"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout.matches("QueryPlanWithoutServerAggregation").count(),
        2
    );
}

#[test]
fn lastpoint_plans_one_statement_per_series() {
    let output = plan(generate_queries("lastpoint", 1), &[]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    // 10 hosts, 10 metrics, one day partition
    assert!(
        stdout.contains("for every 1 hostname, 100 statements"),
        "{stdout}"
    );
    assert_eq!(stdout.matches(" LIMIT 1").count(), 100);
}

#[test]
fn generates_cassandra_rows() {
    let output = run(&[
        "generate-data",
        "--scale",
        "2",
        "--timestamp-start",
        "2016-01-01T00:00:00Z",
        "--timestamp-end",
        "2016-01-01T00:01:00Z",
        "--log-interval",
        "10s",
        "--format",
        "cassandra",
    ]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    let rows: Vec<_> = stdout.lines().collect();
    assert_eq!(rows.len(), 2 * 6 * 10);
    assert!(rows.iter().all(|row| row.starts_with("series_double,cpu,hostname=host_")));
}

#[test]
fn generates_line_protocol() {
    let output = run(&[
        "generate-data",
        "--scale",
        "1",
        "--timestamp-end",
        "2016-01-01T00:00:30Z",
        "--format",
        "influx",
    ]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 3);
    assert!(stdout.starts_with("cpu,hostname=host_0,region="));
}
