//! Integration test: load call-graph and line-stats dumps of one profiled
//! request and check the pruned call tree a renderer would receive.

use linetree_core::line_text::MemorySource;
use linetree_core::model::{EntryPoint, FunctionKey};
use linetree_core::{CallGraphIndex, FunctionCallNode, ProfileSession, RootMatch, TreeOptions};

const CALL_GRAPH: &[u8] = include_bytes!("fixtures/request_call_graph.json");
const LINE_STATS: &[u8] = include_bytes!("fixtures/request_line_stats.json");
const IDLE_CALL_GRAPH: &[u8] = include_bytes!("fixtures/idle_call_graph.json");
const IDLE_LINE_STATS: &[u8] = include_bytes!("fixtures/idle_line_stats.json");
const VIEWS_SOURCE: &str = include_str!("fixtures/views.py");

fn request_session(entry: EntryPoint) -> ProfileSession {
    let mut source = MemorySource::new();
    source.insert("app/views.py", VIEWS_SOURCE);
    ProfileSession::from_dumps(CALL_GRAPH, Some(LINE_STATS), Some(entry), TreeOptions::default())
        .expect("failed to load request dumps")
        .with_source(source)
}

fn names(nodes: &[FunctionCallNode<'_>]) -> Vec<String> {
    nodes.iter().map(|n| n.key().name().to_string()).collect()
}

#[test]
fn heavy_branch_and_line_profiled_helper_survive() {
    let session = request_session(EntryPoint::new("app/views.py", 10));
    let tree = session.call_tree();

    // render (0.04s), format_footer (1ms) and audit (0.1ms) fall below
    // their thresholds; tiny_helper is kept for its line stats.
    assert_eq!(
        names(&tree),
        vec![
            "index",
            "load_items",
            "__iter__",
            "<built-in method time.sleep>",
            "tiny_helper"
        ]
    );

    let ids: Vec<_> = tree.iter().map(|n| n.id().to_string()).collect();
    assert_eq!(ids, vec!["0", "0_1", "0_1_1", "0_1_1_1", "0_3"]);
    let depths: Vec<_> = tree.iter().map(FunctionCallNode::depth).collect();
    assert_eq!(depths, vec![0, 1, 2, 3, 1]);
    let has_subfuncs: Vec<_> = tree.iter().map(FunctionCallNode::has_subfuncs).collect();
    assert_eq!(has_subfuncs, vec![true, true, true, false, false]);
}

#[test]
fn colors_fan_out_by_position_and_share() {
    let session = request_session(EntryPoint::new("app/views.py", 10));
    let tree = session.call_tree();
    let close = |a: f64, b: f64| (a - b).abs() < 1e-9;

    let load_items = tree[1].color();
    assert!(close(load_items.h, 0.25));
    assert!(close(load_items.s, 0.475));

    let iter = tree[2].color();
    assert!(close(iter.h, 0.5));
    assert!(close(iter.s, 0.45));

    let sleep = tree[3].color();
    assert!(close(sleep.h, 0.5 + 1.0 / 3.0));
    assert!(close(sleep.s, 0.425));

    let tiny = tree[4].color();
    assert!(close(tiny.h, 0.75));
    assert!(close(tiny.s, 0.000005));
    assert!(tree.iter().all(|n| n.color().v == 1.0));
}

#[test]
fn names_and_per_call_times() {
    let session = request_session(EntryPoint::new("app/views.py", 10));
    let tree = session.call_tree();

    assert_eq!(
        tree[2].display_name(),
        r#"<span class="path">django/db/models/</span><span class="file">query.py</span> in <span class="func">__iter__</span>(<span class="lineno">394</span>)"#
    );
    assert_eq!(tree[3].display_name(), "{built-in method time.sleep}");
    assert_eq!(tree[1].plain_name(), "app/services.py in load_items(5)");

    // 21 calls, 1 primitive: per-call figures divide by the primitive count.
    assert_eq!(tree[2].call_count(), 21);
    assert!((tree[2].cumulative_time_per_call() - 0.9).abs() < 1e-12);
    assert!((tree[3].self_time_per_call() - 0.85 / 3.0).abs() < 1e-12);
    assert_eq!(tree[4].indent(), 16);
}

#[test]
fn line_stats_reports_for_profiled_functions_only() {
    let session = request_session(EntryPoint::new("app/views.py", 10));
    let tree = session.call_tree();

    let report = tree[4].line_stats_text().expect("tiny_helper was line-profiled");
    let lines: Vec<&str> = report.lines().map(str::trim_end).collect();
    assert_eq!(
        lines,
        vec![
            "Total time: 1e-05 s",
            "File: app/views.py",
            "Function: tiny_helper at line 35",
            "",
            "Line #      Hits         Time  Per Hit   % Time  Line Contents",
            "==============================================================",
            "    35                                           def tiny_helper(items):",
            "    36         1          3.0      3.0     30.0      if not items:",
            "    37                                                   return None",
            "    38         1          7.0      7.0     70.0      return items[0]",
            "",
        ]
    );

    let index_report = tree[0].line_stats_text().expect("index was line-profiled");
    assert!(index_report.starts_with("Total time: 1.00001 s\n"));
    assert!(index_report.contains("    return render(request, \"index.html\""));
    assert!(!index_report.contains("def about"));

    assert!(tree[1].line_stats_text().is_none());
    assert!(tree[3].line_stats_text().is_none());
}

#[test]
fn rows_serialize_for_renderers() {
    let session = request_session(EntryPoint::new("app/views.py", 10));
    let view = session.rows();
    assert_eq!(view.len(), 5);
    assert_eq!(view.subtree_end(1), 4);
    assert_eq!(view.children_of("0").count(), 2);

    let json = serde_json::to_value(&view).expect("rows serialize");
    let first = &json["rows"][0];
    assert_eq!(first["id"], "0");
    assert_eq!(first["background"], "rgb(100.000000%,50.000000%,50.000000%)");
    assert!(first["line_stats"].is_string());
    assert!(json["rows"][1]["line_stats"].is_null());
    assert_eq!(json["rows"][4]["ancestor_ids"], serde_json::json!(["0"]));
}

#[test]
fn unmatched_entry_point_renders_nothing() {
    let session = request_session(EntryPoint::new("app/views.py", 17));
    assert_eq!(session.root(), None);
    assert!(session.call_tree().is_empty());
    assert!(session.rows().is_empty());
}

#[test]
fn strict_root_match_rejects_called_functions() {
    let strict = TreeOptions {
        root_match: RootMatch::Strict,
        ..TreeOptions::default()
    };
    let session = ProfileSession::from_dumps(
        CALL_GRAPH,
        None,
        Some(EntryPoint::new("app/services.py", 5)),
        strict,
    )
    .expect("failed to load request dumps");
    assert!(session.call_tree().is_empty());

    let loose = ProfileSession::from_dumps(
        CALL_GRAPH,
        None,
        Some(EntryPoint::new("app/services.py", 5)),
        TreeOptions::default(),
    )
    .expect("failed to load request dumps");
    assert_eq!(
        names(&loose.call_tree()),
        vec!["load_items", "__iter__", "<built-in method time.sleep>"]
    );
}

#[test]
fn zero_time_profile_keeps_only_line_profiled_children() {
    let session = ProfileSession::from_dumps(
        IDLE_CALL_GRAPH,
        Some(IDLE_LINE_STATS),
        Some(EntryPoint::new("app/jobs.py", 1)),
        TreeOptions::default(),
    )
    .expect("failed to load idle dumps");
    let tree = session.call_tree();

    assert_eq!(names(&tree), vec!["noop", "traced"]);
    assert_eq!(tree[1].color().s, 0.0);
    assert_eq!(tree[1].cumulative_time_per_call(), 0.0);
    let notice = tree[1].line_stats_text().expect("traced was line-profiled");
    assert!(notice.contains("total time was zero"));
}

#[test]
fn zero_primitive_calls_give_zero_per_call_times() {
    let session = ProfileSession::from_dumps(
        IDLE_CALL_GRAPH,
        None,
        Some(EntryPoint::new("app/jobs.py", 1)),
        TreeOptions::default(),
    )
    .expect("failed to load idle dumps");
    let index: &CallGraphIndex = session.index();
    let root = FunctionCallNode::root(index, FunctionKey::user("app/jobs.py", 1, "noop"));
    let idle = root
        .child_calls()
        .find(|c| c.key().name() == "idle")
        .expect("noop calls idle");
    assert_eq!(idle.stats().primitive_calls, 0);
    assert_eq!(idle.self_time_per_call(), 0.0);
    assert_eq!(idle.cumulative_time_per_call(), 0.0);
}
