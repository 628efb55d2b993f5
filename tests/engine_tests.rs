// ABOUTME: Integration tests for the workflow interpreter
// ABOUTME: Runs full YAML workflows through the default plugin set

use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use waypoint::config::ConfigService;
use waypoint::engine::instance::{TaskStatus, Workflow, WorkflowStatus};
use waypoint::engine::interpreter::Interpreter;
use waypoint::parser::WorkflowDefinition;
use waypoint::plugin::builtin::default_manager;
use waypoint::plugin::PluginManager;

async fn manager() -> Arc<PluginManager> {
    let manager = default_manager(Arc::new(ConfigService::new()));
    manager.load().await.unwrap();
    manager
}

async fn run(yaml: &str, input: Value) -> Workflow {
    run_with(manager().await, yaml, input).await
}

async fn run_with(manager: Arc<PluginManager>, yaml: &str, input: Value) -> Workflow {
    let definition = WorkflowDefinition::from_yaml(yaml).unwrap();
    Interpreter::new(manager)
        .run(definition, input, CancellationToken::new())
        .await
        .unwrap()
}

fn find<'a>(tasks: &'a [waypoint::engine::instance::TaskInstance], name: &str) -> &'a waypoint::engine::instance::TaskInstance {
    tasks
        .iter()
        .find(|t| t.name == name)
        .unwrap_or_else(|| panic!("no task instance named '{}'", name))
}

#[tokio::test]
async fn test_sequential_tasks_run_in_order_with_hierarchical_ids() {
    let workflow = run(
        r#"
name: ordering
tasks:
  - name: first
    handler: lambda
    parameters:
      script: "'one'"
  - name: second
    handler: lambda
    parameters:
      script: "'two'"
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.tasks[0].name, "first");
    assert_eq!(workflow.tasks[1].name, "second");
    // Root-level ids come from one counter, in execution order.
    assert_eq!(workflow.tasks[0].id, "1");
    assert_eq!(workflow.tasks[1].id, "2");
    assert!(workflow.tasks[0].time_completed.unwrap() <= workflow.tasks[1].time_started.unwrap());
    assert_eq!(workflow.output, json!("two"));
}

#[tokio::test]
async fn test_sequence_halts_at_first_failure() {
    let workflow = run(
        r#"
name: halting
tasks:
  - name: boom
    handler: not-a-handler
  - name: never
    handler: log
    parameters:
      message: unreachable
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Error);
    assert_eq!(workflow.tasks.len(), 1);
    assert_eq!(workflow.tasks[0].status, TaskStatus::Error);
}

#[tokio::test]
async fn test_parallel_siblings_settle_on_failure() {
    // A failing parallel sibling does not cancel the others; every branch
    // runs to its own terminal status and the first failure wins.
    let workflow = run(
        r#"
name: settle
tasks:
  slow:
    handler: delay
    parameters:
      duration: 50
  failing:
    handler: not-a-handler
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Error);
    assert_eq!(workflow.tasks.len(), 2);
    assert_eq!(find(&workflow.tasks, "slow").status, TaskStatus::Completed);
    assert_eq!(find(&workflow.tasks, "failing").status, TaskStatus::Error);
}

#[tokio::test]
async fn test_if_runs_only_the_taken_branch() {
    let workflow = run(
        r#"
name: branching
tasks:
  - name: check
    handler: if
    parameters:
      left: "{{input.n}}"
      operator: ">"
      right: 3
    then:
      - name: big
        handler: lambda
        parameters:
          script: "'big'"
    else:
      - name: small
        handler: lambda
        parameters:
          script: "'small'"
"#,
        json!({"n": 5}),
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let check = find(&workflow.tasks, "check");
    assert_eq!(check.output, json!({"condition": true}));
    assert_eq!(check.children.len(), 1);
    assert_eq!(check.children[0].name, "big");
    // Children carry the parent's id as a prefix.
    assert!(check.children[0].id.starts_with(&format!("{}-", check.id)));
}

#[tokio::test]
async fn test_switch_picks_case_then_default() {
    let yaml = r#"
name: deciding
tasks:
  - name: route
    handler: switch
    parameters:
      value: "{{input.env}}"
    decision_cases:
      prod:
        - name: careful
          handler: log
          parameters:
            message: prod
      dev:
        - name: loose
          handler: log
          parameters:
            message: dev
    default_case:
      - name: fallback
        handler: log
        parameters:
          message: other
"#;

    let workflow = run(yaml, json!({"env": "dev"})).await;
    let route = find(&workflow.tasks, "route");
    assert_eq!(route.output, json!({"case": "dev"}));
    assert_eq!(route.children[0].name, "loose");

    let workflow = run(yaml, json!({"env": "staging"})).await;
    let route = find(&workflow.tasks, "route");
    assert_eq!(route.output, json!({"case": "default"}));
    assert_eq!(route.children[0].name, "fallback");
}

#[tokio::test]
async fn test_for_loop_runs_body_per_iteration() {
    let workflow = run(
        r#"
name: counting
tasks:
  - name: spin
    handler: for
    parameters:
      from: 0
      to: 2
    loop_over:
      - name: body
        handler: lambda
        parameters:
          script: "parent.index"
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let spin = find(&workflow.tasks, "spin");
    // Three iterations (0, 1, 2), one body instance each.
    assert_eq!(spin.children.len(), 3);
    assert_eq!(spin.output["iteration"], json!(3));
    assert_eq!(spin.output["index"], json!(3));
    // Each body saw the state the loop stored before attaching it.
    let indexes: Vec<&Value> = spin.children.iter().map(|c| &c.output).collect();
    assert_eq!(indexes, vec![&json!(1), &json!(2), &json!(3)]);
}

#[tokio::test]
async fn test_while_loop_stops_when_condition_turns_false() {
    let workflow = run(
        r#"
name: bounded
tasks:
  - name: spin
    handler: while
    parameters:
      condition: "output.iteration < 2"
    loop_over:
      - name: body
        handler: log
        parameters:
          message: "turn {{parent.iteration}}"
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let spin = find(&workflow.tasks, "spin");
    assert_eq!(spin.children.len(), 2);
    assert_eq!(spin.output, json!({"iteration": 2}));
}

#[tokio::test]
async fn test_do_while_runs_body_before_first_check() {
    let workflow = run(
        r#"
name: once
tasks:
  - name: spin
    handler: while
    parameters:
      mode: do_while
      condition: "output.iteration < 1"
    loop_over:
      - name: body
        handler: log
        parameters:
          message: ran
"#,
        Value::Null,
    )
    .await;

    let spin = find(&workflow.tasks, "spin");
    assert_eq!(spin.children.len(), 1);
    assert_eq!(spin.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_iterate_walks_items_and_exposes_each() {
    let workflow = run(
        r#"
name: walking
tasks:
  - name: each
    handler: iterate
    parameters:
      items: ["red", "green", "blue"]
    loop_over:
      - name: body
        handler: lambda
        parameters:
          script: "parent.item"
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let each = find(&workflow.tasks, "each");
    assert_eq!(each.children.len(), 3);
    let seen: Vec<&Value> = each.children.iter().map(|c| &c.output).collect();
    assert_eq!(seen, vec![&json!("red"), &json!("green"), &json!("blue")]);
    assert_eq!(each.output, json!({"iteration": 2}));
}

#[tokio::test]
async fn test_try_catch_swallows_failure_and_finally_runs() {
    let workflow = run(
        r#"
name: guarded
tasks:
  - name: attempt
    handler: try
    tasks:
      - name: broken
        handler: exec
        parameters:
          script: "exit 7"
          shell: /bin/sh
    catch:
      - name: report
        handler: lambda
        parameters:
          script: "error.message"
    finally:
      - name: cleanup
        handler: log
        parameters:
          message: done
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let attempt = find(&workflow.tasks, "attempt");
    assert_eq!(attempt.status, TaskStatus::Completed);
    // body, catch, and finally each produced one child instance.
    assert_eq!(attempt.children.len(), 3);
    assert_eq!(find(&attempt.children, "broken").status, TaskStatus::Error);
    let report = find(&attempt.children, "report");
    assert!(report.output.as_str().unwrap().contains("code 7"));
    assert_eq!(find(&attempt.children, "cleanup").status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_try_without_catch_fails_after_finally() {
    let workflow = run(
        r#"
name: unguarded
tasks:
  - name: attempt
    handler: try
    tasks:
      - name: broken
        handler: exec
        parameters:
          script: "exit 7"
          shell: /bin/sh
    finally:
      - name: cleanup
        handler: log
        parameters:
          message: done
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Error);
    let attempt = find(&workflow.tasks, "attempt");
    assert_eq!(attempt.status, TaskStatus::Error);
    // finally still ran before the failure surfaced.
    assert_eq!(find(&attempt.children, "cleanup").status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_ignore_error_lets_the_sequence_continue() {
    let workflow = run(
        r#"
name: tolerant
tasks:
  - name: flaky
    handler: exec
    ignore_error: true
    parameters:
      script: "exit 1"
      shell: /bin/sh
  - name: after
    handler: lambda
    parameters:
      script: "'survived'"
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let flaky = find(&workflow.tasks, "flaky");
    assert_eq!(flaky.status, TaskStatus::Completed);
    assert!(flaky.error_message.is_some());
    assert_eq!(flaky.output, Value::Null);
    assert_eq!(workflow.output, json!("survived"));
}

#[tokio::test]
async fn test_retry_exhausts_budget_and_records_attempts() {
    let workflow = run(
        r#"
name: retrying
tasks:
  - name: flaky
    handler: exec
    retry:
      retry_count: 2
      retry_delay_seconds: 0.0
    parameters:
      script: "exit 1"
      shell: /bin/sh
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Error);
    let flaky = find(&workflow.tasks, "flaky");
    assert_eq!(flaky.status, TaskStatus::Error);
    // Three attempts total: the first plus two retries.
    assert_eq!(flaky.retries, 2);
}

#[tokio::test]
async fn test_completed_tasks_are_invoked_exactly_once() {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use waypoint::handlers::{HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
    use waypoint::plugin::{HandlerResolver, Plugin, Registration};

    struct TallyHandler {
        calls: Mutex<HashMap<String, u32>>,
    }

    #[async_trait]
    impl TaskHandler for TallyHandler {
        fn name(&self) -> &'static str {
            "tally"
        }

        async fn execute(
            &self,
            call: HandlerCall,
            _ctx: HandlerContext,
        ) -> waypoint::engine::Result<HandlerOutcome> {
            *self.calls.lock().unwrap().entry(call.task_id).or_insert(0) += 1;
            Ok(HandlerOutcome::Completed(json!("done")))
        }
    }

    struct TallyPack {
        handler: Arc<TallyHandler>,
    }

    impl Plugin for TallyPack {
        fn name(&self) -> &str {
            "tally-pack"
        }
    }

    impl HandlerResolver for TallyPack {
        fn resolve(&self, handler: &str) -> Option<Arc<dyn TaskHandler>> {
            (handler == "tally").then(|| Arc::clone(&self.handler) as Arc<dyn TaskHandler>)
        }
    }

    let handler = Arc::new(TallyHandler {
        calls: Mutex::new(HashMap::new()),
    });
    let manager = default_manager(Arc::new(ConfigService::new()));
    manager
        .register(Registration::handler_resolver(Arc::new(TallyPack {
            handler: Arc::clone(&handler),
        })))
        .unwrap();
    manager.load().await.unwrap();

    let workflow = run_with(
        manager,
        r#"
name: tally
tasks:
  - name: first
    handler: tally
  - name: second
    handler: tally
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let calls = handler.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    // A task that completes is never handed back to its handler.
    assert!(calls.values().all(|&count| count == 1), "calls: {:?}", *calls);
}

#[tokio::test]
async fn test_nested_workflow_output_becomes_task_output() {
    let workflow = run(
        r#"
name: outer
tasks:
  - name: inner
    handler: run-workflow
    parameters:
      input:
        n: "{{input.n}}"
      workflow:
        name: doubler
        tasks:
          - name: compute
            handler: lambda
            parameters:
              script: "input.n"
"#,
        json!({"n": 4}),
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.output, json!(4));
}

#[tokio::test]
async fn test_nested_workflow_failure_propagates() {
    let workflow = run(
        r#"
name: outer
tasks:
  - name: inner
    handler: run-workflow
    parameters:
      workflow:
        name: doomed
        tasks:
          - name: broken
            handler: not-a-handler
"#,
        Value::Null,
    )
    .await;

    assert_eq!(workflow.status, WorkflowStatus::Error);
    assert!(workflow
        .error_message
        .unwrap()
        .contains("not-a-handler"));
}

#[tokio::test]
async fn test_completed_run_is_persisted() {
    let manager = manager().await;
    let workflow = run_with(
        Arc::clone(&manager),
        r#"
name: remembered
tasks:
  - name: only
    handler: log
    parameters:
      message: hi
"#,
        Value::Null,
    )
    .await;

    let stored = manager
        .persistence()
        .unwrap()
        .unit("workflows")
        .load(&workflow.id)
        .await
        .unwrap()
        .expect("workflow snapshot missing");
    assert_eq!(stored["status"], json!("completed"));
    assert_eq!(stored["name"], json!("remembered"));
}

#[tokio::test]
async fn test_custom_id_separator_from_config() {
    let config = Arc::new(ConfigService::new());
    config.set("engine.id_separator", json!("."));
    let manager = default_manager(config);
    manager.load().await.unwrap();

    let workflow = run_with(
        manager,
        r#"
name: dotted
tasks:
  - name: spin
    handler: iterate
    parameters:
      items: [1]
    loop_over:
      - name: body
        handler: log
        parameters:
          message: hi
"#,
        Value::Null,
    )
    .await;

    let spin = find(&workflow.tasks, "spin");
    assert!(spin.children[0].id.starts_with("1."));
}
