#[cfg(test)]
mod queue_tests {
    use std::sync::Arc;

    use serde_json::json;
    use uuid::Uuid;

    use engine::idempotency::InMemoryIdempotencyCache;
    use engine::models::{ActionData, Dag, Edge, EdgeWhen, Node, NodeKind, TriggerData, TriggerKind};
    use engine::store::memory::InMemoryStore;
    use engine::store::WorkflowStore;
    use engine::{Executor, ExecutorConfig};
    use nodes::mock::MockNode;

    use crate::model::{EnqueueJob, JobStatus};
    use crate::store::memory::InMemoryJobQueue;
    use crate::store::JobQueue;
    use crate::worker::process_one;

    fn sample_dag(workflow_id: &str) -> Dag {
        Dag {
            workflow_id: workflow_id.into(),
            version: 1,
            nodes: vec![
                Node {
                    id: "trigger".into(),
                    kind: NodeKind::Trigger(TriggerData {
                        kind: TriggerKind::EventBased,
                        toolkit_slug: "core".into(),
                        composio_trigger_slug: None,
                        connection_id: None,
                        filter: None,
                        cron_expr: None,
                        timezone: None,
                    }),
                },
                Node {
                    id: "notify".into(),
                    kind: NodeKind::Action(ActionData {
                        tool: "slack".into(),
                        action: "send_message".into(),
                        connection_id: "conn-1".into(),
                        input_template: json!({ "channel": "#ops" }),
                        output_vars: vec![],
                        retry: None,
                        timeout_ms: None,
                    }),
                },
            ],
            edges: vec![Edge {
                id: "trigger->notify".into(),
                source: "trigger".into(),
                target: "notify".into(),
                when: EdgeWhen::Always,
                condition: None,
            }],
            globals: Default::default(),
        }
    }

    async fn executor() -> Executor {
        let run_store = Arc::new(InMemoryStore::new());
        let invoker = Arc::new(MockNode::returning("slack.send_message", json!({ "ok": true })));
        let idem = Arc::new(InMemoryIdempotencyCache::new());
        Executor::new(invoker, run_store, idem, ExecutorConfig::default())
    }

    fn sample_job(workflow_id: &str) -> EnqueueJob {
        EnqueueJob {
            run_id: format!("run-{}", Uuid::new_v4()),
            workflow_id: workflow_id.into(),
            version: 1,
            user_id: "user-1".into(),
            trigger_node_id: "trigger".into(),
            max_attempts: 3,
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn pending_job_is_claimed_and_activates_executor() {
        let workflow_store = InMemoryStore::new();
        workflow_store.save_dag(&sample_dag("wf-queue-1")).await.unwrap();
        let executor = executor().await;

        let queue = InMemoryJobQueue::new();
        queue.enqueue(sample_job("wf-queue-1")).await.unwrap();

        let processed = process_one(&queue, &workflow_store, &executor).await.unwrap();
        assert!(processed);
    }

    #[tokio::test]
    async fn empty_queue_reports_nothing_to_do() {
        let workflow_store = InMemoryStore::new();
        let executor = executor().await;
        let queue = InMemoryJobQueue::new();

        let processed = process_one(&queue, &workflow_store, &executor).await.unwrap();
        assert!(!processed);
    }

    #[tokio::test]
    async fn missing_dag_dead_letters_after_max_attempts() {
        let workflow_store = InMemoryStore::new();
        let executor = executor().await;

        let queue = InMemoryJobQueue::new();
        let mut job = sample_job("wf-missing");
        job.max_attempts = 1;
        let enqueued = queue.enqueue(job).await.unwrap();

        process_one(&queue, &workflow_store, &executor).await.unwrap();

        let claimed_again = queue.claim_next().await.unwrap();
        // attempts (1) has reached max_attempts (1), so the failed job was
        // dead-lettered rather than requeued to pending.
        assert!(claimed_again.is_none());
        let _ = enqueued.id;
    }

    #[tokio::test]
    async fn job_status_round_trips_through_as_str() {
        for s in [JobStatus::Pending, JobStatus::Processing, JobStatus::Completed, JobStatus::DeadLettered] {
            assert_eq!(JobStatus::parse(s.as_str()).unwrap(), s);
        }
    }
}
