#[cfg(test)]
mod validator_tests {
    use catalog::{ActionSpec, InMemoryCatalog, TriggerSpec};
    use engine::models::{BackoffKind, Globals, RetryPolicy};
    use serde_json::json;

    use crate::model::{ExecStep, ExecTrigger, ExecutableWorkflow, TriggerKind};
    use crate::validate::ValidationContext;
    use crate::{compile, lint_executable, validate_and_compile, validate_dag, validate_executable};

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_provider("slack", "Slack")
            .with_trigger("slack", "message_posted", TriggerSpec::default())
            .with_action(
                "slack",
                "send_message",
                ActionSpec {
                    required_params: vec!["channel".into(), "text".into()],
                    optional_params: vec![],
                    required_scopes: vec![],
                    deprecated: false,
                },
            )
    }

    fn workflow(steps: Vec<ExecStep>) -> ExecutableWorkflow {
        ExecutableWorkflow {
            workflow_id: "wf-1".into(),
            version: 1,
            user_id: "user-1".into(),
            trigger: ExecTrigger {
                node_id: "trigger".into(),
                kind: TriggerKind::EventBased,
                toolkit_slug: "slack".into(),
                composio_trigger_slug: "message_posted".into(),
                connection_id: Some("conn-1".into()),
                filter: Some(json!({ "verify_signature": true })),
                cron_expr: None,
                timezone: None,
                next: "notify".into(),
            },
            steps,
            globals: Globals::default(),
        }
    }

    #[test]
    fn valid_workflow_compiles_cleanly() {
        let wf = workflow(vec![ExecStep::Action {
            id: "notify".into(),
            tool: "slack".into(),
            action: "send_message".into(),
            connection_id: "conn-1".into(),
            input_template: json!({ "channel": "#ops", "text": "hello" }),
            output_vars: vec![],
            retry: Some(RetryPolicy { retries: 2, backoff: BackoffKind::Linear, delay_ms: 500 }),
            timeout_ms: None,
            next: None,
        }]);

        let report = validate_and_compile(&wf, &catalog(), &ValidationContext::default());
        assert!(report.ok, "{:?}", report.errors);
        assert!(report.dag.is_some());
    }

    #[test]
    fn unknown_tool_blocks_with_e001() {
        let wf = workflow(vec![ExecStep::Action {
            id: "notify".into(),
            tool: "slack".into(),
            action: "delete_message".into(),
            connection_id: "conn-1".into(),
            input_template: json!({}),
            output_vars: vec![],
            retry: None,
            timeout_ms: None,
            next: None,
        }]);

        let report = validate_executable(&wf, &catalog(), &ValidationContext::default());
        assert!(!report.ok);
        assert!(report.errors.iter().any(|e| e.code == "E001"));
    }

    #[test]
    fn missing_required_param_is_e002() {
        let wf = workflow(vec![ExecStep::Action {
            id: "notify".into(),
            tool: "slack".into(),
            action: "send_message".into(),
            connection_id: "conn-1".into(),
            input_template: json!({ "channel": "#ops" }),
            output_vars: vec![],
            retry: None,
            timeout_ms: None,
            next: None,
        }]);

        let report = validate_executable(&wf, &catalog(), &ValidationContext::default());
        assert!(report.errors.iter().any(|e| e.code == "E002"));
    }

    #[test]
    fn unparseable_condition_is_e008() {
        let mut wf = workflow(vec![
            ExecStep::If { id: "branch".into(), branches: vec![("inputs. ==".into(), "notify".into())], else_to: None },
            ExecStep::Action {
                id: "notify".into(),
                tool: "slack".into(),
                action: "send_message".into(),
                connection_id: "conn-1".into(),
                input_template: json!({ "channel": "#ops", "text": "hi" }),
                output_vars: vec![],
                retry: None,
                timeout_ms: None,
                next: None,
            },
        ]);
        wf.trigger.next = "branch".into();

        let report = validate_executable(&wf, &catalog(), &ValidationContext::default());
        assert!(report.errors.iter().any(|e| e.code == "E008"));
    }

    #[test]
    fn missing_retry_policy_warns_w502() {
        let wf = workflow(vec![ExecStep::Action {
            id: "notify".into(),
            tool: "slack".into(),
            action: "send_message".into(),
            connection_id: "conn-1".into(),
            input_template: json!({ "channel": "#ops", "text": "hi" }),
            output_vars: vec![],
            retry: None,
            timeout_ms: None,
            next: None,
        }]);

        let lint = lint_executable(&wf);
        assert!(lint.warnings.iter().any(|w| w.code == "W502"));
    }

    #[test]
    fn plaintext_secret_is_repaired() {
        let wf = workflow(vec![ExecStep::Action {
            id: "notify".into(),
            tool: "slack".into(),
            action: "send_message".into(),
            connection_id: "conn-1".into(),
            input_template: json!({ "channel": "#ops", "text": "hi", "api_key": "sk-abcdefghijklmno" }),
            output_vars: vec![],
            retry: Some(RetryPolicy { retries: 1, backoff: BackoffKind::Linear, delay_ms: 100 }),
            timeout_ms: None,
            next: None,
        }]);

        let lint = lint_executable(&wf);
        assert!(lint.errors.iter().any(|e| e.code == "E013" && e.auto_repairable));

        let (patched, repairs) = crate::attempt_repair(&wf, &lint);
        assert_eq!(repairs.len(), 1);
        let ExecStep::Action { input_template, .. } = &patched.steps[0] else { panic!("expected action") };
        assert_eq!(input_template["api_key"].as_str().unwrap(), "{{ secrets.API_KEY }}");
    }

    #[test]
    fn compiled_dag_passes_graph_validation() {
        let wf = workflow(vec![ExecStep::Action {
            id: "notify".into(),
            tool: "slack".into(),
            action: "send_message".into(),
            connection_id: "conn-1".into(),
            input_template: json!({ "channel": "#ops", "text": "hi" }),
            output_vars: vec![],
            retry: None,
            timeout_ms: None,
            next: None,
        }]);

        let dag = compile::compile(&wf);
        let report = validate_dag(&dag);
        assert!(report.ok, "{:?}", report.errors);
    }
}
