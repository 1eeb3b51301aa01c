#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use agentdeck::app::packaging::HANDLER_FILE;
    use agentdeck::app::registrar::{
        register_tools, DeployedFunction, RegistrationStage, ToolDeployer,
    };
    use agentdeck::app::tool_spec::ToolSpec;
    use anyhow::{bail, Result};
    use async_trait::async_trait;

    /// In-memory deployer capturing the cloud mutations a run would perform.
    #[derive(Default)]
    struct MockDeployer {
        state: Mutex<MockState>,
        fail_deploy: HashSet<String>,
        fail_map: HashSet<String>,
        fail_finalize: bool,
    }

    #[derive(Default)]
    struct MockState {
        existing_functions: HashSet<String>,
        created: Vec<String>,
        updated: Vec<String>,
        mapped: Vec<(String, String)>,
        finalize_calls: usize,
    }

    #[async_trait]
    impl ToolDeployer for MockDeployer {
        async fn ensure_function(
            &self,
            spec: &ToolSpec,
            package: &[u8],
        ) -> Result<DeployedFunction> {
            assert!(!package.is_empty(), "deployer received an empty package");
            if self.fail_deploy.contains(&spec.name) {
                bail!("simulated deploy failure for {}", spec.name);
            }
            let function_name = spec.function_name("test");
            let mut state = self.state.lock().unwrap();
            let updated = !state.existing_functions.insert(function_name.clone());
            if updated {
                state.updated.push(function_name.clone());
            } else {
                state.created.push(function_name.clone());
            }
            Ok(DeployedFunction {
                arn: format!("arn:aws:lambda:us-west-2:123:function:{}", function_name),
                name: function_name,
                updated,
            })
        }

        async fn map_action(
            &self,
            spec: &ToolSpec,
            function: &DeployedFunction,
        ) -> Result<String> {
            if self.fail_map.contains(&spec.name) {
                bail!("simulated mapping failure for {}", spec.name);
            }
            let mut state = self.state.lock().unwrap();
            state
                .mapped
                .retain(|(tool, _)| tool != &spec.name);
            state.mapped.push((spec.name.clone(), function.arn.clone()));
            Ok(format!("AG-{}", spec.name))
        }

        async fn finalize(&self) -> Result<()> {
            if self.fail_finalize {
                bail!("simulated prepare failure");
            }
            self.state.lock().unwrap().finalize_calls += 1;
            Ok(())
        }
    }

    /// Write a valid handler package for each named tool and return its spec.
    fn specs_with_handlers(dir: &std::path::Path, names: &[&str]) -> Vec<ToolSpec> {
        names
            .iter()
            .map(|name| {
                let handler_dir = dir.join(name);
                std::fs::create_dir_all(&handler_dir).unwrap();
                std::fs::write(
                    handler_dir.join(HANDLER_FILE),
                    "def lambda_handler(event, context):\n    return {}\n",
                )
                .unwrap();
                ToolSpec {
                    name: name.to_string(),
                    description: format!("{} tool", name),
                    handler: handler_dir,
                    parameters: Vec::new(),
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_both_tools_registered_and_mapped() {
        let dir = tempfile::tempdir().unwrap();
        let specs = specs_with_handlers(dir.path(), &["caption", "diagram"]);
        let deployer = MockDeployer::default();

        let summary = register_tools(&deployer, &specs).await;

        assert!(summary.all_succeeded());
        assert_eq!(summary.succeeded.len(), 2);

        let state = deployer.state.lock().unwrap();
        let mapped_tools: Vec<&str> =
            state.mapped.iter().map(|(tool, _)| tool.as_str()).collect();
        assert_eq!(mapped_tools, vec!["caption", "diagram"]);
        assert!(state.mapped[0].1.contains("test-caption"));
        assert!(state.mapped[1].1.contains("test-diagram"));
        assert_eq!(state.finalize_calls, 1);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_roll_back_success() {
        let dir = tempfile::tempdir().unwrap();
        let specs = specs_with_handlers(dir.path(), &["caption", "diagram"]);
        let deployer = MockDeployer {
            fail_deploy: HashSet::from(["caption".to_string()]),
            ..Default::default()
        };

        let summary = register_tools(&deployer, &specs).await;

        assert!(!summary.all_succeeded());
        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.succeeded[0].tool_name, "diagram");
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].tool_name, "caption");
        assert_eq!(summary.failed[0].stage, RegistrationStage::Deploy);
        assert!(summary.failed[0].error.contains("simulated deploy failure"));

        // diagram's deployment survives caption's failure
        let state = deployer.state.lock().unwrap();
        assert_eq!(state.created, vec!["test-diagram"]);
        assert_eq!(state.mapped.len(), 1);
        assert_eq!(state.finalize_calls, 1);
    }

    #[tokio::test]
    async fn test_reregistration_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let specs = specs_with_handlers(dir.path(), &["caption"]);
        let deployer = MockDeployer::default();

        let first = register_tools(&deployer, &specs).await;
        let second = register_tools(&deployer, &specs).await;
        assert!(first.all_succeeded());
        assert!(second.all_succeeded());

        let state = deployer.state.lock().unwrap();
        // exactly one function resource: created once, updated on the re-run
        assert_eq!(state.existing_functions.len(), 1);
        assert_eq!(state.created, vec!["test-caption"]);
        assert_eq!(state.updated, vec!["test-caption"]);
        // the mapping converges to a single entry
        assert_eq!(state.mapped.len(), 1);
        // each run publishes a version
        assert_eq!(state.finalize_calls, 2);
    }

    #[tokio::test]
    async fn test_mapping_failure_reported_with_stage() {
        let dir = tempfile::tempdir().unwrap();
        let specs = specs_with_handlers(dir.path(), &["caption"]);
        let deployer = MockDeployer {
            fail_map: HashSet::from(["caption".to_string()]),
            ..Default::default()
        };

        let summary = register_tools(&deployer, &specs).await;

        assert!(!summary.all_succeeded());
        assert_eq!(summary.failed[0].stage, RegistrationStage::Map);
        // the function itself was deployed before the mapping failed
        assert_eq!(
            deployer.state.lock().unwrap().created,
            vec!["test-caption"]
        );
    }

    #[tokio::test]
    async fn test_packaging_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut specs = specs_with_handlers(dir.path(), &["diagram"]);
        specs.insert(
            0,
            ToolSpec {
                name: "broken".to_string(),
                description: "handler path does not exist".to_string(),
                handler: dir.path().join("missing"),
                parameters: Vec::new(),
            },
        );
        let deployer = MockDeployer::default();

        let summary = register_tools(&deployer, &specs).await;

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].tool_name, "broken");
        assert_eq!(summary.failed[0].stage, RegistrationStage::Package);
        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.succeeded[0].tool_name, "diagram");
    }

    #[tokio::test]
    async fn test_no_publish_when_nothing_succeeded() {
        let dir = tempfile::tempdir().unwrap();
        let specs = specs_with_handlers(dir.path(), &["caption"]);
        let deployer = MockDeployer {
            fail_deploy: HashSet::from(["caption".to_string()]),
            ..Default::default()
        };

        let summary = register_tools(&deployer, &specs).await;

        assert!(!summary.all_succeeded());
        assert_eq!(deployer.state.lock().unwrap().finalize_calls, 0);
    }

    #[tokio::test]
    async fn test_publish_failure_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let specs = specs_with_handlers(dir.path(), &["caption"]);
        let deployer = MockDeployer {
            fail_finalize: true,
            ..Default::default()
        };

        let summary = register_tools(&deployer, &specs).await;

        assert_eq!(summary.succeeded.len(), 1);
        assert!(summary.failed.is_empty());
        assert!(!summary.all_succeeded());
        assert!(summary
            .finalize_error
            .as_deref()
            .unwrap()
            .contains("simulated prepare failure"));
    }
}
