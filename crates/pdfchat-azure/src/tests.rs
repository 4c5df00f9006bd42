//! Configuration tests for the Azure backends

#[cfg(test)]
mod snapshot_tests {
    use crate::{AzureBackends, Backends, EnvSource, Error, SearchConfig, ServicePrincipalConfig};
    use insta::assert_yaml_snapshot;

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("AZURE_CLIENT_ID", "app-id"),
            ("AZURE_CLIENT_SECRET", "secret"),
            ("AZURE_TENANT_ID", "tenant"),
            ("SEARCH_SERVICE_ENDPOINT", "https://demo.search.windows.net/"),
            ("SEARCH_API_KEY", "search-key"),
            ("AISEARCH_INDEX_NAME", "pdf-index"),
            ("PRODUCT_INDEX_NAME", "products"),
            ("AZURE_INFERENCE_ENDPOINT", "https://demo.openai.azure.com"),
            ("AZURE_INFERENCE_API_KEY", "inference-key"),
            ("CHAT_MODEL", "gpt-4o-mini"),
            ("EMBEDDINGS_MODEL", "text-embedding-3-large"),
            ("EVALUATION_MODEL", "gpt-4o"),
        ]
    }

    fn env_without(name: &str) -> EnvSource {
        EnvSource::from_pairs(full_env().into_iter().filter(|(k, _)| *k != name))
    }

    type Action = Box<dyn Fn(&AzureBackends) -> crate::Result<()>>;

    fn action(f: impl Fn(&AzureBackends) -> crate::Result<()> + 'static) -> Action {
        Box::new(f)
    }

    fn config_error<T>(result: crate::Result<T>) -> String {
        match result {
            Err(Error::Configuration(message)) => message,
            Err(other) => panic!("expected a configuration error, got {other}"),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn test_search_config_snapshot() {
        let env = EnvSource::from_pairs(full_env());
        let config = SearchConfig::from_env(&env).unwrap();

        assert_yaml_snapshot!(config, @r###"
        endpoint: "https://demo.search.windows.net"
        api_key: search-key
        api_version: 2024-07-01
        "###);
    }

    #[test]
    fn test_service_principal_reports_all_missing() {
        let env = EnvSource::from_pairs([("AZURE_CLIENT_ID", "app-id")]);
        let message = config_error(ServicePrincipalConfig::from_env(&env));
        assert_eq!(
            message,
            "AZURE_CLIENT_SECRET, AZURE_TENANT_ID environment variables are not set"
        );
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let env = EnvSource::from_pairs([("AISEARCH_INDEX_NAME", "   ")]);
        let backends = AzureBackends::new(env);
        assert_eq!(
            config_error(backends.index_name()),
            "AISEARCH_INDEX_NAME environment variable is not set"
        );
    }

    #[test]
    fn test_each_action_fails_on_its_missing_variable() {
        let cases: Vec<(&str, Action)> = vec![
            ("AZURE_TENANT_ID", action(|b| b.authenticator().map(|_| ()))),
            ("SEARCH_SERVICE_ENDPOINT", action(|b| b.search().map(|_| ()))),
            ("SEARCH_API_KEY", action(|b| b.search().map(|_| ()))),
            ("CHAT_MODEL", action(|b| b.chat_model().map(|_| ()))),
            ("EMBEDDINGS_MODEL", action(|b| b.embedding_model().map(|_| ()))),
            ("EVALUATION_MODEL", action(|b| b.evaluation_model().map(|_| ()))),
            ("AZURE_INFERENCE_ENDPOINT", action(|b| b.chat_model().map(|_| ()))),
            ("AISEARCH_INDEX_NAME", action(|b| b.index_name().map(|_| ()))),
            ("PRODUCT_INDEX_NAME", action(|b| b.product_index_name().map(|_| ()))),
        ];

        for (missing, action) in cases {
            let backends = AzureBackends::new(env_without(missing));
            let message = config_error(action(&backends));
            assert_eq!(message, format!("{missing} environment variable is not set"));

            let complete = AzureBackends::new(EnvSource::from_pairs(full_env()));
            assert!(action(&complete).is_ok(), "{missing} action failed with full config");
        }
    }

    #[test]
    fn test_inference_without_key_needs_service_principal() {
        let env = EnvSource::from_pairs(
            full_env()
                .into_iter()
                .filter(|(k, _)| !matches!(*k, "AZURE_INFERENCE_API_KEY" | "AZURE_CLIENT_SECRET")),
        );
        let backends = AzureBackends::new(env);
        assert_eq!(
            config_error(backends.chat_model().map(|_| ())),
            "AZURE_CLIENT_SECRET environment variable is not set"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let env = EnvSource::from_pairs([
            ("SEARCH_SERVICE_ENDPOINT", "demo.search.windows.net"),
            ("SEARCH_API_KEY", "key"),
        ]);
        let message = config_error(SearchConfig::from_env(&env));
        assert!(message.starts_with("SEARCH_SERVICE_ENDPOINT is not a valid URL"));
    }

    #[test]
    fn test_parse_or() {
        let env = EnvSource::from_pairs([("SEARCH_TOP", "3"), ("BAD", "x")]);
        assert_eq!(env.parse_or("SEARCH_TOP", 5usize).unwrap(), 3);
        assert_eq!(env.parse_or("MISSING", 5usize).unwrap(), 5);
        assert!(env.parse_or("BAD", 5usize).is_err());
    }
}
