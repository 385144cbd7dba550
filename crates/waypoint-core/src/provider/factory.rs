//! Model service factory
//!
//! Builds the configured [`ModelService`] from `[model]` settings, reading
//! credentials from config first and the environment second.

use std::sync::Arc;
use tracing::{info, warn};

use super::bedrock::{BedrockProvider, InferenceConfig};
use super::genai_provider::{GenAIProvider, ProviderType};
use super::ModelService;
use crate::config::{BEDROCK_API_KEY_ENV, BEDROCK_PROVIDER, ModelConfig};
use crate::error::{Error, Result};

/// Create a model service from config, using the process environment
pub fn create_model_service(config: &ModelConfig) -> Result<Arc<dyn ModelService>> {
    create_model_service_with_env(config, |name| std::env::var(name).ok())
}

/// Create a model service with an explicit environment lookup
pub fn create_model_service_with_env(
    config: &ModelConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn ModelService>> {
    if config.provider.eq_ignore_ascii_case(BEDROCK_PROVIDER) {
        return create_bedrock(config, env).map(|p| Arc::new(p) as Arc<dyn ModelService>);
    }

    let provider_type: ProviderType = config.provider.parse().map_err(Error::Config)?;
    let model = (!config.model_id.is_empty()).then_some(config.model_id.as_str());

    if config.endpoint_url.is_some() {
        warn!(provider = %provider_type, "endpoint_url is only honored for bedrock; ignoring");
    }

    let provider = match config.resolve_api_key(provider_type.api_key_env(), &env) {
        Some(key) => GenAIProvider::with_api_key(provider_type, &key, model),
        None if provider_type.api_key_env().is_none() => GenAIProvider::new(provider_type, model),
        None => {
            return Err(Error::Config(format!(
                "No API key configured for {}. Set it in config or via {}",
                provider_type,
                config
                    .api_key_env
                    .as_deref()
                    .or(provider_type.api_key_env())
                    .unwrap_or("environment variable")
            )));
        }
    };

    info!(provider = %provider.provider_type(), model = %provider.model(), "Using genai model service");
    Ok(Arc::new(provider))
}

fn create_bedrock(config: &ModelConfig, env: impl Fn(&str) -> Option<String>) -> Result<BedrockProvider> {
    let api_key = config
        .resolve_api_key(Some(BEDROCK_API_KEY_ENV), &env)
        .ok_or_else(|| {
            Error::Config(format!(
                "No Bedrock API key configured. Set model.api_key or {}",
                config.api_key_env.as_deref().unwrap_or(BEDROCK_API_KEY_ENV)
            ))
        })?;
    let region = config.resolve_region(&env);

    let mut provider = BedrockProvider::new(&config.model_id, &region, api_key).with_inference(InferenceConfig {
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        top_p: config.top_p,
    });
    if let Some(endpoint) = &config.endpoint_url {
        provider = provider.with_endpoint(endpoint);
    }

    info!(model = %config.model_id, region = %region, "Using Bedrock model service");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_bedrock_requires_key() {
        let err = create_model_service_with_env(&ModelConfig::default(), no_env).err().unwrap();
        assert!(matches!(err, Error::Config(m) if m.contains(BEDROCK_API_KEY_ENV)));
    }

    #[test]
    fn test_bedrock_from_env() {
        let service = create_model_service_with_env(&ModelConfig::default(), |name| {
            (name == BEDROCK_API_KEY_ENV).then(|| "token".to_string())
        })
        .unwrap();
        assert_eq!(service.name(), "bedrock");
        assert_eq!(service.model(), "us.amazon.nova-pro-v1:0");
    }

    #[test]
    fn test_genai_providers() {
        let ollama = ModelConfig {
            provider: "ollama".to_string(),
            model_id: String::new(),
            ..ModelConfig::default()
        };
        let service = create_model_service_with_env(&ollama, no_env).unwrap();
        assert_eq!(service.name(), "ollama");
        assert_eq!(service.model(), "llama3.2");

        let openai = ModelConfig {
            provider: "openai".to_string(),
            model_id: "gpt-4o-mini".to_string(),
            ..ModelConfig::default()
        };
        assert!(create_model_service_with_env(&openai, no_env).is_err());

        let unknown = ModelConfig {
            provider: "nope".to_string(),
            ..ModelConfig::default()
        };
        assert!(matches!(create_model_service_with_env(&unknown, no_env), Err(Error::Config(_))));
    }
}
