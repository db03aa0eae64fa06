//! Completion service implementations.
//!
//! [`build_completion_service`] turns the provider settings and the
//! (possibly absent) credential into the boxed service the pipeline holds.

pub mod openai;

use secrecy::SecretString;

use companion_core::completion::BoxCompletionService;
use companion_types::config::ProviderSettings;

use self::openai::OpenAiCompletionService;

/// Build the configured completion service.
///
/// A missing credential is not an error here: the returned service reports
/// `LlmError::NotConfigured` on first use instead.
pub fn build_completion_service(
    settings: &ProviderSettings,
    api_key: Option<SecretString>,
) -> BoxCompletionService {
    if api_key.is_none() {
        tracing::warn!(
            env = %settings.api_key_env,
            "no API key found; replies will fail until one is set"
        );
    }
    BoxCompletionService::new(OpenAiCompletionService::new(settings, api_key))
}
