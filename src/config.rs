use clap::Parser;
use std::time::Duration;

use crate::client::GeminiConfig;
use crate::gateway::GatewayConfig;
use crate::poller::BackoffPolicy;
use crate::rate_limit::RateLimiter;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "estimate-gateway")]
#[command(about = "Caching gateway in front of the construction estimate models")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Generative Language API base url
    #[arg(long, env = "GEMINI_API_BASE", default_value = "https://generativelanguage.googleapis.com")]
    pub api_base: String,

    // API key, calls fail with a config error when missing
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "ANALYSIS_MODEL", default_value = "gemini-2.0-flash")]
    pub analysis_model: String,

    #[arg(long, env = "VIDEO_MODEL", default_value = "veo-3.1-fast-generate-preview")]
    pub video_model: String,

    // Cache TTL in seconds
    #[arg(short, long, env = "CACHE_TTL", default_value_t = 300)]
    pub cache_ttl: u64,

    // Max cached analyses, unbounded when unset
    #[arg(long, env = "CACHE_MAX_ENTRIES")]
    pub cache_max_entries: Option<usize>,

    // Deadline for quote analysis in seconds
    #[arg(long, default_value_t = 30)]
    pub analysis_timeout: u64,

    // Deadline for walkthrough audio analysis in seconds
    #[arg(long, default_value_t = 45)]
    pub narration_timeout: u64,

    // Deadline for images, descriptions and batch analysis in seconds
    #[arg(long, default_value_t = 60)]
    pub generation_timeout: u64,

    // Video polling backoff
    #[arg(long, default_value_t = 5000)]
    pub poll_base_delay_ms: u64,

    #[arg(long, default_value_t = 1.1)]
    pub poll_growth: f64,

    #[arg(long, default_value_t = 30000)]
    pub poll_max_delay_ms: u64,

    #[arg(long, default_value_t = 60)]
    pub poll_max_attempts: u32,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Key the rate limit on x-forwarded-for; set only behind a proxy that rewrites it
    #[arg(long, env = "TRUST_FORWARDED_FOR")]
    pub trust_forwarded_for: bool,
}

impl Args {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            analysis_timeout: Duration::from_secs(self.analysis_timeout),
            narration_timeout: Duration::from_secs(self.narration_timeout),
            generation_timeout: Duration::from_secs(self.generation_timeout),
            cache_ttl: Duration::from_secs(self.cache_ttl),
            cache_max_entries: self.cache_max_entries,
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base_delay: Duration::from_millis(self.poll_base_delay_ms),
            growth_factor: self.poll_growth,
            max_delay: Duration::from_millis(self.poll_max_delay_ms),
            max_attempts: self.poll_max_attempts,
        }
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.rate_limit, Duration::from_secs(self.rate_window))
            .trusting_forwarded_for(self.trust_forwarded_for)
    }

    pub fn gemini_config(&self) -> GeminiConfig {
        // transport timeout must outlast every gateway deadline
        let longest = self
            .analysis_timeout
            .max(self.narration_timeout)
            .max(self.generation_timeout);
        GeminiConfig {
            base_url: self.api_base.clone(),
            api_key: self.api_key.clone(),
            model: self.analysis_model.clone(),
            video_model: self.video_model.clone(),
            request_timeout: Duration::from_secs(longest + 30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gateway_defaults() {
        let args = Args::parse_from(["estimate-gateway"]);
        let gateway = args.gateway_config();
        assert_eq!(gateway.analysis_timeout, Duration::from_secs(30));
        assert_eq!(gateway.cache_ttl, Duration::from_secs(300));

        let policy = args.backoff_policy();
        assert_eq!(policy.base_delay, Duration::from_secs(5));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.max_attempts, 60);
        assert!(!args.trust_forwarded_for);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "estimate-gateway",
            "--cache-ttl",
            "10",
            "--cache-max-entries",
            "500",
            "--api-key",
            "secret",
            "--trust-forwarded-for",
        ]);
        assert!(args.trust_forwarded_for);
        assert_eq!(args.gateway_config().cache_max_entries, Some(500));
        assert_eq!(args.gateway_config().cache_ttl, Duration::from_secs(10));
        assert_eq!(args.gemini_config().api_key.as_deref(), Some("secret"));
        assert_eq!(args.gemini_config().request_timeout, Duration::from_secs(90));
    }
}
