//! Process configuration.
//!
//! Built once at start-up from environment variables and handed to the
//! adapters that need it. Nothing reads the environment after this.

use std::time::Duration;

use cover_capture::{BrowserRenderingConfig, ImageGenConfig, VisionConfig};
use cover_state::{R2Config, SupabaseConfig};

use crate::error::ConfigError;

/// Default public base under which stored covers are served.
pub const DEFAULT_PUBLIC_BASE: &str = "https://r2.koala-oss.app";

/// Knobs of the repair pipeline itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Re-entries allowed per stage on top of the first visit
    pub max_retries: u32,
    /// Wait before the delayed re-capture
    pub settle_delay: Duration,
    /// Route failed HTML parsing to AI generation instead of a human
    pub ai_fallback: bool,
    /// Base URL of the bucket's public domain
    pub public_base: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            settle_delay: Duration::from_millis(5_000),
            ai_fallback: false,
            public_base: DEFAULT_PUBLIC_BASE.to_string(),
        }
    }
}

impl PipelineSettings {
    /// Public URL of a stored cover.
    pub fn stored_image_url(&self, image: &str) -> String {
        format!(
            "{}/{}",
            self.public_base.trim_end_matches('/'),
            image.trim_start_matches('/')
        )
    }
}

/// Everything the `cover-repair` process needs to talk to the outside world.
#[derive(Debug, Clone)]
pub struct RepairConfig {
    pub supabase: SupabaseConfig,
    pub r2: R2Config,
    pub browser: BrowserRenderingConfig,
    pub vision: VisionConfig,
    /// Present when `OPENAI_API_KEY` is set
    pub image_gen: Option<ImageGenConfig>,
    pub pipeline: PipelineSettings,
}

impl RepairConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::Missing(key.to_string()));

        let account_id = require("S3_ACCOUNT_ID")?;

        let mut supabase = SupabaseConfig::new(
            require("SUPABASE_URL")?,
            require("SUPABASE_SERVICE_KEY")?,
        );
        if let Some(table) = get("COVER_NEWS_TABLE") {
            supabase = supabase.with_table(table);
        }

        let mut r2 = R2Config::new(
            account_id.clone(),
            require("S3_ACCESS_KEY_ID")?,
            require("S3_SECRET_ACCESS_KEY")?,
        );
        if let Some(bucket) = get("COVER_BUCKET") {
            r2 = r2.with_bucket(bucket);
        }

        let browser = BrowserRenderingConfig::new(account_id, require("CF_API_TOKEN")?);

        let mut vision = VisionConfig::new(require("GOOGLE_GENERATIVE_AI_API_KEY")?);
        if let Some(model) = get("VISION_MODEL") {
            vision = vision.with_model(model);
        }

        let image_gen = get("OPENAI_API_KEY").map(|key| {
            let config = ImageGenConfig::new(key);
            match get("IMAGE_MODEL") {
                Some(model) => config.with_model(model),
                None => config,
            }
        });

        let defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            max_retries: parse_or(get("COVER_MAX_RETRIES"), "COVER_MAX_RETRIES", defaults.max_retries)?,
            settle_delay: Duration::from_millis(parse_or(
                get("COVER_SETTLE_DELAY_MS"),
                "COVER_SETTLE_DELAY_MS",
                defaults.settle_delay.as_millis() as u64,
            )?),
            ai_fallback: match get("COVER_AI_FALLBACK") {
                Some(value) => parse_flag("COVER_AI_FALLBACK", &value)?,
                None => defaults.ai_fallback,
            },
            public_base: get("COVER_PUBLIC_BASE").unwrap_or(defaults.public_base),
        };

        let config = Self {
            supabase,
            r2,
            browser,
            vision,
            image_gen,
            pipeline,
        };
        config.validate()?;
        Ok(config)
    }

    /// Turn on AI generation, overriding the environment.
    pub fn with_ai_fallback(mut self, enabled: bool) -> Self {
        self.pipeline.ai_fallback = enabled;
        self
    }

    /// Override the per-stage retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.pipeline.max_retries = max_retries;
        self
    }

    /// AI generation needs its credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.ai_fallback && self.image_gen.is_none() {
            return Err(ConfigError::Missing("OPENAI_API_KEY".to_string()));
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    var: &str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: var.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SUPABASE_URL", "https://db.example.supabase.co"),
            ("SUPABASE_SERVICE_KEY", "service-key"),
            ("S3_ACCOUNT_ID", "acct"),
            ("S3_ACCESS_KEY_ID", "AKID"),
            ("S3_SECRET_ACCESS_KEY", "secret"),
            ("CF_API_TOKEN", "cf-token"),
            ("GOOGLE_GENERATIVE_AI_API_KEY", "gemini-key"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<RepairConfig, ConfigError> {
        RepairConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&required()).unwrap();

        assert_eq!(config.supabase.table, "news");
        assert_eq!(config.r2.bucket, "koala-oss-app");
        assert_eq!(config.browser.account_id, "acct");
        assert_eq!(config.vision.model, "gemini-2.0-flash-001");
        assert!(config.image_gen.is_none());
        assert_eq!(config.pipeline, PipelineSettings::default());
    }

    #[test]
    fn test_each_required_variable_is_enforced() {
        for key in required().keys() {
            let mut env = required();
            env.remove(key);
            match load(&env) {
                Err(ConfigError::Missing(var)) => assert_eq!(&var, key),
                other => panic!("expected Missing({key}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = required();
        env.insert("CF_API_TOKEN", "  ");
        assert!(matches!(load(&env), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_overrides() {
        let mut env = required();
        env.insert("COVER_BUCKET", "covers-staging");
        env.insert("COVER_NEWS_TABLE", "news_staging");
        env.insert("COVER_MAX_RETRIES", "5");
        env.insert("COVER_SETTLE_DELAY_MS", "250");
        env.insert("COVER_PUBLIC_BASE", "https://img.example.com/");
        env.insert("OPENAI_API_KEY", "sk-test");
        env.insert("IMAGE_MODEL", "dall-e-2");
        env.insert("COVER_AI_FALLBACK", "true");

        let config = load(&env).unwrap();
        assert_eq!(config.r2.bucket, "covers-staging");
        assert_eq!(config.supabase.table, "news_staging");
        assert_eq!(config.pipeline.max_retries, 5);
        assert_eq!(config.pipeline.settle_delay, Duration::from_millis(250));
        assert!(config.pipeline.ai_fallback);
        assert_eq!(config.image_gen.unwrap().model, "dall-e-2");
        assert_eq!(
            config.pipeline.stored_image_url("a.png"),
            "https://img.example.com/a.png"
        );
    }

    #[test]
    fn test_invalid_number() {
        let mut env = required();
        env.insert("COVER_MAX_RETRIES", "three");
        match load(&env) {
            Err(ConfigError::Invalid { var, value }) => {
                assert_eq!(var, "COVER_MAX_RETRIES");
                assert_eq!(value, "three");
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_flag() {
        let mut env = required();
        env.insert("COVER_AI_FALLBACK", "maybe");
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_ai_fallback_requires_openai_key() {
        let mut env = required();
        env.insert("COVER_AI_FALLBACK", "1");
        match load(&env) {
            Err(ConfigError::Missing(var)) => assert_eq!(var, "OPENAI_API_KEY"),
            other => panic!("expected Missing(OPENAI_API_KEY), got {other:?}"),
        }

        let config = load(&required()).unwrap().with_ai_fallback(true);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stored_image_url_joins_cleanly() {
        let settings = PipelineSettings::default();
        assert_eq!(
            settings.stored_image_url("github-com-a-b.png"),
            "https://r2.koala-oss.app/github-com-a-b.png"
        );
        assert_eq!(
            settings.stored_image_url("/x.png"),
            "https://r2.koala-oss.app/x.png"
        );
    }
}
