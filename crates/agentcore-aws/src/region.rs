//! Region resolution.

use agentcore_core::process::{run_command, CommandSpec};
use tracing::warn;

pub const FALLBACK_REGION: &str = "us-east-1";

/// Where a region may come from, highest precedence first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSources {
    pub flag: Option<String>,
    pub aws_region: Option<String>,
    pub aws_default_region: Option<String>,
    pub configured: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Pick the first non-empty source, or `None` when all are unset.
pub fn pick_region(sources: &RegionSources) -> Option<String> {
    non_empty(&sources.flag)
        .or_else(|| non_empty(&sources.aws_region))
        .or_else(|| non_empty(&sources.aws_default_region))
        .or_else(|| non_empty(&sources.configured))
        .map(str::to_string)
}

/// Resolve the region from `flag`, the environment, then the CLI's
/// configured profile, defaulting to `us-east-1`.
pub async fn resolve_region(flag: Option<String>) -> String {
    let mut sources = RegionSources {
        flag,
        aws_region: std::env::var("AWS_REGION").ok(),
        aws_default_region: std::env::var("AWS_DEFAULT_REGION").ok(),
        configured: None,
    };
    if let Some(region) = pick_region(&sources) {
        return region;
    }

    sources.configured = configured_region().await;
    pick_region(&sources).unwrap_or_else(|| {
        warn!(region = FALLBACK_REGION, "no region configured, using fallback");
        FALLBACK_REGION.to_string()
    })
}

async fn configured_region() -> Option<String> {
    let program = std::env::var("AGENTCORE_AWS_CLI").unwrap_or_else(|_| "aws".to_string());
    let spec = CommandSpec::new(program)
        .args(["configure", "get", "region"])
        .with_timeout(30);
    match run_command(&spec).await {
        Ok(out) if out.success => Some(out.stdout.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins() {
        let sources = RegionSources {
            flag: Some("eu-west-1".to_string()),
            aws_region: Some("us-west-2".to_string()),
            ..Default::default()
        };
        assert_eq!(pick_region(&sources).as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_env_order() {
        let sources = RegionSources {
            aws_region: Some(" ".to_string()),
            aws_default_region: Some("ap-southeast-2".to_string()),
            configured: Some("us-west-2".to_string()),
            ..Default::default()
        };
        assert_eq!(pick_region(&sources).as_deref(), Some("ap-southeast-2"));
    }

    #[test]
    fn test_nothing_set() {
        assert_eq!(pick_region(&RegionSources::default()), None);
    }
}
