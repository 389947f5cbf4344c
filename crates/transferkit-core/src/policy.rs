//! Generative-fallback policy
//!
//! A decision is evaluated on every call and never cached; it depends on the
//! caller's current session phase and quota.

use crate::config::PolicyConfig;
use crate::model::ContentLocator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Budget granted to an allowed generative call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCaps {
    pub max_tokens: u32,
    pub model_tier: String,
}

/// Outcome of a policy evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caps: Option<PolicyCaps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PolicyDecision {
    pub fn allow(caps: Option<PolicyCaps>) -> Self {
        Self {
            allowed: true,
            caps,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            caps: None,
            reason: Some(reason.into()),
        }
    }
}

/// Inputs a gate decides on
#[derive(Debug, Clone)]
pub struct PolicyRequest<'a> {
    pub caller_id: Option<&'a str>,
    pub session_phase: Option<&'a str>,
    pub locator: &'a ContentLocator,
}

/// Decides whether a generative call is permitted
#[async_trait]
pub trait PolicyGate: Send + Sync {
    async fn evaluate(&self, request: &PolicyRequest<'_>) -> PolicyDecision;
}

/// Config-driven gate: global switch, denied session phases and an
/// in-process per-caller quota of allowed decisions
pub struct PhasePolicyGate {
    config: PolicyConfig,
    calls: Mutex<HashMap<String, u32>>,
}

impl PhasePolicyGate {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn caps(&self) -> PolicyCaps {
        PolicyCaps {
            max_tokens: self.config.max_tokens,
            model_tier: self.config.model_tier.clone(),
        }
    }

    /// Allowed decisions granted to a caller so far
    pub fn calls_for(&self, caller_id: &str) -> u32 {
        self.calls
            .lock()
            .map(|calls| calls.get(caller_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl PolicyGate for PhasePolicyGate {
    async fn evaluate(&self, request: &PolicyRequest<'_>) -> PolicyDecision {
        if !self.config.enabled {
            return PolicyDecision::deny("generative fallback disabled");
        }

        if let Some(phase) = request.session_phase {
            if self
                .config
                .denied_phases
                .iter()
                .any(|denied| denied.eq_ignore_ascii_case(phase))
            {
                return PolicyDecision::deny(format!(
                    "session phase '{}' does not permit generative fallback",
                    phase
                ));
            }
        }

        if let Some(limit) = self.config.max_calls_per_caller {
            let caller = request.caller_id.unwrap_or("anonymous");
            let Ok(mut calls) = self.calls.lock() else {
                return PolicyDecision::deny("quota state unavailable");
            };
            let used = calls.entry(caller.to_string()).or_insert(0);
            if *used >= limit {
                return PolicyDecision::deny(format!(
                    "caller '{}' exhausted its quota of {} generative calls",
                    caller, limit
                ));
            }
            *used += 1;
        }

        PolicyDecision::allow(Some(self.caps()))
    }
}

/// Gate returning the same decision every time
#[derive(Debug, Clone)]
pub struct StaticPolicyGate {
    decision: PolicyDecision,
}

impl StaticPolicyGate {
    pub fn new(decision: PolicyDecision) -> Self {
        Self { decision }
    }

    pub fn allow_all() -> Self {
        Self::new(PolicyDecision::allow(None))
    }

    pub fn deny_all(reason: impl Into<String>) -> Self {
        Self::new(PolicyDecision::deny(reason))
    }
}

#[async_trait]
impl PolicyGate for StaticPolicyGate {
    async fn evaluate(&self, _request: &PolicyRequest<'_>) -> PolicyDecision {
        self.decision.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        locator: &'a ContentLocator,
        caller: Option<&'a str>,
        phase: Option<&'a str>,
    ) -> PolicyRequest<'a> {
        PolicyRequest {
            caller_id: caller,
            session_phase: phase,
            locator,
        }
    }

    #[tokio::test]
    async fn test_denied_phase() {
        let gate = PhasePolicyGate::new(PolicyConfig::default());
        let loc = ContentLocator::whole("c1");

        let decision = gate.evaluate(&request(&loc, None, Some("Assessment"))).await;
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("Assessment"));

        let decision = gate.evaluate(&request(&loc, None, Some("study"))).await;
        assert!(decision.allowed);
        let caps = decision.caps.unwrap();
        assert_eq!(caps.max_tokens, PolicyConfig::default().max_tokens);
    }

    #[tokio::test]
    async fn test_disabled_gate_denies() {
        let gate = PhasePolicyGate::new(PolicyConfig {
            enabled: false,
            ..PolicyConfig::default()
        });
        let loc = ContentLocator::whole("c1");
        let decision = gate.evaluate(&request(&loc, Some("u1"), None)).await;
        assert_eq!(decision, PolicyDecision::deny("generative fallback disabled"));
    }

    #[tokio::test]
    async fn test_quota_is_per_caller() {
        let gate = PhasePolicyGate::new(PolicyConfig {
            max_calls_per_caller: Some(2),
            ..PolicyConfig::default()
        });
        let loc = ContentLocator::whole("c1");

        assert!(gate.evaluate(&request(&loc, Some("u1"), None)).await.allowed);
        assert!(gate.evaluate(&request(&loc, Some("u1"), None)).await.allowed);
        let third = gate.evaluate(&request(&loc, Some("u1"), None)).await;
        assert!(!third.allowed);
        assert!(third.reason.unwrap().contains("quota"));

        assert!(gate.evaluate(&request(&loc, Some("u2"), None)).await.allowed);
        assert_eq!(gate.calls_for("u1"), 2);
    }

    #[tokio::test]
    async fn test_static_gate() {
        let loc = ContentLocator::whole("c1");
        let gate = StaticPolicyGate::deny_all("billing");
        let decision = gate.evaluate(&request(&loc, None, None)).await;
        assert_eq!(decision.reason.as_deref(), Some("billing"));
        assert!(StaticPolicyGate::allow_all()
            .evaluate(&request(&loc, None, None))
            .await
            .allowed);
    }
}
