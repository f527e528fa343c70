//! # Mutation Directives
//!
//! The orchestrator describes an attack as a loosely typed
//! [`DirectiveSpec`] (`kind` plus parameters). [`Directive::from_spec`]
//! turns that into a closed [`Directive`] once, at setup time, so the
//! per-frame path only ever matches on a checked enum.
//!
//! | kind (aliases)                          | parameters                          |
//! |-----------------------------------------|-------------------------------------|
//! | `value-spoof` (`temperature-spoof`)     | `target` / `target_temp` (float)    |
//! | `value-bias` (`bias`)                   | `bias` / `delta` (float)            |
//! | `route-redirect` (`service-disrupt`)    | `target_service` / `service` (name) |
//! | `replay-prime` (`message-replay`)       | `replay_count` / `repeat` (≥1, default 1) |

use crate::directory::ServiceDirectory;
use crate::error::DirectiveError;
use crate::record::MutationKind;
use codec::{MessageType, PacketHeader};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Spoofed readings outside this window are accepted but flagged
const REALISTIC_READING_RANGE: std::ops::RangeInclusive<f32> = -50.0..=150.0;

/// A validated mutation request
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Replace the tagged reading with `target`
    ValueSpoof { target: f32 },
    /// Add `delta` to the tagged reading
    ValueBias { delta: f32 },
    /// Re-address the frame to the named service
    RouteRedirect { service: String },
    /// Advance the sequence number by `repeat` and refresh the timestamp
    ReplayPrime { repeat: u32 },
}

impl Directive {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::ValueSpoof { .. } => MutationKind::ValueSpoof,
            Self::ValueBias { .. } => MutationKind::ValueBias,
            Self::RouteRedirect { .. } => MutationKind::RouteRedirect,
            Self::ReplayPrime { .. } => MutationKind::ReplayPrime,
        }
    }

    /// Validate an orchestrator request
    ///
    /// Service names are resolved against `directory` here so an unknown
    /// name is reported before anything is armed. The name is resolved again
    /// per frame, since the directory can change while armed.
    pub fn from_spec(
        spec: &DirectiveSpec,
        directory: &ServiceDirectory,
    ) -> Result<Self, DirectiveError> {
        let kind = spec.kind.trim().to_ascii_lowercase().replace('_', "-");
        match kind.as_str() {
            "value-spoof" | "temperature-spoof" => {
                let target = spec.float(&kind, &["target", "target_temp"])?;
                if !REALISTIC_READING_RANGE.contains(&target) {
                    warn!(
                        spoof_target = target,
                        "Spoof target outside realistic range {:?}", REALISTIC_READING_RANGE
                    );
                }
                Ok(Self::ValueSpoof { target })
            }
            "value-bias" | "bias" => {
                let delta = spec.float(&kind, &["bias", "delta"])?;
                Ok(Self::ValueBias { delta })
            }
            "route-redirect" | "service-disrupt" => {
                let service = spec
                    .string(&["target_service", "service"])
                    .ok_or_else(|| DirectiveError::invalid(&kind, "missing target_service"))?;
                if directory.resolve_name(&service).is_none() {
                    return Err(DirectiveError::UnknownService(service));
                }
                Ok(Self::RouteRedirect { service })
            }
            "replay-prime" | "message-replay" => {
                let repeat = match spec.param(&["replay_count", "repeat"]) {
                    None => 1,
                    Some(value) => value
                        .as_u64()
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or_else(|| {
                            DirectiveError::invalid(
                                &kind,
                                "replay_count must be a 32-bit unsigned integer",
                            )
                        })?,
                };
                if repeat == 0 {
                    return Err(DirectiveError::invalid(&kind, "replay_count must be at least 1"));
                }
                Ok(Self::ReplayPrime { repeat })
            }
            _ => Err(DirectiveError::UnsupportedKind(spec.kind.clone())),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValueSpoof { target } => write!(f, "value-spoof({target})"),
            Self::ValueBias { delta } => write!(f, "value-bias({delta:+})"),
            Self::RouteRedirect { service } => write!(f, "route-redirect({service})"),
            Self::ReplayPrime { repeat } => write!(f, "replay-prime(+{repeat})"),
        }
    }
}

/// Directive request as supplied by the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectiveSpec {
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    /// Which flows the directive applies to; empty matches everything
    #[serde(default)]
    pub filter: FlowFilter,
}

impl DirectiveSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn param_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_filter(mut self, filter: FlowFilter) -> Self {
        self.filter = filter;
        self
    }

    fn param(&self, names: &[&str]) -> Option<&Value> {
        names.iter().find_map(|name| self.params.get(*name))
    }

    fn string(&self, names: &[&str]) -> Option<String> {
        self.param(names)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn float(&self, kind: &str, names: &[&str]) -> Result<f32, DirectiveError> {
        let value = self
            .param(names)
            .ok_or_else(|| DirectiveError::invalid(kind, format!("missing {}", names[0])))?;
        let number = value.as_f64().ok_or_else(|| {
            DirectiveError::invalid(kind, format!("{} must be a number", names[0]))
        })?;
        let number = number as f32;
        if !number.is_finite() {
            return Err(DirectiveError::invalid(kind, format!("{} must be finite", names[0])));
        }
        Ok(number)
    }
}

/// Restricts a directive to one flow
///
/// Unset criteria match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowFilter {
    pub message_type: Option<MessageType>,
    pub source: Option<u16>,
    pub target: Option<u16>,
}

impl FlowFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = Some(message_type);
        self
    }

    pub fn source(mut self, source: u16) -> Self {
        self.source = Some(source);
        self
    }

    pub fn target(mut self, target: u16) -> Self {
        self.target = Some(target);
        self
    }

    pub fn matches(&self, header: &PacketHeader) -> bool {
        self.message_type.map_or(true, |t| t == header.message_type)
            && self.source.map_or(true, |s| s == header.source_service_id)
            && self.target.map_or(true, |t| t == header.target_service_id)
    }
}

/// A directive installed in the pipeline together with its flow filter
#[derive(Debug, Clone, PartialEq)]
pub struct ArmedDirective {
    pub directive: Directive,
    pub filter: FlowFilter,
}

impl ArmedDirective {
    pub fn new(directive: Directive, filter: FlowFilter) -> Self {
        Self { directive, filter }
    }

    /// Validate a spec and bind it to the filter it carries
    pub fn from_spec(
        spec: &DirectiveSpec,
        directory: &ServiceDirectory,
    ) -> Result<Self, DirectiveError> {
        Ok(Self::new(Directive::from_spec(spec, directory)?, spec.filter.clone()))
    }

    pub fn applies_to(&self, header: &PacketHeader) -> bool {
        self.filter.matches(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_services;

    fn directory() -> ServiceDirectory {
        ServiceDirectory::with_services(&default_services())
    }

    #[test]
    fn test_value_spoof_aliases() {
        let spec = DirectiveSpec::new("temperature_spoof").param_value("target_temp", 99.9);
        assert_eq!(
            Directive::from_spec(&spec, &directory()).unwrap(),
            Directive::ValueSpoof { target: 99.9 }
        );

        let spec = DirectiveSpec::new("Value-Spoof").param_value("target", 500);
        assert_eq!(
            Directive::from_spec(&spec, &directory()).unwrap(),
            Directive::ValueSpoof { target: 500.0 }
        );
    }

    #[test]
    fn test_value_bias() {
        let spec = DirectiveSpec::new("bias").param_value("bias", -7.5);
        let directive = Directive::from_spec(&spec, &directory()).unwrap();
        assert_eq!(directive, Directive::ValueBias { delta: -7.5 });
        assert_eq!(directive.kind(), MutationKind::ValueBias);
    }

    #[test]
    fn test_spoof_requires_finite_number() {
        let missing = DirectiveSpec::new("value-spoof");
        assert!(matches!(
            Directive::from_spec(&missing, &directory()),
            Err(DirectiveError::InvalidParameter { .. })
        ));

        let text = DirectiveSpec::new("value-spoof").param_value("target", "hot");
        assert!(Directive::from_spec(&text, &directory()).is_err());

        let huge = DirectiveSpec::new("value-spoof").param_value("target", 1.0e300);
        assert!(Directive::from_spec(&huge, &directory()).is_err());
    }

    #[test]
    fn test_route_redirect_checks_directory() {
        let spec = DirectiveSpec::new("service-disrupt").param_value("target_service", "Dashboard");
        assert_eq!(
            Directive::from_spec(&spec, &directory()).unwrap(),
            Directive::RouteRedirect {
                service: "Dashboard".into()
            }
        );

        let spec = DirectiveSpec::new("route-redirect").param_value("service", "NoSuchService");
        assert_eq!(
            Directive::from_spec(&spec, &directory()),
            Err(DirectiveError::UnknownService("NoSuchService".into()))
        );
    }

    #[test]
    fn test_replay_prime_defaults_and_bounds() {
        let spec = DirectiveSpec::new("message-replay");
        assert_eq!(
            Directive::from_spec(&spec, &directory()).unwrap(),
            Directive::ReplayPrime { repeat: 1 }
        );

        let zero = DirectiveSpec::new("replay-prime").param_value("replay_count", 0);
        assert!(Directive::from_spec(&zero, &directory()).is_err());

        let negative = DirectiveSpec::new("replay-prime").param_value("repeat", -3);
        assert!(Directive::from_spec(&negative, &directory()).is_err());
    }

    #[test]
    fn test_unsupported_kind() {
        let spec = DirectiveSpec::new("jam");
        assert_eq!(
            Directive::from_spec(&spec, &directory()),
            Err(DirectiveError::UnsupportedKind("jam".into()))
        );
    }

    #[test]
    fn test_flow_filter() {
        let header = PacketHeader::new(MessageType::GuaranteeData, 1, 2, 0);
        assert!(FlowFilter::any().matches(&header));
        assert!(FlowFilter::any().source(1).target(2).matches(&header));
        assert!(!FlowFilter::any().target(3).matches(&header));
        assert!(!FlowFilter::any()
            .message_type(MessageType::Heartbeat)
            .matches(&header));
    }

    #[test]
    fn test_spec_deserializes_with_filter() {
        let spec: DirectiveSpec = serde_json::from_str(
            r#"{"kind":"value-spoof","params":{"target":42.0},
                "filter":{"message_type":"guarantee_data","source":1}}"#,
        )
        .unwrap();
        let armed = ArmedDirective::from_spec(&spec, &directory()).unwrap();
        assert_eq!(armed.filter.message_type, Some(MessageType::GuaranteeData));
        assert!(armed.applies_to(&PacketHeader::new(MessageType::GuaranteeData, 1, 9, 0)));
        assert!(!armed.applies_to(&PacketHeader::new(MessageType::GuaranteeData, 2, 9, 0)));
    }
}
