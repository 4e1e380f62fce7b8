//! Translation endpoint catalog and per-endpoint limit tables.
//! Endpoints are either URL/body templates with a `${TEXT}` placeholder
//! or the auto-detect kind with a primary and a fallback host.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Placeholder token substituted with the source text at call time.
pub const TEXT_PLACEHOLDER: &str = "${TEXT}";

/// Endpoint id selected when the user defines their own template.
pub const CUSTOM_ENDPOINT_ID: &str = "custom";

/// Endpoint id used when no selection has been made yet.
pub const DEFAULT_ENDPOINT_ID: &str = "lingva";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    /// Parse the persisted lowercase method name. Anything else is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            _ => None,
        }
    }
}

/// How an endpoint is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointKind {
    /// Generic template endpoint: text is substituted into the URL (GET)
    /// or the body (POST).
    Template {
        method: HttpMethod,
        url_pattern: String,
        body: Option<String>,
    },
    /// Auto-detect public endpoint: primary host with one deterministic
    /// fallback mirror, both queried as `{host}/api/v1/auto/en/{text}`.
    AutoDetect {
        primary_host: String,
        fallback_host: String,
    },
}

/// A configured translation endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub id: String,
    pub display_name: String,
    pub help_url: Option<String>,
    pub kind: EndpointKind,
}

/// User-defined custom endpoint, persisted inside the settings document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomEndpoint {
    pub method: String,
    pub url_pattern: String,
    pub body: String,
}

impl Default for CustomEndpoint {
    fn default() -> Self {
        Self {
            method: "get".into(),
            url_pattern: format!("http://localhost:5000/translate?text={TEXT_PLACEHOLDER}"),
            body: String::new(),
        }
    }
}

/// Per-endpoint request sizing limits. Used to clamp user-requested
/// values, never to expand them.
#[derive(Debug, Clone, Copy)]
pub struct EndpointLimits {
    pub recommended_chunk_size: usize,
    pub max_chunk_size: usize,
    pub max_parallel_requests: usize,
    /// Maximum combined characters per batch request.
    pub max_batch_length: usize,
    /// Maximum items per batch request.
    pub max_batch_items: usize,
}

/// Fallback limits for unknown or custom endpoints.
const FALLBACK_LIMITS: EndpointLimits = EndpointLimits {
    recommended_chunk_size: 50,
    max_chunk_size: 50,
    max_parallel_requests: 10,
    max_batch_length: 1000,
    max_batch_items: 20,
};

/// Look up the sizing limits for an endpoint id.
pub fn limits_for(id: &str) -> EndpointLimits {
    match id {
        "ezTransWeb" => EndpointLimits {
            recommended_chunk_size: 500,
            max_chunk_size: 1000,
            max_parallel_requests: 50,
            max_batch_length: 5000,
            max_batch_items: 200,
        },
        "ezTransServer" => EndpointLimits {
            recommended_chunk_size: 100,
            max_chunk_size: 500,
            max_parallel_requests: 20,
            max_batch_length: 3000,
            max_batch_items: 100,
        },
        // Public API, stricter limits: batch length stays conservative
        // because the text travels in the URL.
        "lingva" => EndpointLimits {
            recommended_chunk_size: 10,
            max_chunk_size: 20,
            max_parallel_requests: 5,
            max_batch_length: 1500,
            max_batch_items: 50,
        },
        _ => FALLBACK_LIMITS,
    }
}

/// Advisory returned to the settings form for a requested chunk size.
/// Distinct from the engine-level safety clamp applied at translate time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSizeAdvice {
    Ok,
    /// Above 100 items per request is aggressive for most services.
    Large,
    /// Above the endpoint's safe limit; the engine will clamp it.
    ExceedsSafeLimit { max: usize },
    /// Zero or negative sizes cannot be used at all.
    Invalid,
}

/// Assess a requested chunk size against an endpoint's limit table.
pub fn assess_chunk_size(requested: i64, id: &str) -> ChunkSizeAdvice {
    if requested <= 0 {
        return ChunkSizeAdvice::Invalid;
    }
    let max = limits_for(id).max_chunk_size;
    if requested as usize > max {
        ChunkSizeAdvice::ExceedsSafeLimit { max }
    } else if requested > 100 {
        ChunkSizeAdvice::Large
    } else {
        ChunkSizeAdvice::Ok
    }
}

/// Read-only catalog of known endpoints plus selection resolution.
pub struct EndpointRegistry {
    endpoints: Vec<Endpoint>,
    default_id: String,
}

impl EndpointRegistry {
    /// Catalog of the built-in endpoints.
    pub fn builtin() -> Self {
        Self::new(
            vec![
                Endpoint {
                    id: "ezTransWeb".into(),
                    display_name: "ezTransWeb (JP → KR)".into(),
                    help_url: Some("https://github.com/HelloKS/ezTransWeb".into()),
                    kind: EndpointKind::Template {
                        method: HttpMethod::Get,
                        url_pattern: format!(
                            "http://localhost:5000/translate?text={TEXT_PLACEHOLDER}"
                        ),
                        body: None,
                    },
                },
                Endpoint {
                    id: "ezTransServer".into(),
                    display_name: "eztrans-server (JP → KR)".into(),
                    help_url: Some("https://github.com/nanikit/eztrans-server".into()),
                    kind: EndpointKind::Template {
                        method: HttpMethod::Post,
                        url_pattern: "http://localhost:8000".into(),
                        body: Some(TEXT_PLACEHOLDER.into()),
                    },
                },
                Endpoint {
                    id: "lingva".into(),
                    display_name: "Lingva Translate (Auto-detect → EN)".into(),
                    help_url: Some("https://github.com/thedaviddelta/lingva-translate".into()),
                    kind: EndpointKind::AutoDetect {
                        primary_host: "https://lingva.ml".into(),
                        fallback_host: "https://translate.plausibility.cloud".into(),
                    },
                },
            ],
            DEFAULT_ENDPOINT_ID,
        )
    }

    /// Build a registry from an explicit endpoint list. The default id is
    /// the fallback for unknown selections.
    pub fn new(endpoints: Vec<Endpoint>, default_id: &str) -> Self {
        Self {
            endpoints,
            default_id: default_id.to_string(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    pub fn all(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Resolve a selection to a concrete endpoint. `"custom"` builds a
    /// template from the user definition; an unknown id falls back to the
    /// default endpoint.
    pub fn resolve(&self, selection: &str, custom: &CustomEndpoint) -> Endpoint {
        if selection == CUSTOM_ENDPOINT_ID {
            let method = HttpMethod::parse(&custom.method).unwrap_or_else(|| {
                warn!(method = %custom.method, "unknown custom endpoint method, assuming get");
                HttpMethod::Get
            });
            return Endpoint {
                id: CUSTOM_ENDPOINT_ID.into(),
                display_name: "Custom".into(),
                help_url: None,
                kind: EndpointKind::Template {
                    method,
                    url_pattern: custom.url_pattern.clone(),
                    body: if custom.body.is_empty() {
                        None
                    } else {
                        Some(custom.body.clone())
                    },
                },
            };
        }

        match self.get(selection) {
            Some(ep) => ep.clone(),
            None => {
                warn!(selection, default = %self.default_id, "unknown endpoint selection, using default");
                self.get(&self.default_id)
                    .cloned()
                    .unwrap_or_else(|| Self::builtin().resolve(&self.default_id, custom))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_endpoint_gets_fallback_limits() {
        let limits = limits_for("someNewService");
        assert_eq!(limits.max_chunk_size, 50);
        assert_eq!(limits.max_batch_length, 1000);
        assert_eq!(limits.max_batch_items, 20);
    }

    #[test]
    fn resolves_custom_definition() {
        let registry = EndpointRegistry::builtin();
        let custom = CustomEndpoint {
            method: "post".into(),
            url_pattern: "http://localhost:9999".into(),
            body: TEXT_PLACEHOLDER.into(),
        };
        let ep = registry.resolve("custom", &custom);
        assert_eq!(ep.id, "custom");
        assert_eq!(
            ep.kind,
            EndpointKind::Template {
                method: HttpMethod::Post,
                url_pattern: "http://localhost:9999".into(),
                body: Some(TEXT_PLACEHOLDER.into()),
            }
        );
    }

    #[test]
    fn unknown_selection_falls_back_to_default() {
        let registry = EndpointRegistry::builtin();
        let ep = registry.resolve("gone", &CustomEndpoint::default());
        assert_eq!(ep.id, "lingva");
    }

    #[test]
    fn chunk_size_advice_tiers() {
        assert_eq!(assess_chunk_size(0, "lingva"), ChunkSizeAdvice::Invalid);
        assert_eq!(
            assess_chunk_size(21, "lingva"),
            ChunkSizeAdvice::ExceedsSafeLimit { max: 20 }
        );
        assert_eq!(assess_chunk_size(200, "ezTransWeb"), ChunkSizeAdvice::Large);
        assert_eq!(assess_chunk_size(10, "lingva"), ChunkSizeAdvice::Ok);
    }
}
