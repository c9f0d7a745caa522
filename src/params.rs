//! Request-parameter reconciliation for reduced-surface OpenAI-compatible
//! servers.
//!
//! Self-hosted endpoints (vLLM, LM Studio, Ollama in OpenAI mode) accept the
//! Chat Completions wire format but reject or mishandle a chunk of the hosted
//! API's parameter surface. [`reconcile`] turns an arbitrary caller-supplied
//! parameter map into one such a server will accept: denylisted names are
//! stripped, missing names from the default table are filled in, and
//! everything else passes through untouched.

use std::sync::LazyLock;

use serde_json::{Value, json};

/// Open-ended generation parameter map.
///
/// No fixed schema: callers may put any key in here and unknown keys are
/// forwarded to the server as-is.
pub type GenerationParams = serde_json::Map<String, Value>;

/// Parameter names known to be unsupported or unreliable on the target
/// server class. Stripped unconditionally by [`reconcile`].
pub const INCOMPATIBLE_PARAMS: &[&str] = &[
    "logprobs",
    "top_logprobs",
    "response_format",
    "tools",
    "tool_choice",
    "function_call",
    "functions",
    "seed",
    "logit_bias",
    "user",
    "presence_penalty",
    "frequency_penalty",
    // multiple choices per request are flaky on several local servers
    "n",
];

/// Fallback values applied by [`reconcile`] only when the caller omitted the
/// key entirely.
pub static DEFAULT_PARAMS: LazyLock<GenerationParams> = LazyLock::new(|| {
    let mut defaults = GenerationParams::new();
    defaults.insert("temperature".to_string(), json!(0.7));
    defaults.insert("max_tokens".to_string(), json!(1024));
    defaults.insert("top_p".to_string(), json!(0.9));
    defaults.insert("stream".to_string(), json!(false));
    defaults
});

/// Reconcile an arbitrary parameter map against the target server's
/// capabilities.
///
/// Returns a copy of `params` with every name in [`INCOMPATIBLE_PARAMS`]
/// removed and every missing name from [`DEFAULT_PARAMS`] filled in. The
/// input is never mutated.
///
/// Defaults are applied on key *presence*, not value truthiness: a caller
/// who explicitly passes `0`, `false`, or `""` has made a choice, and that
/// choice wins over the fallback.
pub fn reconcile(params: &GenerationParams) -> GenerationParams {
    let mut reconciled = params.clone();

    for name in INCOMPATIBLE_PARAMS {
        reconciled.remove(*name);
    }

    for (name, fallback) in DEFAULT_PARAMS.iter() {
        if !reconciled.contains_key(name) {
            reconciled.insert(name.clone(), fallback.clone());
        }
    }

    reconciled
}

/// Log an assembled request payload for debugging.
///
/// Best-effort instrumentation only: summarizes the conversation instead of
/// dumping it, and flags a `max_tokens` the server is guaranteed to choke
/// on. Never fails and never affects the call it observes.
pub fn log_request(payload: &GenerationParams) {
    for (name, value) in payload {
        match name.as_str() {
            "messages" => {
                let messages = value.as_array();
                let count = messages.map_or(0, |m| m.len());
                let content_chars: usize = messages.map_or(0, |m| {
                    m.iter()
                        .map(|msg| {
                            msg.get("content")
                                .and_then(Value::as_str)
                                .map_or(0, str::len)
                        })
                        .sum()
                });
                tracing::debug!(
                    "request param messages: {} messages, {} content chars total",
                    count,
                    content_chars
                );
            }
            "max_tokens" => {
                tracing::debug!("request param max_tokens: {}", value);
                if value.as_f64().is_some_and(|v| v < 1.0) {
                    tracing::warn!("max_tokens is {}, which is below 1", value);
                }
            }
            _ => tracing::debug!("request param {}: {}", name, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;

    fn params(pairs: &[(&str, Value)]) -> GenerationParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn strips_every_incompatible_param() {
        let mut input = GenerationParams::new();
        for name in INCOMPATIBLE_PARAMS {
            input.insert(name.to_string(), json!("anything"));
        }
        let out = reconcile(&input);
        for name in INCOMPATIBLE_PARAMS {
            assert!(!out.contains_key(*name), "{name} should be stripped");
        }
    }

    #[test]
    fn absent_incompatible_params_are_not_an_error() {
        let out = reconcile(&GenerationParams::new());
        for name in INCOMPATIBLE_PARAMS {
            assert!(!out.contains_key(*name));
        }
    }

    #[test]
    fn fills_defaults_for_missing_keys() {
        let out = reconcile(&GenerationParams::new());
        assert_eq!(out["temperature"], json!(0.7));
        assert_eq!(out["max_tokens"], json!(1024));
        assert_eq!(out["top_p"], json!(0.9));
        assert_eq!(out["stream"], json!(false));
    }

    #[test]
    fn explicit_value_wins_over_default() {
        let input = params(&[("temperature", json!(0.2)), ("max_tokens", json!(64))]);
        let out = reconcile(&input);
        assert_eq!(out["temperature"], json!(0.2));
        assert_eq!(out["max_tokens"], json!(64));
    }

    #[test]
    fn explicit_falsy_value_wins_over_default() {
        // Presence, not truthiness: 0 / false / "" are legitimate overrides.
        let input = params(&[
            ("temperature", json!(0.0)),
            ("max_tokens", json!(0)),
            ("stream", json!(true)),
            ("top_p", json!(0)),
        ]);
        let out = reconcile(&input);
        assert_eq!(out["temperature"], json!(0.0));
        assert_eq!(out["max_tokens"], json!(0));
        assert_eq!(out["stream"], json!(true));
        assert_eq!(out["top_p"], json!(0));
    }

    #[test]
    fn unknown_keys_pass_through_untouched() {
        let input = params(&[
            ("min_p", json!(0.05)),
            ("repetition_penalty", json!(1.1)),
            ("custom", json!({"nested": [1, 2, 3]})),
        ]);
        let out = reconcile(&input);
        assert_eq!(out["min_p"], json!(0.05));
        assert_eq!(out["repetition_penalty"], json!(1.1));
        assert_eq!(out["custom"], json!({"nested": [1, 2, 3]}));
    }

    #[test]
    fn input_is_never_mutated() {
        let input = params(&[("tools", json!([])), ("temperature", json!(0.5))]);
        let snapshot = input.clone();
        let _ = reconcile(&input);
        assert_eq!(input, snapshot);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let input = params(&[
            ("logprobs", json!(true)),
            ("temperature", json!(0.3)),
            ("min_p", json!(0.1)),
        ]);
        let once = reconcile(&input);
        let twice = reconcile(&once);
        assert_eq!(once, twice);
    }

    #[traced_test]
    #[test]
    fn log_request_flags_sub_one_max_tokens() {
        let payload = params(&[
            ("max_tokens", json!(-5)),
            ("messages", json!([{"role": "user", "content": "hi"}])),
        ]);
        log_request(&payload);
        assert!(logs_contain("max_tokens is -5"));
    }

    #[traced_test]
    #[test]
    fn log_request_tolerates_odd_shapes() {
        // messages that are not an array, content that is not a string
        let payload = params(&[
            ("messages", json!("not an array")),
            ("max_tokens", json!("not a number")),
            ("stop", json!(null)),
        ]);
        log_request(&payload);
    }
}
