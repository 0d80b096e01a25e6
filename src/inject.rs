use crate::config::types::Injection;
use crate::event::Event;
use serde_json::Value;

/// Apply enrichment rules to one event, in declared order.
///
/// Each rule has exactly one active source, chosen by priority: environment
/// variable lookup > literal value > local hostname. Later rules may
/// overwrite fields set by earlier ones or by the base event.
pub fn apply_injections(event: &mut Event, injections: &[Injection]) {
    for injection in injections {
        if !injection.env_value.is_empty() {
            let value = std::env::var(&injection.env_value).unwrap_or_default();
            event.set(&injection.field, Value::String(value));
        } else if !injection.value.is_empty() {
            event.set(&injection.field, Value::String(injection.value.clone()));
        } else if injection.hostname {
            event.set(&injection.field, Value::String(local_hostname()));
        }
    }
}

pub fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(field: &str, value: &str, env_value: &str, hostname: bool) -> Injection {
        Injection {
            field: field.to_string(),
            value: value.to_string(),
            env_value: env_value.to_string(),
            hostname,
        }
    }

    #[test]
    fn test_literal_value() {
        let mut event = Event::new();
        apply_injections(&mut event, &[rule("env", "production", "", false)]);
        assert_eq!(
            event.get("env"),
            Some(&Value::String("production".to_string()))
        );
    }

    #[test]
    fn test_env_value_wins_over_literal_and_hostname() {
        std::env::set_var("FLING_TEST_REGION", "us-east1");
        let mut event = Event::new();
        apply_injections(
            &mut event,
            &[rule("region", "fallback", "FLING_TEST_REGION", true)],
        );
        assert_eq!(
            event.get("region"),
            Some(&Value::String("us-east1".to_string()))
        );
        std::env::remove_var("FLING_TEST_REGION");
    }

    #[test]
    fn test_literal_wins_over_hostname() {
        let mut event = Event::new();
        apply_injections(&mut event, &[rule("origin", "literal", "", true)]);
        assert_eq!(
            event.get("origin"),
            Some(&Value::String("literal".to_string()))
        );
    }

    #[test]
    fn test_unset_env_var_injects_empty_string() {
        let mut event = Event::new();
        apply_injections(&mut event, &[rule("missing", "", "FLING_TEST_UNSET_VAR", false)]);
        assert_eq!(event.get("missing"), Some(&Value::String(String::new())));
    }

    #[test]
    fn test_hostname_flag() {
        let mut event = Event::new();
        apply_injections(&mut event, &[rule("host", "", "", true)]);
        assert_eq!(event.get("host"), Some(&Value::String(local_hostname())));
    }

    #[test]
    fn test_later_rules_overwrite_earlier_ones() {
        let mut event = Event::new();
        apply_injections(
            &mut event,
            &[
                rule("dc", "first", "", false),
                rule("dc", "second", "", false),
            ],
        );
        assert_eq!(event.get("dc"), Some(&Value::String("second".to_string())));
    }

    #[test]
    fn test_rules_overwrite_base_event_fields() {
        let mut event = Event::from_json_line(r#"{"service":"upstream"}"#).unwrap();
        apply_injections(&mut event, &[rule("service", "agent", "", false)]);
        assert_eq!(
            event.get("service"),
            Some(&Value::String("agent".to_string()))
        );
    }

    #[test]
    fn test_rule_with_no_active_source_is_a_no_op() {
        let mut event = Event::new();
        apply_injections(&mut event, &[rule("empty", "", "", false)]);
        assert!(event.get("empty").is_none());
    }
}
