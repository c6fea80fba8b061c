//! Assembly of the system context and the tick turns sent to the LLM.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use kokoro_core::PersonaConfig;

/// Build the full system context for one action request.
///
/// Layers, in order: identity, consistency constraints, the compressed
/// conversation summary, recalled long-term memories, and any capability
/// results gathered for this tick. Empty layers are skipped.
pub fn system_context(
    persona: &PersonaConfig,
    compressed_context: &str,
    memory_context: &str,
    capability_notes: &[String],
) -> String {
    let mut sections = vec![persona.format_context()];

    let rules = persona.format_consistency_rules();
    if !rules.is_empty() {
        sections.push(format!("[Stay consistent]\n{}", rules));
    }
    if !compressed_context.is_empty() {
        sections.push(format!("[Previous conversation summary]\n{}", compressed_context));
    }
    if !memory_context.is_empty() {
        sections.push(memory_context.to_string());
    }
    for note in capability_notes {
        sections.push(note.clone());
    }

    sections.join("\n\n")
}

/// The inner-voice turn that drives an autonomous action.
pub fn inner_voice(label: &str, prompt: &str) -> String {
    format!("[Inner voice · {}] {}", label, prompt)
}

/// System time notice injected into autonomous ticks, formatted in the
/// persona's timezone.
pub fn autonomous_notice(now: DateTime<Utc>, tz: Tz) -> String {
    let local = now.with_timezone(&tz);
    format!(
        "[System tick] It is now {}. Choose, on your own, an action that fits this moment.",
        format_local(&local)
    )
}

/// Formatted capability result for context injection.
pub fn capability_note(id: &str, result: &serde_json::Value) -> String {
    format!("[Capability {}]\n{}", id, compact_json(result))
}

fn compact_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn format_local<T: TimeZone>(dt: &DateTime<T>) -> String {
    const WEEKDAYS: [&str; 7] = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];
    const MONTHS: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    let weekday = WEEKDAYS[dt.weekday().num_days_from_monday() as usize];
    let month = MONTHS[dt.month0() as usize];
    format!(
        "{}, {} {} {}, {:02}:{:02}",
        weekday,
        month,
        dt.day(),
        dt.year(),
        dt.hour(),
        dt.minute()
    )
}

/// Parse an IANA timezone name, falling back to UTC.
pub fn resolve_timezone(name: &str) -> Tz {
    name.parse().unwrap_or_else(|_| {
        tracing::warn!("unknown timezone '{}', falling back to UTC", name);
        chrono_tz::UTC
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_context_skips_empty_layers() {
        let persona = PersonaConfig::default();
        let ctx = system_context(&persona, "", "", &[]);
        assert!(ctx.contains("[I am Kokoro]"));
        assert!(!ctx.contains("[Previous conversation summary]"));
    }

    #[test]
    fn test_system_context_orders_layers() {
        let persona = PersonaConfig::default();
        let ctx = system_context(
            &persona,
            "we talked about gardens",
            "[Long-term memories]\n- the dog is called Biscuit",
            &["[Capability get_current_time]\n12:00".to_string()],
        );
        let identity = ctx.find("[I am Kokoro]").unwrap();
        let summary = ctx.find("[Previous conversation summary]").unwrap();
        let memories = ctx.find("[Long-term memories]").unwrap();
        let capability = ctx.find("[Capability").unwrap();
        assert!(identity < summary && summary < memories && memories < capability);
    }

    #[test]
    fn test_autonomous_notice_uses_timezone() {
        let now = Utc.with_ymd_and_hms(2026, 2, 7, 0, 30, 0).unwrap();
        let notice = autonomous_notice(now, resolve_timezone("Asia/Tokyo"));
        // 00:30 UTC is 09:30 in Tokyo.
        assert!(notice.contains("09:30"), "{}", notice);
        assert!(notice.contains("Saturday"));
    }

    #[test]
    fn test_resolve_timezone_fallback() {
        assert_eq!(resolve_timezone("Not/AZone"), chrono_tz::UTC);
    }

    #[test]
    fn test_inner_voice_format() {
        let line = inner_voice("Connection", "I'm thinking about you.");
        assert!(line.starts_with("[Inner voice · Connection]"));
    }
}
