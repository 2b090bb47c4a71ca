use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

#[derive(Debug, Default, Clone, Copy)]
struct Summary {
    count: u64,
    sum_secs: f64,
}

/// In-process counters exported in Prometheus text format.
#[derive(Debug, Default)]
pub struct Metrics {
    generations: DashMap<(String, String), u64>,
    messages: DashMap<String, u64>,
    reactions: DashMap<String, u64>,
    api_calls: DashMap<(String, String), u64>,
    stage_durations: DashMap<String, Summary>,
    active_chats: AtomicI64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// `status` is `success` or a failure label.
    pub fn record_generation(&self, status: &str, trigger: &str) {
        *self
            .generations
            .entry((status.to_string(), trigger.to_string()))
            .or_default() += 1;
    }

    pub fn record_message(&self, chat_type: &str) {
        *self.messages.entry(chat_type.to_string()).or_default() += 1;
    }

    pub fn record_reaction(&self, emoji: &str) {
        *self.reactions.entry(emoji.to_string()).or_default() += 1;
    }

    pub fn record_api_call(&self, service: &str, status: &str) {
        *self
            .api_calls
            .entry((service.to_string(), status.to_string()))
            .or_default() += 1;
    }

    pub fn observe_stage(&self, stage: &str, elapsed: Duration) {
        let mut summary = self.stage_durations.entry(stage.to_string()).or_default();
        summary.count += 1;
        summary.sum_secs += elapsed.as_secs_f64();
    }

    pub fn set_active_chats(&self, count: usize) {
        self.active_chats
            .store(i64::try_from(count).unwrap_or(i64::MAX), Ordering::Relaxed);
    }

    pub fn generation_count(&self, status: &str, trigger: &str) -> u64 {
        self.generations
            .get(&(status.to_string(), trigger.to_string()))
            .map(|v| *v)
            .unwrap_or(0)
    }

    pub fn message_count(&self, chat_type: &str) -> u64 {
        self.messages.get(chat_type).map(|v| *v).unwrap_or(0)
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();

        header(&mut out, "meme_generations_total", "Meme generation attempts.", "counter");
        for ((status, trigger), value) in sorted_pairs(&self.generations) {
            let _ = writeln!(
                out,
                "meme_generations_total{{status=\"{}\",trigger=\"{}\"}} {value}",
                escape_label(&status),
                escape_label(&trigger)
            );
        }

        header(&mut out, "messages_processed_total", "Inbound text messages.", "counter");
        for (chat_type, value) in sorted(&self.messages) {
            let _ = writeln!(
                out,
                "messages_processed_total{{chat_type=\"{}\"}} {value}",
                escape_label(&chat_type)
            );
        }

        header(&mut out, "reactions_received_total", "Inbound emoji reactions.", "counter");
        for (emoji, value) in sorted(&self.reactions) {
            let _ = writeln!(
                out,
                "reactions_received_total{{emoji=\"{}\"}} {value}",
                escape_label(&emoji)
            );
        }

        header(&mut out, "api_calls_total", "Calls to external providers.", "counter");
        for ((service, status), value) in sorted_pairs(&self.api_calls) {
            let _ = writeln!(
                out,
                "api_calls_total{{service=\"{}\",status=\"{}\"}} {value}",
                escape_label(&service),
                escape_label(&status)
            );
        }

        header(
            &mut out,
            "meme_generation_duration_seconds",
            "Time spent per pipeline stage.",
            "summary",
        );
        let stages: BTreeMap<String, Summary> = self
            .stage_durations
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        for (stage, summary) in stages {
            let stage = escape_label(&stage);
            let _ = writeln!(
                out,
                "meme_generation_duration_seconds_sum{{stage=\"{stage}\"}} {}",
                summary.sum_secs
            );
            let _ = writeln!(
                out,
                "meme_generation_duration_seconds_count{{stage=\"{stage}\"}} {}",
                summary.count
            );
        }

        header(&mut out, "active_chats", "Conversations with remembered messages.", "gauge");
        let _ = writeln!(out, "active_chats {}", self.active_chats.load(Ordering::Relaxed));

        out
    }
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

fn sorted(map: &DashMap<String, u64>) -> BTreeMap<String, u64> {
    map.iter().map(|e| (e.key().clone(), *e.value())).collect()
}

fn sorted_pairs(map: &DashMap<(String, String), u64>) -> BTreeMap<(String, String), u64> {
    map.iter().map(|e| (e.key().clone(), *e.value())).collect()
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_label_set() {
        let metrics = Metrics::new();
        metrics.record_generation("success", "🤡");
        metrics.record_generation("success", "🤡");
        metrics.record_generation("template_not_found", "🔥");
        metrics.record_message("group");

        assert_eq!(metrics.generation_count("success", "🤡"), 2);
        assert_eq!(metrics.generation_count("template_not_found", "🔥"), 1);
        assert_eq!(metrics.generation_count("success", "🔥"), 0);
        assert_eq!(metrics.message_count("group"), 1);
        assert_eq!(metrics.message_count("private"), 0);
    }

    #[test]
    fn render_uses_prometheus_text_format() {
        let metrics = Metrics::new();
        metrics.record_generation("success", "🤡");
        metrics.record_message("private");
        metrics.record_reaction("🔥");
        metrics.record_api_call("llm", "ok");
        metrics.observe_stage("render", Duration::from_millis(500));
        metrics.observe_stage("render", Duration::from_millis(250));
        metrics.set_active_chats(3);

        let text = metrics.render();
        assert!(text.contains("# TYPE meme_generations_total counter"));
        assert!(text.contains("meme_generations_total{status=\"success\",trigger=\"🤡\"} 1"));
        assert!(text.contains("messages_processed_total{chat_type=\"private\"} 1"));
        assert!(text.contains("reactions_received_total{emoji=\"🔥\"} 1"));
        assert!(text.contains("api_calls_total{service=\"llm\",status=\"ok\"} 1"));
        assert!(text.contains("meme_generation_duration_seconds_sum{stage=\"render\"} 0.75"));
        assert!(text.contains("meme_generation_duration_seconds_count{stage=\"render\"} 2"));
        assert!(text.contains("active_chats 3"));
    }

    #[test]
    fn label_values_are_escaped() {
        assert_eq!(escape_label("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}
