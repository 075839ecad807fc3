use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::{Value, json};

use super::NotificationEvent;
use super::channel::WebhookFormat;
use crate::model::Severity;

type Formatter = fn(&NotificationEvent) -> Value;

static FORMATTERS: LazyLock<HashMap<WebhookFormat, Formatter>> = LazyLock::new(|| {
    let mut m: HashMap<WebhookFormat, Formatter> = HashMap::with_capacity(4);
    m.insert(WebhookFormat::Slack, slack);
    m.insert(WebhookFormat::Discord, discord);
    m.insert(WebhookFormat::Teams, teams);
    m.insert(WebhookFormat::Generic, generic);
    m
});

/// Renders the webhook payload of `event` in the given format.
pub fn render(format: WebhookFormat, event: &NotificationEvent) -> Value {
    match FORMATTERS.get(&format) {
        Some(formatter) => formatter(event),
        None => generic(event),
    }
}

/// Display color of a severity as `#rrggbb`.
pub fn color(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "#3498db",
        Severity::Warning => "#f39c12",
        Severity::Error => "#e74c3c",
        Severity::Success => "#2ecc71",
    }
}

fn color_value(severity: Severity) -> u32 {
    u32::from_str_radix(color(severity).trim_start_matches('#'), 16).unwrap_or_default()
}

fn severity_label(severity: Severity) -> String {
    severity.as_str().to_uppercase()
}

fn container_label(event: &NotificationEvent) -> Option<String> {
    match (&event.container_name, &event.container_id) {
        (Some(name), Some(id)) => Some(format!("{name} ({id})")),
        (Some(name), None) => Some(name.clone()),
        (None, Some(id)) => Some(id.to_string()),
        (None, None) => None,
    }
}

fn slack(event: &NotificationEvent) -> Value {
    let mut fields = vec![
        json!({"title": "Severity", "value": severity_label(event.severity), "short": true}),
        json!({"title": "Time", "value": event.timestamp.to_rfc3339(), "short": true}),
    ];
    if let Some(container) = container_label(event) {
        fields.push(json!({"title": "Container", "value": container, "short": true}));
    }

    json!({
        "attachments": [{
            "color": color(event.severity),
            "title": event.title,
            "text": event.message,
            "fields": fields,
            "ts": event.timestamp.timestamp(),
        }]
    })
}

fn discord(event: &NotificationEvent) -> Value {
    let mut fields = vec![json!({
        "name": "Severity",
        "value": severity_label(event.severity),
        "inline": true,
    })];
    if let Some(container) = container_label(event) {
        fields.push(json!({"name": "Container", "value": container, "inline": true}));
    }

    json!({
        "embeds": [{
            "title": event.title,
            "description": event.message,
            "color": color_value(event.severity),
            "fields": fields,
            "footer": {"text": "dockwatch"},
            "timestamp": event.timestamp.to_rfc3339(),
        }]
    })
}

fn teams(event: &NotificationEvent) -> Value {
    let mut facts = vec![
        json!({"name": "Severity", "value": severity_label(event.severity)}),
        json!({"name": "Time", "value": event.timestamp.to_rfc3339()}),
    ];
    if let Some(container) = container_label(event) {
        facts.push(json!({"name": "Container", "value": container}));
    }

    json!({
        "@type": "MessageCard",
        "@context": "https://schema.org/extensions",
        "themeColor": color(event.severity).trim_start_matches('#'),
        "summary": event.title,
        "sections": [{
            "activityTitle": event.title,
            "facts": facts,
            "text": event.message,
        }]
    })
}

fn generic(event: &NotificationEvent) -> Value {
    json!({
        "event": event.event_type,
        "title": event.title,
        "message": event.message,
        "severity": event.severity,
        "container": event.container_name,
        "containerId": event.container_id,
        "details": event.details,
        "timestamp": event.timestamp.to_rfc3339(),
    })
}
