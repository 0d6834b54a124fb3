//! Renders reports into the human-facing formats shared by the chat and mail
//! sinks, using the minijinja templating engine.

use chrono::DateTime;
use minijinja::Environment;
use serde_json::{Value, json};
use thiserror::Error;

use crate::models::{Report, ReportItem};

/// Payloads longer than this are shortened before rendering.
const MAX_PAYLOAD_LEN: usize = 256;

const HTML_TEMPLATE: &str = r#"<p>
<p>📣 <b>Notification</b> at <b style="background-color: #a3e4d7">{{ chain }}</b> #<a href="{{ explorer_url | safe }}">{{ height }}</a> aka {{ time }}</p>
<ul>
{%- for item in items %}
<li>💻 type: {{ item.kind }} | {% if item.label %}for <b style="background-color: #a3e4d7">{{ item.label }}</b>{% if item.address %} ({{ item.address }}){% endif %} | {% endif %}method: <b style="background-color: #a3e4d7">{{ item.section }}.{{ item.method }}</b> | data: <code>{{ item.payload | shorten }}</code></li>
{%- endfor %}
</ul>
</p>"#;

const TEXT_TEMPLATE: &str = "🎤 Events at #{{ height }} on {{ chain }}: \
{%- for item in items %} [🧾 {{ item.kind }}{% if item.label %} for {{ item.label }}{% endif %} | 💻 method: {{ item.section }}.{{ item.method }} | 💽 data: {{ item.payload | shorten }}]{% endfor %} ({{ explorer_url }})";

/// Error type for the TemplateService.
#[derive(Debug, Error)]
pub enum TemplateServiceError {
    /// An error occurred while rendering the template.
    #[error("Failed to render template: {0}")]
    RenderError(#[from] minijinja::Error),
}

/// A service for rendering reports using the minijinja templating engine.
pub struct TemplateService {
    env: Environment<'static>,
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateService {
    /// Creates a service with the built-in report templates registered.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        env.add_filter("shorten", |value: String| shorten(&value));
        // Both templates are compile-time constants; a syntax error shows up
        // on the first render.
        if let Err(e) = env.add_template("report.html", HTML_TEMPLATE) {
            tracing::error!(error = %e, "Invalid HTML report template.");
        }
        if let Err(e) = env.add_template("report.txt", TEXT_TEMPLATE) {
            tracing::error!(error = %e, "Invalid text report template.");
        }
        Self { env }
    }

    /// Renders a report as HTML.
    pub fn render_html(&self, report: &Report) -> Result<String, TemplateServiceError> {
        self.render("report.html", report_context(report))
    }

    /// Renders a report as a single line of plain text.
    pub fn render_text(&self, report: &Report) -> Result<String, TemplateServiceError> {
        self.render("report.txt", report_context(report))
    }

    fn render(&self, name: &str, context: Value) -> Result<String, TemplateServiceError> {
        tracing::debug!(template = name, "Rendering report.");
        let template = self.env.get_template(name)?;
        Ok(template.render(context)?)
    }
}

/// The block explorer page of a report's block.
pub fn explorer_url(report: &Report) -> String {
    format!("https://{}.subscan.io/block/{}", report.chain().to_lowercase(), report.height())
}

/// Formats a millisecond timestamp as UTC.
pub fn format_timestamp(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown time".to_string())
}

/// Keeps the head and tail of a long payload, joined by `..`.
pub fn shorten(payload: &str) -> String {
    let chars: Vec<char> = payload.chars().collect();
    if chars.len() <= MAX_PAYLOAD_LEN {
        return payload.to_string();
    }
    let half = MAX_PAYLOAD_LEN / 2;
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    format!("{head}..{tail}")
}

fn report_context(report: &Report) -> Value {
    let items: Vec<Value> = report
        .items()
        .iter()
        .map(|item| {
            let (label, address) = match item {
                ReportItem::Extrinsic { account, .. } =>
                    (Some(account.label()), account.address().map(|a| a.as_str())),
                ReportItem::Event { .. } => (None, None),
            };
            json!({
                "kind": item.kind(),
                "label": label,
                "address": address,
                "section": item.section(),
                "method": item.method(),
                "payload": item.payload(),
            })
        })
        .collect();

    json!({
        "chain": report.chain(),
        "height": report.height(),
        "hash": report.hash().to_string(),
        "time": format_timestamp(report.timestamp()),
        "explorer_url": explorer_url(report),
        "items": items,
    })
}
