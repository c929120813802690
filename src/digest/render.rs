use chrono::{DateTime, Utc};

use crate::constants::{DIGEST_SUBJECT_MARKER, DIGEST_SUBJECT_PREFIX};

use super::entry::DigestEntry;
use super::link::{LinkMode, build_reply_link};
use super::window::TimeRange;

/// Subject line for the outgoing digest mail. The aggregator's
/// self-exclusion keys off the stable prefix and marker in this string.
pub fn digest_subject(range: TimeRange, now: DateTime<Utc>) -> String {
    format!(
        "{}{} {}{}",
        DIGEST_SUBJECT_PREFIX,
        range.period_label(),
        DIGEST_SUBJECT_MARKER,
        now.format("%B %d, %Y"),
    )
}

/// Subject for a generated reply: "Re: " prefixed unless already present.
pub fn reply_subject(subject: &str) -> String {
    if subject.to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    }
}

/// Escape text embedded as visible HTML. Links go through URL encoding
/// instead; this is only for inline body text.
fn escape_html(s: &str) -> String {
    s.replace('<', "&lt;").replace('>', "&gt;")
}

/// Render the full HTML digest document. Entries with no reply options get
/// no reply section; an empty summary still renders so a degraded entry
/// remains visible to the user.
pub fn render_digest(entries: &[DigestEntry], mode: LinkMode, now: DateTime<Utc>) -> String {
    let mut html = format!(
        r#"<html>
<head>
  <style>
    body {{ font-family: Arial, sans-serif; background-color: #f4f4f4; padding: 20px; }}
    .container {{ max-width: 700px; margin: auto; background-color: white; padding: 30px; border-radius: 10px; box-shadow: 0 2px 8px rgba(0,0,0,0.05); }}
    h1 {{ color: #333; }}
    .thread {{ margin-bottom: 30px; }}
    .summary-box {{ border-left: 4px solid #3498db; background-color: #f0f8ff; padding: 15px; border-radius: 6px; }}
    .summary-box .label {{ font-weight: bold; margin-top: 6px; }}
    .action-box {{ background-color: #fffbe6; border-left: 4px solid #f1c40f; padding: 15px; margin-top: 10px; border-radius: 6px; }}
    .action-box .label {{ font-weight: bold; color: #b37f00; margin-bottom: 6px; }}
    .reply-options {{ background-color: #eefaf1; border-left: 4px solid #2ecc71; padding: 15px; margin-top: 10px; border-radius: 6px; }}
    .reply-option {{ margin-top: 10px; padding-top: 10px; border-top: 1px dashed #bfe9cf; }}
    .reply-btn {{ display: inline-block; background-color: #2ecc71; color: white !important; text-decoration: none; padding: 8px 12px; border-radius: 4px; margin-right: 8px; font-weight: 600; text-transform: uppercase; letter-spacing: 0.5px; }}
    .reply-body {{ margin-top: 8px; white-space: pre-wrap; }}
  </style>
</head>
<body>
  <div class="container">
    <h1>{} Email Digest – {}</h1>
    <p>Here's a summary of your recent conversations:</p>
"#,
        DIGEST_SUBJECT_PREFIX.trim_end(),
        now.format("%B %d, %Y"),
    );

    for (i, entry) in entries.iter().enumerate() {
        let subject_reply = reply_subject(&entry.subject);
        html.push_str(&format!(
            r#"    <div class="thread">
      <div class="summary-box">
        <div class="thread-title">📌 Thread {}: {}</div>
        <div><strong>From:</strong> {}</div>
        <div class="label">📝 Summary:</div>
        <div>{}</div>
      </div>
      <div class="action-box">
        <div class="label">⚡ Suggested Action:</div>
        <div>{}</div>
      </div>
"#,
            i + 1,
            escape_html(&entry.subject),
            escape_html(&entry.sender),
            escape_html(&entry.summary),
            escape_html(&entry.suggested_action),
        ));

        if !entry.reply_options.is_empty() {
            html.push_str(
                "      <div class=\"reply-options\"><div class=\"label\">💬 AI Reply Options:</div>\n",
            );
            for opt in &entry.reply_options {
                let reply_link = if entry.reply_target.is_empty() {
                    "#".to_string()
                } else {
                    build_reply_link(mode, &entry.reply_target, &subject_reply, &opt.body)
                };
                html.push_str(&format!(
                    "      <div class=\"reply-option\"><a class=\"reply-btn\" href=\"{}\">{}</a><div class=\"reply-body\">{}</div></div>\n",
                    reply_link,
                    escape_html(&opt.label),
                    escape_html(&opt.body),
                ));
            }
            html.push_str("      </div>\n");
        }

        html.push_str("    </div>\n");
    }

    html.push_str("  </div>\n</body>\n</html>\n");
    html
}
