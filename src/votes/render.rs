//! Page rendering
//!
//! Turns vote records and batch totals into Telegram-ready HTML. Rendering is
//! pure: the same input always produces byte-identical output, which is what
//! lets the navigator replay cached pages without refetching.

use super::{QueryParams, VoteAggregate, VoteRecord};
use html_escape::{encode_double_quoted_attribute, encode_text};

/// What a page shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// A slice of individual votes
    Listing,
    /// Aggregate totals for one batch
    Summary,
    /// Placeholder for a query with no votes at all
    Empty,
    /// Fatal error replacing the attempted content
    Error,
}

/// One rendered unit of display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub kind: PageKind,
    /// Plain-text title (escaped on output)
    pub title: String,
    /// HTML body
    pub body: String,
}

impl Page {
    /// Full HTML for the message, optionally followed by a transient notice.
    #[must_use]
    pub fn to_html(&self, notice: Option<&str>) -> String {
        let mut html = format!("<b>{}</b>", encode_text(&self.title));
        if !self.body.is_empty() {
            html.push_str("\n\n");
            html.push_str(&self.body);
        }
        if let Some(notice) = notice {
            html.push_str("\n\n<i>");
            html.push_str(&encode_text(notice));
            html.push_str("</i>");
        }
        html
    }
}

fn describe_query(query: &QueryParams) -> String {
    let mut line = format!(
        "🔗 {} · {}",
        encode_text(query.target_url()),
        query.vote_filter()
    );
    if let Some(username) = query.username() {
        line.push_str(&format!(" · @{}", encode_text(username)));
    }
    line
}

fn render_record(record: &VoteRecord) -> String {
    let icon = if record.score >= 0 { "👍" } else { "👎" };
    let mut line = format!(
        "{icon} <a href=\"{}\">{}</a>: {}",
        encode_double_quoted_attribute(&record.author_ref),
        encode_text(&record.author_name),
        record.score
    );
    if let Some(created_at) = record.created_at {
        line.push_str(&format!(" <i>({})</i>", created_at.format("%Y-%m-%d %H:%M")));
    }
    line
}

/// Render a listing page for `records`, numbered from `first_position` (zero-based).
#[must_use]
pub fn render_listing(
    query: &QueryParams,
    records: &[VoteRecord],
    first_position: u64,
    total_count: u64,
) -> Page {
    let from = first_position + 1;
    let to = first_position + records.len() as u64;
    let mut lines = vec![describe_query(query), String::new()];
    lines.extend(records.iter().map(render_record));

    Page {
        kind: PageKind::Listing,
        title: format!(
            "🗳 {} votes {from}–{to} of {total_count}",
            capitalize(query.resource().label())
        ),
        body: lines.join("\n"),
    }
}

/// Listing page for a batch that came back empty while the backend still
/// reported more votes further on.
#[must_use]
pub fn render_empty_batch(query: &QueryParams, batch_offset: u64, total_count: u64) -> Page {
    Page {
        kind: PageKind::Listing,
        title: format!(
            "🗳 {} votes after {batch_offset} of {total_count}",
            capitalize(query.resource().label())
        ),
        body: format!("{}\n\n<i>No votes in this batch.</i>", describe_query(query)),
    }
}

/// Render the aggregate summary of one batch.
#[must_use]
pub fn render_summary(
    query: &QueryParams,
    aggregate: &VoteAggregate,
    total_count: u64,
    batch_offset: u64,
    batch_len: usize,
) -> Page {
    let ratio = aggregate.upvote_ratio(total_count) * 100.0;
    let mut lines = vec![
        describe_query(query),
        String::new(),
        format!("Total votes: <b>{total_count}</b>"),
        format!("👍 Upvotes: {}", aggregate.upvotes),
        format!("👎 Downvotes: {}", aggregate.downvotes),
        format!("Score: {}", aggregate.total_score),
        format!("Upvote ratio: {ratio:.1}%"),
    ];
    if batch_len > 0 {
        lines.push(String::new());
        lines.push(format!(
            "<i>Batch covers votes {}–{}</i>",
            batch_offset + 1,
            batch_offset + batch_len as u64
        ));
    }

    Page {
        kind: PageKind::Summary,
        title: format!("📊 {} vote summary", capitalize(query.resource().label())),
        body: lines.join("\n"),
    }
}

/// Placeholder shown when the very first fetch returns no votes.
#[must_use]
pub fn render_empty(query: &QueryParams) -> Page {
    Page {
        kind: PageKind::Empty,
        title: query.target_url().to_string(),
        body: "Nothing to see here.".to_string(),
    }
}

/// Error page replacing the attempted content after a fatal failure.
#[must_use]
pub fn render_error(message: &str) -> Page {
    Page {
        kind: PageKind::Error,
        title: "❌ Could not load votes".to_string(),
        body: encode_text(message).into_owned(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
