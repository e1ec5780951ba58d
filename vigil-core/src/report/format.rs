use chrono::{DateTime, Utc};

use super::ReportKind;
use crate::models::{DomainStatus, DomainTarget, WebsiteStatus, WebsiteTarget};
use crate::notify::{escape_html, format_timestamp};
use crate::status::SslWarningLevel;

const DETAILS_HEADER: &str = "<b>Needs attention</b>\n\n";
const CONTINUED_HEADER: &str = "<b>Needs attention (continued)</b>\n\n";

/// Smallest chunk limit that still leaves room for a header and some text.
pub const MIN_CHUNK_LIMIT: usize = CONTINUED_HEADER.len() + 64;

/// Room kept back when clipping for closing tags and the ellipsis.
const CLIP_RESERVE: usize = 16;
const CLOSABLE_TAGS: &[&str] = &["b", "i", "code"];

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Shorten `text` to at most `max_chars` without leaving a cut entity, a
/// half-written tag or an unclosed tag behind.
fn clip(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(CLIP_RESERVE)).collect();

    if let Some(pos) = out.rfind(|c| c == '&' || c == '<') {
        if !out[pos..].contains(|c| c == ';' || c == '>') {
            out.truncate(pos);
        }
    }
    for tag in CLOSABLE_TAGS.iter().rev() {
        let opened = out.matches(&format!("<{}>", tag)).count();
        let closed = out.matches(&format!("</{}>", tag)).count();
        for _ in closed..opened {
            out.push_str(&format!("</{}>", tag));
        }
    }
    out.push_str("…\n");
    out
}

/// Pack `blocks` into messages of at most `limit` characters. The first
/// message opens with `header`, later ones with `continued`. A block is
/// never split across messages; one that could not fit even an empty
/// message is clipped.
pub fn chunk_blocks(header: &str, continued: &str, blocks: &[String], limit: usize) -> Vec<String> {
    let room = limit.saturating_sub(char_len(header).max(char_len(continued)));
    let mut messages = Vec::new();
    let mut buffer = header.to_string();
    let mut buffer_len = char_len(header);
    let mut holds_blocks = false;

    for block in blocks {
        let block = clip(block, room);
        let block_len = char_len(&block);
        if holds_blocks && buffer_len + block_len > limit {
            messages.push(buffer.trim_end().to_string());
            buffer = continued.to_string();
            buffer_len = char_len(continued);
        }
        buffer.push_str(&block);
        buffer_len += block_len;
        holds_blocks = true;
    }

    if holds_blocks {
        messages.push(buffer.trim_end().to_string());
    }
    messages
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct WebsiteCounts {
    total: usize,
    online: usize,
    offline: usize,
    error: usize,
    unchecked: usize,
}

impl WebsiteCounts {
    fn of(websites: &[WebsiteTarget]) -> Self {
        let mut counts = Self {
            total: websites.len(),
            ..Self::default()
        };
        for target in websites {
            match target.latest.as_ref().map(|c| c.result.status) {
                Some(WebsiteStatus::Online) => counts.online += 1,
                Some(WebsiteStatus::Offline) => counts.offline += 1,
                Some(WebsiteStatus::Error) => counts.error += 1,
                None => counts.unchecked += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct DomainCounts {
    total: usize,
    active: usize,
    expiring: usize,
    expired: usize,
    error: usize,
    unchecked: usize,
}

impl DomainCounts {
    fn of(domains: &[DomainTarget]) -> Self {
        let mut counts = Self {
            total: domains.len(),
            ..Self::default()
        };
        for target in domains {
            match target.latest.as_ref().map(|c| c.result.status) {
                Some(DomainStatus::Active) => counts.active += 1,
                Some(DomainStatus::ExpiringSoon) => counts.expiring += 1,
                Some(DomainStatus::Expired) => counts.expired += 1,
                Some(DomainStatus::Error) => counts.error += 1,
                None => counts.unchecked += 1,
            }
        }
        counts
    }
}

fn summary_message(
    kind: ReportKind,
    websites: &[WebsiteTarget],
    domains: &[DomainTarget],
    now: DateTime<Utc>,
) -> String {
    let mut text = format!("📊 <b>{}</b>\n{}", kind.title(), format_timestamp(now));

    if kind.includes_websites() {
        let c = WebsiteCounts::of(websites);
        text.push_str(&format!(
            "\n\n<b>Websites:</b> {}\n🟢 Online: {}\n🔴 Offline: {}\n⚠️ Error: {}",
            c.total, c.online, c.offline, c.error
        ));
        if c.unchecked > 0 {
            text.push_str(&format!("\n⚪ Not checked yet: {}", c.unchecked));
        }
    }

    if kind.includes_domains() {
        let c = DomainCounts::of(domains);
        text.push_str(&format!(
            "\n\n<b>Domains:</b> {}\n✅ Active: {}\n⏳ Expiring soon: {}\n❌ Expired: {}\n⚠️ Error: {}",
            c.total, c.active, c.expiring, c.expired, c.error
        ));
        if c.unchecked > 0 {
            text.push_str(&format!("\n⚪ Not checked yet: {}", c.unchecked));
        }
    }
    text
}

fn website_block(target: &WebsiteTarget) -> Option<String> {
    let check = target.latest.as_ref()?;
    let icon = match check.result.status {
        WebsiteStatus::Online => return None,
        WebsiteStatus::Offline => "🔴",
        WebsiteStatus::Error => "⚠️",
    };

    let mut block = format!(
        "{} <b>{}</b>\n{}\nStatus: {}",
        icon,
        escape_html(&target.website.name),
        escape_html(&target.website.url),
        check.result.status,
    );
    if let Some(error) = &check.result.error_message {
        block.push_str(&format!(" ({})", escape_html(error)));
    }
    block.push_str(&format!("\nChecked: {}", format_timestamp(check.checked_at)));

    if let Some(days) = check.result.ssl_days_left {
        if let Some(level) = SslWarningLevel::for_days_left(days) {
            block.push_str(&format!(
                "\nSSL: expires in {} days ({})",
                days,
                level.label()
            ));
        }
    }
    block.push_str("\n\n");
    Some(block)
}

fn domain_block(target: &DomainTarget) -> Option<String> {
    let check = target.latest.as_ref()?;
    let icon = match check.result.status {
        DomainStatus::Active => return None,
        DomainStatus::ExpiringSoon => "⏳",
        DomainStatus::Expired => "❌",
        DomainStatus::Error => "⚠️",
    };

    let mut block = format!(
        "{} <b>{}</b> ({})\nStatus: {}",
        icon,
        escape_html(&target.domain.name),
        escape_html(&target.domain.domain),
        check.result.status,
    );
    if let Some(days) = check.result.days_left {
        block.push_str(&format!("\nDays left: {}", days));
    }
    if let Some(expires_at) = check.result.expires_at {
        block.push_str(&format!("\nExpires: {}", expires_at.format("%Y-%m-%d")));
    }
    if let Some(error) = &check.result.error_message {
        block.push_str(&format!("\nError: {}", escape_html(error)));
    }
    block.push_str("\n\n");
    Some(block)
}

/// Detail blocks for unhealthy targets, most severe first.
fn detail_blocks(kind: ReportKind, websites: &[WebsiteTarget], domains: &[DomainTarget]) -> Vec<String> {
    let mut blocks = Vec::new();

    if kind.includes_websites() {
        let mut unhealthy: Vec<&WebsiteTarget> = websites
            .iter()
            .filter(|t| t.latest.as_ref().is_some_and(|c| !c.result.status.is_healthy()))
            .collect();
        unhealthy.sort_by_key(|t| {
            let status = t.latest.as_ref().map(|c| c.result.status);
            (status != Some(WebsiteStatus::Offline), t.website.name.to_lowercase())
        });
        blocks.extend(unhealthy.into_iter().filter_map(website_block));
    }

    if kind.includes_domains() {
        let mut unhealthy: Vec<&DomainTarget> = domains
            .iter()
            .filter(|t| t.latest.as_ref().is_some_and(|c| !c.result.status.is_healthy()))
            .collect();
        unhealthy.sort_by_key(|t| {
            let check = t.latest.as_ref();
            (
                check.map_or(u8::MAX, |c| c.result.status.severity_rank()),
                check.and_then(|c| c.result.days_left).unwrap_or(i64::MAX),
                t.domain.domain.clone(),
            )
        });
        blocks.extend(unhealthy.into_iter().filter_map(domain_block));
    }

    blocks
}

/// Render a report as one or more messages of at most `limit` characters.
///
/// The first message is always the summary. It is followed either by a
/// single all-clear message or by the chunked details of unhealthy targets.
pub fn build_report(
    kind: ReportKind,
    websites: &[WebsiteTarget],
    domains: &[DomainTarget],
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<String> {
    let mut messages = vec![summary_message(kind, websites, domains, now)];

    let watched = (if kind.includes_websites() { websites.len() } else { 0 })
        + (if kind.includes_domains() { domains.len() } else { 0 });
    if watched == 0 {
        messages[0].push_str("\n\nNothing is being monitored yet.");
        return messages;
    }

    let blocks = detail_blocks(kind, websites, domains);
    if blocks.is_empty() {
        messages.push(format!("✅ All {} monitored targets are healthy.", watched));
    } else {
        messages.extend(chunk_blocks(DETAILS_HEADER, CONTINUED_HEADER, &blocks, limit));
    }
    messages
}
