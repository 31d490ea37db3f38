//! Email MIME parsing (§4.4, §6 `parse_email` contract).
//!
//! Uses `mail-parser`, a real single-purpose crate, rather than a
//! hand-rolled RFC 2822 reader — a focused dependency beats reimplementing
//! a well-specified format.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mail_parser::MessageParser;

use crate::error::Error;

/// One parsed address: a display name (if present) and the address itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub display_name: Option<String>,
    pub address: String,
}

/// Output of parsing one `.eml` message, per the §6 contract
/// (`headers, body, attachments[]`), flattened into the fields the email
/// analyzer actually needs.
#[derive(Debug, Clone, Default)]
pub struct ParsedEmail {
    pub from: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub subject: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub body: String,
    pub attachments: Vec<String>,
}

impl ParsedEmail {
    /// Renders the headers the analyzer cares about as a flat text block,
    /// handed to the AI prompt alongside the body (§4.4).
    pub fn headers_text(&self) -> String {
        let fmt_addrs = |addrs: &[EmailAddress]| {
            addrs
                .iter()
                .map(|a| match &a.display_name {
                    Some(name) => format!("{name} <{}>", a.address),
                    None => a.address.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "From: {}\nTo: {}\nCc: {}\nSubject: {}\nDate: {}",
            fmt_addrs(&self.from),
            fmt_addrs(&self.to),
            fmt_addrs(&self.cc),
            self.subject.clone().unwrap_or_default(),
            self.date.map(|d| d.to_rfc2822()).unwrap_or_default(),
        )
    }

    /// Total number of distinct recipients across to/cc/bcc, used by the
    /// email analyzer to size `participants` independent of the AI response.
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }
}

#[async_trait]
pub trait EmailParser: Send + Sync {
    async fn parse(&self, bytes: &[u8]) -> Result<ParsedEmail, Error>;
}

/// `mail-parser`-backed RFC 2822/MIME parser.
pub struct RfcEmailParser;

fn addresses_from(header: Option<&mail_parser::Address>) -> Vec<EmailAddress> {
    let Some(address) = header else { return Vec::new() };
    let mut out = Vec::new();
    collect_addresses(address, &mut out);
    out
}

fn collect_addresses(address: &mail_parser::Address, out: &mut Vec<EmailAddress>) {
    match address {
        mail_parser::Address::List(list) => {
            for addr in list {
                if let Some(email) = addr.address() {
                    out.push(EmailAddress {
                        display_name: addr.name().map(|n| n.to_string()),
                        address: email.to_string(),
                    });
                }
            }
        }
        mail_parser::Address::Group(groups) => {
            for group in groups {
                for addr in &group.addresses {
                    if let Some(email) = addr.address() {
                        out.push(EmailAddress {
                            display_name: addr.name().map(|n| n.to_string()),
                            address: email.to_string(),
                        });
                    }
                }
            }
        }
    }
}

#[async_trait]
impl EmailParser for RfcEmailParser {
    async fn parse(&self, bytes: &[u8]) -> Result<ParsedEmail, Error> {
        let message = MessageParser::default()
            .parse(bytes)
            .ok_or_else(|| Error::ExtractorUnsupported("not a parseable RFC 2822 message".to_string()))?;

        let date = message
            .date()
            .and_then(|d| DateTime::parse_from_rfc2822(&d.to_rfc822()).ok())
            .map(|d| d.with_timezone(&Utc));

        let references = header_value_texts(message.references());
        let in_reply_to = header_value_texts(message.in_reply_to()).into_iter().next();

        let attachments = message
            .attachments()
            .filter_map(|a| a.attachment_name().map(|n| n.to_string()))
            .collect();

        let body = message
            .body_text(0)
            .map(|c| c.to_string())
            .unwrap_or_default();

        Ok(ParsedEmail {
            from: addresses_from(message.from()),
            to: addresses_from(message.to()),
            cc: addresses_from(message.cc()),
            bcc: addresses_from(message.bcc()),
            subject: message.subject().map(str::to_string),
            date,
            message_id: message.message_id().map(str::to_string),
            in_reply_to,
            references,
            body,
            attachments,
        })
    }
}

/// `in_reply_to`/`references` headers may carry one or several message-ids;
/// `mail-parser` represents both shapes in one `HeaderValue`, so this
/// flattens either into a plain `Vec<String>`.
fn header_value_texts(value: &mail_parser::HeaderValue) -> Vec<String> {
    match value {
        mail_parser::HeaderValue::Text(t) => vec![t.to_string()],
        mail_parser::HeaderValue::TextList(list) => list.iter().map(|t| t.to_string()).collect(),
        _ => Vec::new(),
    }
}
