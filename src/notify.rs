//! Mail delivery seam
//!
//! Send-only. A failed send comes back as an error; nothing here retries.

use crate::error::Result;
use crate::review::compose::NotificationMessage;
use async_trait::async_trait;
use colored::Colorize;

/// File attached to an outgoing mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A mail ready for delivery; the body is always HTML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<MailAttachment>,
}

impl From<NotificationMessage> for OutgoingMail {
    fn from(message: NotificationMessage) -> Self {
        Self {
            to: message.to,
            cc: message.cc,
            subject: message.subject,
            html_body: message.html_body,
            attachments: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Prints mails to the terminal instead of sending them
#[derive(Debug, Default)]
pub struct ConsoleMailer {
    pub show_body: bool,
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        println!("{} {}", "✉".cyan(), mail.subject.bold());
        println!("  To: {}", mail.to.join(", "));
        if !mail.cc.is_empty() {
            println!("  Cc: {}", mail.cc.join(", "));
        }
        for attachment in &mail.attachments {
            println!(
                "  Attachment: {} ({} bytes)",
                attachment.file_name,
                attachment.content.len()
            );
        }
        if self.show_body {
            println!("{}", mail.html_body.dimmed());
        }
        Ok(())
    }
}
