//! Outgoing mail through Graph `sendMail`
//!
//! Required permissions:
//! - Mail.Send (application), ideally scoped to the sender mailbox with an
//!   application access policy

use crate::error::{ReviewError, Result};
use crate::graph::GraphClient;
use crate::notify::{MailAttachment, Mailer, OutgoingMail};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMailRequest {
    message: GraphMessage,
    save_to_sent_items: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    subject: String,
    body: ItemBody,
    to_recipients: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc_recipients: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<FileAttachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody {
    content_type: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient {
    email_address: EmailAddress,
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileAttachment {
    #[serde(rename = "@odata.type")]
    odata_type: &'static str,
    name: String,
    content_type: String,
    content_bytes: String,
}

fn recipients(addresses: &[String]) -> Vec<Recipient> {
    addresses
        .iter()
        .map(|address| Recipient {
            email_address: EmailAddress {
                address: address.clone(),
            },
        })
        .collect()
}

fn attachment(file: &MailAttachment) -> FileAttachment {
    FileAttachment {
        odata_type: "#microsoft.graph.fileAttachment",
        name: file.file_name.clone(),
        content_type: file.content_type.clone(),
        content_bytes: general_purpose::STANDARD.encode(&file.content),
    }
}

/// Mailer that sends as `sender` via `POST /users/{sender}/sendMail`
pub struct GraphMailer {
    client: GraphClient,
    sender: String,
}

impl GraphMailer {
    pub fn new(client: GraphClient, sender: impl Into<String>) -> Self {
        Self {
            client,
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Mailer for GraphMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let request = SendMailRequest {
            message: GraphMessage {
                subject: mail.subject.clone(),
                body: ItemBody {
                    content_type: "HTML",
                    content: mail.html_body.clone(),
                },
                to_recipients: recipients(&mail.to),
                cc_recipients: recipients(&mail.cc),
                attachments: mail.attachments.iter().map(attachment).collect(),
            },
            save_to_sent_items: true,
        };

        self.client
            .post_no_content(&format!("users/{}/sendMail", self.sender), &request)
            .await
            .map_err(|e| ReviewError::SendFailure {
                recipient: mail.to.join(", "),
                reason: e.to_string(),
            })
    }
}
