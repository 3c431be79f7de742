use crate::error::{NotifyError, Result};
use crate::template::render;
use crate::NotificationChannel;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use webscore_common::types::NotificationEvent;

const SEND_ATTEMPTS: u32 = 3;

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailChannel {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> Result<Self> {
        if smtp_host.is_empty() {
            return Err(NotifyError::InvalidConfig("missing smtp_host".to_string()));
        }
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(smtp_port);

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox(from)?,
        })
    }

    fn build_message(&self, event: &NotificationEvent, recipient: &str) -> Result<Message> {
        let rendered = render(event);
        Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(recipient)?)
            .subject(rendered.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(rendered.body)
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, event: &NotificationEvent, recipient: &str) -> anyhow::Result<()> {
        let email = self.build_message(event, recipient)?;

        let mut last_err = None;
        for attempt in 0..SEND_ATTEMPTS {
            match self.transport.send(email.clone()).await {
                Ok(_) => {
                    tracing::info!(recipient, url = %event.url, kind = %event.kind, "Email sent");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        recipient,
                        error = %e,
                        "Email send failed, retrying"
                    );
                    last_err = Some(e);
                    if attempt + 1 < SEND_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            100 * 2u64.pow(attempt),
                        ))
                        .await;
                    }
                }
            }
        }

        let reason = last_err.map(|e| e.to_string()).unwrap_or_default();
        tracing::error!(recipient, error = %reason, "Email send failed after 3 attempts");
        Err(NotifyError::Smtp(reason).into())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
