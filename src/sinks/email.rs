//! Mails reports over SMTP.

use std::{fmt::Display, sync::Arc};

use futures::future::join_all;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};

use super::{Sink, SinkError, template::TemplateService};
use crate::{
    config::{EmailConfig, SmtpSecurity},
    models::Report,
};

/// A sink that sends one email per recipient and report, with an HTML body
/// and a plain-text alternative.
pub struct EmailSink<T> {
    transport: T,
    from: Mailbox,
    to: Vec<Mailbox>,
    template_service: Arc<TemplateService>,
}

impl EmailSink<AsyncSmtpTransport<Tokio1Executor>> {
    /// Creates a sink backed by an SMTP connection pool built from `config`.
    pub fn from_config(
        config: &EmailConfig,
        template_service: Arc<TemplateService>,
    ) -> Result<Self, SinkError> {
        let smtp = &config.smtp;
        let builder = match smtp.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host),
            SmtpSecurity::Starttls =>
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host),
            SmtpSecurity::None =>
                Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)),
        }
        .map_err(|e| SinkError::Config(format!("invalid SMTP relay '{}': {e}", smtp.host)))?;

        let mut builder = builder.timeout(Some(smtp.timeout));
        if let Some(port) = smtp.port {
            builder = builder.port(port);
        }
        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Self::new(builder.build(), &config.from, &config.to, template_service)
    }
}

impl<T> EmailSink<T>
where
    T: AsyncTransport + Send + Sync,
    T::Error: Display,
{
    /// Creates a sink on top of an existing transport.
    pub fn new(
        transport: T,
        from: &str,
        to: &[String],
        template_service: Arc<TemplateService>,
    ) -> Result<Self, SinkError> {
        let from = parse_mailbox(from)?;
        let to = to.iter().map(|address| parse_mailbox(address)).collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(SinkError::Config("email sink needs at least one recipient".to_string()));
        }
        Ok(Self { transport, from, to, template_service })
    }

    fn message(
        &self,
        to: &Mailbox,
        subject: &str,
        text: &str,
        html: &str,
    ) -> Result<Message, SinkError> {
        Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text.to_string(), html.to_string()))
            .map_err(|e| SinkError::Email(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SinkError> {
    address.parse().map_err(|e| SinkError::Config(format!("invalid email address '{address}': {e}")))
}

/// The subject line used for a report.
pub fn subject(report: &Report) -> String {
    format!("{} notification at {}", report.chain(), report.height())
}

#[async_trait::async_trait]
impl<T> Sink for EmailSink<T>
where
    T: AsyncTransport + Send + Sync,
    T::Ok: Send,
    T::Error: Display + Send,
{
    fn name(&self) -> &str {
        "email"
    }

    async fn deliver(&self, report: &Report) -> Result<(), SinkError> {
        let html = self.template_service.render_html(report)?;
        let text = self.template_service.render_text(report)?;
        let subject = subject(report);
        let messages = self
            .to
            .iter()
            .map(|to| self.message(to, &subject, &text, &html))
            .collect::<Result<Vec<_>, _>>()?;

        let results = join_all(messages.into_iter().map(|message| self.transport.send(message))).await;

        let failures: Vec<String> = results
            .into_iter()
            .zip(&self.to)
            .filter_map(|(result, to)| result.err().map(|e| format!("{to}: {e}")))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SinkError::Transport(failures.join("; ")))
        }
    }
}
