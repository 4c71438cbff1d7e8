//! Delivery collaborator: transmits the raw magic-link secret out of band.
//!
//! The core only builds the redemption URL; everything past the trait seam
//! is outside the credential lifecycle.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::error::AccessError;

#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    async fn send_magic_link(
        &self,
        to_email: &str,
        redemption_url: &str,
        subject_name: &str,
    ) -> Result<(), AccessError>;
}

#[derive(Clone)]
pub struct SmtpDelivery {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpDelivery {
    pub fn new(config: &SmtpConfig) -> Result<Self, AccessError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AccessError::DeliveryError(e.to_string()))?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Delivery service initialized with SMTP");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
        })
    }
}

#[async_trait]
impl DeliveryProvider for SmtpDelivery {
    async fn send_magic_link(
        &self,
        to_email: &str,
        redemption_url: &str,
        subject_name: &str,
    ) -> Result<(), AccessError> {
        let html_body = format!(
            r###"            <html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Hello {}, your access link is ready</h2>
                    <p>Use the button below to open your secure space. The link works once and expires after 24 hours.</p>
                    <p>
                        <a href="{}" style="background-color: #4CAF50; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                            Open my space
                        </a>
                    </p>
                    <p style="color: #666; font-size: 12px;">
                        If you weren't expecting this invitation, you can ignore this email.
                    </p>
                </body>
            </html>
            "###,
            subject_name, redemption_url
        );

        let plain_body = format!(
            "Hello {},\n\nYour access link is ready. Open the following link to enter your secure space:\n\n{}\n\nThe link works once and expires after 24 hours. If you weren't expecting this invitation, you can ignore this email.",
            subject_name, redemption_url
        );

        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| {
                        AccessError::DeliveryError(e.to_string())
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| {
                    AccessError::DeliveryError(e.to_string())
                })?)
            .subject("Your secure access link")
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        // Send in the blocking pool to keep the async runtime free.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AccessError::DeliveryError(e.to_string()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, "Magic link email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e.to_string(), to = %to_email, "Failed to send magic link email");
                Err(AccessError::DeliveryError(e.to_string()))
            }
        }
    }
}

#[derive(Clone)]
pub struct MockDelivery;

#[async_trait]
impl DeliveryProvider for MockDelivery {
    async fn send_magic_link(
        &self,
        _to_email: &str,
        _redemption_url: &str,
        _subject_name: &str,
    ) -> Result<(), AccessError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_delivery_creation() {
        let config = SmtpConfig {
            host: "smtp.gmail.com".to_string(),
            user: "test@gmail.com".to_string(),
            password: "test_password".to_string(),
            from_email: "test@gmail.com".to_string(),
        };

        let delivery = SmtpDelivery::new(&config);
        assert!(delivery.is_ok());
    }
}
