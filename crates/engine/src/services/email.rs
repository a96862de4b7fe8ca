//! SMTP notification sink.
//!
//! Plain-text transactional mail via lettre. Template rendering lives in
//! the marketing stack; the engine only sends short operational notices.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    transport::smtp::authentication::Credentials,
};
use secrecy::ExposeSecret;

use crate::config::EmailConfig;

use super::notify::{Notification, NotificationSink, NotifyError};

/// Notification sink delivering over SMTP.
#[derive(Clone)]
pub struct EmailSink {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailSink {
    /// Create a new SMTP sink from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError(e.to_string()))?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    fn render(notification: &Notification) -> (String, String, String) {
        match notification {
            Notification::OrderConfirmation { email, order_id } => (
                email.clone(),
                "Votre commande Terroir est confirmée".to_string(),
                format!(
                    "Bonjour,\n\nVotre commande ({order_id}) est confirmée et part \
                     bientôt en préparation.\n\nMerci,\nTerroir"
                ),
            ),
            Notification::OrderShipped {
                email,
                order_id,
                tracking_url,
            } => {
                let tracking = tracking_url.as_ref().map_or_else(String::new, |url| {
                    format!("\n\nSuivre le colis : {url}")
                });
                (
                    email.clone(),
                    "Votre commande Terroir est en route".to_string(),
                    format!(
                        "Bonjour,\n\nVotre commande ({order_id}) vient d'être \
                         expédiée.{tracking}\n\nMerci,\nTerroir"
                    ),
                )
            }
        }
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let (to, subject, body) = Self::render(notification);

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| NotifyError(format!("invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| NotifyError(format!("invalid recipient: {e}")))?)
            .subject(subject)
            .body(body)
            .map_err(|e| NotifyError(e.to_string()))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| NotifyError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_shipped_body_includes_tracking_when_present() {
        let (_, _, body) = EmailSink::render(&Notification::OrderShipped {
            email: "claire@example.fr".to_string(),
            order_id: Uuid::new_v4(),
            tracking_url: Some("https://track.boxtal.com/6A1".to_string()),
        });
        assert!(body.contains("https://track.boxtal.com/6A1"));

        let (_, _, without) = EmailSink::render(&Notification::OrderShipped {
            email: "claire@example.fr".to_string(),
            order_id: Uuid::new_v4(),
            tracking_url: None,
        });
        assert!(!without.contains("Suivre le colis"));
    }

    #[test]
    fn test_confirmation_addresses_the_customer() {
        let (to, subject, _) = EmailSink::render(&Notification::OrderConfirmation {
            email: "claire@example.fr".to_string(),
            order_id: Uuid::new_v4(),
        });
        assert_eq!(to, "claire@example.fr");
        assert!(subject.contains("confirmée"));
    }
}
