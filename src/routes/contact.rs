/**
 * Contact Routes
 * Relays contact-form submissions through the Resend transactional-email API:
 * a notification to the site owner plus a confirmation to the sender
 */
use ammonia::clean;
use axum::{http::StatusCode, response::IntoResponse, Json};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::MailConfig;
use crate::routes::ErrorResponse;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ContactResponse {
    pub message: String,
}

// ============================================================================
// Email bodies
// ============================================================================

/// Form values are untrusted text dropped into HTML. `ammonia::clean` strips
/// markup and entity-encodes the rest but leaves whitespace alone, so the
/// message's newlines survive to become `<br>` below.
fn sanitize(value: &str) -> String {
    clean(value)
}

fn notification_html(name: &str, email: &str, message: &str) -> String {
    let message_html = sanitize(message).replace('\n', "<br>");
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h2 style="color: #3b82f6; border-bottom: 2px solid #3b82f6; padding-bottom: 10px;">
    New Contact Form Submission
  </h2>
  <div style="background-color: #f8fafc; padding: 20px; border-radius: 8px; margin: 20px 0;">
    <p><strong>Name:</strong> {}</p>
    <p><strong>Email:</strong> {}</p>
    <p><strong>Message:</strong></p>
    <div style="background-color: white; padding: 15px; border-radius: 4px; margin-top: 10px;">
      {}
    </div>
  </div>
  <p style="color: #6b7280; font-size: 14px; margin-top: 20px;">
    This message was sent from your portfolio contact form at {}.
  </p>
</div>"#,
        sanitize(name),
        sanitize(email),
        message_html,
        chrono::Utc::now().to_rfc2822()
    )
}

fn confirmation_html(name: &str, message: &str, artist_name: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h2 style="color: #3b82f6; text-align: center;">
    Thank You for Your Message!
  </h2>
  <div style="background-color: #f8fafc; padding: 20px; border-radius: 8px; margin: 20px 0;">
    <p>Hi {},</p>
    <p>Thank you for reaching out through my portfolio contact form. I've received your message and will get back to you as soon as possible.</p>
    <div style="background-color: white; padding: 15px; border-radius: 4px; margin: 15px 0; border-left: 4px solid #3b82f6;">
      <p style="margin: 0; font-style: italic;">"{}"</p>
    </div>
    <p>I appreciate your interest in my work and look forward to connecting with you!</p>
  </div>
  <div style="text-align: center; margin-top: 30px; padding-top: 20px; border-top: 1px solid #e5e7eb;">
    <p style="color: #6b7280; font-size: 14px; margin: 0;">
      Best regards,<br>
      {}
    </p>
  </div>
</div>"#,
        sanitize(name),
        sanitize(message),
        sanitize(artist_name)
    )
}

async fn send_email(
    config: &MailConfig,
    to: &str,
    subject: &str,
    html: &str,
) -> Result<(), reqwest::Error> {
    let response = HTTP_CLIENT
        .post(RESEND_ENDPOINT)
        .bearer_auth(&config.api_key)
        .json(&json!({
            "from": config.from_email,
            "to": [to],
            "subject": subject,
            "html": html,
        }))
        .send()
        .await?;
    response.error_for_status()?;
    Ok(())
}

// ============================================================================
// Handler
// ============================================================================

/// POST /api/contact
/// Sends the owner notification first, then the sender confirmation; both
/// must succeed for the submission to count.
pub async fn submit_contact(Json(payload): Json<ContactRequest>) -> impl IntoResponse {
    let name = payload.name.trim();
    let email = payload.email.trim();
    let message = payload.message.trim();

    if name.is_empty() || email.is_empty() || message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Missing required fields".to_string(),
                message: None,
            }),
        )
            .into_response();
    }

    if !email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid email address".to_string(),
                message: None,
            }),
        )
            .into_response();
    }

    let config = MailConfig::from_env();
    if !config.is_configured() {
        tracing::error!("Missing Resend configuration");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Email service not configured".to_string(),
                message: None,
            }),
        )
            .into_response();
    }

    let notification = send_email(
        &config,
        &config.to_email,
        &format!("New Contact Form Submission from {}", name),
        &notification_html(name, email, message),
    )
    .await;

    let confirmation = match notification {
        Ok(()) => {
            send_email(
                &config,
                email,
                &format!("Thank you for contacting {}!", config.artist_name),
                &confirmation_html(name, message, &config.artist_name),
            )
            .await
        }
        Err(e) => Err(e),
    };

    match confirmation {
        Ok(()) => {
            tracing::info!(sender = %email, "contact form relayed");
            (
                StatusCode::OK,
                Json(ContactResponse {
                    message: "Contact form submitted successfully".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Contact form error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to send email. Please try again later.".to_string(),
                    message: None,
                }),
            )
                .into_response()
        }
    }
}
