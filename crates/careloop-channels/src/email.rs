//! Transactional email over SMTP with STARTTLS (async lettre).

use chrono::NaiveDateTime;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use careloop_core::config::MailConfig;
use careloop_core::error::{CareloopError, Result};

/// Plain-text mail sender.
pub struct Mailer {
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    pub fn from_address(&self) -> &str {
        &self.config.address
    }

    pub fn smtp_host(&self) -> &str {
        &self.config.smtp_host
    }

    async fn send_plain(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let from: Mailbox = self
            .config
            .address
            .parse()
            .map_err(|e| CareloopError::Mail(format!("invalid from address: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| CareloopError::Mail(format!("invalid to address: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| CareloopError::Mail(format!("build message: {e}")))?;

        let credentials = Credentials::new(
            self.config.address.clone(),
            self.config.password.clone(),
        );
        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| CareloopError::Mail(format!("SMTP relay: {e}")))?
                .port(self.config.smtp_port)
                .credentials(credentials)
                .build();

        transport
            .send(message)
            .await
            .map_err(|e| CareloopError::Mail(format!("SMTP send: {e}")))?;
        Ok(())
    }

    /// Send the meeting-details notice to a patient.
    pub async fn send_meeting_notice(
        &self,
        patient_name: &str,
        to: &str,
        meeting_dt: NaiveDateTime,
        meet_link: &str,
    ) -> Result<()> {
        let subject = format!("Health Consultation Meeting Scheduled - {patient_name}");
        let body = meeting_body(patient_name, meeting_dt, meet_link, &self.config.address);
        self.send_plain(to, &subject, body).await?;
        tracing::info!("Meeting email sent to {to}");
        Ok(())
    }

    /// Send a diagnostic message to the configured address itself.
    pub async fn send_self_test(&self) -> Result<()> {
        let body = format!(
            "This is a test email from the Careloop system.\n\n\
             If you receive this, your email configuration is working correctly!\n\n\
             Email settings:\n\
             - SMTP Server: {}\n\
             - From: {}\n\n\
             Test successful!\n",
            self.config.smtp_host, self.config.address
        );
        let to = self.config.address.clone();
        self.send_plain(&to, "Careloop - Email Test", body).await
    }
}

fn format_meeting_datetime(dt: NaiveDateTime) -> String {
    dt.format("%B %d, %Y at %I:%M %p").to_string()
}

fn meeting_id(meet_link: &str) -> &str {
    meet_link.rsplit('/').next().unwrap_or_default()
}

fn meeting_body(
    patient_name: &str,
    meeting_dt: NaiveDateTime,
    meet_link: &str,
    contact: &str,
) -> String {
    format!(
        "Dear {patient_name},\n\n\
         Your health consultation meeting has been scheduled successfully!\n\n\
         Meeting Details:\n\
         📅 Date & Time: {when} (IST)\n\
         ⏱️ Duration: 1 hour\n\
         🏥 Type: Health Consultation\n\n\
         Join the meeting using this link:\n\
         🔗 {meet_link}\n\n\
         Meeting ID: {id}\n\n\
         How to Join:\n\
         • Click the meeting link above\n\
         • Or go to meet.google.com and enter the Meeting ID\n\
         • Join 5 minutes before the scheduled time\n\n\
         Important Notes:\n\
         • Ensure you have a stable internet connection\n\
         • Keep your medical records ready for discussion\n\
         • Test your camera and microphone beforehand\n\
         • If you face any technical issues, contact us immediately\n\n\
         Preparation for the Meeting:\n\
         • Have your medical history ready\n\
         • List of current medications\n\
         • Any specific questions or concerns\n\
         • A quiet, well-lit space for the video call\n\n\
         If you need to reschedule or have any questions, please contact us at {contact}\n\n\
         Best regards,\n\
         Health Care Team\n\
         Careloop\n\n\
         ---\n\
         This is an automated message. Please do not reply to this email.\n\
         If you need immediate assistance, contact our support team.\n",
        when = format_meeting_datetime(meeting_dt),
        id = meeting_id(meet_link),
    )
}
