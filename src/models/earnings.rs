use serde::{Deserialize, Serialize};

use super::platform::SocialPlatform;
use super::transactions::TransactionStatus;

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountSaleRequest {
    /// Credentials of an existing account, reviewed by an admin.
    Sale {
        platform: SocialPlatform,
        credentials: Vec<String>,
    },
    /// Ask the admin for a Gmail account to set up.
    GmailRequest,
}

impl SocialPlatform {
    /// Prefix of the `details` line recorded for a sale.
    pub fn sale_tag(&self) -> &'static str {
        match self {
            SocialPlatform::Gmail => "Gmail",
            SocialPlatform::Facebook => "FB",
            SocialPlatform::Instagram => "Insta",
            SocialPlatform::Tiktok => "TikTok",
        }
    }

    /// Number of credential fields the sale form collects.
    pub fn credential_fields(&self) -> usize {
        match self {
            SocialPlatform::Gmail => 2,
            _ => 4,
        }
    }
}

/// One move in the Gmail request negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NegotiationStep {
    SendCredentials,
    RequestRecovery,
    SendRecovery,
    MarkDone,
}

impl NegotiationStep {
    /// State the request must be in, and the state the step moves it to.
    pub fn transition(&self) -> (TransactionStatus, TransactionStatus) {
        match self {
            NegotiationStep::SendCredentials => {
                (TransactionStatus::PendingCreds, TransactionStatus::Working)
            }
            NegotiationStep::RequestRecovery => {
                (TransactionStatus::Working, TransactionStatus::PendingRecovery)
            }
            NegotiationStep::SendRecovery => {
                (TransactionStatus::PendingRecovery, TransactionStatus::Finalizing)
            }
            NegotiationStep::MarkDone => (TransactionStatus::Finalizing, TransactionStatus::Review),
        }
    }

    pub fn is_admin_step(&self) -> bool {
        matches!(
            self,
            NegotiationStep::SendCredentials | NegotiationStep::SendRecovery
        )
    }
}

impl std::str::FromStr for NegotiationStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send_credentials" | "send-credentials" => Ok(NegotiationStep::SendCredentials),
            "request_recovery" | "request-recovery" => Ok(NegotiationStep::RequestRecovery),
            "send_recovery" | "send-recovery" => Ok(NegotiationStep::SendRecovery),
            "mark_done" | "mark-done" => Ok(NegotiationStep::MarkDone),
            other => Err(format!("Unknown negotiation step: {}", other)),
        }
    }
}

/// Fields an admin hands over during the negotiation. Stored merged into the
/// request's JSON `details`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GmailDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_pass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_recovery: Option<String>,
}

impl GmailDetails {
    /// Names of the fields `step` needs that are missing or blank.
    pub fn missing_for(&self, step: NegotiationStep) -> Vec<&'static str> {
        let blank = |value: &Option<String>| value.as_deref().map_or(true, |v| v.trim().is_empty());

        let required: Vec<(&'static str, &Option<String>)> = match step {
            NegotiationStep::SendCredentials => vec![
                ("firstName", &self.first_name),
                ("lastName", &self.last_name),
                ("adminEmail", &self.admin_email),
                ("adminPass", &self.admin_pass),
            ],
            NegotiationStep::SendRecovery => vec![("adminRecovery", &self.admin_recovery)],
            NegotiationStep::RequestRecovery | NegotiationStep::MarkDone => Vec::new(),
        };

        required
            .into_iter()
            .filter(|(_, value)| blank(value))
            .map(|(name, _)| name)
            .collect()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TypingSubmission {
    pub typed_text: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuizAnswer {
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("send-credentials", NegotiationStep::SendCredentials)]
    #[case("request_recovery", NegotiationStep::RequestRecovery)]
    #[case("mark-done", NegotiationStep::MarkDone)]
    fn parses_step_segment(#[case] segment: &str, #[case] step: NegotiationStep) {
        assert_eq!(segment.parse::<NegotiationStep>(), Ok(step));
    }

    #[test]
    fn steps_follow_the_negotiation_chain() {
        for step in [
            NegotiationStep::SendCredentials,
            NegotiationStep::RequestRecovery,
            NegotiationStep::SendRecovery,
            NegotiationStep::MarkDone,
        ] {
            let (from, to) = step.transition();
            assert!(from.can_transition_to(to));
        }
    }

    #[test]
    fn credentials_step_needs_all_fields() {
        let details: GmailDetails =
            serde_json::from_value(json!({"firstName": "A", "adminEmail": " "})).unwrap();

        assert_eq!(
            details.missing_for(NegotiationStep::SendCredentials),
            vec!["lastName", "adminEmail", "adminPass"]
        );
        assert!(details.missing_for(NegotiationStep::MarkDone).is_empty());
    }

    #[test]
    fn sale_request_is_tagged_by_kind() {
        let request: AccountSaleRequest = serde_json::from_value(json!({
            "kind": "sale",
            "platform": "facebook",
            "credentials": ["mail", "pass", "2fa", "uid"]
        }))
        .unwrap();

        assert!(matches!(
            request,
            AccountSaleRequest::Sale { platform: SocialPlatform::Facebook, .. }
        ));
    }
}
