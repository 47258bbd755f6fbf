use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    #[default]
    Active,
    Inactive,
    Cancelled,
}

impl FromStr for SubscriberStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for SubscriberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscriber {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    #[serde(skip_serializing)]
    pub confirmation_code: Option<String>,
    pub confirmed: bool,
    pub status: SubscriberStatus,
    pub created_at: Option<String>,
    pub last_sent: Option<String>,
    pub total_sent: i64,
}

/// What a subscribe request did.
#[derive(Debug, Clone)]
pub enum Subscription {
    /// New or still unconfirmed; a fresh confirmation code was issued.
    Pending(Subscriber),
    /// Previously cancelled and now awaiting confirmation again.
    Reactivated(Subscriber),
    AlreadySubscribed,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriberFilter {
    pub status: Option<SubscriberStatus>,
    pub confirmed: Option<bool>,
    pub q: Option<String>,
}
