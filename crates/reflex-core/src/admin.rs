//! Admin gate and campaign moderation.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{info, warn};

use crate::{
    api::types::{Campaign, Moderation},
    domain::UserId,
    errors::Error,
    ports::AdApi,
    Result,
};

pub const AUTO_APPROVE_COMMENT: &str = "Автоодобрение";

pub fn is_admin(user: Option<UserId>, admins: &[i64]) -> bool {
    user.is_some_and(|u| admins.contains(&u.0))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApprovalReport {
    pub pending: usize,
    pub approved: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub counts: BTreeMap<String, usize>,
    pub total: usize,
}

pub struct CampaignAdmin {
    ads: Arc<dyn AdApi>,
    token: Option<String>,
}

impl CampaignAdmin {
    pub fn new(ads: Arc<dyn AdApi>, token: Option<String>) -> Self {
        Self { ads, token }
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| Error::Config("ADMIN_API_TOKEN is not set".into()))
    }

    pub async fn pending_campaigns(&self) -> Result<Vec<Campaign>> {
        let campaigns = self.ads.admin_campaigns(self.token()?).await?;
        Ok(campaigns.into_iter().filter(Campaign::is_pending).collect())
    }

    /// Approve the given campaigns, continuing past individual failures.
    pub async fn approve(&self, campaigns: &[Campaign]) -> Result<ApprovalReport> {
        let token = self.token()?;
        let decision = Moderation::approve(AUTO_APPROVE_COMMENT);

        let mut report = ApprovalReport {
            pending: campaigns.len(),
            ..ApprovalReport::default()
        };
        for c in campaigns {
            match self.ads.moderate_campaign(token, &c.id, &decision).await {
                Ok(()) => report.approved += 1,
                Err(e) => {
                    warn!(campaign = %c.id, error = %e, "campaign approval failed");
                    report.failed += 1;
                }
            }
        }
        info!(
            pending = report.pending,
            approved = report.approved,
            "campaign approval finished"
        );
        Ok(report)
    }

    pub async fn approve_all(&self) -> Result<ApprovalReport> {
        let pending = self.pending_campaigns().await?;
        self.approve(&pending).await
    }

    pub async fn status_counts(&self) -> Result<StatusReport> {
        let campaigns = self.ads.admin_campaigns(self.token()?).await?;
        let mut report = StatusReport {
            total: campaigns.len(),
            ..StatusReport::default()
        };
        for c in campaigns {
            *report.counts.entry(c.status).or_default() += 1;
        }
        Ok(report)
    }
}
