//! File-based service discovery document listing every organization.

use std::collections::BTreeMap;

use meraki_dashboard::DashboardClient;
use meraki_dashboard::models::Organization;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Content type of [`list_targets`]'s output.
pub const CONTENT_TYPE: &str = "text/yaml; charset=utf-8";

/// Errors listing organizations.
#[derive(Debug, Error)]
pub enum TargetsError {
    #[error("credential cannot list organizations: {0}")]
    Unauthorized(#[source] meraki_dashboard::Error),
    #[error("failed to list organizations: {0}")]
    Upstream(#[source] meraki_dashboard::Error),
    #[error("failed to render targets: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl From<meraki_dashboard::Error> for TargetsError {
    fn from(e: meraki_dashboard::Error) -> Self {
        if e.is_auth_failure() {
            TargetsError::Unauthorized(e)
        } else {
            TargetsError::Upstream(e)
        }
    }
}

/// One service discovery entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

impl TargetGroup {
    fn from_organization(org: &Organization) -> Self {
        Self {
            targets: vec![org.id.clone()],
            labels: BTreeMap::from([("org_name".to_string(), org.display_name().to_string())]),
        }
    }
}

/// Render organizations with API access as a YAML target list, in upstream order.
pub fn render_targets(organizations: &[Organization]) -> Result<String, serde_yaml::Error> {
    let groups: Vec<TargetGroup> = organizations
        .iter()
        .filter(|org| org.api_enabled())
        .map(TargetGroup::from_organization)
        .collect();
    serde_yaml::to_string(&groups)
}

/// List every organization the credential can access.
pub async fn list_targets(client: &DashboardClient) -> Result<String, TargetsError> {
    let organizations = client.get_organizations().await?;
    debug!(organizations = organizations.len(), "Listed organizations");
    Ok(render_targets(&organizations)?)
}
