//! Spoke-to-transit attachment.

use super::client::Client;
use super::error::ApiError;

impl Client {
    pub async fn attach_spoke_to_transit(
        &self,
        spoke_gw: &str,
        transit_gw: &str,
    ) -> Result<(), ApiError> {
        self.post_api(
            "attach_spoke_to_transit_gw",
            &[
                ("spoke_gw", spoke_gw.to_string()),
                ("transit_gw", transit_gw.to_string()),
            ],
        )
        .await
    }

    /// Detaching a spoke that already left is not an error.
    pub async fn detach_spoke_from_transit(
        &self,
        spoke_gw: &str,
        transit_gw: &str,
    ) -> Result<(), ApiError> {
        self.post_api_allowing(
            "detach_spoke_from_transit_gw",
            &[
                ("spoke_gw", spoke_gw.to_string()),
                ("transit_gw", transit_gw.to_string()),
            ],
            &["has not joined to any transit"],
        )
        .await
    }

    /// The controller has no per-attachment query; the spoke's gateway detail
    /// carries the names of the transits it is joined to. `NotFound` when the
    /// spoke gateway itself is gone.
    pub async fn is_spoke_attached(
        &self,
        spoke_gw: &str,
        transit_gw: &str,
    ) -> Result<bool, ApiError> {
        let detail = self.get_gateway_info(spoke_gw).await?;
        Ok(detail
            .transit_gw_name
            .split(',')
            .any(|name| name.trim() == transit_gw))
    }
}
