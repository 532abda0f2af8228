//! Subscription CRUD against the registry.
//!
//! The primary methods return typed errors so callers can tell a
//! failed request from an empty result; the `*_or_empty` / `*_ok`
//! variants reproduce the historical collapsed contract (empty list or
//! `false` on any failure).

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::config::GarConfig;
use crate::error::{GarError, Result};
use crate::transport::{Method, Transport};
use crate::types::{Assignment, CreatableSubscription, Resource, Subscription, SubscriptionFilter};
use crate::xml::translate::{
    parse_subscription_list, parse_subscription_nodes, patch_subscription_dates, serialize_create,
    serialize_filter,
};

const SUBSCRIPTIONS_PATH: &str = "/abonnements";

pub struct SubscriptionApi {
    transport: Arc<dyn Transport>,
    config: Arc<GarConfig>,
}

impl SubscriptionApi {
    pub(crate) fn new(transport: Arc<dyn Transport>, config: Arc<GarConfig>) -> Self {
        Self { transport, config }
    }

    /// Query subscriptions matching the filter.
    ///
    /// When the filter carries a `resource_id`, results are re-filtered
    /// client-side by exact resource-id match: the server interprets
    /// `codeProjetRessource` as a project-code filter, which is wider
    /// than the caller's intent.
    pub async fn query(&self, filter: &SubscriptionFilter) -> Result<Vec<Subscription>> {
        let body = serialize_filter(filter);
        let url = self.config.endpoint(SUBSCRIPTIONS_PATH);
        let response = self
            .transport
            .request(Method::Post, &url, Some(body.into_bytes()))
            .await?;

        if !response.is_status(200) {
            return Err(GarError::TransportStatus {
                status: response.status,
                url,
            });
        }

        let mut subscriptions = parse_subscription_list(&response.body)?;
        if let Some(resource_id) = filter.resource_id.as_deref() {
            subscriptions.retain(|s| s.resource_id == resource_id);
        }
        Ok(subscriptions)
    }

    /// Legacy contract: any failure collapses to an empty list.
    pub async fn query_or_empty(&self, filter: &SubscriptionFilter) -> Vec<Subscription> {
        match self.query(filter).await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                tracing::warn!(error = %e, "subscription query failed, returning empty list");
                Vec::new()
            }
        }
    }

    /// Register a subscription. Success iff the server answers 201.
    pub async fn create(
        &self,
        subscription: &dyn CreatableSubscription,
        resource: &Resource,
        assignment: &Assignment,
    ) -> Result<()> {
        let body = serialize_create(
            subscription,
            resource,
            assignment,
            &self.config.distributor_id,
        )?;
        let url = self
            .config
            .endpoint(&format!("/{}", subscription.subscription_id()));
        let response = self
            .transport
            .request(Method::Put, &url, Some(body.into_bytes()))
            .await?;

        if response.is_status(201) {
            Ok(())
        } else {
            Err(GarError::TransportStatus {
                status: response.status,
                url,
            })
        }
    }

    /// Legacy contract: `true` iff created.
    pub async fn create_ok(
        &self,
        subscription: &dyn CreatableSubscription,
        resource: &Resource,
        assignment: &Assignment,
    ) -> bool {
        match self.create(subscription, resource, assignment).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "subscription create failed");
                false
            }
        }
    }

    /// Move the validity window of an existing subscription. Bounds
    /// left `None` keep their current server-side value.
    ///
    /// The current node is fetched, rebuilt (institution code dropped,
    /// dates replaced, namespace re-injected) and posted back.
    pub async fn update_dates(
        &self,
        subscription_id: &str,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<()> {
        let node = self
            .fetch_subscription_node(subscription_id)
            .await?
            .ok_or_else(|| GarError::SubscriptionNotFound(subscription_id.to_string()))?;

        let patched = patch_subscription_dates(&node, from, to);
        let url = self.config.endpoint(&format!("/{subscription_id}"));
        let response = self
            .transport
            .request(Method::Post, &url, Some(patched.to_xml().into_bytes()))
            .await?;

        if response.is_status(200) {
            Ok(())
        } else {
            Err(GarError::TransportStatus {
                status: response.status,
                url,
            })
        }
    }

    /// Legacy contract: `false` covers both "not found" and failure.
    pub async fn update_dates_ok(
        &self,
        subscription_id: &str,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> bool {
        match self.update_dates(subscription_id, from, to).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(subscription_id, error = %e, "subscription date update failed");
                false
            }
        }
    }

    /// Remove a subscription. Success iff the server answers 204.
    pub async fn delete(&self, subscription_id: &str) -> Result<()> {
        let url = self.config.endpoint(&format!("/{subscription_id}"));
        let response = self.transport.request(Method::Delete, &url, None).await?;

        if response.is_status(204) {
            Ok(())
        } else {
            Err(GarError::TransportStatus {
                status: response.status,
                url,
            })
        }
    }

    /// Legacy contract: `true` iff deleted.
    pub async fn delete_ok(&self, subscription_id: &str) -> bool {
        match self.delete(subscription_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(subscription_id, error = %e, "subscription delete failed");
                false
            }
        }
    }

    /// Fetch the raw XML node of one subscription via a single-field
    /// filter query, without interpreting it.
    async fn fetch_subscription_node(
        &self,
        subscription_id: &str,
    ) -> Result<Option<crate::xml::tree::Element>> {
        let filter = SubscriptionFilter::by_subscription_id(subscription_id);
        let body = serialize_filter(&filter);
        let url = self.config.endpoint(SUBSCRIPTIONS_PATH);
        let response = self
            .transport
            .request(Method::Post, &url, Some(body.into_bytes()))
            .await?;

        if !response.is_status(200) {
            return Err(GarError::TransportStatus {
                status: response.status,
                url,
            });
        }

        Ok(parse_subscription_nodes(&response.body)?.into_iter().next())
    }
}
