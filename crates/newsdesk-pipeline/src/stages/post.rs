use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use futures::future::join_all;
use newsdesk_core::{
  Entity, Error, Result,
  audit::{NewAuditEntry, SYSTEM_ACTOR, action},
  build::PostPlan,
  post::{ChannelOutcome, Delivery, NewPost, PublishOutcome},
  store::PipelineStore,
};
use serde_json::json;
use tracing::{info, warn};

use super::{AnalysisRef, PostRef, PublishInput, Stages, StoreResultExt as _};
use crate::{channel::ChannelError, render::render_body};

impl<S: PipelineStore + 'static> Stages<S> {
  /// One post per analysis: a second build is rejected with a conflict.
  pub async fn build(&self, input: AnalysisRef) -> Result<PostRef> {
    let analysis = self.require_analysis(input.analysis_id).await?;
    let Some(verification) = self.store.get_verification(analysis.analysis_id).await.db()? else {
      return Err(Error::PreconditionFailed(format!(
        "analysis {} has not been verified",
        analysis.analysis_id
      )));
    };
    if let Some(existing) = self.store.get_post_for_analysis(analysis.analysis_id).await.db()? {
      return Err(Error::Conflict(format!(
        "analysis {} already has post {}",
        analysis.analysis_id, existing.post_id
      )));
    }

    let plan = PostPlan::new(&analysis, Utc::now().date_naive());
    let body_html = render_body(&plan, verification.reliability_score)?;
    let audit = NewAuditEntry::new(
      SYSTEM_ACTOR,
      action::BUILD,
      json!({
        "analysis_id": analysis.analysis_id,
        "slug": plan.slug,
        "reliability_score": verification.reliability_score,
        "verification_status": verification.status,
      }),
    );

    let post = self
      .store
      .insert_post(
        NewPost {
          analysis_id: analysis.analysis_id,
          slug: plan.slug,
          topic: analysis.topic,
          title: plan.title,
          body_html,
          summary: plan.summary,
          seo: plan.seo,
          sources: analysis.items.source_ids.clone(),
          reliability_score: verification.reliability_score,
        },
        audit,
      )
      .await
      .db()?;

    info!(post_id = %post.post_id, slug = %post.slug, analysis_id = %analysis.analysis_id, "draft post committed");
    Ok(PostRef { post_id: post.post_id, slug: post.slug })
  }

  /// Attempt every requested channel concurrently, then mark the post
  /// published. Channel failures are reported in the outcome, never raised.
  /// Channels that already received the post are skipped.
  pub async fn publish(&self, input: PublishInput) -> Result<PublishOutcome> {
    let PublishInput { post_id, channels, actor } = input;
    let post = self
      .store
      .get_post(post_id)
      .await
      .db()?
      .ok_or_else(|| Error::not_found(Entity::Post, post_id))?;
    let delivered: BTreeSet<_> = self.store.delivered_channels(post_id).await.db()?.into_iter().collect();
    let link = format!("{}/{}", self.site_url.trim_end_matches('/'), post.slug);

    let mut outcomes = BTreeMap::new();
    let mut attempts = Vec::new();
    for channel in channels.into_iter().collect::<BTreeSet<_>>() {
      if delivered.contains(&channel) {
        outcomes.insert(channel, ChannelOutcome::Skipped { reason: "already delivered".to_owned() });
        continue;
      }
      let Some(adapter) = self.channels.get(channel) else {
        outcomes.insert(channel, ChannelOutcome::Skipped { reason: "no adapter".to_owned() });
        continue;
      };
      let (post, link, timeout) = (&post, link.as_str(), self.channel_timeout);
      attempts.push(async move {
        let result = match tokio::time::timeout(timeout, adapter.deliver(post, link)).await {
          Ok(result) => result,
          Err(_) => Err(ChannelError::Timeout(timeout)),
        };
        (channel, result)
      });
    }

    let mut deliveries = Vec::new();
    for (channel, result) in join_all(attempts).await {
      let outcome = match result {
        Ok(external_id) => {
          info!(%post_id, %channel, ?external_id, "delivered");
          deliveries.push(Delivery { channel, external_id: external_id.clone() });
          ChannelOutcome::Delivered { external_id }
        }
        Err(ChannelError::NotConfigured) => {
          warn!(%post_id, %channel, "channel not configured; skipped");
          ChannelOutcome::Skipped { reason: ChannelError::NotConfigured.to_string() }
        }
        Err(e) => {
          warn!(%post_id, %channel, error = %e, "delivery failed");
          ChannelOutcome::Failed { error: e.to_string() }
        }
      };
      outcomes.insert(channel, outcome);
    }

    let actor = actor.unwrap_or_else(|| SYSTEM_ACTOR.to_owned());
    let post = self.store.record_publication(post_id, deliveries, actor).await.db()?;

    let outcome = PublishOutcome {
      post_id,
      status: post.status,
      cms_id: post.cms_id,
      channels: outcomes,
    };
    if outcome.is_partial_failure() {
      warn!(%post_id, "published with channel failures");
    } else {
      info!(%post_id, "published");
    }
    Ok(outcome)
  }
}
