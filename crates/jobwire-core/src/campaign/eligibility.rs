//! Eligibility resolution.
//!
//! Turns a segment selector into an ordered, deduplicated sequence of
//! recipients who may receive a campaign. Segments are fetched one at a time
//! and each candidate is checked against the ledger at the moment it is
//! handed out, so sends recorded while a run is in progress are honored.

use std::collections::HashSet;
use std::fmt;
use std::vec;

use serde::Serialize;
use tracing::debug;

use crate::config::{SegmentConfig, Settings};
use crate::ledger::{CampaignKey, SendLedger};
use crate::service::{ContactSource, SegmentMember};
use crate::{Error, PhoneNumber, Result};

/// Which configured segments a campaign targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SegmentSelector {
    /// Every configured segment.
    #[default]
    All,
    /// One segment by name.
    Named(String),
    /// Every segment in a category.
    Category(String),
}

impl fmt::Display for SegmentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all segments"),
            Self::Named(name) => write!(f, "segment '{name}'"),
            Self::Category(name) => write!(f, "category '{name}'"),
        }
    }
}

/// One selected segment, resolved to a list and a campaign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    /// Segment configuration.
    pub segment: SegmentConfig,
    /// Contact-source list id.
    pub list_id: i64,
    /// Template sent to this segment.
    pub template_name: String,
    /// Campaign key for this segment's sends.
    pub campaign_key: CampaignKey,
}

impl SegmentPlan {
    /// Reporting label of the segment.
    #[must_use]
    pub fn label(&self) -> &str {
        self.segment.label()
    }
}

/// A recipient cleared for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Canonical phone number.
    pub recipient_key: PhoneNumber,
    /// Source-side identifier.
    pub display_id: String,
    /// Segment name.
    pub segment_name: String,
    /// Reporting label.
    pub segment_label: String,
    /// List the recipient came from.
    pub source_list_id: i64,
    /// Campaign key the send is recorded under.
    pub campaign_key: CampaignKey,
    /// Template to send.
    pub template_name: String,
}

/// Why members were passed over during a resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    /// Opted out of messages.
    pub opted_out: u32,
    /// Blacklisted in the contact source.
    pub blacklisted: u32,
    /// No phone number, or an invalid one.
    pub invalid_phone: u32,
    /// Already in the ledger for this campaign.
    pub already_sent: u32,
    /// Already offered by an earlier segment.
    pub duplicate: u32,
}

/// Builds candidate sequences from configuration, a contact source and the
/// ledger.
pub struct EligibilityResolver<'a, C> {
    settings: &'a Settings,
    source: &'a C,
    ledger: &'a SendLedger,
}

impl<'a, C: ContactSource> EligibilityResolver<'a, C> {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(settings: &'a Settings, source: &'a C, ledger: &'a SendLedger) -> Self {
        Self {
            settings,
            source,
            ledger,
        }
    }

    /// Ordered segment plan for a selector.
    ///
    /// Segments run by ascending priority, ties in declaration order. An
    /// experience filter of `None` or `"all"` keeps every segment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the named segment or category is not
    /// configured, or a selected segment has no list id or template.
    pub fn plan(
        &self,
        selector: &SegmentSelector,
        campaign_id: Option<&str>,
        experience: Option<&str>,
    ) -> Result<Vec<SegmentPlan>> {
        let mut selected: Vec<&SegmentConfig> = match selector {
            SegmentSelector::All => self.settings.segments.iter().collect(),
            SegmentSelector::Named(name) => vec![
                self.settings
                    .segment(name)
                    .ok_or_else(|| Error::config(format!("segment '{name}' is not configured")))?,
            ],
            SegmentSelector::Category(category) => {
                let in_category: Vec<_> = self
                    .settings
                    .segments
                    .iter()
                    .filter(|s| {
                        s.category
                            .as_deref()
                            .is_some_and(|c| c.eq_ignore_ascii_case(category))
                    })
                    .collect();
                if in_category.is_empty() {
                    return Err(Error::config(format!(
                        "category '{category}' has no configured segments"
                    )));
                }
                in_category
            }
        };

        if let Some(wanted) = experience_filter(experience) {
            selected.retain(|s| {
                s.experience
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
            });
        }

        // Stable: equal priorities keep declaration order.
        selected.sort_by_key(|s| s.priority);

        selected
            .into_iter()
            .map(|segment| {
                let list_id = segment.list_id.ok_or_else(|| {
                    Error::config(format!("segment '{}' has no list_id", segment.name))
                })?;
                let template_name = self.settings.template_for(segment).trim().to_string();
                if template_name.is_empty() {
                    return Err(Error::config(format!(
                        "no template configured for segment '{}'",
                        segment.name
                    )));
                }
                Ok(SegmentPlan {
                    segment: segment.clone(),
                    list_id,
                    campaign_key: CampaignKey::new(campaign_id, &template_name),
                    template_name,
                })
            })
            .collect()
    }

    /// Lazily resolves the candidates for a selector.
    ///
    /// `limit` caps the combined sequence across all segments.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the selection cannot be planned.
    pub fn resolve(
        &self,
        selector: &SegmentSelector,
        campaign_id: Option<&str>,
        experience: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Candidates<'a, C>> {
        let plan = self.plan(selector, campaign_id, experience)?;
        debug!("Resolving {selector}: {} segment(s)", plan.len());
        Ok(self.candidates(plan, limit))
    }

    /// Candidate sequence over an already computed plan.
    #[must_use]
    pub fn candidates(&self, plan: Vec<SegmentPlan>, limit: Option<usize>) -> Candidates<'a, C> {
        Candidates::new(self.source, self.ledger, plan, limit)
    }
}

fn experience_filter(experience: Option<&str>) -> Option<&str> {
    experience
        .map(str::trim)
        .filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case("all"))
}

/// Single-pass candidate sequence.
pub struct Candidates<'a, C> {
    source: &'a C,
    ledger: &'a SendLedger,
    segments: vec::IntoIter<SegmentPlan>,
    current: Option<(SegmentPlan, vec::IntoIter<SegmentMember>)>,
    seen: HashSet<PhoneNumber>,
    peeked: Option<Candidate>,
    limit: Option<usize>,
    yielded: usize,
    skipped: SkipCounts,
}

impl<'a, C: ContactSource> Candidates<'a, C> {
    fn new(
        source: &'a C,
        ledger: &'a SendLedger,
        plan: Vec<SegmentPlan>,
        limit: Option<usize>,
    ) -> Self {
        Self {
            source,
            ledger,
            segments: plan.into_iter(),
            current: None,
            seen: HashSet::new(),
            peeked: None,
            limit,
            yielded: 0,
            skipped: SkipCounts::default(),
        }
    }

    /// Returns the next candidate.
    ///
    /// A candidate that was peeked is checked against the ledger again
    /// before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact source or the ledger fails.
    pub async fn next(&mut self) -> Result<Option<Candidate>> {
        while let Some(candidate) = self.peeked.take() {
            if !self
                .ledger
                .has_been_sent(&candidate.recipient_key, &candidate.campaign_key)
                .await?
            {
                return Ok(Some(candidate));
            }
            debug!(
                "Skipping {}: recorded for {} since it was resolved",
                candidate.recipient_key.masked(),
                candidate.campaign_key
            );
            self.skipped.already_sent += 1;
            self.yielded -= 1;
            self.peeked = self.pull().await?;
        }
        self.pull().await
    }

    /// Looks at the next candidate without consuming it.
    ///
    /// # Errors
    ///
    /// Returns an error if the contact source or the ledger fails.
    pub async fn peek(&mut self) -> Result<Option<&Candidate>> {
        if self.peeked.is_none() {
            self.peeked = self.pull().await?;
        }
        Ok(self.peeked.as_ref())
    }

    /// Members passed over so far.
    #[must_use]
    pub const fn skipped(&self) -> SkipCounts {
        self.skipped
    }

    async fn pull(&mut self) -> Result<Option<Candidate>> {
        if self.limit.is_some_and(|limit| self.yielded >= limit) {
            return Ok(None);
        }

        loop {
            if self.current.is_none() {
                let Some(plan) = self.segments.next() else {
                    return Ok(None);
                };
                let members = self.source.get_segment_members(plan.list_id).await?;
                debug!(
                    "Segment '{}' (list {}): {} members",
                    plan.segment.name,
                    plan.list_id,
                    members.len()
                );
                self.current = Some((plan, members.into_iter()));
            }
            let Some((plan, members)) = self.current.as_mut() else {
                continue;
            };

            let Some(member) = members.next() else {
                self.current = None;
                continue;
            };

            let Some(recipient_key) = admit(&member, &mut self.skipped) else {
                continue;
            };
            if self.seen.contains(&recipient_key) {
                debug!("Skipping {}: already offered", recipient_key.masked());
                self.skipped.duplicate += 1;
                continue;
            }
            if self
                .ledger
                .has_been_sent(&recipient_key, &plan.campaign_key)
                .await?
            {
                debug!(
                    "Skipping {}: already sent {}",
                    recipient_key.masked(),
                    plan.campaign_key
                );
                self.skipped.already_sent += 1;
                continue;
            }

            self.seen.insert(recipient_key.clone());
            self.yielded += 1;
            return Ok(Some(Candidate {
                recipient_key,
                display_id: member.display_id,
                segment_name: plan.segment.name.clone(),
                segment_label: plan.label().to_string(),
                source_list_id: plan.list_id,
                campaign_key: plan.campaign_key.clone(),
                template_name: plan.template_name.clone(),
            }));
        }
    }
}

/// Applies the consent and phone checks to one member.
fn admit(member: &SegmentMember, skipped: &mut SkipCounts) -> Option<PhoneNumber> {
    if member.opted_out {
        debug!("Skipping contact {}: opted out", member.display_id);
        skipped.opted_out += 1;
        return None;
    }
    if member.blacklisted {
        debug!("Skipping contact {}: blacklisted", member.display_id);
        skipped.blacklisted += 1;
        return None;
    }
    let Some(raw) = member.recipient_key_raw.as_deref() else {
        debug!("Skipping contact {}: no phone number", member.display_id);
        skipped.invalid_phone += 1;
        return None;
    };
    match PhoneNumber::parse(raw) {
        Ok(phone) => Some(phone),
        Err(e) => {
            debug!("Skipping contact {}: {e}", member.display_id);
            skipped.invalid_phone += 1;
            None
        }
    }
}
