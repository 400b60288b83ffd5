//! Declarative merge of the head-end channel list with a secondary source

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::models::{ChannelOrigin, Service, ServiceField};

pub type ChannelPredicate = Arc<dyn Fn(&Service, &Service) -> bool + Send + Sync>;

/// Secondary channel source applied on every rebuild until cleared
#[derive(Clone)]
pub struct MergeSpec {
    pub channel_list: Vec<Service>,
    pub are_channels_the_same: ChannelPredicate,
    /// Attributes taken from the secondary channel on a match
    pub field_list: Vec<ServiceField>,
    /// Keep channels that found no partner (secondary ones first)
    pub include_unmatched: bool,
}

impl MergeSpec {
    pub fn new<F>(
        channel_list: Vec<Service>,
        are_channels_the_same: F,
        field_list: Vec<ServiceField>,
        include_unmatched: bool,
    ) -> Self
    where
        F: Fn(&Service, &Service) -> bool + Send + Sync + 'static,
    {
        Self {
            channel_list,
            are_channels_the_same: Arc::new(are_channels_the_same),
            field_list,
            include_unmatched,
        }
    }

    /// Predicate matching channels by service id
    pub fn same_service_id(a: &Service, b: &Service) -> bool {
        a.service_id == b.service_id
    }
}

impl fmt::Debug for MergeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeSpec")
            .field("channel_list", &self.channel_list.len())
            .field("field_list", &self.field_list)
            .field("include_unmatched", &self.include_unmatched)
            .finish()
    }
}

/// Nested O(n·m) pass: each primary channel takes its first matching
/// secondary channel. Unmatched primaries are dropped unless
/// `include_unmatched` is set.
pub fn merge_channels(primary: &[Service], spec: &MergeSpec) -> Vec<Service> {
    let mut primary_merged = vec![false; primary.len()];
    let mut secondary_merged = vec![false; spec.channel_list.len()];
    let mut result = Vec::with_capacity(primary.len());

    for (i, channel) in primary.iter().enumerate() {
        let matched = spec
            .channel_list
            .iter()
            .position(|candidate| (spec.are_channels_the_same)(channel, candidate));

        if let Some(j) = matched {
            result.push(channel.merged_with(&spec.channel_list[j], &spec.field_list));
            primary_merged[i] = true;
            secondary_merged[j] = true;
        }
    }

    let merged_count = result.len();

    if spec.include_unmatched {
        for (channel, _) in spec
            .channel_list
            .iter()
            .zip(&secondary_merged)
            .filter(|(_, merged)| !**merged)
        {
            let mut channel = channel.clone();
            channel.origin = ChannelOrigin::Secondary;
            result.push(channel);
        }
        for (channel, _) in primary
            .iter()
            .zip(&primary_merged)
            .filter(|(_, merged)| !**merged)
        {
            result.push(channel.clone());
        }
    }

    debug!(
        "Merged {} channels ({} primary, {} secondary, {} in result)",
        merged_count,
        primary.len(),
        spec.channel_list.len(),
        result.len()
    );

    result
}
