//! Tag vocabulary.
//!
//! # Responsibilities
//! - Hold the static application identity (application, cluster, service, shard)
//! - Build the tag set attached to a metric at each aggregation granularity
//!
//! # Granularity Rules
//! ```text
//!                 resource tags   cluster  service  shard  source
//! endpoint             yes          yes      yes     yes     -
//! application          yes           -        -       -     yes
//! cluster              yes          yes       -       -     yes
//! service              yes          yes      yes      -     yes
//! shard                yes          yes      yes     yes    yes
//! source (process)      -           yes      yes     yes     -
//! ```
//! Resource tags (`jersey.resource.class`, `jersey.resource.method`,
//! `operationName`) only exist for route-scoped metrics; process-wide
//! aggregates are built without request facts and never carry them.
//!
//! # Design Decisions
//! - Tag sets are ordered maps: equal sets compare and hash equal regardless of insertion order
//! - An absent identity value drops its tag; building tags cannot fail

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::ApplicationConfig;
use crate::instrument::facts::RequestFacts;
use crate::instrument::span::{
    COMPONENT_TAG, ERROR_TAG, HTTP_METHOD_TAG, HTTP_STATUS_CODE_TAG, HTTP_URL_TAG, PATH_TAG,
    SPAN_KIND_TAG,
};

pub const APPLICATION_TAG_KEY: &str = "application";
pub const CLUSTER_TAG_KEY: &str = "cluster";
pub const SERVICE_TAG_KEY: &str = "service";
pub const SHARD_TAG_KEY: &str = "shard";
pub const SOURCE_TAG_KEY: &str = "source";
pub const RESOURCE_CLASS_TAG_KEY: &str = "jersey.resource.class";
pub const RESOURCE_METHOD_TAG_KEY: &str = "jersey.resource.method";
pub const OPERATION_NAME_TAG_KEY: &str = "operationName";

/// Sentinel value of the `source` tag on aggregated metrics.
pub const DEFAULT_PROVIDED_SOURCE: &str = "wavefront-provided";

/// Keys owned by the instrumentation; custom tags may not reuse them.
pub const RESERVED_TAG_KEYS: &[&str] = &[
    SPAN_KIND_TAG,
    COMPONENT_TAG,
    HTTP_METHOD_TAG,
    HTTP_URL_TAG,
    HTTP_STATUS_CODE_TAG,
    PATH_TAG,
    ERROR_TAG,
    APPLICATION_TAG_KEY,
    CLUSTER_TAG_KEY,
    SERVICE_TAG_KEY,
    SHARD_TAG_KEY,
    SOURCE_TAG_KEY,
    RESOURCE_CLASS_TAG_KEY,
    RESOURCE_METHOD_TAG_KEY,
    OPERATION_NAME_TAG_KEY,
];

/// Aggregation level of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    Endpoint,
    Application,
    Cluster,
    Service,
    Shard,
    Source,
}

impl Granularity {
    /// Levels of the per-endpoint delta aggregates.
    pub const ROUTE_AGGREGATES: [Granularity; 4] = [
        Granularity::Application,
        Granularity::Cluster,
        Granularity::Service,
        Granularity::Shard,
    ];

    /// Levels of the process-wide completion and error aggregates.
    pub const PROCESS_AGGREGATES: [Granularity; 5] = [
        Granularity::Source,
        Granularity::Shard,
        Granularity::Service,
        Granularity::Cluster,
        Granularity::Application,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Endpoint => "endpoint",
            Granularity::Application => "application",
            Granularity::Cluster => "cluster",
            Granularity::Service => "service",
            Granularity::Shard => "shard",
            Granularity::Source => "source",
        }
    }

    fn includes_cluster(self) -> bool {
        !matches!(self, Granularity::Application)
    }

    fn includes_service(self) -> bool {
        matches!(
            self,
            Granularity::Endpoint | Granularity::Service | Granularity::Shard | Granularity::Source
        )
    }

    fn includes_shard(self) -> bool {
        matches!(
            self,
            Granularity::Endpoint | Granularity::Shard | Granularity::Source
        )
    }

    fn includes_source(self) -> bool {
        !matches!(self, Granularity::Endpoint | Granularity::Source)
    }

    fn includes_resource(self) -> bool {
        !matches!(self, Granularity::Source)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-unique, order-insensitive set of tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    fn insert_opt(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True if every tag of `self` is present with the same value in `other`.
    pub fn is_subset_of(&self, other: &TagSet) -> bool {
        self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Static identity of the running application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationTags {
    pub application: String,
    pub cluster: Option<String>,
    pub service: Option<String>,
    pub shard: Option<String>,
    /// Extra span tags such as `location` or `env`.
    pub custom: BTreeMap<String, String>,
}

impl ApplicationTags {
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            cluster: None,
            service: None,
            shard: None,
            custom: BTreeMap::new(),
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = non_empty(cluster.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = non_empty(service.into());
        self
    }

    pub fn with_shard(mut self, shard: impl Into<String>) -> Self {
        self.shard = non_empty(shard.into());
        self
    }

    pub fn with_custom_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    pub fn from_config(config: &ApplicationConfig) -> Self {
        Self {
            application: config.application.clone(),
            cluster: config.cluster.clone().and_then(non_empty),
            service: config.service.clone().and_then(non_empty),
            shard: config.shard.clone().and_then(non_empty),
            custom: config.custom_tags.clone(),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Builds tag sets from request facts and the static identity.
#[derive(Debug, Clone)]
pub struct TagVocabulary {
    identity: ApplicationTags,
    provided_source: String,
}

impl TagVocabulary {
    pub fn new(identity: ApplicationTags) -> Self {
        Self {
            identity,
            provided_source: DEFAULT_PROVIDED_SOURCE.to_string(),
        }
    }

    pub fn with_provided_source(mut self, source: impl Into<String>) -> Self {
        self.provided_source = source.into();
        self
    }

    pub fn identity(&self) -> &ApplicationTags {
        &self.identity
    }

    pub fn provided_source(&self) -> &str {
        &self.provided_source
    }

    /// Tags for a metric at `granularity`.
    ///
    /// Pass the request facts for route-scoped metrics and `None` for
    /// process-wide aggregates.
    pub fn metric_tags(&self, granularity: Granularity, request: Option<&RequestFacts>) -> TagSet {
        let mut tags = TagSet::new();

        if granularity.includes_resource() {
            if let Some(request) = request {
                tags.insert_opt(RESOURCE_CLASS_TAG_KEY, request.resource_class.as_deref());
                tags.insert_opt(RESOURCE_METHOD_TAG_KEY, request.resource_method.as_deref());
                tags.insert_opt(OPERATION_NAME_TAG_KEY, request.operation_name.as_deref());
            }
        }
        if granularity.includes_cluster() {
            tags.insert_opt(CLUSTER_TAG_KEY, self.identity.cluster.as_deref());
        }
        if granularity.includes_service() {
            tags.insert_opt(SERVICE_TAG_KEY, self.identity.service.as_deref());
        }
        if granularity.includes_shard() {
            tags.insert_opt(SHARD_TAG_KEY, self.identity.shard.as_deref());
        }
        if granularity.includes_source() {
            tags.insert(SOURCE_TAG_KEY, self.provided_source.as_str());
        }
        tags
    }

    /// Identity tags every finished span carries.
    ///
    /// Custom tags are applied first so identity values take precedence.
    pub fn span_identity_tags(&self) -> TagSet {
        let mut tags: TagSet = self
            .identity
            .custom
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        tags.insert(APPLICATION_TAG_KEY, self.identity.application.as_str());
        tags.insert_opt(SERVICE_TAG_KEY, self.identity.service.as_deref());
        tags.insert_opt(CLUSTER_TAG_KEY, self.identity.cluster.as_deref());
        tags.insert_opt(SHARD_TAG_KEY, self.identity.shard.as_deref());
        tags
    }
}
