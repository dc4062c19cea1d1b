//! Semantic classification of C4 nodes into role, tier and rank.
//!
//! Specific kinds map straight to a role. Generic kinds (systems, containers,
//! components, unknown) are classified lexically from label, technology and
//! tags, trying the rules in a fixed priority order; the first match wins.

use c4layout_core::{C4Node, NodeKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    Person,
    External,
    DataStore,
    Queue,
    Topic,
    Cache,
    FileSystem,
    Repository,
    Controller,
    Gateway,
    Bff,
    Api,
    WebUi,
    MobileApp,
    Service,
    System,
    Container,
    Component,
    Boundary,
    #[default]
    Unknown,
}

/// Vertical band a node belongs to, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Tier {
    Actor,
    Presentation,
    #[default]
    Logic,
    Data,
    External,
}

impl Tier {
    /// Order used for vertical banding; externals sit with the logic band.
    pub fn band(self) -> usize {
        match self {
            Tier::Actor => 0,
            Tier::Presentation => 1,
            Tier::Logic | Tier::External => 2,
            Tier::Data => 3,
        }
    }

    /// Tiers that take part in vertical ordering checks.
    pub fn is_ordered(self) -> bool {
        !matches!(self, Tier::External)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SemanticInfo {
    pub role: Role,
    pub tier: Tier,
    /// Fine-grained ordering value; lower ranks are placed higher.
    pub rank: u32,
    pub is_external: bool,
    pub is_data_layer: bool,
    pub is_presentation_layer: bool,
}

impl SemanticInfo {
    fn for_role(role: Role) -> Self {
        let (tier, rank) = match role {
            Role::Person => (Tier::Actor, 0),
            Role::WebUi | Role::MobileApp => (Tier::Presentation, 10),
            Role::Bff => (Tier::Presentation, 12),
            Role::Gateway => (Tier::Presentation, 14),
            Role::Api => (Tier::Presentation, 16),
            Role::Controller => (Tier::Logic, 22),
            Role::Service => (Tier::Logic, 30),
            Role::System | Role::Container | Role::Component | Role::Boundary => (Tier::Logic, 35),
            Role::Unknown => (Tier::Logic, 39),
            Role::Repository => (Tier::Data, 42),
            Role::Queue | Role::Topic => (Tier::Data, 45),
            Role::Cache => (Tier::Data, 48),
            Role::DataStore => (Tier::Data, 50),
            Role::FileSystem => (Tier::Data, 52),
            Role::External => (Tier::External, 60),
        };

        Self {
            role,
            tier,
            rank,
            is_external: role == Role::External,
            is_data_layer: tier == Tier::Data,
            is_presentation_layer: tier == Tier::Presentation,
        }
    }
}

struct LexicalRule {
    role: Role,
    include: Regex,
    exclude: Option<Regex>,
}

impl LexicalRule {
    fn new(role: Role, include: &str, exclude: Option<&str>) -> Self {
        // Patterns are literals; test_patterns_compile covers them.
        Self {
            role,
            include: Regex::new(include).expect("valid classifier pattern"),
            exclude: exclude.map(|p| Regex::new(p).expect("valid classifier pattern")),
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        self.include.is_match(haystack)
            && !self
                .exclude
                .as_ref()
                .is_some_and(|exclude| exclude.is_match(haystack))
    }
}

static RULES: LazyLock<Vec<LexicalRule>> = LazyLock::new(|| {
    vec![
        LexicalRule::new(
            Role::Person,
            concat!(
                r"\b(user|users|customer|customers|actor|person|admin|administrator|",
                r"operator|staff|employee|member|visitor|client)\b",
            ),
            Some(r"\b(service|api|app|application|system|db|database|server|portal)\b"),
        ),
        LexicalRule::new(
            Role::External,
            r"\b(external|third[- ]party|3rd[- ]party|partner|vendor|saas|legacy)\b",
            None,
        ),
        LexicalRule::new(
            Role::Queue,
            r"\b(queue|mq|rabbitmq|sqs|activemq|jms)\b",
            None,
        ),
        LexicalRule::new(
            Role::Topic,
            r"\b(topic|kafka|event ?bus|pub/?sub|kinesis|sns|stream)\b",
            None,
        ),
        LexicalRule::new(
            Role::Cache,
            r"\b(cache|redis|memcached?|hazelcast)\b",
            None,
        ),
        LexicalRule::new(
            Role::FileSystem,
            r"\b(file ?system|blob|s3|bucket|storage|nfs|filestore)\b",
            None,
        ),
        LexicalRule::new(
            Role::DataStore,
            concat!(
                r"\b(db|database|datastore|data store|sql|postgres(ql)?|mysql|mongo(db)?|",
                r"oracle|dynamo(db)?|cassandra|elasticsearch|warehouse|schema)\b",
            ),
            Some(r"\brepository\b"),
        ),
        LexicalRule::new(Role::Repository, r"\b(repository|repo|dao)\b", None),
        LexicalRule::new(Role::Controller, r"\b(controller|handler|resolver)\b", None),
        LexicalRule::new(
            Role::Gateway,
            r"\b(gateway|proxy|load ?balancer|ingress|edge)\b",
            None,
        ),
        LexicalRule::new(Role::Bff, r"\b(bff|backend[- ]for[- ]frontend)\b", None),
        LexicalRule::new(Role::Api, r"\b(api|rest|graphql|grpc|endpoint)\b", None),
        LexicalRule::new(
            Role::MobileApp,
            r"\b(mobile|ios|android|react native|flutter)\b",
            None,
        ),
        LexicalRule::new(
            Role::WebUi,
            concat!(
                r"\b(web ?app|website|frontend|front[- ]end|ui|spa|portal|",
                r"react|angular|vue|browser|dashboard)\b",
            ),
            None,
        ),
        LexicalRule::new(
            Role::Service,
            r"\b(service|microservice|worker|processor|engine|backend|server|job|scheduler)\b",
            None,
        ),
    ]
});

/// Pure function from node to semantic info.
pub fn classify(node: &C4Node) -> SemanticInfo {
    if let Some(role) = role_for_specific_kind(node.kind) {
        return SemanticInfo::for_role(role);
    }

    let haystack = search_string(node);
    let role = RULES
        .iter()
        .find(|rule| rule.matches(&haystack))
        .map(|rule| rule.role)
        .unwrap_or_else(|| fallback_role(node.kind));

    SemanticInfo::for_role(role)
}

fn role_for_specific_kind(kind: NodeKind) -> Option<Role> {
    let role = match kind {
        NodeKind::PERSON => Role::Person,
        NodeKind::EXTERNAL_PERSON
        | NodeKind::EXTERNAL_SYSTEM
        | NodeKind::EXTERNAL_CONTAINER
        | NodeKind::EXTERNAL_COMPONENT => Role::External,
        NodeKind::DATABASE => Role::DataStore,
        NodeKind::QUEUE => Role::Queue,
        NodeKind::TOPIC => Role::Topic,
        NodeKind::CACHE => Role::Cache,
        NodeKind::FILE_SYSTEM => Role::FileSystem,
        NodeKind::REPOSITORY => Role::Repository,
        NodeKind::CONTROLLER => Role::Controller,
        NodeKind::GATEWAY => Role::Gateway,
        NodeKind::BFF => Role::Bff,
        NodeKind::API => Role::Api,
        NodeKind::WEB_APP => Role::WebUi,
        NodeKind::MOBILE_APP => Role::MobileApp,
        NodeKind::SERVICE => Role::Service,
        NodeKind::BOUNDARY => Role::Boundary,
        NodeKind::SOFTWARE_SYSTEM
        | NodeKind::CONTAINER
        | NodeKind::COMPONENT
        | NodeKind::UNKNOWN => return None,
    };
    Some(role)
}

fn fallback_role(kind: NodeKind) -> Role {
    match kind {
        NodeKind::SOFTWARE_SYSTEM => Role::System,
        NodeKind::CONTAINER => Role::Container,
        NodeKind::COMPONENT => Role::Component,
        _ => Role::Unknown,
    }
}

fn search_string(node: &C4Node) -> String {
    let mut parts = vec![node.label.as_str()];
    if let Some(technology) = &node.technology {
        parts.push(technology);
    }
    parts.extend(node.tags.iter().map(String::as_str));
    parts.join(" ").to_lowercase()
}
