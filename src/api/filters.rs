use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use stellar_xdr::curr::{
    ContractEvent, ContractEventBody, ContractEventType, Limits, ReadXdr, ScVal, WriteXdr,
};

/// Most filters allowed in one getEvents request.
pub const MAX_FILTERS: usize = 5;
const MAX_CONTRACT_IDS: usize = 5;
const MAX_TOPIC_FILTERS: usize = 5;
const MIN_TOPIC_SEGMENTS: usize = 1;
const MAX_TOPIC_SEGMENTS: usize = 4;

/// One getEvents filter. Filters in a request are OR'd; the conditions
/// inside one filter are AND'd.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Event type, one of `contract`, `system`, `diagnostic`; absent
    /// matches all three.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Hex-encoded 32-byte contract ids; empty matches any contract.
    #[serde(rename = "contractIds", default, skip_serializing_if = "Vec::is_empty")]
    pub contract_ids: Vec<String>,
    /// Topic patterns; empty matches any topics, otherwise at least one
    /// pattern must match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<TopicFilter>,
}

/// An ordered topic pattern. Matches an event's topic list only when
/// the lengths are equal and every segment matches pairwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicFilter(pub Vec<TopicSegment>);

impl TopicFilter {
    pub fn matches(&self, topics: &[ScVal]) -> bool {
        self.0.len() == topics.len()
            && self
                .0
                .iter()
                .zip(topics.iter())
                .all(|(segment, topic)| segment.matches(topic))
    }
}

/// One slot of a topic pattern: either the single-slot wildcard or a
/// concrete value compared structurally.
#[derive(Debug, Clone)]
pub enum TopicSegment {
    Wildcard,
    Exact(ScVal),
}

impl TopicSegment {
    pub fn matches(&self, topic: &ScVal) -> bool {
        match self {
            TopicSegment::Wildcard => true,
            TopicSegment::Exact(value) => value == topic,
        }
    }
}

impl Serialize for TopicSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TopicSegment::Wildcard => serializer.serialize_str("*"),
            TopicSegment::Exact(value) => {
                let bytes = value
                    .to_xdr(Limits::none())
                    .map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&BASE64.encode(bytes))
            }
        }
    }
}

impl<'de> Deserialize<'de> for TopicSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "*" {
            return Ok(TopicSegment::Wildcard);
        }
        let bytes = BASE64
            .decode(&raw)
            .map_err(|_| D::Error::custom("topic segment must be \"*\" or base64 XDR"))?;
        let value = ScVal::from_xdr(bytes, Limits::none())
            .map_err(|_| D::Error::custom("topic segment is not a valid ScVal"))?;
        Ok(TopicSegment::Exact(value))
    }
}

/// A validated filter with its contract ids decoded, ready for
/// repeated matching during a scan.
#[derive(Debug)]
pub struct CompiledFilter {
    event_type: Option<ContractEventType>,
    contract_ids: Vec<[u8; 32]>,
    topics: Vec<TopicFilter>,
}

impl EventFilter {
    /// Validate this filter and decode it for matching. `index` is the
    /// filter's position in the request, used in error messages.
    pub fn compile(&self, index: usize) -> Result<CompiledFilter, String> {
        let event_type = match self.event_type.as_deref() {
            None => None,
            Some("contract") => Some(ContractEventType::Contract),
            Some("system") => Some(ContractEventType::System),
            Some("diagnostic") => Some(ContractEventType::Diagnostic),
            Some(other) => {
                return Err(format!(
                    "filter {index} invalid: event type {other:?} must be one of: contract, system, diagnostic"
                ))
            }
        };

        if self.contract_ids.len() > MAX_CONTRACT_IDS {
            return Err(format!(
                "filter {index} invalid: maximum {MAX_CONTRACT_IDS} contract IDs per filter"
            ));
        }
        let mut contract_ids = Vec::with_capacity(self.contract_ids.len());
        for raw in &self.contract_ids {
            let decoded = hex::decode(raw)
                .ok()
                .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
                .ok_or_else(|| {
                    format!("filter {index} invalid: contract ID {raw:?} is not a 32-byte hex value")
                })?;
            contract_ids.push(decoded);
        }

        if self.topics.len() > MAX_TOPIC_FILTERS {
            return Err(format!(
                "filter {index} invalid: maximum {MAX_TOPIC_FILTERS} topic filters per filter"
            ));
        }
        for topic in &self.topics {
            if topic.0.len() < MIN_TOPIC_SEGMENTS || topic.0.len() > MAX_TOPIC_SEGMENTS {
                return Err(format!(
                    "filter {index} invalid: topic filters must have between {MIN_TOPIC_SEGMENTS} and {MAX_TOPIC_SEGMENTS} segments"
                ));
            }
        }

        Ok(CompiledFilter {
            event_type,
            contract_ids,
            topics: self.topics.clone(),
        })
    }
}

impl CompiledFilter {
    pub fn matches(&self, event: &ContractEvent) -> bool {
        self.matches_type(event) && self.matches_contract(event) && self.matches_topics(event)
    }

    fn matches_type(&self, event: &ContractEvent) -> bool {
        self.event_type.is_none_or(|t| event.type_ == t)
    }

    fn matches_contract(&self, event: &ContractEvent) -> bool {
        if self.contract_ids.is_empty() {
            return true;
        }
        match &event.contract_id {
            Some(id) => self.contract_ids.iter().any(|c| *c == id.0 .0),
            None => false,
        }
    }

    fn matches_topics(&self, event: &ContractEvent) -> bool {
        if self.topics.is_empty() {
            return true;
        }
        let ContractEventBody::V0(body) = &event.body;
        self.topics
            .iter()
            .any(|filter| filter.matches(body.topics.as_slice()))
    }
}

/// True when the event passes at least one filter, or no filters were
/// given.
pub fn matches_any(filters: &[CompiledFilter], event: &ContractEvent) -> bool {
    filters.is_empty() || filters.iter().any(|f| f.matches(event))
}
