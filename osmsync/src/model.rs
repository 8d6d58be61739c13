//! Domain types produced by the parser and consumed by the upload protocol.
//!
//! Entities are immutable values. Identity is carried by [`EntityId`], whose
//! string form (`n123`, `w45`, `r6`) is stable across tiles and sessions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dom::Element;

/// Tag key/value pairs.
pub type Tags = BTreeMap<String, String>;

/// User id as assigned by the server.
pub type UserId = u64;

/// Note id. Locally created notes use negative ids until uploaded.
pub type NoteId = i64;

/// Changeset id.
pub type ChangesetId = u64;

// =============================================================================
// Entity identity
// =============================================================================

/// Kind of map entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Way,
    Relation,
}

impl EntityKind {
    /// Element name in the document format (`node`, `way`, `relation`).
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Way => "way",
            EntityKind::Relation => "relation",
        }
    }

    /// Plural form used by the multi-fetch endpoints.
    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Node => "nodes",
            EntityKind::Way => "ways",
            EntityKind::Relation => "relations",
        }
    }

    /// Single-letter prefix used in [`EntityId`] strings.
    pub fn prefix(self) -> char {
        match self {
            EntityKind::Node => 'n',
            EntityKind::Way => 'w',
            EntityKind::Relation => 'r',
        }
    }

    /// Parses an element or member type name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "node" => Some(EntityKind::Node),
            "way" => Some(EntityKind::Way),
            "relation" => Some(EntityKind::Relation),
            _ => None,
        }
    }

    fn from_prefix(c: char) -> Option<Self> {
        match c {
            'n' => Some(EntityKind::Node),
            'w' => Some(EntityKind::Way),
            'r' => Some(EntityKind::Relation),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable entity identifier: kind plus the server-side numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub kind: EntityKind,
    pub osm_id: i64,
}

impl EntityId {
    pub fn new(kind: EntityKind, osm_id: i64) -> Self {
        Self { kind, osm_id }
    }

    pub fn node(osm_id: i64) -> Self {
        Self::new(EntityKind::Node, osm_id)
    }

    pub fn way(osm_id: i64) -> Self {
        Self::new(EntityKind::Way, osm_id)
    }

    pub fn relation(osm_id: i64) -> Self {
        Self::new(EntityKind::Relation, osm_id)
    }

    /// Builds an id from an element name and its `id` attribute.
    pub fn from_osm(kind_name: &str, osm_id: &str) -> Option<Self> {
        let kind = EntityKind::from_name(kind_name)?;
        let osm_id = osm_id.trim().parse().ok()?;
        Some(Self { kind, osm_id })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.osm_id)
    }
}

/// Error returned when an entity id string is not of the form `n123`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid entity id: {0}")]
pub struct InvalidEntityId(pub String);

impl FromStr for EntityId {
    type Err = InvalidEntityId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let kind = chars
            .next()
            .and_then(EntityKind::from_prefix)
            .ok_or_else(|| InvalidEntityId(s.to_string()))?;
        let osm_id = chars
            .as_str()
            .parse()
            .map_err(|_| InvalidEntityId(s.to_string()))?;
        Ok(Self { kind, osm_id })
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Relation member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: EntityId,
    pub role: String,
}

/// Kind-specific entity payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityData {
    /// `[lon, lat]`
    Node { loc: [f64; 2] },
    Way { nodes: Vec<EntityId> },
    Relation { members: Vec<Member> },
}

/// A node, way or relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub visible: bool,
    pub version: Option<u64>,
    pub changeset: Option<ChangesetId>,
    pub timestamp: Option<String>,
    pub user: Option<String>,
    pub uid: Option<UserId>,
    pub tags: Tags,
    pub data: EntityData,
}

impl Entity {
    /// A new, visible, untagged entity with no server metadata.
    pub fn new(id: EntityId, data: EntityData) -> Self {
        Self {
            id,
            visible: true,
            version: None,
            changeset: None,
            timestamp: None,
            user: None,
            uid: None,
            tags: Tags::new(),
            data,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.id.kind
    }

    /// Location for nodes.
    pub fn loc(&self) -> Option<[f64; 2]> {
        match &self.data {
            EntityData::Node { loc } => Some(*loc),
            _ => None,
        }
    }

    /// Serializes this entity for an osmChange payload.
    pub fn to_element(&self, changeset_id: ChangesetId) -> Element {
        let mut element = Element::new(self.kind().as_str())
            .with_attr("id", self.id.osm_id.to_string())
            .with_attr("changeset", changeset_id.to_string());
        if let Some(version) = self.version {
            element = element.with_attr("version", version.to_string());
        }
        match &self.data {
            EntityData::Node { loc } => {
                element = element
                    .with_attr("lat", loc[1].to_string())
                    .with_attr("lon", loc[0].to_string());
            }
            EntityData::Way { nodes } => {
                for node in nodes {
                    element = element
                        .with_child(Element::new("nd").with_attr("ref", node.osm_id.to_string()));
                }
            }
            EntityData::Relation { members } => {
                for member in members {
                    element = element.with_child(
                        Element::new("member")
                            .with_attr("type", member.id.kind.as_str())
                            .with_attr("role", member.role.clone())
                            .with_attr("ref", member.id.osm_id.to_string()),
                    );
                }
            }
        }
        append_tags(element, &self.tags)
    }
}

fn append_tags(mut element: Element, tags: &Tags) -> Element {
    for (k, v) in tags {
        element = element.with_child(
            Element::new("tag")
                .with_attr("k", k.clone())
                .with_attr("v", v.clone()),
        );
    }
    element
}

// =============================================================================
// Notes
// =============================================================================

/// A note comment: child element name to text value.
pub type NoteComment = BTreeMap<String, String>;

/// Note status as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteStatus {
    Open,
    Closed,
}

impl NoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteStatus::Open => "open",
            NoteStatus::Closed => "closed",
        }
    }
}

/// A user-submitted map annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// `[lon, lat]`, possibly nudged apart from coincident notes.
    pub loc: [f64; 2],
    /// Scalar child elements copied verbatim (`status`, `date_created`, ...).
    pub fields: BTreeMap<String, String>,
    pub comments: Vec<NoteComment>,
    /// Comment text to send with the next create/update.
    pub new_comment: Option<String>,
}

impl Note {
    pub fn new(id: NoteId, loc: [f64; 2]) -> Self {
        Self {
            id,
            loc,
            fields: BTreeMap::new(),
            comments: Vec::new(),
            new_comment: None,
        }
    }

    /// Builder: sets the comment sent with the next create/update.
    pub fn with_new_comment(mut self, text: impl Into<String>) -> Self {
        self.new_comment = Some(text.into());
        self
    }

    /// Current status, if the server reported a known one.
    pub fn status(&self) -> Option<NoteStatus> {
        match self.fields.get("status").map(String::as_str) {
            Some("open") => Some(NoteStatus::Open),
            Some("closed") => Some(NoteStatus::Closed),
            _ => None,
        }
    }

    /// True for notes that only exist locally.
    pub fn is_new(&self) -> bool {
        self.id < 0
    }
}

// =============================================================================
// Users
// =============================================================================

/// A user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: Option<String>,
    pub account_created: Option<String>,
    pub image_url: Option<String>,
    pub changesets_count: u64,
}

// =============================================================================
// Changesets
// =============================================================================

/// A changeset being uploaded. `id` is assigned by the create step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Changeset {
    pub id: Option<ChangesetId>,
    pub tags: Tags,
}

impl Changeset {
    pub fn new(tags: Tags) -> Self {
        Self { id: None, tags }
    }

    /// Returns a copy with the server-assigned id.
    pub fn with_id(&self, id: ChangesetId) -> Self {
        Self {
            id: Some(id),
            tags: self.tags.clone(),
        }
    }

    /// Body of the create request.
    pub fn to_document(&self) -> Element {
        let changeset = append_tags(Element::new("changeset"), &self.tags);
        Element::new("osm").with_child(changeset)
    }

    /// Body of the upload request.
    pub fn osm_change(&self, changes: &Changes) -> Element {
        let id = self.id.unwrap_or_default();
        let section = |name: &str, entities: &[Entity]| {
            entities
                .iter()
                .fold(Element::new(name), |el, e| el.with_child(e.to_element(id)))
        };
        Element::new("osmChange")
            .with_attr("version", "0.6")
            .with_attr("generator", "osmsync")
            .with_child(section("create", &changes.created))
            .with_child(section("modify", &changes.modified))
            .with_child(section("delete", &changes.deleted).with_attr("if-unused", "true"))
    }
}

/// Edits carried by an upload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Changes {
    pub created: Vec<Entity>,
    pub modified: Vec<Entity>,
    pub deleted: Vec<Entity>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// A changeset from the current user's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesetSummary {
    pub id: Option<ChangesetId>,
    pub tags: Tags,
}

impl ChangesetSummary {
    /// The changeset comment, if present and non-empty.
    pub fn comment(&self) -> Option<&str> {
        self.tags
            .get("comment")
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }
}

// =============================================================================
// API status
// =============================================================================

/// Server status from the capabilities document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStatus {
    Online,
    Readonly,
    Offline,
    Unknown(String),
}

impl From<&str> for ApiStatus {
    fn from(s: &str) -> Self {
        match s {
            "online" => ApiStatus::Online,
            "readonly" => ApiStatus::Readonly,
            "offline" => ApiStatus::Offline,
            other => ApiStatus::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_display_and_parse() {
        let id = EntityId::way(42);
        assert_eq!(id.to_string(), "w42");
        assert_eq!("w42".parse::<EntityId>().unwrap(), id);
        assert_eq!("n-1".parse::<EntityId>().unwrap(), EntityId::node(-1));
        assert!("x1".parse::<EntityId>().is_err());
        assert!("n".parse::<EntityId>().is_err());
    }

    #[test]
    fn test_entity_id_from_osm() {
        assert_eq!(EntityId::from_osm("relation", "9"), Some(EntityId::relation(9)));
        assert_eq!(EntityId::from_osm("note", "9"), None);
        assert_eq!(EntityId::from_osm("node", "abc"), None);
    }

    #[test]
    fn test_note_status() {
        let mut note = Note::new(1, [0.0, 0.0]);
        assert_eq!(note.status(), None);
        note.fields.insert("status".into(), "closed".into());
        assert_eq!(note.status(), Some(NoteStatus::Closed));
        assert!(!note.is_new());
        assert!(Note::new(-1, [0.0, 0.0]).is_new());
    }

    #[test]
    fn test_changeset_document() {
        let mut tags = Tags::new();
        tags.insert("comment".into(), "fix <road>".into());
        let xml = Changeset::new(tags).to_document().to_xml();
        assert_eq!(
            xml,
            "<osm><changeset><tag k=\"comment\" v=\"fix &lt;road&gt;\"/></changeset></osm>"
        );
    }

    #[test]
    fn test_osm_change_sections() {
        let changeset = Changeset::default().with_id(77);
        let mut node = Entity::new(EntityId::node(-1), EntityData::Node { loc: [2.0, 1.0] });
        node.tags.insert("amenity".into(), "bench".into());
        let way = Entity::new(
            EntityId::way(5),
            EntityData::Way {
                nodes: vec![EntityId::node(1), EntityId::node(2)],
            },
        );
        let changes = Changes {
            created: vec![node],
            modified: vec![],
            deleted: vec![way],
        };

        let doc = changeset.osm_change(&changes);
        assert_eq!(doc.name, "osmChange");

        let create = doc.child("create").unwrap();
        let created = create.child("node").unwrap();
        assert_eq!(created.attr("id"), Some("-1"));
        assert_eq!(created.attr("changeset"), Some("77"));
        assert_eq!(created.attr("lat"), Some("1"));
        assert_eq!(created.attr("lon"), Some("2"));
        assert_eq!(created.child("tag").unwrap().attr("v"), Some("bench"));

        let delete = doc.child("delete").unwrap();
        assert_eq!(delete.attr("if-unused"), Some("true"));
        assert_eq!(delete.child("way").unwrap().descendants("nd").len(), 2);
        assert_eq!(doc.child("modify").unwrap().child_elements().count(), 0);
    }

    #[test]
    fn test_changeset_summary_comment() {
        let mut summary = ChangesetSummary {
            id: Some(1),
            tags: Tags::new(),
        };
        assert_eq!(summary.comment(), None);
        summary.tags.insert("comment".into(), String::new());
        assert_eq!(summary.comment(), None);
        summary.tags.insert("comment".into(), "hello".into());
        assert_eq!(summary.comment(), Some("hello"));
    }

    #[test]
    fn test_api_status_from_str() {
        assert_eq!(ApiStatus::from("online"), ApiStatus::Online);
        assert_eq!(ApiStatus::from("readonly"), ApiStatus::Readonly);
        assert_eq!(ApiStatus::from("weird"), ApiStatus::Unknown("weird".into()));
    }
}
