//! Document parser.
//!
//! Converts the children of a response document into typed objects,
//! merging them into the session caches as it goes:
//!
//! | Element | Identity | Dedup | Cache effect |
//! |---------|----------|-------|--------------|
//! | `node`/`way`/`relation` | kind + `id` attribute | "seen" set when `skip_seen` | marks seen |
//! | `user` | `id` attribute | user cache when `skip_seen` | stores user, clears pending load |
//! | `note` | nested `<id>` element | never | stores note and indexes it (jittered) |
//!
//! Unknown elements are ignored. Conversion runs in slices via
//! [`for_each_idle`] so large tile responses never monopolize the runtime.

use std::ops::ControlFlow;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::cache::Caches;
use crate::dom::{Document, Element};
use crate::error::OsmError;
use crate::idle::for_each_idle;
use crate::model::{
    Entity, EntityData, EntityId, EntityKind, Member, Note, NoteComment, Tags, User, UserId,
};

/// Parser options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Skip entities already in the "seen" set and users already cached.
    pub skip_seen: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { skip_seen: true }
    }
}

impl ParseOptions {
    /// Options that reparse everything.
    pub fn reparse() -> Self {
        Self { skip_seen: false }
    }
}

/// A parsed top-level object.
#[derive(Debug, Clone, PartialEq)]
pub enum OsmObject {
    Entity(Entity),
    User(User),
    Note(Note),
}

impl OsmObject {
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            OsmObject::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            OsmObject::User(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            OsmObject::Note(n) => Some(n),
            _ => None,
        }
    }
}

/// Access to the caches a parse merges into.
///
/// Implementations may refuse access (for example when the connection epoch
/// moved on), which aborts the parse with that error.
pub trait CacheAccess {
    fn with_caches<R>(&self, f: impl FnOnce(&mut Caches) -> R) -> Result<R, OsmError>;
}

impl CacheAccess for Mutex<Caches> {
    fn with_caches<R>(&self, f: impl FnOnce(&mut Caches) -> R) -> Result<R, OsmError> {
        Ok(f(&mut self.lock()))
    }
}

/// Parses every child of the document root.
///
/// A document without a root element fails with [`OsmError::NoData`] before
/// any cache is touched.
pub async fn parse_document<C>(
    doc: &Document,
    options: ParseOptions,
    batch_size: usize,
    caches: &C,
) -> Result<Vec<OsmObject>, OsmError>
where
    C: CacheAccess + Sync,
{
    let root = doc.root().ok_or(OsmError::NoData)?;
    let children: Vec<&Element> = root.child_elements().collect();

    for_each_idle(children, batch_size, |child| {
        match caches.with_caches(|c| parse_child(child, c, options)) {
            Ok(parsed) => ControlFlow::Continue(parsed),
            Err(e) => ControlFlow::Break(e),
        }
    })
    .await
}

/// Parses a single element, updating `caches`.
pub fn parse_child(element: &Element, caches: &mut Caches, options: ParseOptions) -> Option<OsmObject> {
    match element.name.as_str() {
        "node" | "way" | "relation" => parse_entity(element, caches, options).map(OsmObject::Entity),
        "user" => parse_user(element, caches, options).map(OsmObject::User),
        "note" => parse_note(element, caches).map(OsmObject::Note),
        _ => None,
    }
}

fn parse_entity(element: &Element, caches: &mut Caches, options: ParseOptions) -> Option<Entity> {
    let Some(id) = element
        .attr("id")
        .and_then(|raw| EntityId::from_osm(&element.name, raw))
    else {
        warn!(element = %element.name, "Skipping entity without a valid id");
        return None;
    };

    if options.skip_seen && !caches.tile.seen.insert(id) {
        trace!(id = %id, "Skipping seen entity");
        return None;
    }

    let data = match id.kind {
        EntityKind::Node => EntityData::Node {
            loc: get_loc(element),
        },
        EntityKind::Way => EntityData::Way {
            nodes: get_nodes(element),
        },
        EntityKind::Relation => EntityData::Relation {
            members: get_members(element),
        },
    };

    Some(Entity {
        id,
        visible: element.attr("visible") != Some("false"),
        version: parse_attr(element, "version"),
        changeset: parse_attr(element, "changeset"),
        timestamp: element.attr("timestamp").map(str::to_string),
        user: element.attr("user").map(str::to_string),
        uid: parse_attr(element, "uid"),
        tags: get_tags(element),
        data,
    })
}

fn parse_user(element: &Element, caches: &mut Caches, options: ParseOptions) -> Option<User> {
    let Some(uid) = parse_attr::<UserId>(element, "id") else {
        warn!("Skipping user without a valid id");
        return None;
    };

    if options.skip_seen && caches.user.users.contains_key(&uid) {
        caches.user.to_load.remove(&uid);
        return None;
    }

    let image_url = element
        .descendants("img")
        .first()
        .and_then(|img| img.attr("href"))
        .map(str::to_string);
    let changesets_count = element
        .descendants("changesets")
        .first()
        .and_then(|c| c.attr("count"))
        .and_then(|count| count.parse().ok())
        .unwrap_or(0);

    let user = User {
        id: uid,
        display_name: element.attr("display_name").map(str::to_string),
        account_created: element.attr("account_created").map(str::to_string),
        image_url,
        changesets_count,
    };

    caches.user.users.insert(uid, user.clone());
    caches.user.to_load.remove(&uid);
    Some(user)
}

fn parse_note(element: &Element, caches: &mut Caches) -> Option<Note> {
    let Some(id) = element
        .child("id")
        .and_then(|id| id.text().trim().parse().ok())
    else {
        warn!("Skipping note without a valid id");
        return None;
    };

    let mut note = Note::new(id, get_loc(element));
    for child in element.child_elements() {
        match child.name.as_str() {
            "id" => {}
            "comments" => note.comments = parse_comments(child, caches),
            name => {
                note.fields.insert(name.to_string(), child.text());
            }
        }
    }

    // One index entry per note: a reloaded note replaces its old entry.
    caches.note.remove(id);
    Some(caches.note.insert(note))
}

fn parse_comments(comments: &Element, caches: &mut Caches) -> Vec<NoteComment> {
    comments
        .child_elements()
        .filter(|c| c.name == "comment")
        .map(|comment| {
            let mut parsed = NoteComment::new();
            for field in comment.child_elements() {
                let value = field.text();
                if field.name == "uid" {
                    if let Ok(uid) = value.trim().parse::<UserId>() {
                        if !caches.user.users.contains_key(&uid) {
                            caches.user.to_load.insert(uid);
                        }
                    }
                }
                parsed.insert(field.name.clone(), value);
            }
            parsed
        })
        .collect()
}

fn parse_attr<T: std::str::FromStr>(element: &Element, key: &str) -> Option<T> {
    element.attr(key).and_then(|v| v.trim().parse().ok())
}

/// `[lon, lat]`; NaN where the attribute is absent (deleted nodes).
fn get_loc(element: &Element) -> [f64; 2] {
    [
        parse_attr(element, "lon").unwrap_or(f64::NAN),
        parse_attr(element, "lat").unwrap_or(f64::NAN),
    ]
}

pub(crate) fn get_tags(element: &Element) -> Tags {
    element
        .child_elements()
        .filter(|c| c.name == "tag")
        .filter_map(|tag| Some((tag.attr("k")?.to_string(), tag.attr("v")?.to_string())))
        .collect()
}

fn get_nodes(element: &Element) -> Vec<EntityId> {
    element
        .child_elements()
        .filter(|c| c.name == "nd")
        .filter_map(|nd| parse_attr(nd, "ref").map(EntityId::node))
        .collect()
}

fn get_members(element: &Element) -> Vec<Member> {
    element
        .child_elements()
        .filter(|c| c.name == "member")
        .filter_map(|member| {
            let kind = EntityKind::from_name(member.attr("type")?)?;
            let osm_id = parse_attr(member, "ref")?;
            Some(Member {
                id: EntityId::new(kind, osm_id),
                role: member.attr("role").unwrap_or_default().to_string(),
            })
        })
        .collect()
}
