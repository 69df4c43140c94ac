//! Grantscan Record Model
//!
//! Normalized entities produced by every connector:
//! - [`Principal`]: a user, login or service identity
//! - [`Role`]: a named bundle of granted (and optionally denied) permissions
//! - [`PermissionMap`]: resource object -> ordered permission verbs
//! - [`CommandRecord`] / [`ProvenanceLedger`]: the audit trail of every request issued
//!
//! Records live in memory for the duration of one listing. Serialization is
//! provided so callers can persist them; nothing here writes anywhere.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub mod logging;

// ============================================================================
// Permissions
// ============================================================================

/// Mapping from a resource-object identifier (e.g. `TABLE::schema.table`, `*`)
/// to the permission verbs granted on it.
///
/// Append-only with no deduplication: granting the same verb twice on the same
/// object stores it twice. Connectors rely on this to keep a one-to-one
/// relationship between source grant rows and stored verbs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(IndexMap<String, Vec<String>>);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `verb` to the list stored at `object`, creating it if absent.
    pub fn merge(&mut self, object: impl Into<String>, verb: impl Into<String>) {
        self.0.entry(object.into()).or_default().push(verb.into());
    }

    /// Builder form of [`PermissionMap::merge`].
    pub fn with(mut self, object: impl Into<String>, verb: impl Into<String>) -> Self {
        self.merge(object, verb);
        self
    }

    /// Register `object` with no verbs. Used for sources that report an object
    /// without any grant on it.
    pub fn touch(&mut self, object: impl Into<String>) {
        self.0.entry(object.into()).or_default();
    }

    /// Append every verb of `other`, object by object, in order.
    pub fn extend(&mut self, other: &PermissionMap) {
        for (object, verbs) in other.iter() {
            self.0
                .entry(object.clone())
                .or_default()
                .extend(verbs.iter().cloned());
        }
    }

    pub fn get(&self, object: &str) -> Option<&[String]> {
        self.0.get(object).map(Vec::as_slice)
    }

    pub fn contains(&self, object: &str, verb: &str) -> bool {
        self.get(object)
            .map(|verbs| verbs.iter().any(|v| v == verb))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn objects(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of objects (not verbs).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<O, V> FromIterator<(O, V)> for PermissionMap
where
    O: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (O, V)>>(iter: I) -> Self {
        let mut map = PermissionMap::new();
        for (object, verb) in iter {
            map.merge(object, verb);
        }
        map
    }
}

// ============================================================================
// Roles
// ============================================================================

/// A role attached to one or more principals.
///
/// Roles are built once and then shared read-only; see [`SharedRole`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub permissions: PermissionMap,
    /// Explicit denials for systems with deny semantics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied: Option<PermissionMap>,
}

/// A role shared by reference across principals. Many users holding the same
/// group point at the same allocation.
pub type SharedRole = Arc<Role>;

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: PermissionMap::new(),
            denied: None,
        }
    }

    pub fn with_permissions(mut self, permissions: PermissionMap) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_denied(mut self, denied: PermissionMap) -> Self {
        self.denied = Some(denied);
        self
    }

    pub fn grant(&mut self, object: impl Into<String>, verb: impl Into<String>) {
        self.permissions.merge(object, verb);
    }

    pub fn deny(&mut self, object: impl Into<String>, verb: impl Into<String>) {
        self.denied.get_or_insert_with(PermissionMap::new).merge(object, verb);
    }

    pub fn has_denials(&self) -> bool {
        self.denied.as_ref().map(|d| !d.is_empty()).unwrap_or(false)
    }

    /// Freeze the role for sharing.
    pub fn shared(self) -> SharedRole {
        Arc::new(self)
    }
}

// ============================================================================
// Principals
// ============================================================================

/// A user or login extracted from a source system.
///
/// `username` is unique within one listing. Created once per listing and not
/// mutated after the listing completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_change_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roles: HashMap<String, SharedRole>,
    /// Sub-principals, e.g. database-level users under a server login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_principals: Option<HashMap<String, Principal>>,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_created_time(mut self, created: DateTime<Utc>) -> Self {
        self.created_time = Some(created);
        self
    }

    pub fn with_last_change_time(mut self, changed: DateTime<Utc>) -> Self {
        self.last_change_time = Some(changed);
        self
    }

    pub fn with_role(mut self, role: SharedRole) -> Self {
        self.add_role(role);
        self
    }

    /// Attach a role under its own name. Last writer wins: an existing role
    /// with the same name is replaced and returned.
    pub fn add_role(&mut self, role: SharedRole) -> Option<SharedRole> {
        self.roles.insert(role.name.clone(), role)
    }

    pub fn role(&self, name: &str) -> Option<&SharedRole> {
        self.roles.get(name)
    }

    /// Insert a sub-principal keyed by its username, creating the nested map on first use.
    pub fn add_nested(&mut self, nested: Principal) -> Option<Principal> {
        self.nested_principals
            .get_or_insert_with(HashMap::new)
            .insert(nested.username.clone(), nested)
    }

    pub fn nested(&self, username: &str) -> Option<&Principal> {
        self.nested_principals.as_ref().and_then(|n| n.get(username))
    }
}

// ============================================================================
// Provenance
// ============================================================================

/// One outbound request or query, recorded as audit evidence.
///
/// Fields are private; a record is assembled with the builder methods and
/// only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameters: Option<IndexMap<String, serde_json::Value>>,
    #[serde(default)]
    raw_data: String,
}

impl CommandRecord {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            parameters: None,
            raw_data: String::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: IndexMap<String, serde_json::Value>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_raw_data(mut self, raw_data: impl Into<String>) -> Self {
        self.raw_data = raw_data.into();
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn parameters(&self) -> Option<&IndexMap<String, serde_json::Value>> {
        self.parameters.as_ref()
    }

    pub fn raw_data(&self) -> &str {
        &self.raw_data
    }
}

/// Ordered, append-only sequence of [`CommandRecord`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceLedger {
    commands: Vec<CommandRecord>,
}

impl ProvenanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: CommandRecord) {
        self.commands.push(record);
    }

    /// Append all of `other`'s records after this ledger's, preserving both orders.
    pub fn merge(&mut self, other: ProvenanceLedger) {
        self.commands.extend(other.commands);
    }

    /// Builder form of [`ProvenanceLedger::merge`].
    pub fn merged(mut self, other: ProvenanceLedger) -> Self {
        self.merge(other);
        self
    }

    pub fn commands(&self) -> &[CommandRecord] {
        &self.commands
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommandRecord> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl From<CommandRecord> for ProvenanceLedger {
    fn from(record: CommandRecord) -> Self {
        Self { commands: vec![record] }
    }
}

impl FromIterator<CommandRecord> for ProvenanceLedger {
    fn from_iter<I: IntoIterator<Item = CommandRecord>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

impl Extend<CommandRecord> for ProvenanceLedger {
    fn extend<I: IntoIterator<Item = CommandRecord>>(&mut self, iter: I) {
        self.commands.extend(iter);
    }
}

impl IntoIterator for ProvenanceLedger {
    type Item = CommandRecord;
    type IntoIter = std::vec::IntoIter<CommandRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

impl<'a> IntoIterator for &'a ProvenanceLedger {
    type Item = &'a CommandRecord;
    type IntoIter = std::slice::Iter<'a, CommandRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

// ============================================================================
// Listing
// ============================================================================

/// Result of one successful listing call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub principals: Vec<Principal>,
    pub ledger: ProvenanceLedger,
}

impl Listing {
    pub fn new(principals: Vec<Principal>, ledger: ProvenanceLedger) -> Self {
        Self { principals, ledger }
    }

    pub fn principal(&self, username: &str) -> Option<&Principal> {
        self.principals.iter().find(|p| p.username == username)
    }
}
