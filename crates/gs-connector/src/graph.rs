//! Graph listing: principals whose roles are inherited through nested roles
//!
//! The source returns login and role nodes plus membership edges. Each login
//! gets every role reachable from it, each role keeping its own permissions.
//!
//! A graph may carry a nested level, e.g. database users below server logins.
//! The nested level is resolved on its own and each of its logins is attached
//! to its owning login as a nested principal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gs_common::{Listing, Principal, ProvenanceLedger, Role, SharedRole};
use gs_engine::MembershipGraph;
use indexmap::IndexMap;
use sqlx::AnyPool;
use tracing::{debug, info};

use crate::connector::{Connector, PrincipalLister};
use crate::sql::{id_column, optional_id, optional_text, RecordedQuery};
use crate::{ConnectorError, ConnectorResult};

/// One node of a principal graph.
#[derive(Debug, Clone)]
pub enum GraphEntry {
    /// A principal that appears in the listing.
    Login { id: String, principal: Principal },
    /// A role principals can be members of.
    Role { id: String, role: SharedRole },
}

impl GraphEntry {
    pub fn id(&self) -> &str {
        match self {
            GraphEntry::Login { id, .. } | GraphEntry::Role { id, .. } => id,
        }
    }

    /// The role this node contributes to its members.
    ///
    /// A login contributes its own direct-grant role, so logins nested in
    /// other logins (e.g. Windows groups) pass their grants on.
    pub fn role(&self) -> Option<SharedRole> {
        match self {
            GraphEntry::Role { role, .. } => Some(SharedRole::clone(role)),
            GraphEntry::Login { principal, .. } => {
                principal.role(&principal.username).map(SharedRole::clone)
            }
        }
    }
}

/// Everything a graph source loads in one pass.
#[derive(Debug, Clone, Default)]
pub struct PrincipalGraph {
    pub entries: Vec<GraphEntry>,
    /// `(member_id, role_id)` pairs.
    pub memberships: Vec<(String, String)>,
    pub ledger: ProvenanceLedger,
    pub nested: Option<Box<NestedGraph>>,
}

/// A lower level of principals owned by logins of the level above.
#[derive(Debug, Clone, Default)]
pub struct NestedGraph {
    pub graph: PrincipalGraph,
    /// `(nested_login_id, owner_login_id)` pairs.
    pub owners: Vec<(String, String)>,
}

#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn load(&self) -> ConnectorResult<PrincipalGraph>;
}

pub struct GraphLister<S> {
    source: S,
}

impl<S: GraphSource> GraphLister<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S: GraphSource> PrincipalLister for GraphLister<S> {
    async fn list_principals(&self) -> ConnectorResult<Listing> {
        let (principals, ledger) = resolve(self.source.load().await?);
        let principals: Vec<Principal> = principals.into_values().collect();

        info!(
            principals = principals.len(),
            commands = ledger.len(),
            "Graph listing assembled"
        );
        Ok(Listing::new(principals, ledger))
    }
}

/// Resolve one level, then attach the resolved nested level to its owners.
/// Logins are returned in source order, keyed by id.
fn resolve(graph: PrincipalGraph) -> (IndexMap<String, Principal>, ProvenanceLedger) {
    let PrincipalGraph {
        entries,
        memberships,
        mut ledger,
        nested,
    } = graph;

    let logins: Vec<String> = entries
        .iter()
        .filter(|e| matches!(e, GraphEntry::Login { .. }))
        .map(|e| e.id().to_string())
        .collect();

    let closure = MembershipGraph::from_parts(
        entries.into_iter().map(|e| (e.id().to_string(), e)),
        memberships,
    );
    debug!(nodes = closure.len(), logins = logins.len(), "Principal graph built");

    let mut principals = IndexMap::with_capacity(logins.len());
    for id in logins {
        let Some(GraphEntry::Login { principal, .. }) = closure.get(&id) else {
            continue;
        };
        let mut principal = principal.clone();
        closure.attach_ancestor_roles(&mut principal, &id, GraphEntry::role);
        principals.insert(id, principal);
    }

    if let Some(level) = nested {
        let NestedGraph { graph, owners } = *level;
        let (mut members, nested_ledger) = resolve(graph);
        ledger.merge(nested_ledger);

        for (member_id, owner_id) in owners {
            let Some(owner) = principals.get_mut(&owner_id) else {
                info!(
                    member_id = %member_id,
                    owner_id = %owner_id,
                    "Skipping nested principal with unknown owner"
                );
                continue;
            };
            let Some(member) = members.shift_remove(&member_id) else {
                info!(
                    member_id = %member_id,
                    owner_id = %owner_id,
                    "Skipping unknown nested principal"
                );
                continue;
            };
            owner.add_nested(member);
        }
    }

    (principals, ledger)
}

// ============================================================================
// SQL-backed graph source
// ============================================================================

/// The three statements a [`SqlGraphSource`] runs per level, in this order.
///
/// Column contract:
/// - `principals`: `id`, `name`, `kind` (`login` or `role`), `created_at`
///   (nullable RFC 3339 text). On a nested level also `owner_id`: the id of
///   the owning login one level up, NULL for roles and unowned logins.
/// - `memberships`: `member_id`, `role_id`
/// - `grants`: `principal_id`, `object`, `permission`, `state`
///   (`DENY`/`REVOKE`, or their single-letter codes `D`/`R`, are denials;
///   anything else is a grant)
#[derive(Debug, Clone)]
pub struct SqlGraphQueries {
    pub principals: String,
    pub memberships: String,
    pub grants: String,
    /// Statements for the level nested below this one.
    pub nested: Option<Box<SqlGraphQueries>>,
}

impl SqlGraphQueries {
    pub fn new(
        principals: impl Into<String>,
        memberships: impl Into<String>,
        grants: impl Into<String>,
    ) -> Self {
        Self {
            principals: principals.into(),
            memberships: memberships.into(),
            grants: grants.into(),
            nested: None,
        }
    }

    pub fn with_nested(mut self, nested: SqlGraphQueries) -> Self {
        self.nested = Some(Box::new(nested));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Login,
    Role,
}

impl NodeKind {
    fn parse(kind: &str) -> ConnectorResult<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "login" | "user" => Ok(NodeKind::Login),
            "role" | "group" => Ok(NodeKind::Role),
            other => Err(ConnectorError::InvalidResponse(format!(
                "unknown principal kind '{}'",
                other
            ))),
        }
    }
}

fn is_denial(state: &str) -> bool {
    matches!(
        state.to_ascii_uppercase().as_str(),
        "DENY" | "REVOKE" | "D" | "R"
    )
}

struct PendingNode {
    kind: NodeKind,
    created: Option<DateTime<Utc>>,
    role: Role,
}

#[derive(Debug, Clone)]
pub struct SqlGraphSource {
    pool: AnyPool,
    queries: SqlGraphQueries,
}

impl SqlGraphSource {
    pub fn new(pool: AnyPool, queries: SqlGraphQueries) -> Self {
        Self { pool, queries }
    }
}

impl SqlGraphSource {
    /// Load one level. Owner links are read only when `nested` is set.
    async fn load_level(
        &self,
        queries: &SqlGraphQueries,
        nested: bool,
    ) -> ConnectorResult<(PrincipalGraph, Vec<(String, String)>)> {
        let mut ledger = ProvenanceLedger::new();

        let (rows, record) = RecordedQuery::new(queries.principals.as_str())
            .fetch_all(&self.pool)
            .await?;
        ledger.push(record);

        let mut nodes: IndexMap<String, PendingNode> = IndexMap::new();
        let mut owners = Vec::new();
        for row in &rows {
            let id = id_column(row, "id")?;
            let name = id_column(row, "name")?;
            let kind = NodeKind::parse(&id_column(row, "kind")?)?;
            let created = optional_text(row, "created_at")?
                .map(|t| {
                    DateTime::parse_from_rfc3339(&t)
                        .map(|d| d.with_timezone(&Utc))
                        .map_err(|e| {
                            ConnectorError::InvalidResponse(format!("created_at '{}': {}", t, e))
                        })
                })
                .transpose()?;

            if nested && kind == NodeKind::Login {
                if let Some(owner) = optional_id(row, "owner_id")? {
                    owners.push((id.clone(), owner));
                }
            }

            nodes.entry(id).or_insert(PendingNode {
                kind,
                created,
                role: Role::new(name),
            });
        }

        let (rows, record) = RecordedQuery::new(queries.memberships.as_str())
            .fetch_all(&self.pool)
            .await?;
        ledger.push(record);

        let memberships = rows
            .iter()
            .map(|row| -> ConnectorResult<(String, String)> {
                Ok((id_column(row, "member_id")?, id_column(row, "role_id")?))
            })
            .collect::<ConnectorResult<Vec<_>>>()?;

        let (rows, record) = RecordedQuery::new(queries.grants.as_str())
            .fetch_all(&self.pool)
            .await?;
        ledger.push(record);

        for row in &rows {
            let principal_id = id_column(row, "principal_id")?;
            let Some(node) = nodes.get_mut(&principal_id) else {
                info!(principal_id = %principal_id, "Skipping grant for unknown principal");
                continue;
            };
            let object = optional_text(row, "object")?.unwrap_or_default();
            let permission = id_column(row, "permission")?;
            let state = optional_text(row, "state")?.unwrap_or_default();

            if is_denial(&state) {
                node.role.deny(object, permission);
            } else {
                node.role.grant(object, permission);
            }
        }

        let entries = nodes
            .into_iter()
            .map(|(id, node)| match node.kind {
                NodeKind::Login => {
                    let mut principal = Principal::new(node.role.name.as_str());
                    if let Some(created) = node.created {
                        principal = principal.with_created_time(created);
                    }
                    GraphEntry::Login {
                        id,
                        principal: principal.with_role(node.role.shared()),
                    }
                }
                NodeKind::Role => GraphEntry::Role {
                    id,
                    role: node.role.shared(),
                },
            })
            .collect();

        let graph = PrincipalGraph {
            entries,
            memberships,
            ledger,
            nested: None,
        };
        Ok((graph, owners))
    }
}

#[async_trait]
impl GraphSource for SqlGraphSource {
    async fn load(&self) -> ConnectorResult<PrincipalGraph> {
        let mut levels = Vec::new();
        let mut queries = Some(&self.queries);
        while let Some(level) = queries {
            let nested = !levels.is_empty();
            levels.push(self.load_level(level, nested).await?);
            queries = level.nested.as_deref();
        }

        // Fold from the deepest level up; owners of the top level are unused.
        let mut below: Option<Box<NestedGraph>> = None;
        for (mut graph, owners) in levels.into_iter().rev() {
            graph.nested = below.take();
            below = Some(Box::new(NestedGraph { graph, owners }));
        }
        Ok(below.map(|level| level.graph).unwrap_or_default())
    }
}

/// Connector for relational engines whose permissions live in catalog tables.
pub struct SqlConnector {
    name: String,
    source: SqlGraphSource,
}

impl SqlConnector {
    pub fn new(name: impl Into<String>, pool: AnyPool, queries: SqlGraphQueries) -> Self {
        Self {
            name: name.into(),
            source: SqlGraphSource::new(pool, queries),
        }
    }
}

impl Connector for SqlConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn user_interface(&self) -> ConnectorResult<Box<dyn PrincipalLister>> {
        Ok(Box::new(GraphLister::new(self.source.clone())))
    }
}
