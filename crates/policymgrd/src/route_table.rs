//! In-memory route table acting as the policy engine's candidate source.
//!
//! Routes keep their insertion order, which doubles as the bulk cursor:
//! mark `n` is the n-th route. A route is identified by its prefix and
//! source protocol; re-adding the same pair replaces the configured entry.
//!
//! Every applied action is kept on the route as a [`RouteEffect`], and the
//! visible route attributes are recomputed from the remaining effects
//! whenever one is withdrawn.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use sonic_policy::{
    ActionContext, ActionKind, BulkPage, PolicyCandidate, PolicyEngineCallbacks, RouteDisposition,
};
use sonic_types::IpPrefix;
use tracing::debug;

/// Protocol-specific hints carried on a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyExtension {
    Bgp { local_preference: u32 },
    Ospf { metric_type: u8 },
}

/// Extension payload type used by the daemon's engine.
pub type PolicyExt = Option<PolicyExtension>;

/// A route as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub prefix: IpPrefix,
    pub protocol: String,
    #[serde(default)]
    pub admin_distance: u32,
}

impl RouteEntry {
    pub fn new(prefix: IpPrefix, protocol: impl Into<String>) -> Self {
        Self {
            prefix,
            protocol: protocol.into(),
            admin_distance: 0,
        }
    }

    /// Candidate key, unique per (prefix, protocol).
    pub fn key(&self) -> String {
        format!("{}|{}", self.prefix, self.protocol)
    }
}

/// One action applied to a route by one statement of one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEffect {
    pub policy: String,
    pub statement: String,
    pub action: String,
    pub kind: ActionKind,
    pub extension: PolicyExt,
}

impl RouteEffect {
    fn from_context(ctx: &ActionContext<'_, PolicyExt>) -> Self {
        Self {
            policy: ctx.policy.to_string(),
            statement: ctx.statement.to_string(),
            action: ctx.action.name.clone(),
            kind: ctx.action.kind.clone(),
            extension: *ctx.extensions,
        }
    }

    fn is_from(&self, ctx: &ActionContext<'_, PolicyExt>) -> bool {
        self.policy == ctx.policy && self.statement == ctx.statement && self.action == ctx.action.name
    }
}

/// A route plus the policy effects currently applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteState {
    pub entry: RouteEntry,
    pub disposition: Option<RouteDisposition>,
    /// Admin distance set by a policy, overriding the configured one.
    pub admin_distance_override: Option<u32>,
    pub redistributed_to: Vec<String>,
    pub local_preference: Option<u32>,
    pub metric_type: Option<u8>,
    /// Live effects in application order.
    pub effects: Vec<RouteEffect>,
}

impl RouteState {
    fn new(entry: RouteEntry) -> Self {
        Self {
            entry,
            disposition: None,
            admin_distance_override: None,
            redistributed_to: Vec::new(),
            local_preference: None,
            metric_type: None,
            effects: Vec::new(),
        }
    }

    pub fn key(&self) -> String {
        self.entry.key()
    }

    pub fn admin_distance(&self) -> u32 {
        self.admin_distance_override
            .unwrap_or(self.entry.admin_distance)
    }

    fn to_candidate(&self) -> PolicyCandidate {
        PolicyCandidate::new(self.key())
            .with_destination(self.entry.prefix)
            .with_protocol(self.entry.protocol.clone())
    }

    fn apply(&mut self, ctx: &ActionContext<'_, PolicyExt>) {
        match self.effects.iter_mut().find(|e| e.is_from(ctx)) {
            Some(effect) => *effect = RouteEffect::from_context(ctx),
            None => self.effects.push(RouteEffect::from_context(ctx)),
        }
        self.recompute();
    }

    fn withdraw(&mut self, ctx: &ActionContext<'_, PolicyExt>) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| !e.is_from(ctx));
        self.recompute();
        self.effects.len() != before
    }

    /// Rebuilds the visible attributes; later effects override earlier ones.
    fn recompute(&mut self) {
        self.disposition = None;
        self.admin_distance_override = None;
        self.redistributed_to.clear();
        self.local_preference = None;
        self.metric_type = None;

        for effect in &self.effects {
            match &effect.kind {
                ActionKind::RouteDisposition(disposition) => self.disposition = Some(*disposition),
                ActionKind::Redistribution { target_protocol } => {
                    if !self.redistributed_to.contains(target_protocol) {
                        self.redistributed_to.push(target_protocol.clone());
                    }
                }
                ActionKind::SetAdminDistance { value } => self.admin_distance_override = Some(*value),
            }
            match effect.extension {
                Some(PolicyExtension::Bgp { local_preference }) => {
                    self.local_preference = Some(local_preference)
                }
                Some(PolicyExtension::Ospf { metric_type }) => self.metric_type = Some(metric_type),
                None => {}
            }
        }
    }
}

/// Route table shared between the daemon and its policy engine.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Mutex<Vec<RouteState>>,
}

impl RouteTable {
    pub fn new(routes: impl IntoIterator<Item = RouteEntry>) -> Self {
        let table = Self::default();
        for entry in routes {
            table.add_route(entry);
        }
        table
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RouteState>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a route, or replaces the configured entry of an existing
    /// (prefix, protocol) route while keeping its effects. Policies only
    /// see a new route on their next evaluation.
    pub fn add_route(&self, entry: RouteEntry) {
        let mut routes = self.lock();
        let key = entry.key();
        match routes.iter_mut().find(|r| r.key() == key) {
            Some(route) => route.entry = entry,
            None => routes.push(RouteState::new(entry)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// First route for `prefix`, from any protocol.
    pub fn route(&self, prefix: &IpPrefix) -> Option<RouteState> {
        self.lock().iter().find(|r| r.entry.prefix == *prefix).cloned()
    }

    pub fn route_from(&self, prefix: &IpPrefix, protocol: &str) -> Option<RouteState> {
        self.lock()
            .iter()
            .find(|r| r.entry.prefix == *prefix && r.entry.protocol == protocol)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<RouteState> {
        self.lock().clone()
    }

    fn with_route<F, T>(&self, key: &str, f: F) -> Result<T, String>
    where
        F: FnOnce(&mut RouteState) -> T,
    {
        let mut routes = self.lock();
        let route = routes
            .iter_mut()
            .find(|r| r.key() == key)
            .ok_or_else(|| format!("route {} not found", key))?;
        Ok(f(route))
    }
}

impl PolicyEngineCallbacks<PolicyExt> for RouteTable {
    fn get_bulk_candidates(
        &self,
        cur_mark: usize,
        count: usize,
    ) -> Result<BulkPage<PolicyCandidate>, String> {
        let routes = self.lock();
        let start = cur_mark.min(routes.len());
        let end = start.saturating_add(count).min(routes.len());
        Ok(BulkPage {
            items: routes[start..end].iter().map(RouteState::to_candidate).collect(),
            next_mark: end,
            more: end < routes.len(),
        })
    }

    fn apply_action(
        &self,
        ctx: &ActionContext<'_, PolicyExt>,
        candidate: &PolicyCandidate,
    ) -> Result<(), String> {
        debug!(
            policy = ctx.policy,
            action = %ctx.action.name,
            route = %candidate.key,
            "apply"
        );
        self.with_route(&candidate.key, |route| route.apply(ctx))
    }

    fn withdraw_action(
        &self,
        ctx: &ActionContext<'_, PolicyExt>,
        candidate: &PolicyCandidate,
    ) -> Result<(), String> {
        debug!(
            policy = ctx.policy,
            action = %ctx.action.name,
            route = %candidate.key,
            "withdraw"
        );
        if !self.with_route(&candidate.key, |route| route.withdraw(ctx))? {
            debug!(route = %candidate.key, "no live effect to withdraw");
        }
        Ok(())
    }
}
