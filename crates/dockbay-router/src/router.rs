use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dockbay_core::{
    AgentLogger, ChatModel, ChatResponse, ContextStore, Error, Message, MetaEvent, Result, ToolDef,
};

use crate::config::{RouterConfig, StickyMode, Strategy};
use crate::health::{Clock, HealthSnapshot, HealthTable, SystemClock};
use crate::sanitize::sanitize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Single request/response call.
    Raw,
    Stream,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Raw => "raw",
            Operation::Stream => "stream",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Tools,
    Stream,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Tools => "tools",
            Capability::Stream => "stream",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPolicy {
    pub supports_tools: bool,
    pub supports_stream: bool,
    /// Share in round-robin rotation; values below 1 count as 1.
    pub weight: u32,
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self { supports_tools: true, supports_stream: true, weight: 1 }
    }
}

impl TargetPolicy {
    pub fn supports(&self, capability: Option<Capability>) -> bool {
        match capability {
            None => true,
            Some(Capability::Tools) => self.supports_tools,
            Some(Capability::Stream) => self.supports_stream,
        }
    }
}

#[derive(Clone)]
pub struct RouteTarget {
    pub id: String,
    pub handle: Arc<dyn ChatModel>,
    pub policy: TargetPolicy,
}

impl RouteTarget {
    pub fn new(id: impl Into<String>, handle: Arc<dyn ChatModel>) -> Self {
        Self { id: id.into(), handle, policy: TargetPolicy::default() }
    }

    pub fn with_policy(mut self, policy: TargetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.policy.weight = weight;
        self
    }
}

/// Work performed against whichever target the router picks. Called at most
/// once per target per route.
#[async_trait]
pub trait RouteAction: Send {
    type Output: Send;

    async fn run(&mut self, target: &dyn ChatModel) -> Result<Self::Output>;
}

struct SendAction<'a> {
    messages: Vec<Message>,
    tools: &'a [ToolDef],
}

#[async_trait]
impl<'a> RouteAction for SendAction<'a> {
    type Output = ChatResponse;

    async fn run(&mut self, target: &dyn ChatModel) -> Result<ChatResponse> {
        target.send(&self.messages, self.tools).await
    }
}

struct StreamAction<'a> {
    messages: Vec<Message>,
    tools: &'a [ToolDef],
    on_token: &'a mut (dyn for<'t> FnMut(&'t str) + Send),
    on_meta: &'a mut (dyn FnMut(MetaEvent) + Send),
}

#[async_trait]
impl<'a> RouteAction for StreamAction<'a> {
    type Output = ();

    async fn run(&mut self, target: &dyn ChatModel) -> Result<()> {
        target.stream(&self.messages, self.tools, &mut *self.on_token, &mut *self.on_meta).await
    }
}

/// Routes chat calls across several targets with failover or weighted
/// round-robin ordering, per-target cooldowns and optional sticky selection.
///
/// Health state lives in the router and is shared by every caller; sticky
/// and rotation state live in the caller's `ContextStore`.
pub struct ChatRouter {
    config: RouterConfig,
    targets: Vec<RouteTarget>,
    health: HealthTable,
    clock: Arc<dyn Clock>,
    logger: Option<Arc<dyn AgentLogger>>,
}

impl ChatRouter {
    pub fn new(config: RouterConfig, targets: Vec<RouteTarget>) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::InvalidConfig(format!("router '{}' has no targets", config.name)));
        }
        let mut seen = HashSet::new();
        for t in &targets {
            if !seen.insert(t.id.as_str()) {
                return Err(Error::InvalidConfig(format!("router '{}': duplicate target '{}'", config.name, t.id)));
            }
        }
        let health = HealthTable::new(targets.len(), config.max_failures, config.cooldown_seconds);
        Ok(Self { config, targets, health, clock: Arc::new(SystemClock), logger: None })
    }

    /// Resolve `config.targets` against a registry of chat models by id.
    pub fn from_registry(config: RouterConfig, registry: &HashMap<String, Arc<dyn ChatModel>>) -> Result<Self> {
        let targets = config
            .targets
            .iter()
            .map(|t| {
                let handle = registry.get(&t.id).cloned().ok_or_else(|| {
                    Error::InvalidConfig(format!("router '{}': unknown target '{}'", config.name, t.id))
                })?;
                let weight = u32::try_from(t.weight.max(1)).unwrap_or(u32::MAX);
                Ok(RouteTarget::new(t.id.clone(), handle).with_policy(TargetPolicy {
                    supports_tools: t.supports_tools,
                    supports_stream: t.supports_stream,
                    weight,
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(config, targets)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn AgentLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn targets(&self) -> &[RouteTarget] {
        &self.targets
    }

    pub fn health_snapshot(&self) -> Vec<HealthSnapshot> {
        let ids: Vec<String> = self.targets.iter().map(|t| t.id.clone()).collect();
        self.health.snapshot(&ids, self.clock.now())
    }

    pub async fn send(
        &self,
        ctx: &dyn ContextStore,
        cancel: &CancellationToken,
        messages: &[Message],
        tools: &[ToolDef],
    ) -> Result<ChatResponse> {
        let required = (!tools.is_empty()).then_some(Capability::Tools);
        let mut action = SendAction { messages: sanitize(messages, !tools.is_empty()), tools };
        self.route(ctx, Operation::Raw, required, cancel, &mut action).await
    }

    /// Tokens are forwarded as they arrive. A target that fails mid-stream
    /// may already have delivered some tokens before failover.
    pub async fn stream(
        &self,
        ctx: &dyn ContextStore,
        cancel: &CancellationToken,
        messages: &[Message],
        tools: &[ToolDef],
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
        on_meta: &mut (dyn FnMut(MetaEvent) + Send),
    ) -> Result<()> {
        let mut action = StreamAction { messages: sanitize(messages, !tools.is_empty()), tools, on_token, on_meta };
        self.route(ctx, Operation::Stream, Some(Capability::Stream), cancel, &mut action).await
    }

    pub async fn route<A: RouteAction>(
        &self,
        ctx: &dyn ContextStore,
        operation: Operation,
        required: Option<Capability>,
        cancel: &CancellationToken,
        action: &mut A,
    ) -> Result<A::Output> {
        let candidates: Vec<usize> = self
            .targets
            .iter()
            .enumerate()
            .filter(|(_, t)| t.policy.supports(required))
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            let needed = required.map_or_else(|| "any".to_string(), |c| c.to_string());
            return Err(Error::CapabilityUnavailable(format!(
                "router '{}': no targets support {needed}",
                self.config.name
            )));
        }

        let mut last_error: Option<Error> = None;
        let mut sticky_tried: Option<usize> = None;

        if self.config.sticky {
            if let Some(index) = self.read_sticky(ctx, operation) {
                if candidates.contains(&index) && !self.health.is_cooling(index, self.clock.now()) {
                    sticky_tried = Some(index);
                    debug!(router = %self.config.name, target = %self.targets[index].id, "trying sticky target");
                    match self.attempt(index, operation, cancel, action).await {
                        Ok(output) => return Ok(output),
                        Err(e) if e.is_cancelled() => return Err(e),
                        Err(e) => last_error = Some(e),
                    }
                }
            }
        }

        let order = match self.config.strategy {
            Strategy::Failover => candidates.clone(),
            Strategy::RoundRobin => self.rotation(ctx, operation, &candidates),
        };

        for index in order {
            if sticky_tried == Some(index) {
                continue;
            }
            if self.health.is_cooling(index, self.clock.now()) {
                debug!(router = %self.config.name, target = %self.targets[index].id, "skipping target in cooldown");
                continue;
            }
            match self.attempt(index, operation, cancel, action).await {
                Ok(output) => {
                    if self.config.sticky {
                        ctx.set_var(&self.sticky_key(operation), Value::from(index));
                    }
                    return Ok(output);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Err(Error::NoAvailableTargets(format!(
                "router '{}': all {} capable targets are cooling down",
                self.config.name,
                candidates.len()
            ))),
        }
    }

    async fn attempt<A: RouteAction>(
        &self,
        index: usize,
        operation: Operation,
        cancel: &CancellationToken,
        action: &mut A,
    ) -> Result<A::Output> {
        let target = &self.targets[index];
        debug!(router = %self.config.name, target = %target.id, %operation, "attempt");
        self.emit(&format!("attempt target={} op={operation}", target.id));

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(router = %self.config.name, target = %target.id, "cancelled");
                return Err(Error::Cancelled);
            }
            result = action.run(target.handle.as_ref()) => result,
        };

        match outcome {
            Ok(output) => {
                self.health.record_success(index);
                info!(router = %self.config.name, target = %target.id, %operation, "target succeeded");
                self.emit(&format!("success target={} op={operation}", target.id));
                Ok(output)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                let kind = e.failure_kind();
                let record = self.health.record_failure(index, kind, self.clock.now());
                warn!(
                    router = %self.config.name,
                    target = %target.id,
                    %operation,
                    kind = %kind,
                    failures = record.failures,
                    error = %e,
                    "target failed"
                );
                self.emit(&format!("failure target={} op={operation} kind={kind} error={e}", target.id));
                if let Some(until) = record.cooldown_until {
                    warn!(router = %self.config.name, target = %target.id, until = %until, "cooldown opened");
                    self.emit(&format!("cooldown target={} until={}", target.id, until.to_rfc3339()));
                }
                Err(e)
            }
        }
    }

    /// Weighted virtual list rotated by the stored position, first
    /// occurrence of each target kept.
    fn rotation(&self, ctx: &dyn ContextStore, operation: Operation, candidates: &[usize]) -> Vec<usize> {
        let slots: Vec<usize> = candidates
            .iter()
            .flat_map(|&i| std::iter::repeat(i).take(self.targets[i].policy.weight.max(1) as usize))
            .collect();
        let position = ctx.fetch_add(&self.rr_key(operation), 1);
        let start = usize::try_from(position.rem_euclid(slots.len() as i64)).unwrap_or(0);

        let mut order = Vec::with_capacity(candidates.len());
        for &i in slots[start..].iter().chain(&slots[..start]) {
            if !order.contains(&i) {
                order.push(i);
            }
        }
        for &i in candidates {
            if !order.contains(&i) {
                order.push(i);
            }
        }
        order
    }

    fn read_sticky(&self, ctx: &dyn ContextStore, operation: Operation) -> Option<usize> {
        ctx.get_var(&self.sticky_key(operation))
            .and_then(|v| v.as_u64())
            .and_then(|v| usize::try_from(v).ok())
    }

    pub fn sticky_key(&self, operation: Operation) -> String {
        match self.config.sticky_mode {
            StickyMode::Global => format!("router:{}:sticky", self.config.name),
            StickyMode::PerOp => format!("router:{}:sticky:{operation}", self.config.name),
        }
    }

    pub fn rr_key(&self, operation: Operation) -> String {
        format!("router:{}:rr:{operation}", self.config.name)
    }

    fn emit(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.log(&format!("router:{}", self.config.name), message);
        }
    }
}
