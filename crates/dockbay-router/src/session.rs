use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use dockbay_core::{ChatModel, ChatResponse, ContextStore, Message, MetaEvent, Options, Result, ToolDef};

use crate::router::ChatRouter;

/// A router bound to one conversation's context, usable anywhere a
/// `ChatModel` is expected (including as a target of another router).
pub struct SessionRouter {
    router: Arc<ChatRouter>,
    ctx: Arc<dyn ContextStore>,
    cancel: CancellationToken,
}

impl SessionRouter {
    pub fn new(router: Arc<ChatRouter>, ctx: Arc<dyn ContextStore>) -> Self {
        Self { router, ctx, cancel: CancellationToken::new() }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn router(&self) -> &ChatRouter {
        &self.router
    }

    pub fn context(&self) -> &dyn ContextStore {
        self.ctx.as_ref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[async_trait]
impl ChatModel for SessionRouter {
    async fn send(&self, messages: &[Message], tools: &[ToolDef]) -> Result<ChatResponse> {
        self.router.send(self.ctx.as_ref(), &self.cancel, messages, tools).await
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
        on_meta: &mut (dyn FnMut(MetaEvent) + Send),
    ) -> Result<()> {
        self.router.stream(self.ctx.as_ref(), &self.cancel, messages, tools, on_token, on_meta).await
    }

    fn options(&self) -> Options {
        let mut options = Options::new();
        options.insert("router".to_string(), Value::from(self.router.name()));
        let targets: Vec<Value> = self.router.targets().iter().map(|t| Value::from(t.id.as_str())).collect();
        options.insert("targets".to_string(), Value::Array(targets));
        options
    }

    /// Forwarded to every target; the first failure is returned after all
    /// targets have been offered the options.
    fn set_options(&self, options: Options) -> Result<()> {
        let mut first_error = None;
        for target in self.router.targets() {
            if let Err(e) = target.handle.set_options(options.clone()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
