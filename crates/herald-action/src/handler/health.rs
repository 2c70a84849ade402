//! Liveness route for the HTTP surface.

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::debug::DebugStream;
use crate::error::ActionError;
use crate::event::{RouteExchange, RouteResponse};
use crate::handler::ActionHandler;

pub struct HealthRoute;

#[async_trait]
impl ActionHandler<RouteExchange> for HealthRoute {
    async fn handle(
        &self,
        ctx: &InvocationContext<RouteExchange>,
        _debug: Option<&DebugStream>,
    ) -> Result<(), ActionError> {
        ctx.event.respond(RouteResponse::json(
            200,
            &serde_json::json!({
                "status": "ok",
                "correlation_id": ctx.correlation_id,
            }),
        ));
        Ok(())
    }
}
