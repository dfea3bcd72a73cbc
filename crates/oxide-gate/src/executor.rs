//! Runs the rule chain of a matched route.

use tracing::debug;

use crate::context::RequestContext;
use crate::error::{guarded, GateError};
use crate::plugin::PluginPipeline;
use crate::rule::{RuleOutcome, SharedRule};

/// Executes `rules` in order, stopping at the first decision.
///
/// Plugins see every rule through `before_rule` / `after_rule`. A failing
/// rule fails the chain; its `after_rule` hooks do not run.
pub async fn execute_chain<T: Send + Sync>(
    rules: &[SharedRule<T>],
    ctx: &mut RequestContext<T>,
    plugins: &PluginPipeline<T>,
) -> RuleOutcome {
    for rule in rules {
        plugins.before_rule(ctx, rule.as_ref()).await;

        let decision = guarded(rule.evaluate(ctx))
            .await
            .map_err(|err| match err {
                GateError::Panicked(message) => GateError::rule(rule.name(), message),
                other => other,
            })?;

        plugins.after_rule(ctx, rule.as_ref(), decision.as_ref()).await;

        if let Some(response) = decision {
            debug!(
                rule = %rule.name(),
                path = %ctx.path,
                status = response.status,
                "Rule decided"
            );
            return Ok(Some(response));
        }
    }

    Ok(None)
}
