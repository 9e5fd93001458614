//! Confirmation before cache roots are deleted

use super::context::UiContext;
use super::status;
use crate::error::{TpoError, TpoResult};
use std::path::Path;

/// Ask before removing everything under `roots`.
///
/// `--yes` approves without asking. Without a terminal the answer is no,
/// so scripts have to pass `--yes` to delete anything.
pub async fn confirm_removal(ctx: &UiContext, roots: &[&Path]) -> TpoResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(false);
    }

    status::paths(ctx, roots);
    let question = match roots.len() {
        1 => "Remove this cache and everything in it?".to_string(),
        n => format!("Remove these {n} caches and everything in them?"),
    };

    // The prompt reads stdin synchronously
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(question).initial_value(false).interact()
    })
    .await
    .map_err(|e| TpoError::Internal(format!("prompt task failed: {e}")))?
    .map_err(|e| TpoError::User(format!("Prompt failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yes_flag_approves() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(confirm_removal(&ctx, &[Path::new("/p/.tpo")]).await.unwrap());
    }

    #[tokio::test]
    async fn no_terminal_declines() {
        let ctx = UiContext::non_interactive();
        let roots = [Path::new("/p/.tpo"), Path::new("/home/u/.tpo_global")];
        assert!(!confirm_removal(&ctx, &roots).await.unwrap());
    }
}
