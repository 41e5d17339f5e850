use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::engine::Context;
use crate::makefile::Makefile;

/// Boxed future returned by closure recipes
pub type RecipeFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// The body of a make target.
///
/// Recipes receive the makefile so they can run their own dependencies
/// through [`Makefile::depend`] before doing their work.
#[async_trait]
pub trait Recipe: Send + Sync {
    async fn build(&self, ctx: &Context, mf: &Makefile) -> anyhow::Result<()>;
}

/// Adapter turning a closure into a [`Recipe`]
pub struct FnRecipe<F>(F);

#[async_trait]
impl<F> Recipe for FnRecipe<F>
where
    F: for<'a> Fn(&'a Context, &'a Makefile) -> RecipeFuture<'a> + Send + Sync,
{
    async fn build(&self, ctx: &Context, mf: &Makefile) -> anyhow::Result<()> {
        (self.0)(ctx, mf).await
    }
}

/// Build a recipe from a closure returning a boxed future.
///
/// ```
/// use pipewright::traits::recipe_fn;
///
/// let recipe = recipe_fn(|ctx, mf| {
///     Box::pin(async move {
///         mf.depend(ctx, &["generate"]).await?;
///         anyhow::Ok(())
///     })
/// });
/// # let _ = recipe;
/// ```
pub fn recipe_fn<F>(f: F) -> Arc<dyn Recipe>
where
    F: for<'a> Fn(&'a Context, &'a Makefile) -> RecipeFuture<'a> + Send + Sync + 'static,
{
    Arc::new(FnRecipe(f))
}
